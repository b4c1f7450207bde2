//! Inbound payment-gateway notifications.

use crate::apis::api_error;
use crate::server::AppState;
use axum::{extract::State, response::Json};
use order_types::{APIError, WebhookAck};
use serde_json::Value;

/// Handles POST /api/webhooks/payment.
///
/// Answers 200 once the notification is recorded, including unrecognized
/// or no-op statuses, so the gateway stops retrying. Unknown orders get 404.
pub async fn handle_payment_notification(
	State(state): State<AppState>,
	Json(payload): Json<Value>,
) -> Result<Json<WebhookAck>, APIError> {
	let order_ref = payload
		.get("order_id")
		.and_then(Value::as_str)
		.map(str::to_string)
		.ok_or_else(|| APIError::BadRequest {
			error_type: "VALIDATION_ERROR".to_string(),
			message: "notification is missing order_id".to_string(),
			details: None,
		})?;

	match state
		.lifecycle
		.handle_gateway_webhook(&order_ref, payload)
		.await
	{
		Ok(ack) => Ok(Json(ack)),
		Err(e) => {
			tracing::warn!(order_ref = %order_ref, error = %e, "Payment notification rejected");
			Err(api_error(e))
		},
	}
}
