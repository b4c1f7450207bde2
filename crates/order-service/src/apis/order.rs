//! Order endpoints: creation, reads and administrative updates.

use crate::apis::api_error;
use crate::server::AppState;
use axum::{
	extract::{Path, State},
	http::{HeaderMap, StatusCode},
	response::Json,
};
use order_types::{
	APIError, Actor, CreateOrderRequest, Order, TransitionResult, UpdatePaymentStatusRequest,
	UpdateStatusRequest, WebhookAck, WebhookEvent,
};
use validator::Validate;

const IDEMPOTENCY_HEADER: &str = "idempotency-key";

/// Actor for an administrative request without an explicit admin id.
fn admin_actor(admin_id: Option<String>) -> Actor {
	Actor::Admin(admin_id.unwrap_or_else(|| "anonymous".to_string()))
}

/// Handles POST /api/orders.
///
/// Returns 201 for a new order and 200 when an `Idempotency-Key` repeat
/// returns the order created earlier.
pub async fn create_order(
	State(state): State<AppState>,
	headers: HeaderMap,
	Json(request): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<Order>), APIError> {
	request.validate()?;

	let idempotency_key = headers
		.get(IDEMPOTENCY_HEADER)
		.map(|value| {
			value.to_str().map_err(|_| APIError::BadRequest {
				error_type: "VALIDATION_ERROR".to_string(),
				message: "Idempotency-Key must be visible ASCII".to_string(),
				details: None,
			})
		})
		.transpose()?;

	let created = state
		.lifecycle
		.create_order(request.into(), idempotency_key)
		.await
		.map_err(api_error)?;

	let status = if created.replayed {
		StatusCode::OK
	} else {
		StatusCode::CREATED
	};
	Ok((status, Json(created.order)))
}

/// Handles GET /api/orders/{ref}.
pub async fn get_order(
	Path(order_ref): Path<String>,
	State(state): State<AppState>,
) -> Result<Json<Order>, APIError> {
	state
		.lifecycle
		.get_order(&order_ref)
		.await
		.map(Json)
		.map_err(api_error)
}

/// Handles POST /api/orders/{ref}/status.
pub async fn update_status(
	Path(order_ref): Path<String>,
	State(state): State<AppState>,
	Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<TransitionResult>, APIError> {
	request.validate()?;

	state
		.lifecycle
		.update_status(
			&order_ref,
			request.status,
			admin_actor(request.admin_id),
			request.notes,
			request.notify.unwrap_or(true),
		)
		.await
		.map(Json)
		.map_err(api_error)
}

/// Handles POST /api/orders/{ref}/payment-status.
pub async fn update_payment_status(
	Path(order_ref): Path<String>,
	State(state): State<AppState>,
	Json(request): Json<UpdatePaymentStatusRequest>,
) -> Result<Json<TransitionResult>, APIError> {
	request.validate()?;

	state
		.lifecycle
		.update_payment_status(
			&order_ref,
			request.payment_status,
			admin_actor(request.admin_id),
		)
		.await
		.map(Json)
		.map_err(api_error)
}

/// Handles POST /api/orders/{ref}/sync.
pub async fn sync_payment_status(
	Path(order_ref): Path<String>,
	State(state): State<AppState>,
) -> Result<Json<WebhookAck>, APIError> {
	state
		.lifecycle
		.sync_payment_status(&order_ref)
		.await
		.map(Json)
		.map_err(api_error)
}

/// Handles GET /api/orders/{ref}/payment-events.
pub async fn payment_events(
	Path(order_ref): Path<String>,
	State(state): State<AppState>,
) -> Result<Json<Vec<WebhookEvent>>, APIError> {
	state
		.lifecycle
		.payment_events(&order_ref)
		.await
		.map(Json)
		.map_err(api_error)
}
