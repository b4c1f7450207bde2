//! Payment-gateway payloads and the payment audit trail.

use crate::status::PaymentStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The fields the engine reads from a gateway transaction-status payload.
///
/// Everything else in the payload is kept verbatim in `raw` for the audit
/// trail; signing and gateway-specific fields are not interpreted here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayNotification {
	/// The order reference the gateway was given at charge time.
	pub order_id: String,
	pub transaction_status: String,
	#[serde(default)]
	pub fraud_status: Option<String>,
	#[serde(default)]
	pub payment_type: Option<String>,
	#[serde(skip)]
	pub raw: serde_json::Value,
}

impl GatewayNotification {
	/// Parses a raw gateway payload, retaining the full JSON document.
	pub fn from_payload(raw: serde_json::Value) -> Result<Self, serde_json::Error> {
		let mut notification: GatewayNotification = serde_json::from_value(raw.clone())?;
		notification.raw = raw;
		Ok(notification)
	}
}

/// How a gateway status reached the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSource {
	/// Pushed by the gateway.
	Webhook,
	/// Pulled from the gateway's status endpoint.
	Poll,
}

/// One entry in an order's append-only payment audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEvent {
	pub received_at: DateTime<Utc>,
	pub source: EventSource,
	pub source_transaction_status: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub fraud_status: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub payment_type: Option<String>,
	/// Internal status the gateway status mapped to, `None` when unrecognized.
	#[serde(default)]
	pub mapped_status: Option<PaymentStatus>,
	pub raw_payload: serde_json::Value,
}

impl WebhookEvent {
	pub fn from_notification(
		notification: &GatewayNotification,
		source: EventSource,
		mapped_status: Option<PaymentStatus>,
	) -> Self {
		Self {
			received_at: Utc::now(),
			source,
			source_transaction_status: notification.transaction_status.clone(),
			fraud_status: notification.fraud_status.clone(),
			payment_type: notification.payment_type.clone(),
			mapped_status,
			raw_payload: notification.raw.clone(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn test_payload_keeps_raw_document() {
		let raw = json!({
			"order_id": "ORD-1",
			"transaction_status": "capture",
			"fraud_status": "accept",
			"payment_type": "credit_card",
			"gross_amount": "100000.00",
			"signature_key": "abc"
		});
		let n = GatewayNotification::from_payload(raw.clone()).unwrap();
		assert_eq!(n.order_id, "ORD-1");
		assert_eq!(n.fraud_status.as_deref(), Some("accept"));
		assert_eq!(n.raw, raw);
	}

	#[test]
	fn test_payload_requires_status() {
		let raw = json!({ "order_id": "ORD-1" });
		assert!(GatewayNotification::from_payload(raw).is_err());
	}
}
