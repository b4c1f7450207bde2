//! Maps payment-gateway transaction statuses onto [`PaymentStatus`].

use order_types::{EventSource, GatewayNotification, PaymentStatus, WebhookEvent};

/// Outcome of mapping a gateway status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayStatus {
	Mapped(PaymentStatus),
	/// Recorded in the audit trail but never applied.
	Unrecognized,
}

impl GatewayStatus {
	pub fn payment_status(&self) -> Option<PaymentStatus> {
		match self {
			GatewayStatus::Mapped(status) => Some(*status),
			GatewayStatus::Unrecognized => None,
		}
	}
}

/// Maps a gateway `transaction_status` (and `fraud_status` for card captures).
///
/// | transaction status          | fraud status | result        |
/// |-----------------------------|--------------|---------------|
/// | `capture`                   | `accept`     | `Paid`        |
/// | `capture`                   | `challenge`  | `Pending`     |
/// | `capture`                   | other/none   | unrecognized  |
/// | `settlement`                | any          | `Paid`        |
/// | `pending`                   | any          | `Pending`     |
/// | `deny`, `cancel`, `failure` | any          | `Failed`      |
/// | `expire`                    | any          | `Expired`     |
///
/// Matching is case-insensitive and ignores surrounding whitespace.
pub fn map_gateway_status(transaction_status: &str, fraud_status: Option<&str>) -> GatewayStatus {
	let transaction_status = transaction_status.trim().to_ascii_lowercase();
	let fraud_status = fraud_status.map(|f| f.trim().to_ascii_lowercase());

	match transaction_status.as_str() {
		"capture" => match fraud_status.as_deref() {
			Some("accept") => GatewayStatus::Mapped(PaymentStatus::Paid),
			Some("challenge") => GatewayStatus::Mapped(PaymentStatus::Pending),
			_ => GatewayStatus::Unrecognized,
		},
		"settlement" => GatewayStatus::Mapped(PaymentStatus::Paid),
		"pending" => GatewayStatus::Mapped(PaymentStatus::Pending),
		"deny" | "cancel" | "failure" => GatewayStatus::Mapped(PaymentStatus::Failed),
		"expire" => GatewayStatus::Mapped(PaymentStatus::Expired),
		_ => GatewayStatus::Unrecognized,
	}
}

/// Maps a notification and builds the audit entry recording it.
pub fn classify(
	notification: &GatewayNotification,
	source: EventSource,
) -> (GatewayStatus, WebhookEvent) {
	let mapped = map_gateway_status(
		&notification.transaction_status,
		notification.fraud_status.as_deref(),
	);
	let event = WebhookEvent::from_notification(notification, source, mapped.payment_status());
	(mapped, event)
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn test_status_mapping() {
		use GatewayStatus::*;
		use PaymentStatus::*;

		let cases = [
			("capture", Some("accept"), Mapped(Paid)),
			("capture", Some("challenge"), Mapped(Pending)),
			("capture", Some("deny"), Unrecognized),
			("capture", None, Unrecognized),
			("settlement", None, Mapped(Paid)),
			("pending", None, Mapped(Pending)),
			("deny", None, Mapped(Failed)),
			("cancel", None, Mapped(Failed)),
			("failure", None, Mapped(Failed)),
			("expire", None, Mapped(Expired)),
			("refund", None, Unrecognized),
			("authorize", None, Unrecognized),
			("", None, Unrecognized),
		];
		for (tx, fraud, expected) in cases {
			assert_eq!(map_gateway_status(tx, fraud), expected, "{} / {:?}", tx, fraud);
		}
	}

	#[test]
	fn test_mapping_is_case_insensitive() {
		assert_eq!(
			map_gateway_status(" Settlement ", None),
			GatewayStatus::Mapped(PaymentStatus::Paid)
		);
		assert_eq!(
			map_gateway_status("CAPTURE", Some("Accept")),
			GatewayStatus::Mapped(PaymentStatus::Paid)
		);
	}

	#[test]
	fn test_classify_records_unrecognized() {
		let notification = GatewayNotification::from_payload(json!({
			"order_id": "ORD-1",
			"transaction_status": "authorize",
			"payment_type": "credit_card"
		}))
		.unwrap();
		let (mapped, event) = classify(&notification, EventSource::Webhook);
		assert_eq!(mapped, GatewayStatus::Unrecognized);
		assert_eq!(event.mapped_status, None);
		assert_eq!(event.source_transaction_status, "authorize");
		assert_eq!(event.payment_type.as_deref(), Some("credit_card"));
		assert_eq!(event.raw_payload["order_id"], "ORD-1");
	}
}
