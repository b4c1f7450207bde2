//! Payment-gateway reconciliation: inbound webhooks and status polling.
//!
//! Both paths share one routine. Under the order's lock the report is
//! appended to the audit trail unconditionally, then its mapped status (if
//! any) goes through the transition engine, whose idempotence, sticky-paid
//! and priority rules make replayed and reordered reports harmless.

use super::reconciler::{classify, GatewayStatus};
use super::transition::TransitionRequest;
use super::OrderLifecycle;
use crate::LifecycleError;
use order_gateway::GatewayError;
use order_types::{Actor, EventSource, GatewayNotification, WebhookAck};
use tracing::instrument;

impl OrderLifecycle {
	/// Records and applies a gateway notification for `order_ref`.
	///
	/// Succeeds once the event is recorded, even when the status is
	/// unrecognized or changes nothing.
	#[instrument(skip_all, fields(order_ref = %order_ref))]
	pub async fn handle_gateway_webhook(
		&self,
		order_ref: &str,
		payload: serde_json::Value,
	) -> Result<WebhookAck, LifecycleError> {
		let notification = GatewayNotification::from_payload(payload)
			.map_err(|e| LifecycleError::Validation(format!("malformed notification: {}", e)))?;
		if notification.order_id != order_ref {
			return Err(LifecycleError::Validation(format!(
				"notification is for {}, not {}",
				notification.order_id, order_ref
			)));
		}

		self.reconcile(order_ref, &notification, EventSource::Webhook, Actor::Webhook)
			.await
	}

	/// Polls the gateway for the current status and applies it like a webhook.
	#[instrument(skip_all, fields(order_ref = %order_ref))]
	pub async fn sync_payment_status(&self, order_ref: &str) -> Result<WebhookAck, LifecycleError> {
		if self.store.get(order_ref).await?.is_none() {
			return Err(LifecycleError::NotFound(order_ref.to_string()));
		}

		// The gateway call happens outside the order's lock.
		let notification = self
			.gateway
			.fetch_status(order_ref)
			.await
			.map_err(|e| match e {
				GatewayError::NotFound(_) => LifecycleError::Gateway(format!(
					"gateway has no transaction for {}",
					order_ref
				)),
				other => LifecycleError::Gateway(other.to_string()),
			})?;

		self.reconcile(order_ref, &notification, EventSource::Poll, Actor::PaymentSystem)
			.await
	}

	async fn reconcile(
		&self,
		order_ref: &str,
		notification: &GatewayNotification,
		source: EventSource,
		actor: Actor,
	) -> Result<WebhookAck, LifecycleError> {
		let (mapped, event) = classify(notification, source);

		let (request, transition) = {
			let _guard = self.lock(order_ref).await?;
			if self.store.get(order_ref).await?.is_none() {
				return Err(LifecycleError::NotFound(order_ref.to_string()));
			}

			let trail_len = self.store.append_event(order_ref, &event).await?;
			tracing::debug!(
				transaction_status = %notification.transaction_status,
				trail_len,
				"Payment event recorded"
			);

			match mapped {
				GatewayStatus::Unrecognized => {
					tracing::warn!(
						transaction_status = %notification.transaction_status,
						fraud_status = ?notification.fraud_status,
						"Unrecognized gateway status, recorded without applying"
					);
					(None, None)
				},
				GatewayStatus::Mapped(status) => {
					let request = TransitionRequest::payment(status, actor);
					let transition = self.commit_locked(order_ref, &request).await?;
					(Some(request), Some(transition))
				},
			}
		};

		if let (Some(request), Some(transition)) = (&request, &transition) {
			self.after_commit(transition, request, true).await;
		}

		Ok(WebhookAck {
			order_ref: order_ref.to_string(),
			recorded: true,
			mapped_status: mapped.payment_status(),
			transition: transition.map(|t| t.result),
		})
	}
}

#[cfg(test)]
mod tests {
	use crate::test_support::{admin, Harness};
	use crate::LifecycleError;
	use order_types::{EventSource, OrderEvent, OrderStatus, PaymentStatus};
	use serde_json::{json, Value};
	use std::sync::Arc;

	fn notification(order_ref: &str, status: &str) -> Value {
		json!({
			"order_id": order_ref,
			"transaction_status": status,
			"payment_type": "bank_transfer",
			"gross_amount": "110000.00"
		})
	}

	#[tokio::test]
	async fn test_settlement_pays_and_advances() {
		let mut harness = Harness::new(&[(1, 5)]).await;
		let order = harness.place_order(2).await;

		let ack = harness
			.lifecycle
			.handle_gateway_webhook(&order.order_ref, notification(&order.order_ref, "settlement"))
			.await
			.unwrap();
		assert!(ack.recorded);
		assert_eq!(ack.mapped_status, Some(PaymentStatus::Paid));
		let result = ack.transition.unwrap();
		assert!(result.changed);
		assert!(result.derived_secondary_change);

		let stored = harness.lifecycle.get_order(&order.order_ref).await.unwrap();
		assert_eq!(stored.payment_status, PaymentStatus::Paid);
		assert_eq!(stored.status, OrderStatus::Processing);
		assert_eq!(stored.status_updated_by.to_string(), "midtrans_webhook");

		let events = harness.drain_events();
		assert_eq!(events.len(), 2);
		assert!(matches!(
			events[0],
			OrderEvent::PaymentStatusChanged {
				old_payment_status: PaymentStatus::Pending,
				new_payment_status: PaymentStatus::Paid,
				..
			}
		));
		assert!(matches!(
			events[1],
			OrderEvent::OrderStatusChanged {
				old_status: OrderStatus::WaitingForPayment,
				new_status: OrderStatus::Processing,
				..
			}
		));
	}

	#[tokio::test]
	async fn test_late_pending_after_paid_is_audited_only() {
		let mut harness = Harness::new(&[(1, 5)]).await;
		let order = harness.place_order(2).await;
		let lifecycle = &harness.lifecycle;

		lifecycle
			.handle_gateway_webhook(&order.order_ref, notification(&order.order_ref, "settlement"))
			.await
			.unwrap();
		let paid = lifecycle.get_order(&order.order_ref).await.unwrap();

		let ack = lifecycle
			.handle_gateway_webhook(&order.order_ref, notification(&order.order_ref, "pending"))
			.await
			.unwrap();
		assert!(!ack.transition.unwrap().changed);

		assert_eq!(lifecycle.get_order(&order.order_ref).await.unwrap(), paid);
		assert_eq!(lifecycle.payment_events(&order.order_ref).await.unwrap().len(), 2);
		assert_eq!(harness.drain_events().len(), 2);
	}

	#[tokio::test]
	async fn test_replayed_webhook_applies_once() {
		let mut harness = Harness::new(&[(1, 5)]).await;
		let order = harness.place_order(1).await;

		let mut changed = 0;
		for _ in 0..5 {
			let ack = harness
				.lifecycle
				.handle_gateway_webhook(
					&order.order_ref,
					json!({
						"order_id": order.order_ref,
						"transaction_status": "capture",
						"fraud_status": "accept",
					}),
				)
				.await
				.unwrap();
			if ack.transition.is_some_and(|t| t.changed) {
				changed += 1;
			}
		}
		assert_eq!(changed, 1);

		let trail = harness.lifecycle.payment_events(&order.order_ref).await.unwrap();
		assert_eq!(trail.len(), 5);
		assert!(trail
			.iter()
			.all(|e| e.mapped_status == Some(PaymentStatus::Paid) && e.source == EventSource::Webhook));
		assert_eq!(harness.drain_events().len(), 2);
	}

	#[tokio::test]
	async fn test_unrecognized_status_is_recorded() {
		let mut harness = Harness::new(&[(1, 5)]).await;
		let order = harness.place_order(1).await;

		let ack = harness
			.lifecycle
			.handle_gateway_webhook(&order.order_ref, notification(&order.order_ref, "authorize"))
			.await
			.unwrap();
		assert!(ack.recorded);
		assert_eq!(ack.mapped_status, None);
		assert!(ack.transition.is_none());

		let trail = harness.lifecycle.payment_events(&order.order_ref).await.unwrap();
		assert_eq!(trail.len(), 1);
		assert_eq!(trail[0].raw_payload["gross_amount"], "110000.00");
		assert_eq!(
			harness.lifecycle.get_order(&order.order_ref).await.unwrap(),
			order
		);
		assert!(harness.drain_events().is_empty());
	}

	#[tokio::test]
	async fn test_webhook_for_unknown_order() {
		let harness = Harness::new(&[]).await;
		let err = harness
			.lifecycle
			.handle_gateway_webhook("ORD-NOPE", notification("ORD-NOPE", "settlement"))
			.await
			.unwrap_err();
		assert!(matches!(err, LifecycleError::NotFound(_)));
		assert!(matches!(
			harness.lifecycle.payment_events("ORD-NOPE").await,
			Err(LifecycleError::NotFound(_))
		));
	}

	#[tokio::test]
	async fn test_mismatched_or_malformed_payload() {
		let mut harness = Harness::new(&[(1, 5)]).await;
		let order = harness.place_order(1).await;

		let err = harness
			.lifecycle
			.handle_gateway_webhook(&order.order_ref, notification("ORD-OTHER", "settlement"))
			.await
			.unwrap_err();
		assert!(matches!(err, LifecycleError::Validation(_)));

		let err = harness
			.lifecycle
			.handle_gateway_webhook(&order.order_ref, json!({ "order_id": order.order_ref }))
			.await
			.unwrap_err();
		assert!(matches!(err, LifecycleError::Validation(_)));
		assert!(harness
			.lifecycle
			.payment_events(&order.order_ref)
			.await
			.unwrap()
			.is_empty());
	}

	#[tokio::test]
	async fn test_late_capture_after_refund_is_ignored() {
		let mut harness = Harness::new(&[(1, 5)]).await;
		let order = harness.place_order(1).await;
		let lifecycle = &harness.lifecycle;

		lifecycle
			.update_payment_status(&order.order_ref, PaymentStatus::Paid, admin())
			.await
			.unwrap();
		lifecycle
			.update_payment_status(&order.order_ref, PaymentStatus::Refunded, admin())
			.await
			.unwrap();

		let ack = lifecycle
			.handle_gateway_webhook(&order.order_ref, notification(&order.order_ref, "settlement"))
			.await
			.unwrap();
		assert!(!ack.transition.unwrap().changed);
		assert_eq!(
			lifecycle.get_order(&order.order_ref).await.unwrap().payment_status,
			PaymentStatus::Refunded
		);

		// An administrator can still correct it.
		let result = lifecycle
			.update_payment_status(&order.order_ref, PaymentStatus::Paid, admin())
			.await
			.unwrap();
		assert!(result.changed);
	}

	#[tokio::test]
	async fn test_expiry_then_cancel() {
		let mut harness = Harness::new(&[(1, 5)]).await;
		let order = harness.place_order(3).await;

		harness
			.lifecycle
			.handle_gateway_webhook(&order.order_ref, notification(&order.order_ref, "expire"))
			.await
			.unwrap();
		let stored = harness.lifecycle.get_order(&order.order_ref).await.unwrap();
		assert_eq!(stored.payment_status, PaymentStatus::Expired);
		assert_eq!(stored.status, OrderStatus::WaitingForPayment);

		// A retried pending from before the expiry is out of date.
		let ack = harness
			.lifecycle
			.handle_gateway_webhook(&order.order_ref, notification(&order.order_ref, "pending"))
			.await
			.unwrap();
		assert!(!ack.transition.unwrap().changed);

		harness
			.lifecycle
			.update_status(&order.order_ref, OrderStatus::Cancelled, admin(), None, true)
			.await
			.unwrap();
		assert_eq!(harness.stock(1).await, 5);
	}

	#[tokio::test]
	async fn test_sync_applies_polled_status() {
		let mut harness = Harness::new(&[(1, 5)]).await;
		let order = harness.place_order(1).await;

		let err = harness
			.lifecycle
			.sync_payment_status(&order.order_ref)
			.await
			.unwrap_err();
		assert!(matches!(err, LifecycleError::Gateway(_)));

		harness
			.gateway
			.set_status(&order.order_ref, "capture", Some("accept"));
		let ack = harness
			.lifecycle
			.sync_payment_status(&order.order_ref)
			.await
			.unwrap();
		assert_eq!(ack.mapped_status, Some(PaymentStatus::Paid));

		let stored = harness.lifecycle.get_order(&order.order_ref).await.unwrap();
		assert_eq!(stored.status, OrderStatus::Processing);
		assert_eq!(stored.status_updated_by.to_string(), "payment_system");

		let trail = harness.lifecycle.payment_events(&order.order_ref).await.unwrap();
		assert_eq!(trail.len(), 1);
		assert_eq!(trail[0].source, EventSource::Poll);

		assert!(matches!(
			harness.lifecycle.sync_payment_status("ORD-NOPE").await,
			Err(LifecycleError::NotFound(_))
		));
	}

	#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
	async fn test_admin_and_webhook_race_commit_once() {
		let mut harness = Harness::new(&[(1, 50)]).await;

		for _ in 0..10 {
			let order = harness.place_order(1).await;
			let admin_side = {
				let lifecycle = Arc::clone(&harness.lifecycle);
				let order_ref = order.order_ref.clone();
				tokio::spawn(async move {
					lifecycle
						.update_payment_status(&order_ref, PaymentStatus::Paid, admin())
						.await
						.unwrap()
				})
			};
			let webhook_side = {
				let lifecycle = Arc::clone(&harness.lifecycle);
				let order_ref = order.order_ref.clone();
				tokio::spawn(async move {
					lifecycle
						.handle_gateway_webhook(&order_ref, notification(&order_ref, "settlement"))
						.await
						.unwrap()
				})
			};

			let admin_result = admin_side.await.unwrap();
			let webhook_result = webhook_side.await.unwrap().transition.unwrap();
			assert!(admin_result.changed ^ webhook_result.changed);

			let stored = harness.lifecycle.get_order(&order.order_ref).await.unwrap();
			assert_eq!(stored.payment_status, PaymentStatus::Paid);
			assert_eq!(stored.status, OrderStatus::Processing);
			assert_eq!(stored.version, order.version + 1);

			let events = harness.drain_events();
			assert_eq!(events.len(), 2);
		}
	}
}
