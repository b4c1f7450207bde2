//! Background maintenance for the lifecycle engine.

use super::OrderLifecycle;
use crate::LifecycleError;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

impl OrderLifecycle {
	/// Removes expired storage entries and idle order locks.
	///
	/// Returns the number of expired storage entries removed.
	pub async fn cleanup(&self) -> Result<usize, LifecycleError> {
		let pruned = self.locks.prune();
		if pruned > 0 {
			tracing::trace!(pruned, "Pruned idle order locks");
		}
		Ok(self.storage.cleanup_expired().await?)
	}

	/// Runs [`cleanup`](Self::cleanup) every `storage.cleanup_interval_seconds`.
	///
	/// The task runs until aborted.
	pub fn spawn_cleanup(self: &Arc<Self>) -> JoinHandle<()> {
		let engine = Arc::clone(self);
		let period = Duration::from_secs(self.config.storage.cleanup_interval_seconds);
		tokio::spawn(async move {
			let mut interval = tokio::time::interval(period);
			loop {
				interval.tick().await;
				match engine.cleanup().await {
					Ok(count) if count > 0 => {
						tracing::debug!("Storage cleanup: removed {} expired entries", count);
					},
					Err(e) => {
						tracing::warn!("Storage cleanup failed: {}", e);
					},
					_ => {},
				}
			}
		})
	}
}

#[cfg(test)]
mod tests {
	use crate::test_support::{admin, new_order, Harness};
	use order_types::{OrderEvent, OrderStatus, PaymentStatus};
	use rust_decimal_macros::dec;
	use serde_json::json;

	/// Create, pay by webhook, reject an unpaid-style jump, replay a stale
	/// report, then walk a second order through cancellation.
	#[tokio::test]
	async fn test_order_walkthrough() {
		let mut harness = Harness::new(&[(1, 5)]).await;
		let lifecycle = harness.lifecycle.clone();

		let order = lifecycle
			.create_order(new_order(&[(1, 2, dec!(50000))]), Some("cart-1"))
			.await
			.unwrap()
			.order;
		assert_eq!(harness.stock(1).await, 3);
		assert_eq!(order.status, OrderStatus::WaitingForPayment);
		assert_eq!(order.payment_status, PaymentStatus::Pending);

		let err = lifecycle
			.update_status(&order.order_ref, OrderStatus::Delivered, admin(), None, true)
			.await
			.unwrap_err();
		assert!(err.to_string().contains("must be paid"));

		lifecycle
			.handle_gateway_webhook(
				&order.order_ref,
				json!({ "order_id": order.order_ref, "transaction_status": "settlement" }),
			)
			.await
			.unwrap();
		lifecycle
			.handle_gateway_webhook(
				&order.order_ref,
				json!({ "order_id": order.order_ref, "transaction_status": "pending" }),
			)
			.await
			.unwrap();

		let paid = lifecycle.get_order(&order.order_ref).await.unwrap();
		assert_eq!(paid.status, OrderStatus::Processing);
		assert_eq!(paid.payment_status, PaymentStatus::Paid);
		assert_eq!(
			lifecycle.payment_events(&order.order_ref).await.unwrap().len(),
			2
		);

		let kinds: Vec<&str> = harness.drain_events().iter().map(OrderEvent::kind).collect();
		assert_eq!(
			kinds,
			["created", "payment_status_changed", "order_status_changed"]
		);

		let second = harness.place_order(2).await;
		assert_eq!(harness.stock(1).await, 1);
		lifecycle
			.update_status(&second.order_ref, OrderStatus::Cancelled, admin(), None, true)
			.await
			.unwrap();
		assert_eq!(harness.stock(1).await, 3);
	}

	#[tokio::test]
	async fn test_cleanup_prunes_idle_locks() {
		let mut harness = Harness::new(&[(1, 5)]).await;
		let order = harness.place_order(1).await;
		harness
			.lifecycle
			.update_status(&order.order_ref, OrderStatus::Cancelled, admin(), None, true)
			.await
			.unwrap();
		assert!(!harness.lifecycle.locks.is_empty());

		harness.lifecycle.cleanup().await.unwrap();
		assert!(harness.lifecycle.locks.is_empty());
	}

	#[tokio::test(start_paused = true)]
	async fn test_cleanup_task_runs_until_aborted() {
		let harness = Harness::new(&[]).await;
		let handle = harness.lifecycle.spawn_cleanup();
		tokio::time::sleep(std::time::Duration::from_secs(300)).await;
		assert!(!handle.is_finished());
		handle.abort();
		assert!(handle.await.unwrap_err().is_cancelled());
	}
}
