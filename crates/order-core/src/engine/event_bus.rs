//! Broadcast channel carrying domain events out of the engine.
//!
//! Publishing never blocks and never fails the caller: with no subscribers
//! the event is dropped, and slow subscribers observe `Lagged` instead of
//! back-pressuring a transition.

use order_types::OrderEvent;
use tokio::sync::broadcast;

#[derive(Clone)]
pub struct EventBus {
	sender: broadcast::Sender<OrderEvent>,
}

impl EventBus {
	/// Creates a bus buffering up to `capacity` events per subscriber.
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity);
		Self { sender }
	}

	/// Publishes an event, returning the number of subscribers reached.
	pub fn publish(
		&self,
		event: OrderEvent,
	) -> Result<usize, broadcast::error::SendError<OrderEvent>> {
		self.sender.send(event)
	}

	pub fn subscribe(&self) -> broadcast::Receiver<OrderEvent> {
		self.sender.subscribe()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rust_decimal_macros::dec;

	fn created(order_ref: &str) -> OrderEvent {
		OrderEvent::Created {
			order_ref: order_ref.to_string(),
			total_amount: dec!(100000),
			item_count: 2,
			payment_method: "bank_transfer".to_string(),
		}
	}

	#[tokio::test]
	async fn test_publish_without_subscribers_is_harmless() {
		let bus = EventBus::new(8);
		assert!(bus.publish(created("ORD-1")).is_err());

		let mut rx = bus.subscribe();
		assert_eq!(bus.publish(created("ORD-2")).unwrap(), 1);
		assert_eq!(rx.recv().await.unwrap().order_ref(), "ORD-2");
	}
}
