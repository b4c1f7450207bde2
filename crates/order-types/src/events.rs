//! Domain events published by the lifecycle engine.
//!
//! Events flow through an event bus; notification dispatchers subscribe to
//! it and deliver them independently of the state transition that produced
//! them. Each event carries enough context to render a user-facing message
//! without reading the order again.

use crate::order::Actor;
use crate::status::{OrderStatus, PaymentStatus};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Events related to an order's lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderEvent {
	/// A new order was placed.
	Created {
		order_ref: String,
		total_amount: Decimal,
		item_count: u64,
		payment_method: String,
	},
	/// The fulfillment status changed.
	OrderStatusChanged {
		order_ref: String,
		old_status: OrderStatus,
		new_status: OrderStatus,
		actor: Actor,
		#[serde(default, skip_serializing_if = "Option::is_none")]
		reason: Option<String>,
	},
	/// The payment status changed.
	PaymentStatusChanged {
		order_ref: String,
		old_payment_status: PaymentStatus,
		new_payment_status: PaymentStatus,
		actor: Actor,
		total_amount: Decimal,
	},
}

impl OrderEvent {
	pub fn order_ref(&self) -> &str {
		match self {
			OrderEvent::Created { order_ref, .. }
			| OrderEvent::OrderStatusChanged { order_ref, .. }
			| OrderEvent::PaymentStatusChanged { order_ref, .. } => order_ref,
		}
	}

	/// Short machine name, used in logs and outbound payloads.
	pub fn kind(&self) -> &'static str {
		match self {
			OrderEvent::Created { .. } => "created",
			OrderEvent::OrderStatusChanged { .. } => "order_status_changed",
			OrderEvent::PaymentStatusChanged { .. } => "payment_status_changed",
		}
	}
}
