//! Order record types.
//!
//! An order is created once, mutated by status and payment-status transitions
//! and never deleted. Line items are a price/name snapshot taken at creation.

use crate::status::{OrderStatus, PaymentStatus};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A purchased product, frozen at order creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
	pub product_id: u64,
	pub name: String,
	pub unit_price: Decimal,
	pub quantity: u32,
}

impl LineItem {
	/// `unit_price * quantity`, or `None` on overflow.
	pub fn line_total(&self) -> Option<Decimal> {
		self.unit_price.checked_mul(Decimal::from(self.quantity))
	}
}

/// Where and how the order is shipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingInfo {
	pub recipient_name: String,
	pub phone: String,
	pub address: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub courier: Option<String>,
	/// Shipping cost charged on top of the line items.
	pub cost: Decimal,
}

/// Who requested a change.
///
/// Serialized as the tag stored in `statusUpdatedBy`:
/// `admin:<id>`, `payment_system`, `midtrans_webhook` or `system`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Actor {
	/// An administrator acting through the back office.
	Admin(String),
	/// The payment gateway, polled by this service.
	PaymentSystem,
	/// The payment gateway, via an inbound notification.
	Webhook,
	/// This service on its own behalf (creation, maintenance).
	System,
}

impl Actor {
	pub fn is_admin(&self) -> bool {
		matches!(self, Actor::Admin(_))
	}

	/// True for updates reported by the payment gateway.
	pub fn is_gateway(&self) -> bool {
		matches!(self, Actor::PaymentSystem | Actor::Webhook)
	}
}

impl fmt::Display for Actor {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Actor::Admin(id) => write!(f, "admin:{}", id),
			Actor::PaymentSystem => f.write_str("payment_system"),
			Actor::Webhook => f.write_str("midtrans_webhook"),
			Actor::System => f.write_str("system"),
		}
	}
}

/// Error returned for an unknown actor tag.
#[derive(Debug, Clone, Error)]
#[error("Invalid actor tag '{0}'")]
pub struct ParseActorError(pub String);

impl FromStr for Actor {
	type Err = ParseActorError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"payment_system" => Ok(Actor::PaymentSystem),
			"midtrans_webhook" => Ok(Actor::Webhook),
			"system" => Ok(Actor::System),
			other => match other.strip_prefix("admin:") {
				Some(id) if !id.is_empty() => Ok(Actor::Admin(id.to_string())),
				_ => Err(ParseActorError(other.to_string())),
			},
		}
	}
}

impl From<Actor> for String {
	fn from(actor: Actor) -> Self {
		actor.to_string()
	}
}

impl TryFrom<String> for Actor {
	type Error = ParseActorError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		value.parse()
	}
}

/// Persisted order record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
	/// Monotonic internal identifier.
	pub id: u64,
	/// Unique external reference, e.g. `ORD-20240101-7KQ2ZD`.
	pub order_ref: String,
	/// Incremented on every committed write; used for compare-and-swap.
	pub version: u64,
	pub status: OrderStatus,
	pub payment_status: PaymentStatus,
	pub line_items: Vec<LineItem>,
	pub shipping: ShippingInfo,
	pub subtotal: Decimal,
	pub shipping_cost: Decimal,
	pub total_amount: Decimal,
	pub payment_method: String,
	/// Informational only, never enforced by the engine.
	pub payment_deadline: DateTime<Utc>,
	pub created_at: DateTime<Utc>,
	pub status_updated_at: DateTime<Utc>,
	pub status_updated_by: Actor,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub paid_at: Option<DateTime<Utc>>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub shipped_at: Option<DateTime<Utc>>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub delivered_at: Option<DateTime<Utc>>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub cancelled_at: Option<DateTime<Utc>>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub cancellation_reason: Option<String>,
}

impl Order {
	/// Total number of units across all line items.
	pub fn item_count(&self) -> u64 {
		self.line_items.iter().map(|i| u64::from(i.quantity)).sum()
	}
}

/// Outcome of a single call into the transition engine.
///
/// Not persisted; the lifecycle service uses it to decide which
/// notifications to emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionResult {
	pub changed: bool,
	pub old_status: OrderStatus,
	pub new_status: OrderStatus,
	pub old_payment_status: PaymentStatus,
	pub new_payment_status: PaymentStatus,
	/// Set when the order status moved as a consequence of a payment change.
	pub derived_secondary_change: bool,
}

impl TransitionResult {
	/// A result describing no change to `order`.
	pub fn unchanged(order: &Order) -> Self {
		Self {
			changed: false,
			old_status: order.status,
			new_status: order.status,
			old_payment_status: order.payment_status,
			new_payment_status: order.payment_status,
			derived_secondary_change: false,
		}
	}

	pub fn status_changed(&self) -> bool {
		self.old_status != self.new_status
	}

	pub fn payment_status_changed(&self) -> bool {
		self.old_payment_status != self.new_payment_status
	}
}
