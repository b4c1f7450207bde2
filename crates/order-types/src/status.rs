//! Order and payment status model.
//!
//! Defines the two status vocabularies of an order together with the single
//! authoritative transition table for fulfillment status. Every caller
//! (admin handlers, webhook reconciliation, tests) validates through these
//! functions rather than matching on strings.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error returned when a status string cannot be parsed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Unknown {kind} '{value}'")]
pub struct ParseStatusError {
	pub kind: &'static str,
	pub value: String,
}

/// Fulfillment stage of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
	/// Order placed, waiting for the gateway to confirm payment.
	WaitingForPayment,
	/// Payment confirmed, order is being prepared.
	Processing,
	/// Order handed to the courier.
	Shipping,
	/// Order received by the customer. Terminal.
	Delivered,
	/// Order cancelled. Terminal.
	Cancelled,
}

/// Static transition table - each status maps to its allowed next statuses.
static ORDER_TRANSITIONS: Lazy<HashMap<OrderStatus, HashSet<OrderStatus>>> = Lazy::new(|| {
	use OrderStatus::*;

	let mut m = HashMap::new();
	m.insert(WaitingForPayment, HashSet::from([Processing, Cancelled]));
	m.insert(Processing, HashSet::from([Shipping, Cancelled]));
	m.insert(Shipping, HashSet::from([Delivered, Cancelled]));
	m.insert(Delivered, HashSet::new()); // terminal success
	m.insert(Cancelled, HashSet::new()); // terminal
	m
});

impl OrderStatus {
	/// All statuses, in lifecycle order.
	pub const ALL: [OrderStatus; 5] = [
		OrderStatus::WaitingForPayment,
		OrderStatus::Processing,
		OrderStatus::Shipping,
		OrderStatus::Delivered,
		OrderStatus::Cancelled,
	];

	pub fn as_str(&self) -> &'static str {
		match self {
			OrderStatus::WaitingForPayment => "waiting_for_payment",
			OrderStatus::Processing => "processing",
			OrderStatus::Shipping => "shipping",
			OrderStatus::Delivered => "delivered",
			OrderStatus::Cancelled => "cancelled",
		}
	}

	/// Checks the transition table for `self -> to`.
	///
	/// A status is never a valid transition target of itself; idempotent
	/// requests are handled by the transition engine before consulting the table.
	pub fn can_transition_to(&self, to: OrderStatus) -> bool {
		ORDER_TRANSITIONS
			.get(self)
			.is_some_and(|allowed| allowed.contains(&to))
	}

	/// Returns true when no further status transition is possible.
	pub fn is_terminal(&self) -> bool {
		ORDER_TRANSITIONS
			.get(self)
			.is_none_or(|allowed| allowed.is_empty())
	}

	/// Statuses that may only be entered once the order is paid.
	pub fn requires_payment(&self) -> bool {
		matches!(
			self,
			OrderStatus::Processing | OrderStatus::Shipping | OrderStatus::Delivered
		)
	}
}

impl fmt::Display for OrderStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for OrderStatus {
	type Err = ParseStatusError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		OrderStatus::ALL
			.into_iter()
			.find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
			.ok_or_else(|| ParseStatusError {
				kind: "order status",
				value: s.to_string(),
			})
	}
}

/// Settlement state of an order's charge as reported by the payment gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
	Pending,
	Paid,
	Failed,
	Expired,
	Refunded,
}

impl PaymentStatus {
	pub const ALL: [PaymentStatus; 5] = [
		PaymentStatus::Pending,
		PaymentStatus::Paid,
		PaymentStatus::Failed,
		PaymentStatus::Expired,
		PaymentStatus::Refunded,
	];

	pub fn as_str(&self) -> &'static str {
		match self {
			PaymentStatus::Pending => "pending",
			PaymentStatus::Paid => "paid",
			PaymentStatus::Failed => "failed",
			PaymentStatus::Expired => "expired",
			PaymentStatus::Refunded => "refunded",
		}
	}

	/// Rank used to refuse out-of-order gateway reports.
	///
	/// `Pending` < `Paid` < `Failed` = `Expired` = `Refunded`.
	pub fn priority(&self) -> u8 {
		match self {
			PaymentStatus::Pending => 0,
			PaymentStatus::Paid => 1,
			PaymentStatus::Failed | PaymentStatus::Expired | PaymentStatus::Refunded => 2,
		}
	}

	/// Once paid, only a refund may move the payment status away from `Paid`
	/// unless an administrator overrides it.
	pub fn is_sticky_downgrade(&self, to: PaymentStatus) -> bool {
		*self == PaymentStatus::Paid && !matches!(to, PaymentStatus::Paid | PaymentStatus::Refunded)
	}
}

impl fmt::Display for PaymentStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for PaymentStatus {
	type Err = ParseStatusError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		PaymentStatus::ALL
			.into_iter()
			.find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
			.ok_or_else(|| ParseStatusError {
				kind: "payment status",
				value: s.to_string(),
			})
	}
}
