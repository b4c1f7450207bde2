//! The order state machine.
//!
//! [`apply_transition`] is a pure function over an order snapshot: it
//! validates a requested status and/or payment-status change, derives the
//! implied secondary change and stamps timestamps. It either returns the
//! complete updated order or an error, never a partially updated one.

use chrono::{DateTime, Utc};
use order_types::{Actor, Order, OrderStatus, PaymentStatus, TransitionResult};
use thiserror::Error;

/// A requested change to an order.
#[derive(Debug, Clone)]
pub struct TransitionRequest {
	pub status: Option<OrderStatus>,
	pub payment_status: Option<PaymentStatus>,
	pub actor: Actor,
	/// Free-text note; becomes the cancellation reason when cancelling.
	pub notes: Option<String>,
}

impl TransitionRequest {
	pub fn status(status: OrderStatus, actor: Actor, notes: Option<String>) -> Self {
		Self {
			status: Some(status),
			payment_status: None,
			actor,
			notes,
		}
	}

	pub fn payment(payment_status: PaymentStatus, actor: Actor) -> Self {
		Self {
			status: None,
			payment_status: Some(payment_status),
			actor,
			notes: None,
		}
	}
}

/// Errors that reject a transition request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
	#[error("Invalid transition from {from} to {to}")]
	InvalidTransition { from: OrderStatus, to: OrderStatus },
	#[error("Order must be paid before moving to {requested} (payment status is {payment_status})")]
	PaymentRequired {
		requested: OrderStatus,
		payment_status: PaymentStatus,
	},
}

/// Why a reported payment status was not applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoredPayment {
	/// The order is paid and the report was not a refund.
	StickyPaid {
		current: PaymentStatus,
		reported: PaymentStatus,
	},
	/// The report ranks below the status already recorded.
	LowerPriority {
		current: PaymentStatus,
		reported: PaymentStatus,
	},
}

/// Result of a successful [`apply_transition`] call.
#[derive(Debug, Clone)]
pub struct Transition {
	/// The order after the transition. Equal to the input when nothing changed.
	pub order: Order,
	pub result: TransitionResult,
	/// Set when a non-administrative payment report was refused.
	pub ignored: Option<IgnoredPayment>,
}

/// Decides whether a non-administrative payment report may replace `current`.
///
/// Once `Paid`, only `Refunded` is accepted. Otherwise a report whose
/// priority is lower than the current status is out of date and refused;
/// equal-priority terminal reports (e.g. `Failed` then `Refunded`) apply.
pub fn admit_payment_report(
	current: PaymentStatus,
	reported: PaymentStatus,
) -> Result<(), IgnoredPayment> {
	if current.is_sticky_downgrade(reported) {
		return Err(IgnoredPayment::StickyPaid { current, reported });
	}
	if reported.priority() < current.priority() {
		return Err(IgnoredPayment::LowerPriority { current, reported });
	}
	Ok(())
}

/// Applies a transition request to an order snapshot.
///
/// Steps, in order:
/// 1. A payment change is admitted (administrators bypass the sticky and
///    priority rules) and `paidAt` is stamped on first entry into `Paid`.
/// 2. A new `Paid` on a `WaitingForPayment` order derives `Processing`.
/// 3. A requested order status is validated against the status reached
///    after step 2: terminal statuses reject everything, then the payment
///    guard, then the transition table.
/// 4. `statusUpdatedAt`/`statusUpdatedBy` and first-entry timestamps are
///    stamped when anything changed.
pub fn apply_transition(
	order: &Order,
	request: &TransitionRequest,
	now: DateTime<Utc>,
) -> Result<Transition, TransitionError> {
	let mut next = order.clone();
	let mut ignored = None;
	let mut derived = false;

	if let Some(reported) = request.payment_status {
		if reported != next.payment_status {
			let admitted = if request.actor.is_admin() {
				Ok(())
			} else {
				admit_payment_report(next.payment_status, reported)
			};
			match admitted {
				Ok(()) => {
					next.payment_status = reported;
					if reported == PaymentStatus::Paid {
						next.paid_at.get_or_insert(now);
						if next.status == OrderStatus::WaitingForPayment {
							next.status = OrderStatus::Processing;
							derived = true;
						}
					}
				},
				Err(reason) => ignored = Some(reason),
			}
		}
	}

	if let Some(requested) = request.status {
		if requested != next.status {
			if next.status.is_terminal() {
				return Err(TransitionError::InvalidTransition {
					from: next.status,
					to: requested,
				});
			}
			if requested.requires_payment() && next.payment_status != PaymentStatus::Paid {
				return Err(TransitionError::PaymentRequired {
					requested,
					payment_status: next.payment_status,
				});
			}
			if !next.status.can_transition_to(requested) {
				return Err(TransitionError::InvalidTransition {
					from: next.status,
					to: requested,
				});
			}
			next.status = requested;
		}
	}

	let result = TransitionResult {
		changed: next.status != order.status || next.payment_status != order.payment_status,
		old_status: order.status,
		new_status: next.status,
		old_payment_status: order.payment_status,
		new_payment_status: next.payment_status,
		derived_secondary_change: derived,
	};

	if !result.changed {
		return Ok(Transition {
			order: order.clone(),
			result,
			ignored,
		});
	}

	if result.status_changed() {
		match next.status {
			OrderStatus::Shipping => {
				next.shipped_at.get_or_insert(now);
			},
			OrderStatus::Delivered => {
				next.delivered_at.get_or_insert(now);
			},
			OrderStatus::Cancelled => {
				next.cancelled_at.get_or_insert(now);
				if next.cancellation_reason.is_none() {
					next.cancellation_reason = Some(
						request
							.notes
							.clone()
							.filter(|n| !n.trim().is_empty())
							.unwrap_or_else(|| format!("cancelled by {}", request.actor)),
					);
				}
			},
			OrderStatus::WaitingForPayment | OrderStatus::Processing => {},
		}
	}
	next.status_updated_at = now;
	next.status_updated_by = request.actor.clone();

	Ok(Transition {
		order: next,
		result,
		ignored,
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::test_support::sample_order;
	use chrono::Duration;

	fn admin() -> Actor {
		Actor::Admin("1".into())
	}

	fn apply(order: &Order, request: TransitionRequest) -> Result<Transition, TransitionError> {
		apply_transition(order, &request, Utc::now())
	}

	#[test]
	fn test_paid_derives_processing() {
		let order = sample_order();
		let t = apply(&order, TransitionRequest::payment(PaymentStatus::Paid, Actor::Webhook))
			.unwrap();

		assert!(t.result.changed);
		assert!(t.result.derived_secondary_change);
		assert_eq!(t.order.status, OrderStatus::Processing);
		assert_eq!(t.order.payment_status, PaymentStatus::Paid);
		assert!(t.order.paid_at.is_some());
		assert_eq!(t.order.status_updated_by, Actor::Webhook);
	}

	#[test]
	fn test_admin_paid_also_derives_processing() {
		let order = sample_order();
		let t = apply(&order, TransitionRequest::payment(PaymentStatus::Paid, admin())).unwrap();
		assert!(t.result.derived_secondary_change);
		assert_eq!(t.order.status, OrderStatus::Processing);
	}

	#[test]
	fn test_payment_required_guard() {
		let order = sample_order();
		for target in [
			OrderStatus::Processing,
			OrderStatus::Shipping,
			OrderStatus::Delivered,
		] {
			let err = apply(&order, TransitionRequest::status(target, admin(), None)).unwrap_err();
			assert_eq!(
				err,
				TransitionError::PaymentRequired {
					requested: target,
					payment_status: PaymentStatus::Pending
				}
			);
		}
	}

	#[test]
	fn test_table_enforced_after_payment() {
		let mut order = sample_order();
		order.payment_status = PaymentStatus::Paid;
		order.status = OrderStatus::Processing;

		let err = apply(
			&order,
			TransitionRequest::status(OrderStatus::Delivered, admin(), None),
		)
		.unwrap_err();
		assert!(matches!(err, TransitionError::InvalidTransition { .. }));

		let t = apply(
			&order,
			TransitionRequest::status(OrderStatus::Shipping, admin(), None),
		)
		.unwrap();
		assert!(t.order.shipped_at.is_some());
	}

	#[test]
	fn test_cancelled_is_terminal() {
		let mut order = sample_order();
		order.status = OrderStatus::Cancelled;
		for target in OrderStatus::ALL {
			let result = apply(&order, TransitionRequest::status(target, admin(), None));
			if target == OrderStatus::Cancelled {
				assert!(!result.unwrap().result.changed);
			} else {
				assert!(matches!(
					result,
					Err(TransitionError::InvalidTransition { .. })
				));
			}
		}
	}

	#[test]
	fn test_refund_allowed_after_cancel() {
		let mut order = sample_order();
		order.status = OrderStatus::Cancelled;
		order.payment_status = PaymentStatus::Paid;
		let t = apply(
			&order,
			TransitionRequest::payment(PaymentStatus::Refunded, Actor::Webhook),
		)
		.unwrap();
		assert_eq!(t.order.status, OrderStatus::Cancelled);
		assert_eq!(t.order.payment_status, PaymentStatus::Refunded);
		assert!(!t.result.derived_secondary_change);
	}

	#[test]
	fn test_sticky_paid_ignores_gateway_downgrade() {
		let mut order = sample_order();
		order.status = OrderStatus::Processing;
		order.payment_status = PaymentStatus::Paid;

		for reported in [
			PaymentStatus::Pending,
			PaymentStatus::Failed,
			PaymentStatus::Expired,
		] {
			let t = apply(&order, TransitionRequest::payment(reported, Actor::Webhook)).unwrap();
			assert!(!t.result.changed);
			assert_eq!(t.order, order);
			assert!(matches!(t.ignored, Some(IgnoredPayment::StickyPaid { .. })));
		}
	}

	#[test]
	fn test_late_capture_after_refund_is_refused() {
		let mut order = sample_order();
		order.payment_status = PaymentStatus::Refunded;
		let t = apply(
			&order,
			TransitionRequest::payment(PaymentStatus::Paid, Actor::PaymentSystem),
		)
		.unwrap();
		assert!(!t.result.changed);
		assert!(matches!(
			t.ignored,
			Some(IgnoredPayment::LowerPriority { .. })
		));
	}

	#[test]
	fn test_admin_overrides_payment_rules() {
		let mut order = sample_order();
		order.status = OrderStatus::Processing;
		order.payment_status = PaymentStatus::Paid;
		let t = apply(
			&order,
			TransitionRequest::payment(PaymentStatus::Pending, admin()),
		)
		.unwrap();
		assert!(t.result.changed);
		assert_eq!(t.order.payment_status, PaymentStatus::Pending);
		// Order status is not rolled back by a payment override.
		assert_eq!(t.order.status, OrderStatus::Processing);
	}

	#[test]
	fn test_identical_request_is_noop() {
		let order = sample_order();
		let t = apply(
			&order,
			TransitionRequest {
				status: Some(OrderStatus::WaitingForPayment),
				payment_status: Some(PaymentStatus::Pending),
				actor: admin(),
				notes: None,
			},
		)
		.unwrap();
		assert!(!t.result.changed);
		assert_eq!(t.order, order);
	}

	#[test]
	fn test_combined_request_is_atomic() {
		let order = sample_order();
		// Payment would apply, but the status part is invalid: nothing commits.
		let err = apply(
			&order,
			TransitionRequest {
				status: Some(OrderStatus::Delivered),
				payment_status: Some(PaymentStatus::Paid),
				actor: admin(),
				notes: None,
			},
		)
		.unwrap_err();
		assert!(matches!(err, TransitionError::InvalidTransition { .. }));

		// Payment plus a status reachable after derivation commits both.
		let t = apply(
			&order,
			TransitionRequest {
				status: Some(OrderStatus::Shipping),
				payment_status: Some(PaymentStatus::Paid),
				actor: admin(),
				notes: None,
			},
		)
		.unwrap();
		assert_eq!(t.order.status, OrderStatus::Shipping);
		assert!(t.result.derived_secondary_change);
		assert_eq!(t.result.old_status, OrderStatus::WaitingForPayment);
	}

	#[test]
	fn test_timestamps_set_once() {
		let mut order = sample_order();
		let earlier = Utc::now() - Duration::days(1);
		order.paid_at = Some(earlier);
		order.payment_status = PaymentStatus::Failed;

		let t = apply_transition(
			&order,
			&TransitionRequest::payment(PaymentStatus::Paid, admin()),
			Utc::now(),
		)
		.unwrap();
		assert_eq!(t.order.paid_at, Some(earlier));
	}

	#[test]
	fn test_cancellation_reason() {
		let order = sample_order();
		let t = apply(
			&order,
			TransitionRequest::status(OrderStatus::Cancelled, admin(), Some("out of stock".into())),
		)
		.unwrap();
		assert_eq!(t.order.cancellation_reason.as_deref(), Some("out of stock"));
		assert!(t.order.cancelled_at.is_some());

		let t = apply(
			&order,
			TransitionRequest::status(OrderStatus::Cancelled, admin(), None),
		)
		.unwrap();
		assert_eq!(
			t.order.cancellation_reason.as_deref(),
			Some("cancelled by admin:1")
		);
	}

	#[test]
	fn test_equal_priority_terminal_reports_apply() {
		let mut order = sample_order();
		order.payment_status = PaymentStatus::Failed;
		let t = apply(
			&order,
			TransitionRequest::payment(PaymentStatus::Expired, Actor::Webhook),
		)
		.unwrap();
		assert!(t.result.changed);
		assert_eq!(t.order.payment_status, PaymentStatus::Expired);
	}
}
