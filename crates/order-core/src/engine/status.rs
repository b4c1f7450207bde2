//! Administrative status and payment-status updates.

use super::transition::TransitionRequest;
use super::OrderLifecycle;
use crate::LifecycleError;
use order_types::{Actor, OrderStatus, PaymentStatus, TransitionResult};
use tracing::instrument;

impl OrderLifecycle {
	/// Moves an order to `status`.
	///
	/// Entering `Cancelled` records the cancellation reason (`notes`, or the
	/// actor) and returns the reserved stock. With `notify` false the change
	/// is applied without publishing events.
	#[instrument(skip_all, fields(order_ref = %order_ref, status = %status))]
	pub async fn update_status(
		&self,
		order_ref: &str,
		status: OrderStatus,
		actor: Actor,
		notes: Option<String>,
		notify: bool,
	) -> Result<TransitionResult, LifecycleError> {
		let request = TransitionRequest::status(status, actor, notes);
		let transition = self
			.transition(order_ref, &request, notify)
			.await
			.inspect_err(|e| tracing::info!(error = %e, "Status update rejected"))?;
		Ok(transition.result)
	}

	/// Sets the payment status.
	///
	/// Administrators may set any payment status. Gateway actors are subject
	/// to the sticky-paid and priority rules; a refused report returns an
	/// unchanged result rather than an error.
	#[instrument(skip_all, fields(order_ref = %order_ref, payment_status = %payment_status))]
	pub async fn update_payment_status(
		&self,
		order_ref: &str,
		payment_status: PaymentStatus,
		actor: Actor,
	) -> Result<TransitionResult, LifecycleError> {
		let request = TransitionRequest::payment(payment_status, actor);
		let transition = self.transition(order_ref, &request, true).await?;
		Ok(transition.result)
	}
}
