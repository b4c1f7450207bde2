//! Order creation with stock reservation and idempotent resubmission.

use super::OrderLifecycle;
use crate::LifecycleError;
use chrono::{DateTime, TimeDelta, Utc};
use order_types::{
	Actor, CreateOrderRequest, LineItem, Order, OrderEvent, OrderStatus, PaymentStatus,
	ShippingInfo,
};
use rust_decimal::Decimal;
use tracing::instrument;

/// Attempts at finding an unused order reference.
const REF_ATTEMPTS: u32 = 5;

const REF_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Input for [`OrderLifecycle::create_order`].
#[derive(Debug, Clone)]
pub struct NewOrder {
	pub line_items: Vec<LineItem>,
	pub shipping: ShippingInfo,
	pub payment_method: String,
}

impl From<CreateOrderRequest> for NewOrder {
	fn from(request: CreateOrderRequest) -> Self {
		Self {
			line_items: request.line_items.into_iter().map(Into::into).collect(),
			shipping: request.shipping.into(),
			payment_method: request.payment_method,
		}
	}
}

impl NewOrder {
	fn validate(&self) -> Result<(), LifecycleError> {
		if self.line_items.is_empty() {
			return Err(LifecycleError::Validation(
				"order must contain at least one line item".into(),
			));
		}
		for item in &self.line_items {
			if item.quantity == 0 {
				return Err(LifecycleError::Validation(format!(
					"quantity for product {} must be positive",
					item.product_id
				)));
			}
			if item.unit_price.is_sign_negative() {
				return Err(LifecycleError::Validation(format!(
					"unit price for product {} cannot be negative",
					item.product_id
				)));
			}
		}
		if self.shipping.cost.is_sign_negative() {
			return Err(LifecycleError::Validation(
				"shipping cost cannot be negative".into(),
			));
		}
		if self.payment_method.trim().is_empty() {
			return Err(LifecycleError::Validation(
				"payment method is required".into(),
			));
		}
		Ok(())
	}

	/// Subtotal and total, rejecting amounts that overflow `Decimal`.
	fn totals(&self) -> Result<(Decimal, Decimal), LifecycleError> {
		let overflow = || LifecycleError::Validation("order amount is out of range".into());
		let subtotal = self.line_items.iter().try_fold(Decimal::ZERO, |sum, item| {
			item.line_total()
				.and_then(|total| sum.checked_add(total))
				.ok_or_else(overflow)
		})?;
		let total = subtotal
			.checked_add(self.shipping.cost)
			.ok_or_else(overflow)?;
		Ok((subtotal, total))
	}
}

/// `now + minutes`, or `None` when the deadline cannot be represented.
fn payment_deadline(now: DateTime<Utc>, minutes: u64) -> Option<DateTime<Utc>> {
	let delta = TimeDelta::try_minutes(i64::try_from(minutes).ok()?)?;
	now.checked_add_signed(delta)
}

/// Result of [`OrderLifecycle::create_order`].
#[derive(Debug, Clone)]
pub struct CreatedOrder {
	pub order: Order,
	/// True when an earlier order was returned for a repeated idempotency key.
	pub replayed: bool,
}

/// `<prefix>-<YYYYMMDD>-<6 alphanumerics>`.
fn generate_order_ref(prefix: &str, now: DateTime<Utc>) -> String {
	let suffix: String = uuid::Uuid::new_v4().as_bytes()[..6]
		.iter()
		.map(|b| REF_ALPHABET[usize::from(*b) % REF_ALPHABET.len()] as char)
		.collect();
	format!("{}-{}-{}", prefix, now.format("%Y%m%d"), suffix)
}

impl OrderLifecycle {
	/// Creates an order in `WaitingForPayment`/`Pending`.
	///
	/// With an idempotency key, a repeat within the configured window returns
	/// the order created by the first call. Stock is reserved before the
	/// order is persisted; if persisting fails the reservation and the
	/// reference claim are undone before the error is returned.
	#[instrument(skip_all, fields(items = new_order.line_items.len()))]
	pub async fn create_order(
		&self,
		new_order: NewOrder,
		idempotency_key: Option<&str>,
	) -> Result<CreatedOrder, LifecycleError> {
		new_order.validate()?;

		let Some(key) = idempotency_key.filter(|k| !k.is_empty()) else {
			return self.create_new(new_order).await.map(|order| CreatedOrder {
				order,
				replayed: false,
			});
		};

		// Concurrent submissions with one key queue here; the first one
		// creates, the rest find its record.
		let _guard = self.lock(&format!("idempotency:{}", key)).await?;

		if let Some(order_ref) = self.store.idempotent_ref(key).await? {
			match self.store.get(&order_ref).await? {
				Some(snapshot) => {
					tracing::info!(order_ref = %order_ref, "Returning order for repeated idempotency key");
					return Ok(CreatedOrder {
						order: snapshot.value,
						replayed: true,
					});
				},
				None => {
					tracing::warn!(order_ref = %order_ref, "Idempotency record points at a missing order");
				},
			}
		}

		let order = self.create_new(new_order).await?;
		let window = std::time::Duration::from_secs(self.config.lifecycle.idempotency_window_seconds);
		if let Err(e) = self
			.store
			.remember_idempotent_ref(key, &order.order_ref, window)
			.await
		{
			tracing::warn!(order_ref = %order.order_ref, error = %e, "Failed to record idempotency key");
		}
		Ok(CreatedOrder {
			order,
			replayed: false,
		})
	}

	async fn create_new(&self, new_order: NewOrder) -> Result<Order, LifecycleError> {
		let now = Utc::now();
		// Everything that can reject the order runs before anything is claimed.
		let (subtotal, total_amount) = new_order.totals()?;
		let payment_deadline =
			payment_deadline(now, self.config.lifecycle.payment_deadline_minutes).ok_or_else(|| {
				LifecycleError::Validation(format!(
					"payment deadline of {} minutes is out of range",
					self.config.lifecycle.payment_deadline_minutes
				))
			})?;

		let id = self.store.allocate_id().await?;
		let order_ref = self.claim_order_ref(id, now).await?;

		if let Err(e) = self.inventory.reserve(&new_order.line_items).await {
			self.release_ref_quietly(&order_ref).await;
			tracing::info!(order_ref = %order_ref, error = %e, "Order rejected");
			return Err(e.into());
		}

		let shipping_cost = new_order.shipping.cost;
		let order = Order {
			id,
			order_ref,
			version: 1,
			status: OrderStatus::WaitingForPayment,
			payment_status: PaymentStatus::Pending,
			line_items: new_order.line_items,
			shipping: new_order.shipping,
			subtotal,
			shipping_cost,
			total_amount,
			payment_method: new_order.payment_method,
			payment_deadline,
			created_at: now,
			status_updated_at: now,
			status_updated_by: Actor::System,
			paid_at: None,
			shipped_at: None,
			delivered_at: None,
			cancelled_at: None,
			cancellation_reason: None,
		};

		let persisted = match self.store.insert(&order).await {
			Ok(true) => Ok(()),
			Ok(false) => Err(LifecycleError::Storage(format!(
				"order {} already exists",
				order.order_ref
			))),
			Err(e) => Err(e.into()),
		};
		if let Err(e) = persisted {
			tracing::warn!(
				order_ref = %order.order_ref,
				error = %e,
				"Persisting order failed, releasing reservation"
			);
			if let Err(release_err) = self.inventory.release(&order.line_items).await {
				tracing::error!(
					order_ref = %order.order_ref,
					error = %release_err,
					"Failed to release reservation after persistence failure"
				);
			}
			self.release_ref_quietly(&order.order_ref).await;
			return Err(e);
		}

		tracing::info!(
			order_ref = %order.order_ref,
			id = order.id,
			total = %order.total_amount,
			"Order created"
		);
		self.event_bus
			.publish(OrderEvent::Created {
				order_ref: order.order_ref.clone(),
				total_amount: order.total_amount,
				item_count: order.item_count(),
				payment_method: order.payment_method.clone(),
			})
			.ok();
		Ok(order)
	}

	async fn claim_order_ref(&self, id: u64, now: DateTime<Utc>) -> Result<String, LifecycleError> {
		for _ in 0..REF_ATTEMPTS {
			let candidate = generate_order_ref(&self.config.lifecycle.order_ref_prefix, now);
			if self.store.claim_ref(&candidate, id).await? {
				return Ok(candidate);
			}
			tracing::debug!(order_ref = %candidate, "Order reference collision");
		}
		Err(LifecycleError::Storage(
			"could not allocate a unique order reference".into(),
		))
	}

	async fn release_ref_quietly(&self, order_ref: &str) {
		if let Err(e) = self.store.release_ref(order_ref).await {
			tracing::warn!(order_ref = %order_ref, error = %e, "Failed to release order reference");
		}
	}
}
