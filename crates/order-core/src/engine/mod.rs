//! The order lifecycle façade.
//!
//! [`OrderLifecycle`] orchestrates the transition engine, the gateway status
//! reconciler, inventory and persistence. Every read-validate-write of an
//! order runs inside that order's lock and commits through a compare-and-swap
//! on the stored record. Side effects that may be slow (inventory release,
//! event publication) run after the lock is released.

pub mod create;
pub mod event_bus;
pub mod lifecycle;
pub mod payment;
pub mod reconciler;
pub mod status;
pub mod transition;

use crate::state::{KeyedLocks, OrderStore};
use crate::LifecycleError;
use chrono::Utc;
use event_bus::EventBus;
use order_config::Config;
use order_gateway::GatewayService;
use order_inventory::InventoryService;
use order_storage::StorageService;
use order_types::{Order, OrderEvent, OrderStatus, WebhookEvent};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OwnedMutexGuard;
use transition::{apply_transition, Transition, TransitionRequest};

pub struct OrderLifecycle {
	config: Config,
	storage: Arc<StorageService>,
	store: Arc<OrderStore>,
	inventory: Arc<InventoryService>,
	gateway: Arc<GatewayService>,
	locks: Arc<KeyedLocks>,
	event_bus: EventBus,
}

impl OrderLifecycle {
	pub fn new(
		config: Config,
		storage: Arc<StorageService>,
		store: Arc<OrderStore>,
		inventory: Arc<InventoryService>,
		gateway: Arc<GatewayService>,
		event_bus: EventBus,
	) -> Self {
		let locks = Arc::new(KeyedLocks::new(
			Duration::from_millis(config.lifecycle.lock_timeout_ms),
			config.lifecycle.max_conflict_retries,
		));
		Self {
			config,
			storage,
			store,
			inventory,
			gateway,
			locks,
			event_bus,
		}
	}

	pub fn config(&self) -> &Config {
		&self.config
	}

	pub fn event_bus(&self) -> &EventBus {
		&self.event_bus
	}

	pub fn inventory(&self) -> &Arc<InventoryService> {
		&self.inventory
	}

	/// Reads an order by reference.
	pub async fn get_order(&self, order_ref: &str) -> Result<Order, LifecycleError> {
		self.store
			.get(order_ref)
			.await?
			.map(|snapshot| snapshot.value)
			.ok_or_else(|| LifecycleError::NotFound(order_ref.to_string()))
	}

	/// The payment audit trail of an order, oldest first.
	pub async fn payment_events(&self, order_ref: &str) -> Result<Vec<WebhookEvent>, LifecycleError> {
		if self.store.get(order_ref).await?.is_none() {
			return Err(LifecycleError::NotFound(order_ref.to_string()));
		}
		Ok(self.store.events(order_ref).await?)
	}

	pub(crate) async fn lock(&self, key: &str) -> Result<OwnedMutexGuard<()>, LifecycleError> {
		Ok(self.locks.acquire(key).await?)
	}

	/// Applies a transition and commits it. The caller holds the order's lock.
	///
	/// The compare-and-swap guards against writers that bypass the lock
	/// (another process sharing the storage backend); on conflict the order
	/// is re-read and the request re-validated.
	pub(crate) async fn commit_locked(
		&self,
		order_ref: &str,
		request: &TransitionRequest,
	) -> Result<Transition, LifecycleError> {
		let attempts = self.config.lifecycle.max_conflict_retries.max(1);

		for attempt in 1..=attempts {
			let snapshot = self
				.store
				.get(order_ref)
				.await?
				.ok_or_else(|| LifecycleError::NotFound(order_ref.to_string()))?;

			let mut transition = apply_transition(&snapshot.value, request, Utc::now())?;
			if !transition.result.changed {
				return Ok(transition);
			}

			transition.order.version = snapshot.value.version + 1;
			if self
				.store
				.update_if_version(&snapshot, &transition.order)
				.await?
			{
				return Ok(transition);
			}
			tracing::debug!(
				order_ref = %order_ref,
				attempt,
				"Order changed during commit, retrying"
			);
		}

		Err(LifecycleError::ConcurrentModification(order_ref.to_string()))
	}

	/// Runs a transition request end to end: lock, commit, then side effects.
	pub(crate) async fn transition(
		&self,
		order_ref: &str,
		request: &TransitionRequest,
		notify: bool,
	) -> Result<Transition, LifecycleError> {
		let transition = {
			let _guard = self.lock(order_ref).await?;
			self.commit_locked(order_ref, request).await?
		};
		self.after_commit(&transition, request, notify).await;
		Ok(transition)
	}

	/// Side effects of a committed transition. Failures are logged only.
	pub(crate) async fn after_commit(
		&self,
		transition: &Transition,
		request: &TransitionRequest,
		notify: bool,
	) {
		let order = &transition.order;
		let result = transition.result;

		if let Some(ignored) = transition.ignored {
			tracing::warn!(
				order_ref = %order.order_ref,
				actor = %request.actor,
				?ignored,
				"Payment status report ignored"
			);
		}
		if !result.changed {
			return;
		}

		tracing::info!(
			order_ref = %order.order_ref,
			actor = %request.actor,
			status = %result.new_status,
			payment_status = %result.new_payment_status,
			derived = result.derived_secondary_change,
			"Order updated"
		);

		if result.status_changed() && result.new_status == OrderStatus::Cancelled {
			match self.inventory.release(&order.line_items).await {
				Ok(()) => {
					tracing::info!(order_ref = %order.order_ref, "Released reserved stock");
				},
				Err(e) => {
					tracing::error!(
						order_ref = %order.order_ref,
						error = %e,
						"Failed to release reserved stock"
					);
				},
			}
		}

		if !notify {
			tracing::debug!(order_ref = %order.order_ref, "Notifications suppressed");
			return;
		}

		if result.payment_status_changed() {
			self.event_bus
				.publish(OrderEvent::PaymentStatusChanged {
					order_ref: order.order_ref.clone(),
					old_payment_status: result.old_payment_status,
					new_payment_status: result.new_payment_status,
					actor: request.actor.clone(),
					total_amount: order.total_amount,
				})
				.ok();
		}
		if result.status_changed() {
			let reason = if result.new_status == OrderStatus::Cancelled {
				order.cancellation_reason.clone()
			} else {
				request.notes.clone()
			};
			self.event_bus
				.publish(OrderEvent::OrderStatusChanged {
					order_ref: order.order_ref.clone(),
					old_status: result.old_status,
					new_status: result.new_status,
					actor: request.actor.clone(),
					reason,
				})
				.ok();
		}
	}
}
