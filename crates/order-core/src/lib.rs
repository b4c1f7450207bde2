//! Order lifecycle and payment reconciliation engine.
//!
//! This crate owns an order's status and payment status. It validates every
//! change through a single transition engine, reconciles asynchronous
//! payment-gateway reports with administrative actions, keeps product stock
//! in step with creation and cancellation, and publishes domain events for
//! notification subscribers. Backends (storage, inventory, gateway,
//! notifiers) are assembled from configuration by [`builder::LifecycleBuilder`].

use order_inventory::{InventoryError, StockShortfall};
use order_storage::StorageError;
use order_types::{OrderStatus, PaymentStatus};
use thiserror::Error;

pub mod builder;
pub mod engine;
pub mod state;

#[cfg(test)]
pub(crate) mod test_support;

pub use builder::{BuilderError, LifecycleBuilder, LifecycleFactories};
pub use engine::create::{CreatedOrder, NewOrder};
pub use engine::event_bus::EventBus;
pub use engine::reconciler::{map_gateway_status, GatewayStatus};
pub use engine::transition::{apply_transition, TransitionError, TransitionRequest};
pub use engine::OrderLifecycle;

/// Errors returned by lifecycle operations.
#[derive(Debug, Error)]
pub enum LifecycleError {
	/// The requested status is not reachable from the current one.
	#[error("Invalid transition from {from} to {to}")]
	InvalidTransition { from: OrderStatus, to: OrderStatus },
	/// The order must be paid before it can advance.
	#[error("Order must be paid before moving to {requested} (payment status is {payment_status})")]
	PaymentRequired {
		requested: OrderStatus,
		payment_status: PaymentStatus,
	},
	/// Stock was short for one or more line items; nothing was reserved.
	#[error("Insufficient stock for {} item(s)", items.len())]
	InsufficientStock { items: Vec<StockShortfall> },
	#[error("Order not found: {0}")]
	NotFound(String),
	/// The order stayed locked or kept changing for every retry.
	#[error("Concurrent modification of {0}, retry later")]
	ConcurrentModification(String),
	#[error("Storage error: {0}")]
	Storage(String),
	#[error("Inventory error: {0}")]
	Inventory(String),
	#[error("Validation error: {0}")]
	Validation(String),
	#[error("Gateway error: {0}")]
	Gateway(String),
}

impl From<TransitionError> for LifecycleError {
	fn from(err: TransitionError) -> Self {
		match err {
			TransitionError::InvalidTransition { from, to } => {
				LifecycleError::InvalidTransition { from, to }
			},
			TransitionError::PaymentRequired {
				requested,
				payment_status,
			} => LifecycleError::PaymentRequired {
				requested,
				payment_status,
			},
		}
	}
}

impl From<StorageError> for LifecycleError {
	fn from(err: StorageError) -> Self {
		LifecycleError::Storage(err.to_string())
	}
}

impl From<InventoryError> for LifecycleError {
	fn from(err: InventoryError) -> Self {
		match err {
			InventoryError::InsufficientStock { items } => {
				LifecycleError::InsufficientStock { items }
			},
			other => LifecycleError::Inventory(other.to_string()),
		}
	}
}

impl From<state::LockTimeout> for LifecycleError {
	fn from(err: state::LockTimeout) -> Self {
		LifecycleError::ConcurrentModification(err.key)
	}
}
