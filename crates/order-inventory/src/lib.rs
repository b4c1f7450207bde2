//! Inventory module for the order engine.
//!
//! This module owns the product stock counters consumed by order creation
//! and cancellation. Backends implement an atomic compare-and-decrement per
//! product; [`InventoryService`] builds all-or-nothing reservations on top.

use async_trait::async_trait;
use order_types::{ConfigSchema, ImplementationRegistry, LineItem};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod memory;
}

/// One line item that could not be reserved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockShortfall {
	pub product_id: u64,
	pub requested: u32,
	pub available: u64,
}

/// Errors that can occur during inventory operations.
#[derive(Debug, Error)]
pub enum InventoryError {
	/// One or more line items exceed the available stock.
	#[error("Insufficient stock for {} item(s)", items.len())]
	InsufficientStock { items: Vec<StockShortfall> },
	/// The product has no stock counter.
	#[error("Product not found: {0}")]
	ProductNotFound(u64),
	/// Error that occurs in the inventory backend.
	#[error("Backend error: {0}")]
	Backend(String),
	/// Error that occurs during configuration validation.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Outcome of a single compare-and-decrement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decrement {
	/// Stock was sufficient and has been deducted.
	Applied,
	/// Stock was insufficient; nothing changed. Carries the available amount.
	Insufficient(u64),
}

/// Trait defining the interface for stock counter backends.
#[async_trait]
pub trait InventoryInterface: Send + Sync {
	/// Returns the configuration schema for this implementation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Atomically checks `available >= quantity` and deducts.
	///
	/// An unknown product behaves as a product with zero stock.
	async fn try_decrement(&self, product_id: u64, quantity: u32)
		-> Result<Decrement, InventoryError>;

	/// Adds stock back to a product. Fails with `ProductNotFound` for unknown products.
	async fn increment(&self, product_id: u64, quantity: u32) -> Result<(), InventoryError>;

	/// Current stock of a product, if it exists.
	async fn available(&self, product_id: u64) -> Result<Option<u64>, InventoryError>;

	/// Sets the stock of a product, creating the counter if needed.
	async fn set_stock(&self, product_id: u64, quantity: u64) -> Result<(), InventoryError>;
}

/// Type alias for inventory factory functions.
pub type InventoryFactory = fn(&toml::Value) -> Result<Box<dyn InventoryInterface>, InventoryError>;

/// Registry trait for inventory implementations.
pub trait InventoryRegistry: ImplementationRegistry<Factory = InventoryFactory> {}

/// Get all registered inventory implementations.
pub fn get_all_implementations() -> Vec<(&'static str, InventoryFactory)> {
	use implementations::memory;

	vec![(memory::Registry::NAME, memory::Registry::factory())]
}

/// Service reserving and releasing stock for whole orders.
pub struct InventoryService {
	backend: Box<dyn InventoryInterface>,
}

impl InventoryService {
	pub fn new(backend: Box<dyn InventoryInterface>) -> Self {
		Self { backend }
	}

	/// Reserves stock for every line item, or for none of them.
	///
	/// Every item is attempted so that the error lists all shortfalls, and
	/// deductions already applied in this call are returned on failure.
	pub async fn reserve(&self, items: &[LineItem]) -> Result<(), InventoryError> {
		let mut applied: Vec<&LineItem> = Vec::with_capacity(items.len());
		let mut shortfalls = Vec::new();
		let mut backend_error = None;

		for item in items {
			match self
				.backend
				.try_decrement(item.product_id, item.quantity)
				.await
			{
				Ok(Decrement::Applied) => applied.push(item),
				Ok(Decrement::Insufficient(available)) => shortfalls.push(StockShortfall {
					product_id: item.product_id,
					requested: item.quantity,
					available,
				}),
				Err(e) => {
					backend_error = Some(e);
					break;
				},
			}
		}

		if shortfalls.is_empty() && backend_error.is_none() {
			return Ok(());
		}

		for item in applied {
			if let Err(e) = self.backend.increment(item.product_id, item.quantity).await {
				tracing::error!(
					product_id = item.product_id,
					quantity = item.quantity,
					error = %e,
					"Failed to roll back partial reservation"
				);
			}
		}

		match backend_error {
			Some(e) => Err(e),
			None => Err(InventoryError::InsufficientStock { items: shortfalls }),
		}
	}

	/// Returns stock for every line item.
	///
	/// Products that no longer exist are logged and skipped so the rest of
	/// the order is still released.
	pub async fn release(&self, items: &[LineItem]) -> Result<(), InventoryError> {
		for item in items {
			match self.backend.increment(item.product_id, item.quantity).await {
				Ok(()) => {},
				Err(InventoryError::ProductNotFound(product_id)) => {
					tracing::warn!(
						product_id,
						quantity = item.quantity,
						"Skipping stock release for missing product"
					);
				},
				Err(e) => return Err(e),
			}
		}
		Ok(())
	}

	pub async fn available(&self, product_id: u64) -> Result<Option<u64>, InventoryError> {
		self.backend.available(product_id).await
	}

	pub async fn set_stock(&self, product_id: u64, quantity: u64) -> Result<(), InventoryError> {
		self.backend.set_stock(product_id, quantity).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use implementations::memory::MemoryInventory;
	use rust_decimal::Decimal;

	fn item(product_id: u64, quantity: u32) -> LineItem {
		LineItem {
			product_id,
			name: format!("product-{}", product_id),
			unit_price: Decimal::new(10_000, 0),
			quantity,
		}
	}

	async fn service(stock: &[(u64, u64)]) -> InventoryService {
		let backend = MemoryInventory::new();
		for (id, qty) in stock {
			backend.set_stock(*id, *qty).await.unwrap();
		}
		InventoryService::new(Box::new(backend))
	}

	#[tokio::test]
	async fn test_reserve_and_release_conserve_stock() {
		let inventory = service(&[(1, 5), (2, 3)]).await;
		let items = vec![item(1, 2), item(2, 3)];

		inventory.reserve(&items).await.unwrap();
		assert_eq!(inventory.available(1).await.unwrap(), Some(3));
		assert_eq!(inventory.available(2).await.unwrap(), Some(0));

		inventory.release(&items).await.unwrap();
		assert_eq!(inventory.available(1).await.unwrap(), Some(5));
		assert_eq!(inventory.available(2).await.unwrap(), Some(3));
	}

	#[tokio::test]
	async fn test_reserve_is_all_or_nothing_and_lists_every_shortfall() {
		let inventory = service(&[(1, 5), (2, 1), (3, 0)]).await;
		let items = vec![item(1, 2), item(2, 4), item(3, 1), item(9, 1)];

		let shortfalls = match inventory.reserve(&items).await {
			Err(InventoryError::InsufficientStock { items }) => items,
			other => panic!("expected InsufficientStock, got {:?}", other),
		};
		assert_eq!(
			shortfalls,
			vec![
				StockShortfall {
					product_id: 2,
					requested: 4,
					available: 1
				},
				StockShortfall {
					product_id: 3,
					requested: 1,
					available: 0
				},
				StockShortfall {
					product_id: 9,
					requested: 1,
					available: 0
				},
			]
		);
		// Product 1 was deducted then rolled back.
		assert_eq!(inventory.available(1).await.unwrap(), Some(5));
		assert_eq!(inventory.available(2).await.unwrap(), Some(1));
	}

	#[tokio::test]
	async fn test_release_skips_missing_products() {
		let inventory = service(&[(1, 0)]).await;
		inventory
			.release(&[item(42, 1), item(1, 2)])
			.await
			.unwrap();
		assert_eq!(inventory.available(1).await.unwrap(), Some(2));
		assert_eq!(inventory.available(42).await.unwrap(), None);
	}
}
