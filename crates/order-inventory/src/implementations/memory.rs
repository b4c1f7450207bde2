//! In-memory stock counters.
//!
//! Each product's counter lives in a `DashMap` entry, so a decrement holds
//! the shard lock for that product while checking and deducting.

use crate::{Decrement, InventoryError, InventoryFactory, InventoryInterface, InventoryRegistry};
use async_trait::async_trait;
use dashmap::DashMap;
use order_types::{ConfigSchema, Field, FieldType, ImplementationRegistry, Schema, ValidationError};

/// In-memory inventory implementation.
#[derive(Default)]
pub struct MemoryInventory {
	stock: DashMap<u64, u64>,
}

impl MemoryInventory {
	pub fn new() -> Self {
		Self::default()
	}
}

#[async_trait]
impl InventoryInterface for MemoryInventory {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(MemoryInventorySchema)
	}

	async fn try_decrement(
		&self,
		product_id: u64,
		quantity: u32,
	) -> Result<Decrement, InventoryError> {
		let Some(mut available) = self.stock.get_mut(&product_id) else {
			return Ok(Decrement::Insufficient(0));
		};
		let quantity = u64::from(quantity);
		if *available < quantity {
			return Ok(Decrement::Insufficient(*available));
		}
		*available -= quantity;
		Ok(Decrement::Applied)
	}

	async fn increment(&self, product_id: u64, quantity: u32) -> Result<(), InventoryError> {
		let mut available = self
			.stock
			.get_mut(&product_id)
			.ok_or(InventoryError::ProductNotFound(product_id))?;
		*available = available.saturating_add(u64::from(quantity));
		Ok(())
	}

	async fn available(&self, product_id: u64) -> Result<Option<u64>, InventoryError> {
		Ok(self.stock.get(&product_id).map(|v| *v))
	}

	async fn set_stock(&self, product_id: u64, quantity: u64) -> Result<(), InventoryError> {
		self.stock.insert(product_id, quantity);
		Ok(())
	}
}

/// Configuration schema for MemoryInventory.
pub struct MemoryInventorySchema;

impl ConfigSchema for MemoryInventorySchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![],
			vec![Field::new(
				"seed",
				FieldType::Map(Box::new(FieldType::Integer {
					min: Some(0),
					max: None,
				})),
			)
			.with_validator(|value| {
				let table = value.as_table().ok_or("seed must be a table")?;
				match table.keys().find(|k| k.parse::<u64>().is_err()) {
					Some(key) => Err(format!("'{}' is not a product id", key)),
					None => Ok(()),
				}
			})],
		);
		schema.validate(config)
	}
}

/// Factory function to create a memory inventory from configuration.
///
/// Configuration parameters:
/// - `seed`: optional table of product id to initial stock, e.g. `{ "1" = 5 }`
pub fn create_inventory(
	config: &toml::Value,
) -> Result<Box<dyn InventoryInterface>, InventoryError> {
	MemoryInventorySchema
		.validate(config)
		.map_err(|e| InventoryError::Configuration(e.to_string()))?;

	let inventory = MemoryInventory::new();
	if let Some(seed) = config.get("seed").and_then(|v| v.as_table()) {
		for (key, value) in seed {
			// Both parse after schema validation.
			if let (Ok(product_id), Some(qty)) = (key.parse::<u64>(), value.as_integer()) {
				inventory.stock.insert(product_id, qty as u64);
			}
		}
		tracing::debug!(products = seed.len(), "Seeded memory inventory");
	}
	Ok(Box::new(inventory))
}

/// Registry for the memory inventory implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "memory";
	type Factory = InventoryFactory;

	fn factory() -> Self::Factory {
		create_inventory
	}
}

impl InventoryRegistry for Registry {}
