//! Configuration builder for tests and local development.

use crate::{
	ApiConfig, Config, GatewayConfig, InventoryConfig, LifecycleConfig, NotificationsConfig,
	ServiceConfig, StorageConfig,
};
use std::collections::HashMap;

/// Builder for creating `Config` instances with a fluent API.
///
/// Defaults to memory storage, memory inventory, the mock gateway and no
/// notifiers.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
	service_id: String,
	storage_primary: String,
	storage_config: toml::Value,
	inventory_seed: Vec<(u64, i64)>,
	lifecycle: LifecycleConfig,
	notifiers: HashMap<String, toml::Value>,
	api: Option<ApiConfig>,
}

impl Default for ConfigBuilder {
	fn default() -> Self {
		Self::new()
	}
}

fn empty_table() -> toml::Value {
	toml::Value::Table(toml::Table::new())
}

impl ConfigBuilder {
	pub fn new() -> Self {
		Self {
			service_id: "test-engine".to_string(),
			storage_primary: "memory".to_string(),
			storage_config: empty_table(),
			inventory_seed: Vec::new(),
			lifecycle: LifecycleConfig::default(),
			notifiers: HashMap::new(),
			api: None,
		}
	}

	pub fn service_id(mut self, id: impl Into<String>) -> Self {
		self.service_id = id.into();
		self
	}

	/// Uses the file storage backend rooted at `path`.
	pub fn file_storage(mut self, path: impl Into<String>) -> Self {
		let mut table = toml::Table::new();
		table.insert("storage_path".into(), toml::Value::String(path.into()));
		self.storage_primary = "file".to_string();
		self.storage_config = toml::Value::Table(table);
		self
	}

	/// Adds initial stock for a product.
	pub fn stock(mut self, product_id: u64, quantity: i64) -> Self {
		self.inventory_seed.push((product_id, quantity));
		self
	}

	pub fn lifecycle(mut self, lifecycle: LifecycleConfig) -> Self {
		self.lifecycle = lifecycle;
		self
	}

	pub fn notifier(mut self, name: impl Into<String>, config: toml::Value) -> Self {
		self.notifiers.insert(name.into(), config);
		self
	}

	pub fn api(mut self, api: Option<ApiConfig>) -> Self {
		self.api = api;
		self
	}

	pub fn build(self) -> Config {
		let mut seed = toml::Table::new();
		for (product_id, quantity) in self.inventory_seed {
			seed.insert(product_id.to_string(), toml::Value::Integer(quantity));
		}
		let mut memory_inventory = toml::Table::new();
		memory_inventory.insert("seed".into(), toml::Value::Table(seed));

		Config {
			service: ServiceConfig {
				id: self.service_id,
			},
			storage: StorageConfig {
				implementations: HashMap::from([(
					self.storage_primary.clone(),
					self.storage_config,
				)]),
				primary: self.storage_primary,
				cleanup_interval_seconds: 60,
			},
			inventory: InventoryConfig {
				primary: "memory".to_string(),
				implementations: HashMap::from([(
					"memory".to_string(),
					toml::Value::Table(memory_inventory),
				)]),
			},
			lifecycle: self.lifecycle,
			notifications: NotificationsConfig {
				implementations: self.notifiers,
			},
			gateway: GatewayConfig {
				primary: "mock".to_string(),
				implementations: HashMap::from([("mock".to_string(), empty_table())]),
			},
			api: self.api,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_built_config_passes_validation() {
		let config = ConfigBuilder::new().stock(1, 5).build();
		config.validate().unwrap();

		// Survives a TOML round trip through the parser's validation.
		let text = toml::to_string(&config).unwrap();
		let parsed: Config = text.parse().unwrap();
		assert_eq!(parsed.inventory.primary, "memory");
		assert!(parsed.storage.implementations.contains_key("memory"));
	}
}
