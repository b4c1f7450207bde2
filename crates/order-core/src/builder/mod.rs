//! Builder pattern for constructing the lifecycle engine.
//!
//! Backends are created from the `implementations` tables of the
//! configuration using factory functions keyed by implementation name. For
//! storage, inventory and gateway exactly one implementation, the
//! `primary`, is used; every configured notifier is used.

use crate::engine::{event_bus::EventBus, OrderLifecycle};
use crate::state::OrderStore;
use order_config::Config;
use order_gateway::{GatewayError, GatewayInterface, GatewayService};
use order_inventory::{InventoryError, InventoryInterface, InventoryService};
use order_notify::{Dispatcher, NotificationService, NotifierInterface, NotifyError, RetryPolicy};
use order_storage::{StorageError, StorageInterface, StorageService};
use std::collections::HashMap;
use std::fmt::Display;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during engine construction.
#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Missing required component: {0}")]
	MissingComponent(String),
}

/// Factory functions for every pluggable component, keyed by implementation name.
pub struct LifecycleFactories<SF, IF, GF, NF> {
	pub storage_factories: HashMap<String, SF>,
	pub inventory_factories: HashMap<String, IF>,
	pub gateway_factories: HashMap<String, GF>,
	pub notifier_factories: HashMap<String, NF>,
}

/// Builder for constructing an [`OrderLifecycle`] and its notification fan-out.
pub struct LifecycleBuilder {
	config: Config,
}

/// Instantiates every configured implementation that has a factory, then
/// takes out the primary one.
fn load_primary<T, E, F>(
	component: &'static str,
	implementations: &HashMap<String, toml::Value>,
	primary: &str,
	factories: &HashMap<String, F>,
) -> Result<T, BuilderError>
where
	F: Fn(&toml::Value) -> Result<T, E>,
	E: Display,
{
	let mut loaded = HashMap::new();
	for (name, config) in implementations {
		let Some(factory) = factories.get(name) else {
			tracing::warn!(component, implementation = %name, "No factory registered, skipping");
			continue;
		};
		match factory(config) {
			Ok(implementation) => {
				let is_primary = primary == name;
				tracing::info!(component, implementation = %name, enabled = %is_primary, "Loaded");
				loaded.insert(name.clone(), implementation);
			},
			Err(e) => {
				tracing::error!(
					component,
					implementation = %name,
					error = %e,
					"Failed to create implementation"
				);
				return Err(BuilderError::Config(format!(
					"Failed to create {} implementation '{}': {}",
					component, name, e
				)));
			},
		}
	}

	if loaded.is_empty() {
		return Err(BuilderError::MissingComponent(format!(
			"no valid {} implementations available",
			component
		)));
	}

	loaded.remove(primary).ok_or_else(|| {
		BuilderError::Config(format!(
			"Primary {} '{}' failed to load or has invalid configuration",
			component, primary
		))
	})
}

impl LifecycleBuilder {
	pub fn new(config: Config) -> Self {
		Self { config }
	}

	/// Builds the engine from the storage, inventory and gateway factories.
	pub async fn build<SF, IF, GF, NF>(
		self,
		factories: &LifecycleFactories<SF, IF, GF, NF>,
	) -> Result<OrderLifecycle, BuilderError>
	where
		SF: Fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>,
		IF: Fn(&toml::Value) -> Result<Box<dyn InventoryInterface>, InventoryError>,
		GF: Fn(&toml::Value) -> Result<Box<dyn GatewayInterface>, GatewayError>,
	{
		let storage_backend = load_primary(
			"storage",
			&self.config.storage.implementations,
			&self.config.storage.primary,
			&factories.storage_factories,
		)?;
		let storage = Arc::new(StorageService::new(storage_backend));

		let store = OrderStore::load(storage.clone()).await.map_err(|e| {
			BuilderError::Config(format!("Failed to open order store: {}", e))
		})?;

		let inventory_backend = load_primary(
			"inventory",
			&self.config.inventory.implementations,
			&self.config.inventory.primary,
			&factories.inventory_factories,
		)?;
		let inventory = Arc::new(InventoryService::new(inventory_backend));

		let gateway_client = load_primary(
			"gateway",
			&self.config.gateway.implementations,
			&self.config.gateway.primary,
			&factories.gateway_factories,
		)?;
		let gateway = Arc::new(GatewayService::new(gateway_client));

		tracing::info!(
			service_id = %self.config.service.id,
			idempotency_window_seconds = self.config.lifecycle.idempotency_window_seconds,
			"Lifecycle engine assembled"
		);

		Ok(OrderLifecycle::new(
			self.config,
			storage,
			Arc::new(store),
			inventory,
			gateway,
			EventBus::new(1000),
		))
	}

	/// Creates one dispatcher per configured notifier.
	///
	/// An empty `[notifications]` section yields an empty service.
	pub fn build_notifications<SF, IF, GF, NF>(
		&self,
		factories: &LifecycleFactories<SF, IF, GF, NF>,
	) -> Result<NotificationService, BuilderError>
	where
		NF: Fn(&toml::Value) -> Result<Box<dyn NotifierInterface>, NotifyError>,
	{
		let mut dispatchers = Vec::new();
		for (name, config) in &self.config.notifications.implementations {
			let factory = factories.notifier_factories.get(name).ok_or_else(|| {
				BuilderError::Config(format!("Unknown notifier implementation '{}'", name))
			})?;
			match factory(config) {
				Ok(notifier) => {
					let retry = RetryPolicy::from_config(config);
					tracing::info!(
						component = "notifier",
						implementation = %name,
						max_retries = retry.max_retries,
						"Loaded"
					);
					dispatchers.push(Dispatcher {
						name: name.clone(),
						notifier,
						retry,
					});
				},
				Err(e) => {
					tracing::error!(
						component = "notifier",
						implementation = %name,
						error = %e,
						"Failed to create notifier"
					);
					return Err(BuilderError::Config(format!(
						"Failed to create notifier '{}': {}",
						name, e
					)));
				},
			}
		}
		Ok(NotificationService::new(dispatchers))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use order_config::builders::config::ConfigBuilder;
	use order_gateway::GatewayFactory;
	use order_inventory::InventoryFactory;
	use order_notify::NotifierFactory;
	use order_storage::StorageFactory;
	use rust_decimal_macros::dec;
	use tempfile::TempDir;

	fn factories() -> LifecycleFactories<StorageFactory, InventoryFactory, GatewayFactory, NotifierFactory>
	{
		LifecycleFactories {
			storage_factories: order_storage::get_all_implementations()
				.into_iter()
				.map(|(name, f)| (name.to_string(), f))
				.collect(),
			inventory_factories: order_inventory::get_all_implementations()
				.into_iter()
				.map(|(name, f)| (name.to_string(), f))
				.collect(),
			gateway_factories: order_gateway::get_all_implementations()
				.into_iter()
				.map(|(name, f)| (name.to_string(), f))
				.collect(),
			notifier_factories: order_notify::get_all_implementations()
				.into_iter()
				.map(|(name, f)| (name.to_string(), f))
				.collect(),
		}
	}

	#[tokio::test]
	async fn test_build_from_config_seeds_inventory() {
		let config = ConfigBuilder::new().stock(1, 5).build();
		let lifecycle = LifecycleBuilder::new(config)
			.build(&factories())
			.await
			.unwrap();

		assert_eq!(lifecycle.inventory().available(1).await.unwrap(), Some(5));
		let order = lifecycle
			.create_order(crate::test_support::new_order(&[(1, 2, dec!(50000))]), None)
			.await
			.unwrap()
			.order;
		assert!(order.order_ref.starts_with("ORD-"));
	}

	#[tokio::test]
	async fn test_orders_survive_restart_on_file_storage() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().to_string_lossy().to_string();

		let first = LifecycleBuilder::new(ConfigBuilder::new().file_storage(&path).stock(1, 5).build())
			.build(&factories())
			.await
			.unwrap();
		let order = first
			.create_order(crate::test_support::new_order(&[(1, 1, dec!(1000))]), None)
			.await
			.unwrap()
			.order;
		drop(first);

		let second = LifecycleBuilder::new(ConfigBuilder::new().file_storage(&path).stock(1, 5).build())
			.build(&factories())
			.await
			.unwrap();
		assert_eq!(second.get_order(&order.order_ref).await.unwrap(), order);
		let next = second
			.create_order(crate::test_support::new_order(&[(1, 1, dec!(1000))]), None)
			.await
			.unwrap()
			.order;
		assert!(next.id > order.id);
	}

	#[tokio::test]
	async fn test_unknown_primary_is_rejected() {
		let mut config = ConfigBuilder::new().build();
		config.gateway.primary = "stripe".to_string();
		let err = LifecycleBuilder::new(config)
			.build(&factories())
			.await
			.err()
			.unwrap();
		assert!(err.to_string().contains("stripe"));
	}

	#[test]
	fn test_notifications_built_per_config() {
		let builder = LifecycleBuilder::new(ConfigBuilder::new().build());
		assert!(builder.build_notifications(&factories()).unwrap().is_empty());

		let log: toml::Value = toml::from_str("max_retries = 1").unwrap();
		let builder = LifecycleBuilder::new(ConfigBuilder::new().notifier("log", log).build());
		assert!(!builder.build_notifications(&factories()).unwrap().is_empty());

		let builder = LifecycleBuilder::new(
			ConfigBuilder::new()
				.notifier("pager", toml::Value::Table(toml::Table::new()))
				.build(),
		);
		assert!(builder.build_notifications(&factories()).is_err());
	}
}
