//! Factory registry for every pluggable backend.
//!
//! Collects the implementations each backend crate exports and selects the
//! ones named in the configuration.

use order_config::Config;
use order_core::{LifecycleBuilder, LifecycleFactories, OrderLifecycle};
use order_gateway::GatewayFactory;
use order_inventory::InventoryFactory;
use order_notify::{NotificationService, NotifierFactory};
use order_storage::StorageFactory;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Global registry for all implementation factories
pub struct FactoryRegistry {
	pub storage: HashMap<String, StorageFactory>,
	pub inventory: HashMap<String, InventoryFactory>,
	pub gateway: HashMap<String, GatewayFactory>,
	pub notifier: HashMap<String, NotifierFactory>,
}

static REGISTRY: OnceLock<FactoryRegistry> = OnceLock::new();

fn collect<F>(kind: &str, implementations: Vec<(&'static str, F)>) -> HashMap<String, F> {
	implementations
		.into_iter()
		.map(|(name, factory)| {
			tracing::debug!("Registering {} implementation: {}", kind, name);
			(name.to_string(), factory)
		})
		.collect()
}

/// Get the global factory registry
pub fn get_registry() -> &'static FactoryRegistry {
	REGISTRY.get_or_init(|| FactoryRegistry {
		storage: collect("storage", order_storage::get_all_implementations()),
		inventory: collect("inventory", order_inventory::get_all_implementations()),
		gateway: collect("gateway", order_gateway::get_all_implementations()),
		notifier: collect("notifier", order_notify::get_all_implementations()),
	})
}

/// Macro to build factories from config implementations
macro_rules! build_factories {
	($registry:expr, $config_impls:expr, $registry_field:ident, $type_name:literal) => {{
		let mut factories = HashMap::new();
		for name in $config_impls.keys() {
			if let Some(factory) = $registry.$registry_field.get(name) {
				factories.insert(name.clone(), *factory);
			} else {
				let mut available: Vec<_> = $registry.$registry_field.keys().cloned().collect();
				available.sort();
				return Err(format!(
					"Unknown {} implementation '{}'. Available: [{}]",
					$type_name,
					name,
					available.join(", ")
				)
				.into());
			}
		}
		factories
	}};
}

/// Builds the engine and the notification fan-out from configuration.
pub async fn build_from_config(
	config: Config,
) -> Result<(OrderLifecycle, NotificationService), Box<dyn std::error::Error>> {
	let registry = get_registry();

	let factories = LifecycleFactories {
		storage_factories: build_factories!(
			registry,
			config.storage.implementations,
			storage,
			"storage"
		),
		inventory_factories: build_factories!(
			registry,
			config.inventory.implementations,
			inventory,
			"inventory"
		),
		gateway_factories: build_factories!(
			registry,
			config.gateway.implementations,
			gateway,
			"gateway"
		),
		notifier_factories: build_factories!(
			registry,
			config.notifications.implementations,
			notifier,
			"notifier"
		),
	};

	let builder = LifecycleBuilder::new(config);
	let notifications = builder.build_notifications(&factories)?;
	let lifecycle = builder.build(&factories).await?;
	Ok((lifecycle, notifications))
}
