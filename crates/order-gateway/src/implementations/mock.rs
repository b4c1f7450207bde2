//! In-memory gateway for development and tests.
//!
//! Holds the transaction status per order reference. Clones share state, so
//! a test can keep a handle and change statuses after handing the gateway
//! to the engine.

use crate::{GatewayError, GatewayFactory, GatewayInterface, GatewayRegistry};
use async_trait::async_trait;
use dashmap::DashMap;
use order_types::{
	ConfigSchema, Field, FieldType, GatewayNotification, ImplementationRegistry, Schema,
	ValidationError,
};
use serde_json::json;
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct MockGateway {
	transactions: Arc<DashMap<String, serde_json::Value>>,
}

impl MockGateway {
	pub fn new() -> Self {
		Self::default()
	}

	/// Sets the status the gateway reports for an order.
	pub fn set_status(&self, order_ref: &str, transaction_status: &str, fraud_status: Option<&str>) {
		let mut payload = json!({
			"order_id": order_ref,
			"transaction_status": transaction_status,
		});
		if let Some(fraud) = fraud_status {
			payload["fraud_status"] = json!(fraud);
		}
		self.transactions.insert(order_ref.to_string(), payload);
	}
}

#[async_trait]
impl GatewayInterface for MockGateway {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(MockGatewaySchema)
	}

	async fn fetch_status(&self, order_ref: &str) -> Result<GatewayNotification, GatewayError> {
		let payload = self
			.transactions
			.get(order_ref)
			.map(|p| p.clone())
			.ok_or_else(|| GatewayError::NotFound(order_ref.to_string()))?;
		GatewayNotification::from_payload(payload)
			.map_err(|e| GatewayError::InvalidResponse(e.to_string()))
	}
}

pub struct MockGatewaySchema;

impl ConfigSchema for MockGatewaySchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		Schema::new(
			vec![],
			vec![Field::new("statuses", FieldType::Map(Box::new(FieldType::String)))],
		)
		.validate(config)
	}
}

/// Factory function to create a mock gateway from configuration.
///
/// Configuration parameters:
/// - `statuses`: optional table of order reference to transaction status
pub fn create_gateway(config: &toml::Value) -> Result<Box<dyn GatewayInterface>, GatewayError> {
	MockGatewaySchema
		.validate(config)
		.map_err(|e| GatewayError::Configuration(e.to_string()))?;

	let gateway = MockGateway::new();
	if let Some(statuses) = config.get("statuses").and_then(|v| v.as_table()) {
		for (order_ref, status) in statuses {
			if let Some(status) = status.as_str() {
				gateway.set_status(order_ref, status, None);
			}
		}
	}
	Ok(Box::new(gateway))
}

/// Registry for the mock gateway implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "mock";
	type Factory = GatewayFactory;

	fn factory() -> Self::Factory {
		create_gateway
	}
}

impl GatewayRegistry for Registry {}
