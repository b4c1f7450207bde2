//! Payment gateway integration.
//!
//! The gateway pushes transaction-status notifications on its own; this
//! crate covers the other direction, asking the gateway for the current
//! status of a transaction so a missed or delayed notification can be
//! reconciled.

use async_trait::async_trait;
use order_types::{ConfigSchema, GatewayNotification, ImplementationRegistry};
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod http;
	pub mod mock;
}

/// Errors that can occur while talking to the payment gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
	/// The gateway has no transaction for this order reference.
	#[error("Transaction not found: {0}")]
	NotFound(String),
	/// The request did not complete.
	#[error("Network error: {0}")]
	Network(String),
	/// The gateway answered with something that is not a status payload.
	#[error("Invalid response: {0}")]
	InvalidResponse(String),
	/// Error that occurs during configuration validation.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Trait defining the interface for payment gateway clients.
#[async_trait]
pub trait GatewayInterface: Send + Sync {
	/// Returns the configuration schema for this implementation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Fetches the gateway's current view of the transaction for an order.
	async fn fetch_status(&self, order_ref: &str) -> Result<GatewayNotification, GatewayError>;
}

/// Type alias for gateway factory functions.
pub type GatewayFactory = fn(&toml::Value) -> Result<Box<dyn GatewayInterface>, GatewayError>;

/// Registry trait for gateway implementations.
pub trait GatewayRegistry: ImplementationRegistry<Factory = GatewayFactory> {}

/// Get all registered gateway implementations.
pub fn get_all_implementations() -> Vec<(&'static str, GatewayFactory)> {
	use implementations::{http, mock};

	vec![
		(http::Registry::NAME, http::Registry::factory()),
		(mock::Registry::NAME, mock::Registry::factory()),
	]
}

/// Service wrapper around the configured gateway client.
pub struct GatewayService {
	client: Box<dyn GatewayInterface>,
}

impl GatewayService {
	pub fn new(client: Box<dyn GatewayInterface>) -> Self {
		Self { client }
	}

	pub async fn fetch_status(&self, order_ref: &str) -> Result<GatewayNotification, GatewayError> {
		let notification = self.client.fetch_status(order_ref).await?;
		if notification.order_id != order_ref {
			return Err(GatewayError::InvalidResponse(format!(
				"status for '{}' returned for '{}'",
				notification.order_id, order_ref
			)));
		}
		Ok(notification)
	}
}
