//! HTTP client for the gateway's transaction-status endpoint.
//!
//! Issues `GET <base_url>/<order_ref>/status` authenticated with HTTP basic
//! auth, the server key as user name and an empty password.

use crate::{GatewayError, GatewayFactory, GatewayInterface, GatewayRegistry};
use async_trait::async_trait;
use order_types::{
	ConfigSchema, Field, FieldType, GatewayNotification, ImplementationRegistry, Schema,
	ValidationError,
};
use std::time::Duration;

pub struct HttpGateway {
	client: reqwest::Client,
	base_url: String,
	server_key: String,
}

impl HttpGateway {
	pub fn new(base_url: &str, server_key: String, timeout: Duration) -> Result<Self, GatewayError> {
		let client = reqwest::Client::builder()
			.timeout(timeout)
			.build()
			.map_err(|e| GatewayError::Configuration(e.to_string()))?;
		Ok(Self {
			client,
			base_url: base_url.trim_end_matches('/').to_string(),
			server_key,
		})
	}

	fn status_url(&self, order_ref: &str) -> String {
		format!("{}/{}/status", self.base_url, order_ref)
	}
}

#[async_trait]
impl GatewayInterface for HttpGateway {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(HttpGatewaySchema)
	}

	async fn fetch_status(&self, order_ref: &str) -> Result<GatewayNotification, GatewayError> {
		let response = self
			.client
			.get(self.status_url(order_ref))
			.basic_auth(&self.server_key, Some(""))
			.header(reqwest::header::ACCEPT, "application/json")
			.send()
			.await
			.map_err(|e| GatewayError::Network(e.to_string()))?;

		if response.status() == reqwest::StatusCode::NOT_FOUND {
			return Err(GatewayError::NotFound(order_ref.to_string()));
		}
		if !response.status().is_success() {
			return Err(GatewayError::InvalidResponse(format!(
				"status endpoint returned {}",
				response.status()
			)));
		}

		let body: serde_json::Value = response
			.json()
			.await
			.map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;

		// Some gateways answer 200 with the real code in the body.
		if body.get("status_code").and_then(|c| c.as_str()) == Some("404") {
			return Err(GatewayError::NotFound(order_ref.to_string()));
		}

		tracing::debug!(order_ref = %order_ref, "Fetched transaction status");
		GatewayNotification::from_payload(body)
			.map_err(|e| GatewayError::InvalidResponse(e.to_string()))
	}
}

pub struct HttpGatewaySchema;

impl ConfigSchema for HttpGatewaySchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![
				Field::new("base_url", FieldType::String).with_validator(|value| {
					match value.as_str() {
						Some(url) if url.starts_with("http://") || url.starts_with("https://") => {
							Ok(())
						},
						_ => Err("base_url must start with http:// or https://".to_string()),
					}
				}),
				Field::new("server_key", FieldType::String).with_validator(|value| {
					match value.as_str() {
						Some(key) if !key.is_empty() => Ok(()),
						_ => Err("server_key cannot be empty".to_string()),
					}
				}),
			],
			vec![Field::new(
				"timeout_seconds",
				FieldType::Integer {
					min: Some(1),
					max: Some(300),
				},
			)],
		);
		schema.validate(config)
	}
}

/// Factory function to create an HTTP gateway client from configuration.
///
/// Configuration parameters:
/// - `base_url`: status API base URL (required)
/// - `server_key`: secret used for basic auth (required)
/// - `timeout_seconds`: request timeout (default: 10)
pub fn create_gateway(config: &toml::Value) -> Result<Box<dyn GatewayInterface>, GatewayError> {
	HttpGatewaySchema
		.validate(config)
		.map_err(|e| GatewayError::Configuration(e.to_string()))?;

	let base_url = config
		.get("base_url")
		.and_then(|v| v.as_str())
		.ok_or_else(|| GatewayError::Configuration("base_url is required".into()))?;
	let server_key = config
		.get("server_key")
		.and_then(|v| v.as_str())
		.ok_or_else(|| GatewayError::Configuration("server_key is required".into()))?;
	let timeout = config
		.get("timeout_seconds")
		.and_then(|v| v.as_integer())
		.unwrap_or(10) as u64;

	Ok(Box::new(HttpGateway::new(
		base_url,
		server_key.to_string(),
		Duration::from_secs(timeout),
	)?))
}

/// Registry for the HTTP gateway implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "http";
	type Factory = GatewayFactory;

	fn factory() -> Self::Factory {
		create_gateway
	}
}

impl GatewayRegistry for Registry {}
