//! Notifier that POSTs events as JSON to an HTTP endpoint.
//!
//! Connection errors, timeouts and 5xx/429 responses are reported as
//! retryable; other non-success responses are rejections.

use crate::{NotifierFactory, NotifierInterface, NotifierRegistry, NotifyError};
use async_trait::async_trait;
use order_types::{
	ConfigSchema, Field, FieldType, ImplementationRegistry, OrderEvent, Schema, ValidationError,
};
use std::time::Duration;

pub struct HttpNotifier {
	client: reqwest::Client,
	url: String,
}

impl HttpNotifier {
	pub fn new(url: String, timeout: Duration) -> Result<Self, NotifyError> {
		let client = reqwest::Client::builder()
			.timeout(timeout)
			.build()
			.map_err(|e| NotifyError::Configuration(e.to_string()))?;
		Ok(Self { client, url })
	}
}

#[async_trait]
impl NotifierInterface for HttpNotifier {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(HttpNotifierSchema)
	}

	async fn notify(&self, event: &OrderEvent) -> Result<(), NotifyError> {
		let response = self
			.client
			.post(&self.url)
			.header("X-Order-Event", event.kind())
			.json(event)
			.send()
			.await
			.map_err(|e| NotifyError::Delivery(e.to_string()))?;

		let status = response.status();
		if status.is_success() {
			Ok(())
		} else if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
			Err(NotifyError::Delivery(format!("endpoint returned {}", status)))
		} else {
			Err(NotifyError::Rejected(format!("endpoint returned {}", status)))
		}
	}
}

pub struct HttpNotifierSchema;

impl ConfigSchema for HttpNotifierSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![Field::new("url", FieldType::String).with_validator(|value| {
				match value.as_str() {
					Some(url) if url.starts_with("http://") || url.starts_with("https://") => Ok(()),
					_ => Err("url must start with http:// or https://".to_string()),
				}
			})],
			vec![
				Field::new(
					"max_retries",
					FieldType::Integer {
						min: Some(0),
						max: Some(20),
					},
				),
				Field::new(
					"timeout_seconds",
					FieldType::Integer {
						min: Some(1),
						max: Some(300),
					},
				),
			],
		);
		schema.validate(config)
	}
}

/// Factory function to create an HTTP notifier from configuration.
///
/// Configuration parameters:
/// - `url`: endpoint receiving the JSON events (required)
/// - `timeout_seconds`: per-request timeout (default: 10)
/// - `max_retries`: read by the notification service (default: 3)
pub fn create_notifier(config: &toml::Value) -> Result<Box<dyn NotifierInterface>, NotifyError> {
	HttpNotifierSchema
		.validate(config)
		.map_err(|e| NotifyError::Configuration(e.to_string()))?;

	let url = config
		.get("url")
		.and_then(|v| v.as_str())
		.ok_or_else(|| NotifyError::Configuration("url is required".into()))?;
	let timeout = config
		.get("timeout_seconds")
		.and_then(|v| v.as_integer())
		.unwrap_or(10) as u64;

	Ok(Box::new(HttpNotifier::new(
		url.to_string(),
		Duration::from_secs(timeout),
	)?))
}

/// Registry for the HTTP notifier implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "http";
	type Factory = NotifierFactory;

	fn factory() -> Self::Factory {
		create_notifier
	}
}

impl NotifierRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;
	use axum::{http::HeaderMap, http::StatusCode, routing::post, Router};
	use rust_decimal::Decimal;
	use tokio::net::TcpListener;

	async fn serve(router: Router) -> String {
		let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
		let addr = listener.local_addr().unwrap();
		tokio::spawn(async move {
			axum::serve(listener, router).await.unwrap();
		});
		format!("http://{}", addr)
	}

	fn notifier(url: String) -> HttpNotifier {
		HttpNotifier::new(url, Duration::from_secs(5)).unwrap()
	}

	fn event() -> OrderEvent {
		OrderEvent::Created {
			order_ref: "ORD-20240101-ABC123".into(),
			total_amount: Decimal::new(110_000, 0),
			item_count: 2,
			payment_method: "bank_transfer".into(),
		}
	}

	#[tokio::test]
	async fn test_response_classification() {
		let base = serve(
			Router::new()
				.route(
					"/events",
					post(|headers: HeaderMap| async move {
						match headers.get("X-Order-Event").and_then(|v| v.to_str().ok()) {
							Some("created") => StatusCode::NO_CONTENT,
							_ => StatusCode::BAD_REQUEST,
						}
					}),
				)
				.route("/gone", post(|| async { StatusCode::GONE }))
				.route("/down", post(|| async { StatusCode::SERVICE_UNAVAILABLE }))
				.route("/busy", post(|| async { StatusCode::TOO_MANY_REQUESTS })),
		)
		.await;

		assert!(notifier(format!("{}/events", base)).notify(&event()).await.is_ok());
		assert!(matches!(
			notifier(format!("{}/gone", base)).notify(&event()).await,
			Err(NotifyError::Rejected(_))
		));
		assert!(matches!(
			notifier(format!("{}/down", base)).notify(&event()).await,
			Err(NotifyError::Delivery(_))
		));
		assert!(matches!(
			notifier(format!("{}/busy", base)).notify(&event()).await,
			Err(NotifyError::Delivery(_))
		));
	}

	#[tokio::test]
	async fn test_unreachable_endpoint_is_retryable() {
		let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
		let addr = listener.local_addr().unwrap();
		drop(listener);

		let result = notifier(format!("http://{}/events", addr)).notify(&event()).await;
		assert!(matches!(result, Err(NotifyError::Delivery(_))));
	}

	#[test]
	fn test_config_validation() {
		let ok: toml::Value =
			toml::from_str("url = \"http://localhost:9000/events\"\nmax_retries = 2").unwrap();
		assert!(create_notifier(&ok).is_ok());

		let missing: toml::Value = toml::from_str("max_retries = 2").unwrap();
		assert!(create_notifier(&missing).is_err());

		let bad_scheme: toml::Value = toml::from_str("url = \"ftp://host\"").unwrap();
		assert!(create_notifier(&bad_scheme).is_err());
	}
}
