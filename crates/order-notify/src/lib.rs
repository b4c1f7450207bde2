//! Notification dispatch for order events.
//!
//! The lifecycle engine only decides that an event happened; this crate
//! delivers it. Each configured notifier is retried independently and a
//! failing notifier never affects the others or the transition that
//! produced the event.

use async_trait::async_trait;
use backoff::ExponentialBackoffBuilder;
use futures::future::join_all;
use order_types::{ConfigSchema, ImplementationRegistry, OrderEvent};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;

/// Re-export implementations
pub mod implementations {
	pub mod http;
	pub mod log;
}

/// Errors that can occur while delivering notifications.
#[derive(Debug, Error)]
pub enum NotifyError {
	/// Delivery failed and may succeed if retried.
	#[error("Delivery failed: {0}")]
	Delivery(String),
	/// Delivery failed in a way retrying will not fix.
	#[error("Rejected: {0}")]
	Rejected(String),
	/// Error that occurs during configuration validation.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Trait defining the interface for notification dispatchers.
#[async_trait]
pub trait NotifierInterface: Send + Sync {
	/// Returns the configuration schema for this implementation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Delivers one event.
	async fn notify(&self, event: &OrderEvent) -> Result<(), NotifyError>;
}

/// Type alias for notifier factory functions.
pub type NotifierFactory = fn(&toml::Value) -> Result<Box<dyn NotifierInterface>, NotifyError>;

/// Registry trait for notifier implementations.
pub trait NotifierRegistry: ImplementationRegistry<Factory = NotifierFactory> {}

/// Get all registered notifier implementations.
pub fn get_all_implementations() -> Vec<(&'static str, NotifierFactory)> {
	use implementations::{http, log};

	vec![
		(http::Registry::NAME, http::Registry::factory()),
		(log::Registry::NAME, log::Registry::factory()),
	]
}

/// Retry settings for one notifier.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
	/// Retries after the first attempt.
	pub max_retries: u32,
	pub initial_interval: Duration,
	pub max_interval: Duration,
}

impl Default for RetryPolicy {
	fn default() -> Self {
		Self {
			max_retries: 3,
			initial_interval: Duration::from_millis(200),
			max_interval: Duration::from_secs(5),
		}
	}
}

impl RetryPolicy {
	/// Reads `max_retries` from a notifier's configuration table.
	pub fn from_config(config: &toml::Value) -> Self {
		let mut policy = Self::default();
		if let Some(n) = config.get("max_retries").and_then(|v| v.as_integer()) {
			policy.max_retries = n.clamp(0, 20) as u32;
		}
		policy
	}
}

/// A named notifier with its retry policy.
pub struct Dispatcher {
	pub name: String,
	pub notifier: Box<dyn NotifierInterface>,
	pub retry: RetryPolicy,
}

/// Fans events out to every configured notifier.
pub struct NotificationService {
	dispatchers: Vec<Dispatcher>,
}

impl NotificationService {
	pub fn new(dispatchers: Vec<Dispatcher>) -> Self {
		Self { dispatchers }
	}

	pub fn is_empty(&self) -> bool {
		self.dispatchers.is_empty()
	}

	/// Delivers an event to every notifier concurrently.
	///
	/// Returns the names of the notifiers that gave up.
	pub async fn dispatch(&self, event: &OrderEvent) -> Vec<String> {
		let results = join_all(
			self.dispatchers
				.iter()
				.map(|d| async move { (d, deliver_with_retry(d, event).await) }),
		)
		.await;

		let mut failed = Vec::new();
		for (dispatcher, result) in results {
			if let Err(e) = result {
				tracing::error!(
					notifier = %dispatcher.name,
					event = event.kind(),
					order_ref = %event.order_ref(),
					error = %e,
					"Notification delivery failed"
				);
				failed.push(dispatcher.name.clone());
			}
		}
		failed
	}

	/// Forwards events from the bus until it closes.
	///
	/// Each event is dispatched on its own task so a slow notifier does not
	/// hold back the receiver.
	pub async fn run(self: Arc<Self>, mut receiver: broadcast::Receiver<OrderEvent>) {
		loop {
			match receiver.recv().await {
				Ok(event) => {
					let service = self.clone();
					tokio::spawn(async move {
						service.dispatch(&event).await;
					});
				},
				Err(broadcast::error::RecvError::Lagged(skipped)) => {
					tracing::warn!(skipped, "Notification bridge lagged, events dropped");
				},
				Err(broadcast::error::RecvError::Closed) => {
					tracing::debug!("Event bus closed, stopping notification bridge");
					break;
				},
			}
		}
	}
}

async fn deliver_with_retry(dispatcher: &Dispatcher, event: &OrderEvent) -> Result<(), NotifyError> {
	let policy = dispatcher.retry;
	let backoff = ExponentialBackoffBuilder::new()
		.with_initial_interval(policy.initial_interval)
		.with_max_interval(policy.max_interval)
		.with_max_elapsed_time(None)
		.build();

	let mut attempt = 0u32;
	backoff::future::retry(backoff, || {
		attempt += 1;
		let current = attempt;
		async move {
			match dispatcher.notifier.notify(event).await {
				Ok(()) => Ok(()),
				Err(e @ NotifyError::Delivery(_)) if current <= policy.max_retries => {
					tracing::debug!(
						notifier = %dispatcher.name,
						attempt = current,
						error = %e,
						"Retrying notification"
					);
					Err(backoff::Error::transient(e))
				},
				Err(e) => Err(backoff::Error::permanent(e)),
			}
		}
	})
	.await
}
