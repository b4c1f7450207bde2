//! Notifier that writes events to the tracing log.

use crate::{NotifierFactory, NotifierInterface, NotifierRegistry, NotifyError};
use async_trait::async_trait;
use order_types::{ConfigSchema, ImplementationRegistry, OrderEvent, Schema, ValidationError};

pub struct LogNotifier;

#[async_trait]
impl NotifierInterface for LogNotifier {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(LogNotifierSchema)
	}

	async fn notify(&self, event: &OrderEvent) -> Result<(), NotifyError> {
		match event {
			OrderEvent::Created {
				order_ref,
				total_amount,
				item_count,
				..
			} => tracing::info!(
				order_ref = %order_ref,
				total = %total_amount,
				items = item_count,
				"Order placed"
			),
			OrderEvent::OrderStatusChanged {
				order_ref,
				old_status,
				new_status,
				actor,
				..
			} => tracing::info!(
				order_ref = %order_ref,
				from = %old_status,
				to = %new_status,
				actor = %actor,
				"Order status changed"
			),
			OrderEvent::PaymentStatusChanged {
				order_ref,
				old_payment_status,
				new_payment_status,
				actor,
				..
			} => tracing::info!(
				order_ref = %order_ref,
				from = %old_payment_status,
				to = %new_payment_status,
				actor = %actor,
				"Payment status changed"
			),
		}
		Ok(())
	}
}

pub struct LogNotifierSchema;

impl ConfigSchema for LogNotifierSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		Schema::new(vec![], vec![]).validate(config)
	}
}

pub fn create_notifier(config: &toml::Value) -> Result<Box<dyn NotifierInterface>, NotifyError> {
	LogNotifierSchema
		.validate(config)
		.map_err(|e| NotifyError::Configuration(e.to_string()))?;
	Ok(Box::new(LogNotifier))
}

/// Registry for the log notifier implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "log";
	type Factory = NotifierFactory;

	fn factory() -> Self::Factory {
		create_notifier
	}
}

impl NotifierRegistry for Registry {}
