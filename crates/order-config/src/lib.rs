//! Configuration module for the order engine.
//!
//! This module provides structures and utilities for managing engine configuration.
//! It supports loading configuration from TOML files and provides validation to ensure
//! all required configuration values are properly set.
//!
//! ## Modular Configuration Support
//!
//! Configurations can be split into multiple files for better organization:
//! - Use `include = ["file1.toml", "file2.toml"]` to include other config files
//! - Each top-level section must be unique across all files (no duplicates allowed)

mod loader;

/// Configuration builders for tests and development setups.
#[cfg(any(test, feature = "testing"))]
pub mod builders {
	pub mod config;
}

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Keep the message, not the echoed input.
		ConfigError::Parse(err.message().to_string())
	}
}

/// Main configuration structure for the order engine.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Identity of this engine instance.
	pub service: ServiceConfig,
	/// Persistent order store.
	pub storage: StorageConfig,
	/// Product stock counters.
	pub inventory: InventoryConfig,
	/// Transition engine and creation settings.
	#[serde(default)]
	pub lifecycle: LifecycleConfig,
	/// Notification dispatchers.
	#[serde(default)]
	pub notifications: NotificationsConfig,
	/// Payment gateway client used for status polling.
	pub gateway: GatewayConfig,
	/// HTTP API server.
	pub api: Option<ApiConfig>,
}

/// Service identity.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
	/// Unique identifier, included in logs.
	pub id: String,
}

/// Configuration for the storage backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Map of storage implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
	/// Interval in seconds for cleaning up expired storage entries.
	#[serde(default = "default_cleanup_interval")]
	pub cleanup_interval_seconds: u64,
}

fn default_cleanup_interval() -> u64 {
	60
}

/// Configuration for the inventory backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InventoryConfig {
	pub primary: String,
	pub implementations: HashMap<String, toml::Value>,
}

/// Settings for the lifecycle engine.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LifecycleConfig {
	/// How long an idempotency key collapses duplicate creations.
	pub idempotency_window_seconds: u64,
	/// Lock acquisition attempts before reporting a concurrent modification.
	pub max_conflict_retries: u32,
	/// Bound on waiting for the per-order lock, per attempt.
	pub lock_timeout_ms: u64,
	/// Payment deadline relative to creation time.
	pub payment_deadline_minutes: u64,
	/// Prefix of generated order references.
	pub order_ref_prefix: String,
}

/// Upper bound for `payment_deadline_minutes`.
pub const MAX_PAYMENT_DEADLINE_MINUTES: u64 = 365 * 24 * 60;

impl Default for LifecycleConfig {
	fn default() -> Self {
		Self {
			idempotency_window_seconds: 30,
			max_conflict_retries: 3,
			lock_timeout_ms: 2000,
			payment_deadline_minutes: 24 * 60,
			order_ref_prefix: "ORD".to_string(),
		}
	}
}

/// Configuration for notification dispatchers.
///
/// Every entry under `implementations` is enabled.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct NotificationsConfig {
	#[serde(default)]
	pub implementations: HashMap<String, toml::Value>,
}

/// Configuration for the payment gateway client.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GatewayConfig {
	pub primary: String,
	pub implementations: HashMap<String, toml::Value>,
}

/// Configuration for the HTTP API server.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
	/// Whether the API server is enabled.
	#[serde(default)]
	pub enabled: bool,
	/// Host address to bind the server to.
	#[serde(default = "default_api_host")]
	pub host: String,
	/// Port to bind the server to.
	#[serde(default = "default_api_port")]
	pub port: u16,
	/// Request timeout in seconds.
	#[serde(default = "default_api_timeout")]
	pub timeout_seconds: u64,
	/// Maximum request size in bytes.
	#[serde(default = "default_max_request_size")]
	pub max_request_size: usize,
}

fn default_api_host() -> String {
	"127.0.0.1".to_string()
}

fn default_api_port() -> u16 {
	3000
}

fn default_api_timeout() -> u64 {
	30
}

fn default_max_request_size() -> usize {
	1024 * 1024
}

/// Resolves environment variables in a string.
///
/// Replaces ${VAR_NAME} with the value of the environment variable VAR_NAME.
/// Supports default values with ${VAR_NAME:-default_value}.
///
/// Input strings are limited to 1MB.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut missing = None;
	let resolved = re.replace_all(input, |caps: &regex::Captures| {
		let var_name = &caps[1];
		match (std::env::var(var_name), caps.get(2)) {
			(Ok(value), _) => value,
			(Err(_), Some(default)) => default.as_str().to_string(),
			(Err(_), None) => {
				missing.get_or_insert_with(|| var_name.to_string());
				String::new()
			},
		}
	});

	match missing {
		Some(var_name) => Err(ConfigError::Validation(format!(
			"Environment variable '{}' not found",
			var_name
		))),
		None => Ok(resolved.into_owned()),
	}
}

fn check_primary(
	section: &str,
	primary: &str,
	implementations: &HashMap<String, toml::Value>,
) -> Result<(), ConfigError> {
	if implementations.is_empty() {
		return Err(ConfigError::Validation(format!(
			"At least one {} implementation must be configured",
			section
		)));
	}
	if !implementations.contains_key(primary) {
		return Err(ConfigError::Validation(format!(
			"Primary {} '{}' not found in {}.implementations",
			section, primary, section
		)));
	}
	Ok(())
}

impl Config {
	/// Loads configuration from a file with environment variable resolution.
	///
	/// This method supports modular configuration through include directives:
	/// - `include = ["file1.toml", "file2.toml"]` - Include specific files
	///
	/// Each top-level section must be unique across all configuration files.
	pub async fn from_file(path: &str) -> Result<Self, ConfigError> {
		let path_buf = Path::new(path);
		let base_dir = path_buf.parent().unwrap_or_else(|| Path::new("."));

		let mut loader = loader::ConfigLoader::new(base_dir);
		let file_name = path_buf
			.file_name()
			.ok_or_else(|| ConfigError::Validation(format!("Invalid path: {}", path)))?;
		loader.load_config(file_name).await
	}

	/// Validates the configuration to ensure all required fields are properly set.
	fn validate(&self) -> Result<(), ConfigError> {
		if self.service.id.trim().is_empty() {
			return Err(ConfigError::Validation("Service ID cannot be empty".into()));
		}

		check_primary("storage", &self.storage.primary, &self.storage.implementations)?;
		if self.storage.cleanup_interval_seconds == 0 {
			return Err(ConfigError::Validation(
				"Storage cleanup_interval_seconds must be greater than 0".into(),
			));
		}
		if self.storage.cleanup_interval_seconds > 86400 {
			return Err(ConfigError::Validation(
				"Storage cleanup_interval_seconds cannot exceed 86400 (24 hours)".into(),
			));
		}

		check_primary(
			"inventory",
			&self.inventory.primary,
			&self.inventory.implementations,
		)?;
		check_primary("gateway", &self.gateway.primary, &self.gateway.implementations)?;

		let lifecycle = &self.lifecycle;
		if lifecycle.idempotency_window_seconds == 0 {
			return Err(ConfigError::Validation(
				"Lifecycle idempotency_window_seconds must be greater than 0".into(),
			));
		}
		if lifecycle.max_conflict_retries == 0 {
			return Err(ConfigError::Validation(
				"Lifecycle max_conflict_retries must be at least 1".into(),
			));
		}
		if lifecycle.lock_timeout_ms == 0 {
			return Err(ConfigError::Validation(
				"Lifecycle lock_timeout_ms must be greater than 0".into(),
			));
		}
		if lifecycle.payment_deadline_minutes == 0 {
			return Err(ConfigError::Validation(
				"Lifecycle payment_deadline_minutes must be greater than 0".into(),
			));
		}
		if lifecycle.payment_deadline_minutes > MAX_PAYMENT_DEADLINE_MINUTES {
			return Err(ConfigError::Validation(format!(
				"Lifecycle payment_deadline_minutes cannot exceed {} (365 days)",
				MAX_PAYMENT_DEADLINE_MINUTES
			)));
		}
		let prefix = &lifecycle.order_ref_prefix;
		if prefix.is_empty()
			|| prefix.len() > 8
			|| !prefix.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
		{
			return Err(ConfigError::Validation(format!(
				"Lifecycle order_ref_prefix '{}' must be 1-8 uppercase letters or digits",
				prefix
			)));
		}

		if let Some(api) = &self.api {
			if api.enabled && api.max_request_size == 0 {
				return Err(ConfigError::Validation(
					"API max_request_size must be greater than 0".into(),
				));
			}
		}

		Ok(())
	}
}

/// Parses a configuration from a TOML string.
///
/// Environment variables are resolved and the configuration is validated
/// after parsing.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}
