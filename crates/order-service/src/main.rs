//! Main entry point for the order lifecycle service.
//!
//! Loads the configuration, assembles the lifecycle engine with the backends
//! it names, starts the notification fan-out and serves the HTTP API.

use clap::Parser;
use order_config::Config;
use std::path::PathBuf;
use std::sync::Arc;

mod apis;
mod factory_registry;
mod server;

/// Command-line arguments for the order service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config.toml")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	use tracing_subscriber::{fmt, EnvFilter};

	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.init();

	tracing::info!("Started order service");

	let config_path = args.config.to_string_lossy();
	let config = Config::from_file(&config_path).await?;
	tracing::info!("Loaded configuration [{}]", config.service.id);

	let api_config = config.api.clone().filter(|api| api.enabled);

	let (lifecycle, notifications) = factory_registry::build_from_config(config).await?;
	let lifecycle = Arc::new(lifecycle);

	let cleanup = lifecycle.spawn_cleanup();

	let notifier = if notifications.is_empty() {
		tracing::info!("No notifiers configured");
		None
	} else {
		let receiver = lifecycle.event_bus().subscribe();
		Some(tokio::spawn(Arc::new(notifications).run(receiver)))
	};

	let result = match api_config {
		Some(api_config) => {
			tokio::select! {
				result = server::start_server(api_config, Arc::clone(&lifecycle)) => {
					tracing::info!("API server finished");
					result
				},
				_ = tokio::signal::ctrl_c() => {
					tracing::info!("Shutdown signal received");
					Ok(())
				},
			}
		},
		None => {
			tracing::info!("API disabled, running background tasks only");
			tokio::signal::ctrl_c().await?;
			Ok(())
		},
	};

	cleanup.abort();
	if let Some(notifier) = notifier {
		notifier.abort();
	}

	tracing::info!("Stopped order service");
	result
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::tempdir;

	#[test]
	fn test_args_defaults() {
		let args = Args::parse_from(["orderd"]);
		assert_eq!(args.config, PathBuf::from("config.toml"));
		assert_eq!(args.log_level, "info");
	}

	#[test]
	fn test_args_custom_values() {
		let args = Args::parse_from(["orderd", "--config", "prod.toml", "-l", "debug"]);
		assert_eq!(args.config, PathBuf::from("prod.toml"));
		assert_eq!(args.log_level, "debug");
	}

	#[tokio::test]
	async fn test_build_from_file_config() {
		let temp_dir = tempdir().unwrap();
		let config_path = temp_dir.path().join("config.toml");
		std::fs::write(
			&config_path,
			r#"
[service]
id = "file-engine"

[storage]
primary = "memory"
cleanup_interval_seconds = 60
[storage.implementations.memory]

[inventory]
primary = "memory"
[inventory.implementations.memory.seed]
1 = 10

[gateway]
primary = "mock"
[gateway.implementations.mock]

[notifications.implementations.log]
"#,
		)
		.unwrap();

		let config = Config::from_file(config_path.to_str().unwrap()).await.unwrap();
		let (lifecycle, notifications) = factory_registry::build_from_config(config).await.unwrap();

		assert_eq!(lifecycle.config().service.id, "file-engine");
		assert_eq!(lifecycle.inventory().available(1).await.unwrap(), Some(10));
		assert!(!notifications.is_empty());
	}
}
