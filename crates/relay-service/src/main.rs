//! Main entry point for the relay service.
//!
//! Loads the configuration, builds every configured chain adapter, and runs
//! the relay until interrupted or until an adapter fails. A failed adapter
//! makes the process exit with a non-zero status so an external supervisor
//! can restart it.

use clap::Parser;
use relay_config::Config;
use std::path::PathBuf;
use std::sync::Arc;

mod factory_registry;
mod server;

/// Command-line arguments for the relay service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config/relay.toml")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info", env = "RELAY_LOG_LEVEL")]
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

	tracing::info!("Started relay");

	let config = Config::from_file(&args.config).await?;
	tracing::info!("Loaded configuration [{}]", config.relay.id);

	let api_config = config.api.clone().filter(|api| api.enabled);
	let relay = Arc::new(factory_registry::build_relay_from_config(config)?);

	if let Some(api_config) = api_config {
		let api_relay = Arc::clone(&relay);

		tokio::select! {
			result = relay.run() => {
				tracing::info!("Relay finished");
				result?;
			}
			result = server::start_server(api_config, api_relay) => {
				tracing::info!("API server finished");
				relay.shutdown().await;
				result?;
			}
		}
	} else {
		relay.run().await?;
	}

	tracing::info!("Stopped relay");
	Ok(())
}
