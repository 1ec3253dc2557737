pub mod core;
pub mod engine;
pub mod firewall;

use anyhow::{Context, Result};
use log::{info, warn};
use std::path::Path;
use std::sync::Arc;

use crate::core::config::Config;
use crate::engine::Engine;
use crate::firewall::IptablesBackend;

/// Load configuration, seed the rule mirror from live iptables state, and
/// run both engine workers for the life of the process.
pub async fn run(config_path: &str) -> Result<()> {
    let config = if Path::new(config_path).exists() {
        Config::from_file(config_path)?
    } else {
        warn!(
            "Config file {} not found, falling back to defaults",
            config_path
        );
        Config::get_default_configuration()
    };

    if !config.general.enabled {
        info!("leasewall is disabled in {}, exiting", config_path);
        return Ok(());
    }

    let backend = Arc::new(
        IptablesBackend::new(&config.iptables)
            .context("Failed to initialize iptables backend")?,
    );

    let engine = Engine::start(backend, &config.engine)
        .context("Failed to start rule engine")?;

    // The CommandSender handle is where an embedding layer (REST front end,
    // control socket) would push commands; the daemon itself only services
    // expiry-generated deletions.
    engine.join().await;
    Ok(())
}
