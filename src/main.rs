use anyhow::Result;
use log::info;
use std::env;

const DEFAULT_CONFIG_PATH: &str = "/etc/leasewall/config.toml";

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let config_path =
        env::var("LEASEWALL_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    info!("leasewall starting (config: {})", config_path);

    leasewall::run(&config_path).await
}
