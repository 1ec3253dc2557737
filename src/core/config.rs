use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Configuration for the leasewall daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// General configuration
    pub general: GeneralConfig,

    /// Rule engine configuration
    #[serde(default)]
    pub engine: EngineConfig,

    /// IPTables backend configuration
    #[serde(default)]
    pub iptables: IptablesConfig,
}

/// General configuration options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Whether the daemon is enabled
    pub enabled: bool,

    /// The log level
    pub log_level: String,
}

/// Rule engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Lease applied to inserts that carry none, in seconds as a
    /// non-negative integer string. "0" means permanent.
    #[serde(default = "default_lease")]
    pub default_lease: String,

    /// Expiry manager poll interval in seconds; bounds how far past its
    /// nominal expiry a leased rule may live
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

/// IPTables backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IptablesConfig {
    /// The iptables table to operate on
    #[serde(default = "default_table")]
    pub table: String,

    /// Whether to use ip6tables
    #[serde(default)]
    pub use_ipv6: bool,

    /// Built-in chains mirrored at startup
    #[serde(default = "default_chains")]
    pub chains: Vec<String>,
}

fn default_lease() -> String {
    "0".to_string()
}

fn default_poll_interval() -> u64 {
    1
}

fn default_table() -> String {
    "filter".to_string()
}

fn default_chains() -> Vec<String> {
    vec![
        "INPUT".to_string(),
        "OUTPUT".to_string(),
        "FORWARD".to_string(),
    ]
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_lease: default_lease(),
            poll_interval_secs: default_poll_interval(),
        }
    }
}

impl Default for IptablesConfig {
    fn default() -> Self {
        Self {
            table: default_table(),
            use_ipv6: false,
            chains: default_chains(),
        }
    }
}

impl Config {
    /// Load the configuration from a file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut file = File::open(path)
            .with_context(|| format!("Failed to open config file: {}", path.display()))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config = match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => config::Config::builder()
                .add_source(config::File::from_str(&contents, config::FileFormat::Toml))
                .build()?,
            Some("json") => config::Config::builder()
                .add_source(config::File::from_str(&contents, config::FileFormat::Json))
                .build()?,
            _ => return Err(anyhow::anyhow!("Unsupported config file format")),
        };

        let config: Self = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration
    pub fn get_default_configuration() -> Self {
        Self {
            general: GeneralConfig {
                enabled: true,
                log_level: "info".to_string(),
            },
            engine: EngineConfig::default(),
            iptables: IptablesConfig::default(),
        }
    }

    fn validate(&self) -> Result<()> {
        self.engine.default_lease.parse::<u64>().map_err(|_| {
            anyhow::anyhow!(
                "engine.default_lease must be a non-negative integer string, got {:?}",
                self.engine.default_lease
            )
        })?;

        if self.engine.poll_interval_secs == 0 {
            return Err(anyhow::anyhow!("engine.poll_interval_secs must be >= 1"));
        }

        Ok(())
    }
}
