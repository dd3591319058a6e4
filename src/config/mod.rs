//! Configuration management for SushiDash
//!
//! Loads from config files + environment variables via .env

mod types;

pub use types::*;

use anyhow::{bail, Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub refresh: RefreshConfig,
    pub subgraph: SubgraphConfig,
    pub export: ExportConfig,
    pub dashboard: DashboardConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RefreshConfig {
    /// Interval between refresh batches in milliseconds
    pub interval_ms: u64,
    /// Issue a batch immediately instead of waiting one interval
    pub fire_immediately: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubgraphConfig {
    /// Exchange subgraph (day data, tokens, pairs, ETH bundle)
    pub exchange_url: String,
    /// MasterChef subgraph (reward pools)
    pub masterchef_url: String,
    /// Ethereum blocks subgraph (block number at timestamp)
    pub blocks_url: String,
    /// `first:` argument for list queries
    pub page_size: u32,
    /// Request timeout in milliseconds
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExportConfig {
    /// Directory `sushi_pools.json` is written to
    pub dir: String,
    /// Accept tokens sharing a symbol (last one wins) instead of failing
    pub allow_duplicate_symbols: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DashboardConfig {
    pub enabled: bool,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when RUST_LOG is unset
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl AppConfig {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self> {
        // Load .env file first
        dotenvy::dotenv().ok();

        let config = Self::builder()?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // Override with environment variables (SUSHIDASH_*)
            .add_source(Environment::with_prefix("SUSHIDASH").separator("__"))
            .build()
            .context("Failed to build configuration")?;

        let app_config: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        app_config.validate()?;
        Ok(app_config)
    }

    fn builder() -> Result<config::ConfigBuilder<config::builder::DefaultState>> {
        let builder = Config::builder()
            // Refresh defaults
            .set_default("refresh.interval_ms", DEFAULT_REFRESH_INTERVAL_MS)?
            .set_default("refresh.fire_immediately", false)?
            // Subgraph defaults
            .set_default("subgraph.exchange_url", DEFAULT_EXCHANGE_SUBGRAPH)?
            .set_default("subgraph.masterchef_url", DEFAULT_MASTERCHEF_SUBGRAPH)?
            .set_default("subgraph.blocks_url", DEFAULT_BLOCKS_SUBGRAPH)?
            .set_default("subgraph.page_size", 1000)?
            .set_default("subgraph.timeout_ms", 30_000)?
            // Export defaults
            .set_default("export.dir", "./data")?
            .set_default("export.allow_duplicate_symbols", true)?
            // Dashboard defaults
            .set_default("dashboard.enabled", true)?
            .set_default("dashboard.port", 3001)?
            // Logging defaults
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?;
        Ok(builder)
    }

    /// Reject settings the service cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.refresh.interval_ms == 0 {
            bail!("refresh.interval_ms must be greater than zero");
        }
        if self.subgraph.page_size == 0 || self.subgraph.page_size > 1000 {
            bail!(
                "subgraph.page_size must be between 1 and 1000 (got {})",
                self.subgraph.page_size
            );
        }
        for (name, url) in [
            ("subgraph.exchange_url", &self.subgraph.exchange_url),
            ("subgraph.masterchef_url", &self.subgraph.masterchef_url),
            ("subgraph.blocks_url", &self.subgraph.blocks_url),
        ] {
            if url.trim().is_empty() {
                bail!("{} must not be empty", name);
            }
        }
        Ok(())
    }

    /// Generate a one-line digest of the config for logging
    pub fn digest(&self) -> String {
        format!(
            "interval_ms={} fire_immediately={} page_size={} export_dir={} strict_symbols={} dashboard={}:{}",
            self.refresh.interval_ms,
            self.refresh.fire_immediately,
            self.subgraph.page_size,
            self.export.dir,
            !self.export.allow_duplicate_symbols,
            self.dashboard.enabled,
            self.dashboard.port
        )
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            refresh: RefreshConfig {
                interval_ms: DEFAULT_REFRESH_INTERVAL_MS,
                fire_immediately: false,
            },
            subgraph: SubgraphConfig {
                exchange_url: DEFAULT_EXCHANGE_SUBGRAPH.to_string(),
                masterchef_url: DEFAULT_MASTERCHEF_SUBGRAPH.to_string(),
                blocks_url: DEFAULT_BLOCKS_SUBGRAPH.to_string(),
                page_size: 1000,
                timeout_ms: 30_000,
            },
            export: ExportConfig {
                dir: "./data".to_string(),
                allow_duplicate_symbols: true,
            },
            dashboard: DashboardConfig {
                enabled: true,
                port: 3001,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                json: false,
            },
        }
    }
}

impl std::fmt::Display for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.digest())
    }
}
