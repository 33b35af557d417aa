//! Configuration management for the kitchen ledger
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (config/development.toml, config/production.toml)
//! 3. Environment variable overrides with KITCHEN_ prefix

use config::{ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Which store backs the ledger
    pub storage: StorageConfig,

    /// Ledger thresholds and tolerances
    pub ledger: LedgerConfig,

    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL, required for the postgres backend
    pub url: Option<String>,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,

    /// Seconds to wait for a pooled connection
    pub acquire_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Postgres,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LedgerConfig {
    /// Acceptable usage variance in percent
    pub variance_threshold_percent: Decimal,

    /// Target food cost in percent of revenue
    pub target_food_cost_percent: Decimal,

    /// How far past the ordered quantity a receipt may go, in percent
    pub over_receipt_tolerance_percent: Decimal,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Emit JSON log lines instead of the human-readable format
    pub json: bool,
}

/// Thresholds the services apply
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LedgerPolicy {
    pub variance_threshold_percent: Decimal,
    pub target_food_cost_percent: Decimal,
    pub over_receipt_tolerance_percent: Decimal,
}

impl Default for LedgerPolicy {
    fn default() -> Self {
        Self {
            variance_threshold_percent: shared::DEFAULT_VARIANCE_THRESHOLD,
            target_food_cost_percent: shared::DEFAULT_TARGET_FOOD_COST,
            over_receipt_tolerance_percent: Decimal::from(10),
        }
    }
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment =
            std::env::var("KITCHEN_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("database.acquire_timeout_secs", 30)?
            .set_default("storage.backend", "memory")?
            .set_default("ledger.variance_threshold_percent", "5.0")?
            .set_default("ledger.target_food_cost_percent", "30.0")?
            .set_default("ledger.over_receipt_tolerance_percent", "10.0")?
            .set_default("logging.json", false)?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (KITCHEN_ prefix)
            .add_source(
                Environment::with_prefix("KITCHEN")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    pub fn ledger_policy(&self) -> LedgerPolicy {
        LedgerPolicy {
            variance_threshold_percent: self.ledger.variance_threshold_percent,
            target_food_cost_percent: self.ledger.target_food_cost_percent,
            over_receipt_tolerance_percent: self.ledger.over_receipt_tolerance_percent,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            host: "0.0.0.0".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let policy = LedgerPolicy::default();
        Self {
            environment: "development".to_string(),
            server: ServerConfig::default(),
            database: DatabaseConfig {
                url: None,
                max_connections: 10,
                min_connections: 2,
                acquire_timeout_secs: 30,
            },
            storage: StorageConfig {
                backend: StorageBackend::Memory,
            },
            ledger: LedgerConfig {
                variance_threshold_percent: policy.variance_threshold_percent,
                target_food_cost_percent: policy.target_food_cost_percent,
                over_receipt_tolerance_percent: policy.over_receipt_tolerance_percent,
            },
            logging: LoggingConfig { json: false },
        }
    }
}
