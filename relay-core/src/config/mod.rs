pub mod types;

pub use types::*;

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use std::path::Path;

/// Environment variable overriding `logging.level`
pub const LOG_LEVEL_ENV: &str = "RELAY_LOG_LEVEL";

impl Config {
    /// Load configuration from a JSON file with environment overrides
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config_path = path.as_ref();

        let raw = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read configuration {:?}", config_path))?;
        let mut cfg = Self::from_json(&raw)?;

        if let Ok(level) = std::env::var(LOG_LEVEL_ENV) {
            cfg.logging.level = level;
        }

        // Validate configuration
        cfg.validate()?;

        Ok(cfg)
    }

    /// Parse configuration from a JSON string without validating it
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).context("Failed to deserialize configuration")
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.engine.thread_name.trim().is_empty() {
            anyhow::bail!("engine.thread_name must not be empty");
        }

        // Identity parts are joined with '.' into global order ids
        for (field, value) in [
            ("orders.gateway", &self.orders.gateway),
            ("orders.account", &self.orders.account),
        ] {
            if value.is_empty() {
                anyhow::bail!("{} must not be empty", field);
            }
            if value.contains('.') {
                anyhow::bail!("{} '{}' must not contain '.'", field, value);
            }
        }

        if self.journal.enabled && self.journal.buffer_size == 0 {
            anyhow::bail!("journal.buffer_size must be positive when the journal is enabled");
        }

        match &self.gateway.commission {
            CommissionConfig::Zero => {}
            CommissionConfig::PerShare { rate } => {
                if *rate < Decimal::ZERO {
                    anyhow::bail!("per-share commission rate must not be negative");
                }
            }
            CommissionConfig::Percent { rate, minimum } => {
                if *rate < Decimal::ZERO || *rate >= Decimal::ONE {
                    anyhow::bail!("percent commission rate must be in [0, 1)");
                }
                if *minimum < Decimal::ZERO {
                    anyhow::bail!("commission minimum must not be negative");
                }
            }
        }

        match &self.gateway.slippage {
            SlippageConfig::Zero => {}
            SlippageConfig::Fixed { amount } => {
                if *amount < Decimal::ZERO {
                    anyhow::bail!("fixed slippage must not be negative");
                }
            }
            SlippageConfig::Percent { rate } => {
                if *rate < Decimal::ZERO || *rate >= Decimal::ONE {
                    anyhow::bail!("percent slippage must be in [0, 1)");
                }
            }
        }

        // Validate log level
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.logging.level.as_str()) {
            anyhow::bail!(
                "Invalid log level '{}', must be one of: {:?}",
                self.logging.level,
                valid_log_levels
            );
        }

        Ok(())
    }
}
