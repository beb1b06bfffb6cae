use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub orders: OrdersConfig,
    #[serde(default)]
    pub journal: JournalConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
}

/// Dispatch engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Name given to the consumer thread
    #[serde(default = "default_thread_name")]
    pub thread_name: String,

    /// Sleep after the backoff is exhausted on an empty queue (microseconds)
    #[serde(default = "default_idle_sleep_us")]
    pub idle_sleep_us: u64,
}

impl EngineConfig {
    pub fn idle_sleep(&self) -> Duration {
        Duration::from_micros(self.idle_sleep_us)
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub json: bool,
}

/// Identity stamped on orders created by the default adapter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrdersConfig {
    #[serde(default = "default_gateway")]
    pub gateway: String,

    #[serde(default = "default_account")]
    pub account: String,
}

/// Order journal configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalConfig {
    /// Mirror every persisted record onto a JSON-lines journal
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_journal_path")]
    pub path: PathBuf,

    /// Capacity of the writer channel; records beyond it are dropped
    #[serde(default = "default_journal_buffer")]
    pub buffer_size: usize,
}

/// Simulated gateway configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub mode: GatewayMode,

    #[serde(default)]
    pub commission: CommissionConfig,

    #[serde(default)]
    pub slippage: SlippageConfig,
}

/// How the simulated gateway answers orders
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayMode {
    /// Fill every order in full as soon as it arrives
    #[default]
    Immediate,
    /// Acknowledge orders and wait for explicit fills or cancels
    Resting,
}

/// Commission model selection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum CommissionConfig {
    #[default]
    Zero,
    /// Fixed amount per share
    PerShare { rate: Decimal },
    /// Fraction of notional with a floor per fill
    Percent {
        rate: Decimal,
        #[serde(default)]
        minimum: Decimal,
    },
}

/// Slippage model selection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum SlippageConfig {
    #[default]
    Zero,
    /// Fixed price offset against the order side
    Fixed { amount: Decimal },
    /// Fractional price offset against the order side
    Percent { rate: Decimal },
}

// Default value functions
fn default_thread_name() -> String {
    "relay-dispatch".to_string()
}

fn default_idle_sleep_us() -> u64 {
    100
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_gateway() -> String {
    "sim".to_string()
}

fn default_account() -> String {
    "default".to_string()
}

fn default_journal_path() -> PathBuf {
    PathBuf::from("./data/orders.jsonl")
}

fn default_journal_buffer() -> usize {
    4096
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            thread_name: default_thread_name(),
            idle_sleep_us: default_idle_sleep_us(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for OrdersConfig {
    fn default() -> Self {
        Self {
            gateway: default_gateway(),
            account: default_account(),
        }
    }
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: default_journal_path(),
            buffer_size: default_journal_buffer(),
        }
    }
}
