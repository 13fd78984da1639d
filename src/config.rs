//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Every field defaults to the agent's stock behaviour, so sections may be
//! omitted. Secrets (broker keys) are referenced by env-var name in the
//! config and resolved at runtime via `std::env::var`.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;

use crate::engine::retry::BackoffKind;
use crate::indicators::ema::EmaSeed;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub agent: AgentConfig,
    pub broker: BrokerConfig,
    pub screener: ScreenerConfig,
    pub retry: RetryConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AgentConfig {
    pub name: String,
    /// Seconds between clock polls.
    pub poll_interval_secs: u64,
    /// Buy once this many seconds (or fewer) remain before the close.
    pub buy_window_secs: i64,
    /// Log planned orders instead of submitting them.
    pub dry_run: bool,
    /// Emit "waiting to buy" every N ticks while the market is open.
    pub waiting_log_every_ticks: u64,
    /// Emit "waiting for market open" every N ticks while closed.
    pub closed_log_every_ticks: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: "DIPPER-001".to_string(),
            poll_interval_secs: 5,
            buy_window_secs: 120,
            dry_run: false,
            waiting_log_every_ticks: 400,
            closed_log_every_ticks: 1200,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BrokerConfig {
    pub trading_url: String,
    pub data_url: String,
    /// Market-data feed: "iex" (free) or "sip".
    pub data_feed: String,
    pub key_id_env: String,
    pub secret_key_env: String,
    pub request_timeout_secs: u64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            trading_url: "https://paper-api.alpaca.markets".to_string(),
            data_url: "https://data.alpaca.markets".to_string(),
            data_feed: "iex".to_string(),
            key_id_env: "APCA_API_KEY_ID".to_string(),
            secret_key_env: "APCA_API_SECRET_KEY".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Screening thresholds and indicator windows.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ScreenerConfig {
    pub max_stock_price: f64,
    pub min_stock_price: f64,
    /// Symbols per bar request.
    pub max_batch_size: usize,
    /// Daily bars required per symbol.
    pub time_window: usize,
    /// Latest day-over-day change must be at or below this.
    pub day_change_threshold: f64,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub top_n: usize,
    /// `simple_average` seeds at bar `span - 1`; `first_value` reproduces
    /// pandas/`ta` MACD output exactly.
    pub ema_seed: EmaSeed,
    /// Bar batches in flight at once. Results are consumed in batch order.
    pub fetch_concurrency: usize,
}

impl Default for ScreenerConfig {
    fn default() -> Self {
        Self {
            max_stock_price: 4.00,
            min_stock_price: 0.0,
            max_batch_size: 200,
            time_window: 30,
            day_change_threshold: -0.025,
            macd_fast: 12,
            macd_slow: 26,
            top_n: 5,
            // Set `first_value` to match ratings from the `ta`-based screener.
            ema_seed: EmaSeed::SimpleAverage,
            fetch_concurrency: 1,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetryConfig {
    pub policy: BackoffKind,
    pub base_delay_secs: u64,
    pub max_delay_secs: u64,
    /// Total attempts per operation; 0 retries until success.
    pub max_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            policy: BackoffKind::Fixed,
            base_delay_secs: 30,
            max_delay_secs: 300,
            max_attempts: 0,
        }
    }
}

/// Configuration values that parse but cannot run.
#[derive(Debug, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("screener.max_batch_size must be at least 1")]
    ZeroBatchSize,

    #[error("screener.top_n must be at least 1")]
    ZeroTopN,

    #[error("screener.fetch_concurrency must be at least 1")]
    ZeroConcurrency,

    #[error("screener.macd_fast ({fast}) must be below screener.macd_slow ({slow})")]
    MacdWindows { fast: usize, slow: usize },

    #[error("screener.time_window ({window}) must be at least {required} bars")]
    WindowTooShort { window: usize, required: usize },

    #[error("screener.min_stock_price ({min}) exceeds screener.max_stock_price ({max})")]
    PriceRange { min: f64, max: f64 },

    #[error("agent.poll_interval_secs must be at least 1")]
    ZeroPollInterval,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        config
            .validate()
            .with_context(|| format!("Invalid config file: {path}"))?;
        Ok(config)
    }

    /// Check cross-field constraints serde cannot express.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        let s = &self.screener;
        if s.max_batch_size == 0 {
            return Err(ConfigError::ZeroBatchSize);
        }
        if s.top_n == 0 {
            return Err(ConfigError::ZeroTopN);
        }
        if s.fetch_concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        if s.macd_fast == 0 || s.macd_fast >= s.macd_slow {
            return Err(ConfigError::MacdWindows {
                fast: s.macd_fast,
                slow: s.macd_slow,
            });
        }
        let required = crate::screener::scorer::required_bars(s.macd_slow);
        if s.time_window < required {
            return Err(ConfigError::WindowTooShort {
                window: s.time_window,
                required,
            });
        }
        if s.min_stock_price > s.max_stock_price {
            return Err(ConfigError::PriceRange {
                min: s.min_stock_price,
                max: s.max_stock_price,
            });
        }
        if self.agent.poll_interval_secs == 0 {
            return Err(ConfigError::ZeroPollInterval);
        }
        Ok(())
    }

    /// Resolve an environment variable name to its value.
    /// Useful for loading secrets referenced in the config.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }
}
