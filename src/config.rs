//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! The predictor API key is referenced by env-var name in the config and
//! resolved at runtime via `std::env::var`.

use anyhow::{ensure, Context, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::fs;

use crate::types::{BetMode, BufferPolicy};

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub session: SessionConfig,
    pub predictor: PredictorConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
}

/// Staking and buffering parameters, fixed for the lifetime of a session.
#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    pub initial_bankroll: Decimal,
    pub base_stake: Decimal,
    #[serde(default = "default_true")]
    pub progression_enabled: bool,
    #[serde(default)]
    pub bet_mode: BetMode,
    #[serde(default)]
    pub buffer_policy: BufferPolicy,
    #[serde(default = "default_trigger_threshold")]
    pub trigger_threshold: usize,
    #[serde(default = "default_history_cap")]
    pub history_cap: usize,
    #[serde(default = "default_ledger_cap")]
    pub ledger_cap: usize,
    #[serde(default = "default_tables")]
    pub tables: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PredictorConfig {
    /// "openrouter" | "local"
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    /// Second model tried by the remote client when the first one fails.
    #[serde(default)]
    pub fallback_model: Option<String>,
    pub api_key_env: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Upper bound on one gateway call; expiry collapses into the fallback.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DashboardConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 8080,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_trigger_threshold() -> usize {
    3
}

fn default_history_cap() -> usize {
    30
}

fn default_ledger_cap() -> usize {
    50
}

fn default_tables() -> Vec<String> {
    vec!["iconic21".to_string(), "evolution".to_string()]
}

fn default_max_tokens() -> u32 {
    256
}

fn default_timeout_secs() -> u64 {
    20
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            initial_bankroll: dec!(1000),
            base_stake: dec!(10),
            progression_enabled: true,
            bet_mode: BetMode::Number,
            buffer_policy: BufferPolicy::FixedThreshold,
            trigger_threshold: default_trigger_threshold(),
            history_cap: default_history_cap(),
            ledger_cap: default_ledger_cap(),
            tables: default_tables(),
        }
    }
}

impl SessionConfig {
    /// Reject parameter combinations the session engine cannot honour.
    pub fn validate(&self) -> Result<()> {
        ensure!(self.trigger_threshold >= 1, "trigger_threshold must be at least 1");
        ensure!(
            self.history_cap >= self.trigger_threshold,
            "history_cap ({}) must be >= trigger_threshold ({})",
            self.history_cap,
            self.trigger_threshold
        );
        ensure!(self.ledger_cap >= 1, "ledger_cap must be at least 1");
        ensure!(
            self.base_stake > Decimal::ZERO,
            "base_stake must be positive, got {}",
            self.base_stake
        );
        ensure!(!self.tables.is_empty(), "at least one table must be configured");
        Ok(())
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::from_toml(&contents).with_context(|| format!("Invalid config file: {path}"))
    }

    /// Parse and validate configuration from a TOML string.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: AppConfig =
            toml::from_str(contents).context("Failed to parse config TOML")?;
        config.session.validate()?;
        Ok(config)
    }

    /// Resolve an environment variable name to its value.
    /// Useful for loading secrets referenced in the config.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [session]
        initial_bankroll = 1000.0
        base_stake = 10.0
        buffer_policy = "rolling_window"
        bet_mode = "color"

        [predictor]
        provider = "openrouter"
        model = "google/gemini-2.5-flash"
        api_key_env = "OPENROUTER_API_KEY"
    "#;

    #[test]
    fn test_parse_sample() {
        let cfg = AppConfig::from_toml(SAMPLE).unwrap();
        assert_eq!(cfg.session.initial_bankroll, dec!(1000));
        assert_eq!(cfg.session.base_stake, dec!(10));
        assert_eq!(cfg.session.buffer_policy, BufferPolicy::RollingWindow);
        assert_eq!(cfg.session.bet_mode, BetMode::Color);
        assert!(cfg.session.progression_enabled);
        assert_eq!(cfg.session.trigger_threshold, 3);
        assert_eq!(cfg.session.history_cap, 30);
        assert_eq!(cfg.session.ledger_cap, 50);
        assert_eq!(cfg.session.tables, vec!["iconic21", "evolution"]);
        assert_eq!(cfg.predictor.timeout_secs, 20);
        assert!(!cfg.dashboard.enabled);
    }

    #[test]
    fn test_rejects_zero_base_stake() {
        let toml = SAMPLE.replace("base_stake = 10.0", "base_stake = 0.0");
        assert!(AppConfig::from_toml(&toml).is_err());
    }

    #[test]
    fn test_rejects_history_cap_below_threshold() {
        let mut cfg = SessionConfig::default();
        cfg.history_cap = 2;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_default_session_config_is_valid() {
        assert!(SessionConfig::default().validate().is_ok());
    }

    #[test]
    fn test_load_config() {
        // This test requires config.toml to be in the working directory.
        let result = AppConfig::load("config.toml");
        if let Ok(cfg) = result {
            assert!(cfg.session.initial_bankroll > Decimal::ZERO);
            assert!(cfg.session.base_stake > Decimal::ZERO);
            assert!(!cfg.predictor.api_key_env.is_empty());
        }
    }

    #[test]
    fn test_resolve_env_missing() {
        assert!(AppConfig::resolve_env("ROULETTE_TRACKER_SURELY_UNSET_VAR").is_err());
    }
}
