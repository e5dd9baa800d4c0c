use std::path::Path;

use anyhow::Context;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::SimulationError;

const ENV_PREFIX: &str = "SHORTGRID";

/// Parameters of one short-grid simulation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Bollinger window length
    pub period: usize,
    /// Band width in standard deviations
    pub k: Decimal,
    /// Total capital in USDT, split evenly across the four levels
    pub capital: Decimal,
    pub leverage: Decimal,
    /// Fee charged on notional for every open and close
    pub fee_rate: Decimal,
    /// Number of most recent candles replayed through the engine
    pub window: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            period: 20,
            k: dec!(2),
            capital: dec!(1000),
            leverage: dec!(10),
            fee_rate: dec!(0.0005), // OKX swap taker
            window: 96,             // 24 hours of 15m candles
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> crate::Result<()> {
        if self.capital <= Decimal::ZERO {
            return Err(invalid("capital", format!("must be positive, got {}", self.capital)));
        }
        if self.leverage <= Decimal::ZERO {
            return Err(invalid("leverage", format!("must be positive, got {}", self.leverage)));
        }
        if self.fee_rate < Decimal::ZERO {
            return Err(invalid("fee_rate", format!("must not be negative, got {}", self.fee_rate)));
        }
        if self.k < Decimal::ZERO {
            return Err(invalid("k", format!("must not be negative, got {}", self.k)));
        }
        if self.window == 0 {
            return Err(invalid("window", "must be at least 1".to_string()));
        }
        Ok(())
    }
}

fn invalid(name: &'static str, reason: String) -> SimulationError {
    SimulationError::InvalidParameter { name, reason }
}

/// Where and what to fetch from OKX
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    pub base_url: String,
    pub inst_id: String,
    /// Candle granularity, e.g. `15m`, `1H`
    pub bar: String,
    /// Candles requested per call (OKX caps this at 300)
    pub limit: u32,
    /// Optional HTTP(S) proxy, e.g. `http://127.0.0.1:7890`
    pub proxy: Option<String>,
    pub timeout_secs: u64,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.okx.com".to_string(),
            inst_id: "BTC-USDT-SWAP".to_string(),
            bar: "15m".to_string(),
            limit: 100,
            proxy: None,
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub simulation: SimulationConfig,
    pub market: MarketConfig,
}

impl AppConfig {
    /// Load configuration from an optional TOML file, then `SHORTGRID__*` env vars
    ///
    /// e.g. `SHORTGRID__SIMULATION__LEVERAGE=5`, `SHORTGRID__MARKET__PROXY=http://127.0.0.1:7890`
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let settings = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()
            .context("Failed to build configuration")?;

        let config: AppConfig = settings
            .try_deserialize()
            .context("Failed to parse configuration")?;

        tracing::debug!("Loaded configuration: {:?}", config);
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SimulationConfig::default();
        assert_eq!(config.period, 20);
        assert_eq!(config.k, dec!(2));
        assert_eq!(config.window, 96);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_non_positive_capital() {
        let config = SimulationConfig {
            capital: Decimal::ZERO,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            SimulationError::InvalidParameter { name: "capital", .. }
        ));
    }

    #[test]
    fn test_rejects_negative_fee_and_zero_window() {
        let negative_fee = SimulationConfig {
            fee_rate: dec!(-0.001),
            ..Default::default()
        };
        assert!(negative_fee.validate().is_err());

        let zero_window = SimulationConfig {
            window: 0,
            ..Default::default()
        };
        assert!(zero_window.validate().is_err());
    }

    #[test]
    fn test_zero_fee_is_valid() {
        let config = SimulationConfig {
            fee_rate: Decimal::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_toml_file() {
        let path = std::env::temp_dir().join("shortgrid_config_test.toml");
        std::fs::write(
            &path,
            "[simulation]\nleverage = 5\nwindow = 48\n\n[market]\ninst_id = \"ETH-USDT-SWAP\"\n",
        )
        .unwrap();

        let config = AppConfig::load(Some(&path)).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.simulation.leverage, dec!(5));
        assert_eq!(config.simulation.window, 48);
        assert_eq!(config.simulation.period, 20);
        assert_eq!(config.market.inst_id, "ETH-USDT-SWAP");
        assert_eq!(config.market.bar, "15m");
    }
}
