use rust_decimal::Decimal;

use crate::backtest::engine::GridEngine;
use crate::backtest::settlement::{SettlementCalculator, SimulationResult};
use crate::config::SimulationConfig;
use crate::error::SimulationError;
use crate::grid::GridLevels;
use crate::indicators::calculate_bollinger_bands;
use crate::models::{Band, Candle};
use crate::Result;

/// Runs the full pipeline: bands → grid → engine → settlement
pub struct GridBacktest {
    config: SimulationConfig,
}

impl GridBacktest {
    pub fn new(config: SimulationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Bollinger bands for every candle of the series
    pub fn bands(&self, candles: &[Candle]) -> Result<Vec<Option<Band>>> {
        let closes: Vec<Decimal> = candles.iter().map(|c| c.close).collect();
        calculate_bollinger_bands(&closes, self.config.period, self.config.k)
    }

    /// Simulate the short grid over a chronological candle series
    ///
    /// # Arguments
    /// * `candles` - Oldest first; the grid comes from the band at the last candle
    /// * `reference_price` - Terminal price for settlement; defaults to the last close
    pub fn run(&self, candles: &[Candle], reference_price: Option<Decimal>) -> Result<SimulationResult> {
        self.config.validate()?;

        if candles.len() < 2 {
            return Err(SimulationError::DegenerateInput(format!(
                "need at least 2 candles, got {}",
                candles.len()
            )));
        }
        let last = &candles[candles.len() - 1];

        let bands = self.bands(candles)?;
        let levels = GridLevels::from_bands(&bands, self.config.period)?;

        let window_start = candles.len().saturating_sub(self.config.window);
        let window = &candles[window_start..];
        let reference_price = reference_price.unwrap_or(last.close);

        tracing::info!(
            "Starting grid simulation: {} candles ({} simulated), levels {:?}, reference {:.2}",
            candles.len(),
            window.len(),
            levels.as_slice(),
            reference_price
        );

        let mut engine = GridEngine::new(&self.config, levels);
        engine.run(window);

        let settlement = SettlementCalculator::new(&self.config);
        let result = settlement.settle(engine.into_book(), reference_price, last.timestamp);

        tracing::info!(
            "Simulation complete: {} opens, {} closes, {} stop-outs, P&L: {:.2} USDT ({:.2}%)",
            result.open_count,
            result.close_count,
            result.stop_out_count,
            result.final_pnl,
            result.profit_rate_pct()
        );

        Ok(result)
    }
}
