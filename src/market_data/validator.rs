use anyhow::{bail, Result};
use rust_decimal::Decimal;

use crate::models::Candle;

/// Validates OHLCV candle data for sanity before it reaches the simulator
pub struct CandleValidator;

impl CandleValidator {
    pub fn new() -> Self {
        Self
    }

    /// Validate a candle for correctness
    pub fn validate(&self, candle: &Candle) -> Result<()> {
        self.validate_prices(candle)?;
        self.validate_ohlc_relationship(candle)?;
        Ok(())
    }

    /// Validate every candle and that timestamps strictly increase
    pub fn validate_series(&self, candles: &[Candle]) -> Result<()> {
        for candle in candles {
            self.validate(candle)?;
        }

        for pair in candles.windows(2) {
            if pair[1].timestamp <= pair[0].timestamp {
                bail!(
                    "Candles are not in chronological order: {} followed by {}",
                    pair[0].timestamp,
                    pair[1].timestamp
                );
            }
        }

        Ok(())
    }

    /// Validate that all prices are positive
    fn validate_prices(&self, candle: &Candle) -> Result<()> {
        if candle.open <= Decimal::ZERO {
            bail!("Invalid open price: {}", candle.open);
        }
        if candle.high <= Decimal::ZERO {
            bail!("Invalid high price: {}", candle.high);
        }
        if candle.low <= Decimal::ZERO {
            bail!("Invalid low price: {}", candle.low);
        }
        if candle.close <= Decimal::ZERO {
            bail!("Invalid close price: {}", candle.close);
        }
        // Volume can be 0 on illiquid bars
        if candle.volume < Decimal::ZERO {
            bail!("Invalid volume: {}", candle.volume);
        }
        Ok(())
    }

    /// Validate OHLC relationships (high >= low, etc.)
    fn validate_ohlc_relationship(&self, candle: &Candle) -> Result<()> {
        if candle.high < candle.low {
            bail!("High ({}) is less than low ({})", candle.high, candle.low);
        }
        if candle.high < candle.open.max(candle.close) {
            bail!(
                "High ({}) is less than open/close ({}/{})",
                candle.high,
                candle.open,
                candle.close
            );
        }
        if candle.low > candle.open.min(candle.close) {
            bail!(
                "Low ({}) is greater than open/close ({}/{})",
                candle.low,
                candle.open,
                candle.close
            );
        }
        Ok(())
    }
}

impl Default for CandleValidator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn make_valid_candle() -> Candle {
        Candle {
            timestamp: 1_704_067_200_000,
            open: dec!(100),
            high: dec!(102),
            low: dec!(99),
            close: dec!(101),
            volume: dec!(1000000),
        }
    }

    #[test]
    fn test_validate_valid_candle() {
        let validator = CandleValidator::new();
        assert!(validator.validate(&make_valid_candle()).is_ok());
    }

    #[test]
    fn test_validate_negative_close() {
        let validator = CandleValidator::new();
        let mut candle = make_valid_candle();
        candle.close = dec!(-101);

        let result = validator.validate(&candle);
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Invalid close price"));
    }

    #[test]
    fn test_validate_zero_volume_allowed() {
        let validator = CandleValidator::new();
        let mut candle = make_valid_candle();
        candle.volume = Decimal::ZERO;

        assert!(validator.validate(&candle).is_ok());
    }

    #[test]
    fn test_validate_negative_volume() {
        let validator = CandleValidator::new();
        let mut candle = make_valid_candle();
        candle.volume = dec!(-1000);

        let result = validator.validate(&candle);
        assert!(result.unwrap_err().to_string().contains("Invalid volume"));
    }

    #[test]
    fn test_validate_high_less_than_low() {
        let validator = CandleValidator::new();
        let mut candle = make_valid_candle();
        candle.high = dec!(98);

        let err_msg = validator.validate(&candle).unwrap_err().to_string();
        assert!(err_msg.contains("High") && err_msg.contains("less than low"));
    }

    #[test]
    fn test_validate_low_greater_than_close() {
        let validator = CandleValidator::new();
        let mut candle = make_valid_candle();
        candle.close = dec!(99.5);
        candle.low = dec!(99.8);

        let err_msg = validator.validate(&candle).unwrap_err().to_string();
        assert!(err_msg.contains("Low") && err_msg.contains("greater than open/close"));
    }

    #[test]
    fn test_validate_all_prices_equal() {
        // No trading activity, still a valid bar
        let validator = CandleValidator::new();
        let mut candle = make_valid_candle();
        candle.open = dec!(100);
        candle.high = dec!(100);
        candle.low = dec!(100);
        candle.close = dec!(100);

        assert!(validator.validate(&candle).is_ok());
    }

    #[test]
    fn test_validate_series_order() {
        let validator = CandleValidator::new();
        let first = make_valid_candle();
        let mut second = make_valid_candle();
        second.timestamp += 900_000;

        assert!(validator
            .validate_series(&[first.clone(), second.clone()])
            .is_ok());

        let err = validator.validate_series(&[second, first]).unwrap_err();
        assert!(err.to_string().contains("chronological"));
    }
}
