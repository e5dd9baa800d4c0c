use std::fmt;
use std::str::FromStr;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;

use crate::models::Candle;

/// First candle of every synthetic series (2024-01-01T00:00:00Z)
pub const SYNTHETIC_START_MS: i64 = 1_704_067_200_000;

/// Market scenario types for synthetic data generation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketScenario {
    /// Mean-reverting chop around the base price
    Sideways,
    /// Steady uptrend with noise (+2% daily average)
    Uptrend,
    /// Steady downtrend with noise (-2% daily average)
    Downtrend,
    /// Large swings (±2% per candle)
    Volatile,
    /// Quiet range followed by a sharp sell-off through the grid
    Crash,
}

impl MarketScenario {
    pub const ALL: [MarketScenario; 5] = [
        MarketScenario::Sideways,
        MarketScenario::Uptrend,
        MarketScenario::Downtrend,
        MarketScenario::Volatile,
        MarketScenario::Crash,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Sideways => "sideways",
            Self::Uptrend => "uptrend",
            Self::Downtrend => "downtrend",
            Self::Volatile => "volatile",
            Self::Crash => "crash",
        }
    }
}

impl fmt::Display for MarketScenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MarketScenario {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|scenario| scenario.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Unknown scenario: {}", s))
    }
}

/// Generates reproducible candle series for offline simulation
pub struct SyntheticDataGenerator {
    rng: StdRng,
    base_price: f64,
    base_volume: f64,
}

impl SyntheticDataGenerator {
    /// Create a new generator with a seed for reproducibility
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            base_price: 65_000.0,
            base_volume: 1_200.0,
        }
    }

    /// Generate `num_candles` chronological candles `interval_minutes` apart
    pub fn generate(
        &mut self,
        scenario: MarketScenario,
        num_candles: usize,
        interval_minutes: i64,
    ) -> Vec<Candle> {
        let mut candles = Vec::with_capacity(num_candles);
        let mut price = self.base_price;
        let per_day = 24.0 * 60.0 / interval_minutes as f64;

        for i in 0..num_candles {
            let timestamp = SYNTHETIC_START_MS + i as i64 * interval_minutes * 60_000;
            let open = price;

            price = match scenario {
                MarketScenario::Sideways => {
                    let reversion = (self.base_price - price) * 0.1; // 10% pull to mean
                    let noise = price * self.rng.gen_range(-0.004..0.004);
                    price + reversion + noise
                }
                MarketScenario::Uptrend => {
                    let drift = price * 0.02 / per_day;
                    price + drift + price * self.rng.gen_range(-0.001..0.001)
                }
                MarketScenario::Downtrend => {
                    let drift = price * -0.02 / per_day;
                    price + drift + price * self.rng.gen_range(-0.001..0.001)
                }
                MarketScenario::Volatile => {
                    let moved = price + price * self.rng.gen_range(-0.02..0.02);
                    // Prevent price from going too low
                    moved.max(self.base_price * 0.5)
                }
                MarketScenario::Crash => {
                    if i < num_candles * 3 / 4 {
                        let reversion = (self.base_price - price) * 0.1;
                        price + reversion + price * self.rng.gen_range(-0.003..0.003)
                    } else {
                        // -1.5% per candle over the last quarter
                        price * (1.0 - 0.015) + price * self.rng.gen_range(-0.002..0.002)
                    }
                }
            };

            candles.push(self.create_candle(timestamp, open, price));
        }

        candles
    }

    /// Helper to create a candle from open, close and timestamp
    fn create_candle(&mut self, timestamp: i64, open: f64, close: f64) -> Candle {
        // ±0.3% intrabar movement beyond the body
        let noise_pct = 0.003;

        let high = open.max(close) * (1.0 + self.rng.gen_range(0.0..noise_pct));
        let low = open.min(close) * (1.0 - self.rng.gen_range(0.0..noise_pct));

        // Vary volume ±30%
        let volume = self.base_volume * self.rng.gen_range(0.7..1.3);

        let open = to_price(open);
        let close = to_price(close);

        Candle {
            timestamp,
            open,
            high: to_price(high).max(open).max(close),
            low: to_price(low).min(open).min(close),
            close,
            volume: to_price(volume),
        }
    }
}

fn to_price(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or_default().round_dp(2)
}
