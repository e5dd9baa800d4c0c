use rust_decimal::{Decimal, MathematicalOps};

use crate::error::SimulationError;
use crate::indicators::moving_average::{calculate_sma, sample_variance};
use crate::models::Band;
use crate::Result;

pub const DEFAULT_PERIOD: usize = 20;
pub const DEFAULT_K: Decimal = Decimal::TWO;

/// Calculate Bollinger Bands for every index of `closes`
///
/// Indices inside the warm-up region (fewer than `period` closes up to and
/// including the index) yield `None`. Each band uses the sample standard
/// deviation of its trailing window.
///
/// # Errors
/// `DegenerateInput` when `period < 2`, since the sample deviation is undefined.
pub fn calculate_bollinger_bands(
    closes: &[Decimal],
    period: usize,
    k: Decimal,
) -> Result<Vec<Option<Band>>> {
    if period < 2 {
        return Err(SimulationError::DegenerateInput(format!(
            "Bollinger period must be at least 2, got {}",
            period
        )));
    }

    let mut bands = Vec::with_capacity(closes.len());

    for i in 0..closes.len() {
        if i + 1 < period {
            bands.push(None);
            continue;
        }

        let window = &closes[i + 1 - period..=i];
        bands.push(Some(band_for_window(window, period, k)?));
    }

    Ok(bands)
}

fn band_for_window(window: &[Decimal], period: usize, k: Decimal) -> Result<Band> {
    let middle = calculate_sma(window, period).ok_or_else(|| {
        SimulationError::DegenerateInput(format!("window shorter than period {}", period))
    })?;
    let variance = sample_variance(window, period, middle).ok_or_else(|| {
        SimulationError::DegenerateInput(format!("window shorter than period {}", period))
    })?;
    // Variance is a sum of squares, never negative
    let stdev = variance.sqrt().ok_or_else(|| {
        SimulationError::DegenerateInput(format!("negative variance {}", variance))
    })?;

    let width = k * stdev;
    Ok(Band {
        middle,
        upper: middle + width,
        lower: middle - width,
    })
}
