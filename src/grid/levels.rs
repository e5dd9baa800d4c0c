use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::SimulationError;
use crate::models::Band;
use crate::Result;

/// Number of grid lines between the lower and upper band
pub const GRID_LEVELS: usize = 4;

/// Four equally spaced price levels derived from one Bollinger band
///
/// Levels are stored ascending; a level is addressed by its rank (0 = lowest).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridLevels {
    levels: [Decimal; GRID_LEVELS],
    spacing: Decimal,
    band: Band,
}

impl GridLevels {
    /// Build the grid from the band at the last candle of the series
    ///
    /// # Errors
    /// * `InsufficientHistory` if the last band is absent (series still in warm-up)
    /// * `DegenerateGrid` if `upper <= lower`
    pub fn from_bands(bands: &[Option<Band>], period: usize) -> Result<Self> {
        match bands.last().copied().flatten() {
            Some(band) => Self::from_band(&band),
            None => Err(SimulationError::InsufficientHistory {
                required: period,
                available: bands.len(),
            }),
        }
    }

    pub fn from_band(band: &Band) -> Result<Self> {
        Self::from_bounds(band.lower, band.upper, band.middle)
    }

    /// Build the grid from explicit bounds, `middle` is kept for reporting only
    pub fn from_bounds(lower: Decimal, upper: Decimal, middle: Decimal) -> Result<Self> {
        if upper <= lower {
            return Err(SimulationError::DegenerateGrid { upper, lower });
        }

        let spacing = (upper - lower) / Decimal::from(GRID_LEVELS);
        let mut levels = [Decimal::ZERO; GRID_LEVELS];
        for (i, level) in levels.iter_mut().enumerate() {
            *level = lower + spacing * Decimal::from(i);
        }

        Ok(Self {
            levels,
            spacing,
            band: Band {
                middle,
                upper,
                lower,
            },
        })
    }

    /// Levels in their natural (ascending) order
    pub fn as_slice(&self) -> &[Decimal] {
        &self.levels
    }

    pub fn level(&self, rank: usize) -> Decimal {
        self.levels[rank]
    }

    /// `(rank, price)` pairs lowest first
    pub fn ascending(&self) -> impl Iterator<Item = (usize, Decimal)> + '_ {
        self.levels.iter().copied().enumerate()
    }

    /// `(rank, price)` pairs highest first
    pub fn descending(&self) -> impl Iterator<Item = (usize, Decimal)> + '_ {
        self.levels.iter().copied().enumerate().rev()
    }

    pub fn lowest(&self) -> Decimal {
        self.levels[0]
    }

    pub fn highest(&self) -> Decimal {
        self.levels[GRID_LEVELS - 1]
    }

    pub fn spacing(&self) -> Decimal {
        self.spacing
    }

    /// Band middle, the nominal price of the first fill
    pub fn first_entry(&self) -> Decimal {
        self.band.middle
    }

    /// Band the grid was built from
    pub fn band(&self) -> &Band {
        &self.band
    }

    /// Level whose touch closes a short opened at `rank`, if any
    pub fn close_trigger(&self, rank: usize) -> Option<Decimal> {
        rank.checked_sub(1).map(|below| self.levels[below])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_levels_from_band() {
        let band = Band {
            middle: dec!(100),
            upper: dec!(110),
            lower: dec!(90),
        };
        let grid = GridLevels::from_band(&band).unwrap();

        assert_eq!(grid.as_slice(), &[dec!(90), dec!(95), dec!(100), dec!(105)]);
        assert_eq!(grid.spacing(), dec!(5));
        assert_eq!(grid.first_entry(), dec!(100));
        assert_eq!(grid.lowest(), dec!(90));
        assert_eq!(grid.highest(), dec!(105));
    }

    #[test]
    fn test_levels_strictly_increasing_and_even() {
        let grid = GridLevels::from_bounds(dec!(63012.4), dec!(64890.8), dec!(63951.6)).unwrap();
        let levels = grid.as_slice();

        assert_eq!(levels.len(), GRID_LEVELS);
        for pair in levels.windows(2) {
            assert!(pair[1] > pair[0]);
            assert_eq!(pair[1] - pair[0], grid.spacing());
        }
    }

    #[test]
    fn test_orderings() {
        let grid = GridLevels::from_bounds(dec!(90), dec!(110), dec!(100)).unwrap();

        let asc: Vec<usize> = grid.ascending().map(|(rank, _)| rank).collect();
        let desc: Vec<Decimal> = grid.descending().map(|(_, price)| price).collect();
        assert_eq!(asc, vec![0, 1, 2, 3]);
        assert_eq!(desc, vec![dec!(105), dec!(100), dec!(95), dec!(90)]);
    }

    #[test]
    fn test_close_trigger() {
        let grid = GridLevels::from_bounds(dec!(90), dec!(110), dec!(100)).unwrap();
        assert_eq!(grid.close_trigger(0), None);
        assert_eq!(grid.close_trigger(3), Some(dec!(100)));
    }

    #[test]
    fn test_uses_last_band() {
        let bands = vec![
            None,
            Some(Band {
                middle: dec!(50),
                upper: dec!(60),
                lower: dec!(40),
            }),
            Some(Band {
                middle: dec!(100),
                upper: dec!(110),
                lower: dec!(90),
            }),
        ];
        let grid = GridLevels::from_bands(&bands, 2).unwrap();
        assert_eq!(grid.lowest(), dec!(90));
    }

    #[test]
    fn test_absent_band_is_insufficient_history() {
        let bands = vec![None, None, None];
        let err = GridLevels::from_bands(&bands, 20).unwrap_err();
        assert_eq!(
            err,
            SimulationError::InsufficientHistory {
                required: 20,
                available: 3
            }
        );
    }

    #[test]
    fn test_collapsed_band_is_degenerate() {
        let band = Band {
            middle: dec!(100),
            upper: dec!(100),
            lower: dec!(100),
        };
        let err = GridLevels::from_band(&band).unwrap_err();
        assert!(matches!(err, SimulationError::DegenerateGrid { .. }));

        let inverted = GridLevels::from_bounds(dec!(110), dec!(90), dec!(100));
        assert!(inverted.is_err());
    }
}
