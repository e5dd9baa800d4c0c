// Technical indicators module
// Bollinger Bands built on a Decimal SMA and sample variance

pub mod bollinger;
pub mod moving_average;

pub use bollinger::{calculate_bollinger_bands, DEFAULT_K, DEFAULT_PERIOD};
pub use moving_average::{calculate_sma, sample_variance};
