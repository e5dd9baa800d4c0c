use thiserror::Error;

/// Fatal errors raised by the simulation core
#[derive(Debug, Error, PartialEq)]
pub enum SimulationError {
    /// Window too small for a sample deviation, or too few candles to simulate
    #[error("Degenerate input: {0}")]
    DegenerateInput(String),

    /// The terminal band is absent because the series is shorter than the window
    #[error("Insufficient history: need {required} candles, got {available}")]
    InsufficientHistory { required: usize, available: usize },

    /// Upper band does not lie strictly above the lower band
    #[error("Degenerate grid: upper band {upper} must be above lower band {lower}")]
    DegenerateGrid {
        upper: rust_decimal::Decimal,
        lower: rust_decimal::Decimal,
    },

    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}
