// Core modules
pub mod backtest;
pub mod config;
pub mod error;
pub mod grid;
pub mod indicators;
pub mod market_data;
pub mod models;

// Re-export commonly used types
pub use backtest::{GridBacktest, SimulationResult};
pub use config::{AppConfig, MarketConfig, SimulationConfig};
pub use error::SimulationError;
pub use grid::GridLevels;
pub use models::*;

// Error handling
pub type Result<T> = std::result::Result<T, SimulationError>;
