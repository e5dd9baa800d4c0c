// Grid construction
pub mod levels;

pub use levels::{GridLevels, GRID_LEVELS};
