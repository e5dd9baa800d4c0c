pub mod engine;
pub mod report;
pub mod runner;
pub mod settlement;
pub mod synthetic;

pub use engine::{GridBook, GridEngine, StepOutcome};
pub use runner::GridBacktest;
pub use settlement::{SettlementCalculator, SettlementStatus, SimulationResult, UntriggeredClose};
pub use synthetic::{MarketScenario, SyntheticDataGenerator};
