pub mod leveraged;
pub mod paths;

pub use leveraged::{daily_cost_from_annual, simulate, LeveragedInstrument, TRADING_DAYS_PER_YEAR};
pub use paths::{generate_paths, gradual_path, PathKind, PathSet, ScenarioPath};
