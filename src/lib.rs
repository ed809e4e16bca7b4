pub mod compare;
pub mod config;
pub mod errors;
pub mod feeds;
pub mod models;
pub mod positions;
pub mod risk;
pub mod sim;
pub mod state;

pub use compare::{
    compare, ComparisonOutput, ComparisonRow, HedgeComparator, InstrumentParams, OptionLeg, Winner,
};
pub use config::HedgeConfig;
pub use errors::{HedgeError, HedgeResult};
pub use models::black_scholes::{price, BlackScholes};
pub use models::early_exercise::{price_adjustable, AdjustedPrice, EarlyExercise};
pub use models::volatility::{CalibrationTable, VolEstimate, VolRegimeModel};
pub use models::{OptionPricer, PricingOutcome};
pub use risk::{find_breakeven_leveraged, find_breakeven_option, Breakeven};
pub use sim::{generate_paths, simulate, LeveragedInstrument, PathSet};
pub use state::{GreeksResult, OptionRight, OptionSpec, ScenarioInput, SimulationResult};
