pub mod black_scholes;
pub mod early_exercise;
pub mod volatility;

use crate::errors::HedgeResult;
use crate::state::{GreeksResult, OptionSpec};
use serde::Serialize;

/// All closed-form pricers implement this trait.
/// price() must be a pure function: deterministic output from inputs only.
/// Send + Sync so a single instance can be shared across callers.
pub trait OptionPricer: Send + Sync {
    fn name(&self) -> &'static str;

    /// Fails only on invalid input. A price the model itself cannot justify
    /// (below exercise value) comes back as `PricingOutcome::BelowIntrinsic`.
    fn price(&self, spec: &OptionSpec) -> HedgeResult<PricingOutcome>;
}

/// Result of a raw closed-form pricing call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PricingOutcome {
    /// Price and Greeks are internally consistent (price >= intrinsic).
    Consistent(GreeksResult),
    /// European value fell below immediate exercise value, or the arithmetic
    /// degenerated. `raw` is whatever the formula produced.
    BelowIntrinsic { raw: GreeksResult, intrinsic: f64 },
}

impl PricingOutcome {
    /// The formula's own Greeks, whether or not they are consistent.
    #[inline]
    pub fn raw(&self) -> &GreeksResult {
        match self {
            PricingOutcome::Consistent(g) => g,
            PricingOutcome::BelowIntrinsic { raw, .. } => raw,
        }
    }

    #[inline]
    pub fn is_consistent(&self) -> bool {
        matches!(self, PricingOutcome::Consistent(_))
    }
}
