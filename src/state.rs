use crate::errors::{ensure_finite, ensure_positive, HedgeError, HedgeResult};
use serde::{Deserialize, Serialize};

/// Lower bound on a modelled market drop (a 99% crash).
pub const MIN_MARKET_DROP: f64 = -0.99;

// ── Contract right ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionRight {
    Call,
    Put,
}

impl OptionRight {
    /// Payoff direction: +1 for call, -1 for put
    #[inline]
    pub fn phi(&self) -> f64 {
        match self {
            OptionRight::Call => 1.0,
            OptionRight::Put => -1.0,
        }
    }

    #[inline]
    pub fn intrinsic(&self, spot: f64, strike: f64) -> f64 {
        match self {
            OptionRight::Call => (spot - strike).max(0.0),
            OptionRight::Put => (strike - spot).max(0.0),
        }
    }
}

impl std::fmt::Display for OptionRight {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Call => write!(f, "call"),
            Self::Put => write!(f, "put"),
        }
    }
}

impl std::str::FromStr for OptionRight {
    type Err = HedgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "call" | "c" => Ok(Self::Call),
            "put" | "p" => Ok(Self::Put),
            other => Err(HedgeError::invalid("right", format!("expected call|put, got {other:?}"))),
        }
    }
}

// ── Pricing inputs / outputs ──

/// Inputs to one closed-form pricing call. Created per call, no identity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OptionSpec {
    pub spot: f64,
    pub strike: f64,
    /// Time to expiry in years
    pub time_to_expiry: f64,
    /// Annualized volatility
    pub volatility: f64,
    pub rate: f64,
    /// Dividend / cost-of-carry yield
    #[serde(default)]
    pub dividend_yield: f64,
    pub right: OptionRight,
}

impl OptionSpec {
    pub fn new(
        spot: f64,
        strike: f64,
        time_to_expiry: f64,
        volatility: f64,
        rate: f64,
        right: OptionRight,
    ) -> Self {
        Self {
            spot,
            strike,
            time_to_expiry,
            volatility,
            rate,
            dividend_yield: 0.0,
            right,
        }
    }

    pub fn with_dividend_yield(mut self, q: f64) -> Self {
        self.dividend_yield = q;
        self
    }

    /// Fail fast on any field the model is undefined for.
    pub fn validate(&self) -> HedgeResult<()> {
        ensure_positive("spot", self.spot)?;
        ensure_positive("strike", self.strike)?;
        ensure_positive("volatility", self.volatility)?;
        ensure_finite("rate", self.rate)?;
        ensure_finite("dividend_yield", self.dividend_yield)?;
        if !self.time_to_expiry.is_finite() || self.time_to_expiry < 0.0 {
            return Err(HedgeError::invalid(
                "time_to_expiry",
                format!("must be >= 0 years (got {})", self.time_to_expiry),
            ));
        }
        Ok(())
    }

    #[inline]
    pub fn intrinsic(&self) -> f64 {
        self.right.intrinsic(self.spot, self.strike)
    }
}

/// Price and first-order sensitivities.
/// theta is per calendar day, vega per vol point, rho per rate point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GreeksResult {
    pub price: f64,
    pub delta: f64,
    pub gamma: f64,
    pub theta: f64,
    pub vega: f64,
    pub rho: f64,
}

impl GreeksResult {
    /// Greeks of an option that is worth exactly its exercise value.
    pub fn exercise_value(spec: &OptionSpec) -> Self {
        let intrinsic = spec.intrinsic();
        let delta = if intrinsic > 0.0 { spec.right.phi() } else { 0.0 };
        Self {
            price: intrinsic,
            delta,
            ..Self::default()
        }
    }
}

// ── Scenario inputs ──

/// One requested market scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioInput {
    #[serde(default)]
    pub label: Option<String>,
    /// Cumulative underlying return over the horizon, strictly negative
    pub market_drop: f64,
    /// Holding horizon in trading days
    pub horizon_days: u32,
    /// Assumed daily volatility used for path generation
    pub daily_volatility: f64,
}

impl ScenarioInput {
    pub fn new(market_drop: f64, horizon_days: u32, daily_volatility: f64) -> HedgeResult<Self> {
        let s = Self {
            label: None,
            market_drop,
            horizon_days,
            daily_volatility,
        };
        s.validate()?;
        Ok(s)
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn validate(&self) -> HedgeResult<()> {
        validate_market_drop(self.market_drop)?;
        if self.horizon_days == 0 {
            return Err(HedgeError::invalid("horizon_days", "must be at least 1 trading day"));
        }
        ensure_positive("daily_volatility", self.daily_volatility)?;
        Ok(())
    }

    pub fn display_label(&self) -> String {
        self.label
            .clone()
            .unwrap_or_else(|| {
                format!("{:.0}% over {}d", self.market_drop * 100.0, self.horizon_days)
            })
    }
}

pub fn validate_market_drop(drop: f64) -> HedgeResult<f64> {
    if !drop.is_finite() || drop >= 0.0 || drop < MIN_MARKET_DROP {
        return Err(HedgeError::invalid(
            "market_drop",
            format!("must be in [{MIN_MARKET_DROP}, 0) (got {drop})"),
        ));
    }
    Ok(drop)
}

// ── Simulation output ──

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub initial_value: f64,
    /// Daily-compounded ending value (floored at 0)
    pub compounded_value: f64,
    /// initial * (1 + leverage * cumulative_return), no compounding
    pub naive_value: f64,
    /// naive - compounded
    pub decay: f64,
    pub compounded_return: f64,
    pub naive_return: f64,
    /// Decay as a fraction of the starting capital
    pub decay_pct: f64,
}

impl SimulationResult {
    /// Derive decay and the returns from the three values.
    pub fn from_values(initial_value: f64, compounded_value: f64, naive_value: f64) -> Self {
        let decay = naive_value - compounded_value;
        Self {
            initial_value,
            compounded_value,
            naive_value,
            decay,
            compounded_return: compounded_value / initial_value - 1.0,
            naive_return: naive_value / initial_value - 1.0,
            decay_pct: decay / initial_value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intrinsic() {
        assert_eq!(OptionRight::Call.intrinsic(110.0, 100.0), 10.0);
        assert_eq!(OptionRight::Put.intrinsic(90.0, 100.0), 10.0);
        assert_eq!(OptionRight::Put.intrinsic(110.0, 100.0), 0.0);
    }

    #[test]
    fn test_right_parse() {
        assert_eq!("PUT".parse::<OptionRight>().unwrap(), OptionRight::Put);
        assert_eq!("c".parse::<OptionRight>().unwrap(), OptionRight::Call);
        assert!("straddle".parse::<OptionRight>().is_err());
    }

    #[test]
    fn test_spec_validation() {
        let ok = OptionSpec::new(100.0, 95.0, 0.5, 0.2, 0.04, OptionRight::Put);
        assert!(ok.validate().is_ok());

        let zero_vol = OptionSpec { volatility: 0.0, ..ok };
        match zero_vol.validate() {
            Err(HedgeError::InvalidInput { field, .. }) => assert_eq!(field, "volatility"),
            other => panic!("expected InvalidInput, got {other:?}"),
        }

        let neg_time = OptionSpec { time_to_expiry: -0.1, ..ok };
        assert!(neg_time.validate().is_err());

        let expired = OptionSpec { time_to_expiry: 0.0, ..ok };
        assert!(expired.validate().is_ok());
    }

    #[test]
    fn test_scenario_domain() {
        assert!(ScenarioInput::new(-0.2, 30, 0.015).is_ok());
        assert!(ScenarioInput::new(0.0, 30, 0.015).is_err());
        assert!(ScenarioInput::new(0.1, 30, 0.015).is_err());
        assert!(ScenarioInput::new(-1.0, 30, 0.015).is_err());
        assert!(ScenarioInput::new(-0.2, 0, 0.015).is_err());
        assert!(ScenarioInput::new(-0.2, 30, 0.0).is_err());
    }

    #[test]
    fn test_default_label() {
        let s = ScenarioInput::new(-0.2, 30, 0.015).unwrap();
        assert_eq!(s.display_label(), "-20% over 30d");
        assert_eq!(s.with_label("crash").display_label(), "crash");
    }
}
