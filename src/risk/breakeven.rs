use crate::errors::{ensure_positive, HedgeError, HedgeResult};
use crate::sim::leveraged::LeveragedInstrument;
use crate::sim::paths::gradual_path;
use argmin::core::{CostFunction, Executor, State};
use argmin::solver::brent::BrentRoot;
use serde::Serialize;

/// Search domain for the leveraged breakeven (underlying cumulative return)
pub const SEARCH_LOWER: f64 = -0.50;
pub const SEARCH_UPPER: f64 = -1e-5;

const SOLVER_TOLERANCE: f64 = 1e-12;
const SOLVER_MAX_ITERS: u64 = 200;

/// Underlying move at which a hedge pays for itself, or why there is none.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Breakeven {
    Drop { value: f64 },
    None { reason: String },
}

impl Breakeven {
    pub fn drop_value(&self) -> Option<f64> {
        match self {
            Breakeven::Drop { value } => Some(*value),
            Breakeven::None { .. } => None,
        }
    }
}

/// Ending value minus capital for a gradual decline of `drop` over the horizon.
struct LeveragedObjective<'a> {
    instrument: &'a LeveragedInstrument,
    horizon_days: u32,
}

impl LeveragedObjective<'_> {
    fn eval(&self, drop: f64) -> HedgeResult<f64> {
        let path = gradual_path(drop, self.horizon_days)?;
        let res = self.instrument.simulate(&path.returns)?;
        Ok(res.compounded_value - res.initial_value)
    }
}

impl CostFunction for LeveragedObjective<'_> {
    type Param = f64;
    type Output = f64;

    fn cost(&self, drop: &Self::Param) -> Result<Self::Output, argmin::core::Error> {
        Ok(self.eval(*drop)?)
    }
}

/// Underlying drop at which the leveraged position is back to its capital
/// after costs, along the gradual path.
///
/// `daily_volatility` is validated but does not move the root: the gradual path
/// is the deterministic point estimate. Noisy paths only widen the range.
pub fn find_breakeven_leveraged(
    instrument: &LeveragedInstrument,
    horizon_days: u32,
    daily_volatility: f64,
) -> HedgeResult<Breakeven> {
    instrument.validate()?;
    ensure_positive("daily_volatility", daily_volatility)?;
    if horizon_days == 0 {
        return Err(HedgeError::invalid("horizon_days", "must be at least 1 trading day"));
    }

    let objective = LeveragedObjective {
        instrument,
        horizon_days,
    };

    let f_lo = objective.eval(SEARCH_LOWER)?;
    let f_hi = objective.eval(SEARCH_UPPER)?;

    if f_hi == 0.0 {
        return Ok(Breakeven::Drop { value: SEARCH_UPPER });
    }
    if f_lo * f_hi > 0.0 {
        tracing::warn!(
            ticker = %instrument.ticker,
            leverage = instrument.leverage,
            horizon_days,
            f_lo,
            f_hi,
            "no leveraged breakeven inside search domain"
        );
        return Ok(Breakeven::None {
            reason: format!(
                "position does not recover its capital for any drop between {:.1}% and {:.3}%",
                SEARCH_LOWER * 100.0,
                SEARCH_UPPER * 100.0
            ),
        });
    }

    let solver = BrentRoot::new(SEARCH_LOWER, SEARCH_UPPER, SOLVER_TOLERANCE);
    let res = Executor::new(objective, solver)
        .configure(|state| state.max_iters(SOLVER_MAX_ITERS))
        .run()
        .map_err(|e| HedgeError::Solver(e.to_string()))?;

    let state = res.state();
    let root = state
        .get_best_param()
        .or_else(|| state.get_param())
        .copied()
        .ok_or_else(|| HedgeError::Solver("brent solver returned no parameter".into()))?;

    tracing::debug!(
        ticker = %instrument.ticker,
        root,
        iterations = state.get_iter(),
        "leveraged breakeven solved"
    );

    Ok(Breakeven::Drop { value: root })
}

/// Closed form: the put pays for itself once intrinsic value covers the premium.
/// (strike - premium - spot) / spot
pub fn find_breakeven_option(premium_paid: f64, spot: f64, strike: f64) -> HedgeResult<Breakeven> {
    ensure_positive("spot", spot)?;
    ensure_positive("strike", strike)?;
    if !premium_paid.is_finite() || premium_paid < 0.0 {
        return Err(HedgeError::invalid(
            "premium_paid",
            format!("must be >= 0 (got {premium_paid})"),
        ));
    }

    let breakeven_spot = strike - premium_paid;
    if breakeven_spot <= 0.0 {
        return Ok(Breakeven::None {
            reason: "premium exceeds strike; the put cannot recover its cost".into(),
        });
    }

    Ok(Breakeven::Drop {
        value: (strike - premium_paid - spot) / spot,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn fund(expense: f64) -> LeveragedInstrument {
        LeveragedInstrument {
            ticker: "SQQQ".into(),
            leverage: -3.0,
            annual_expense_ratio: expense,
            capital: 10_000.0,
        }
    }

    #[test]
    fn test_option_breakeven_closed_form() {
        let b = find_breakeven_option(5.0, 100.0, 100.0).unwrap();
        assert_eq!(b, Breakeven::Drop { value: -0.05 });

        let otm = find_breakeven_option(2.0, 100.0, 90.0).unwrap();
        assert_relative_eq!(otm.drop_value().unwrap(), -0.12, epsilon = 1e-12);
    }

    #[test]
    fn test_option_breakeven_impossible() {
        let b = find_breakeven_option(120.0, 100.0, 100.0).unwrap();
        assert!(b.drop_value().is_none());
        assert!(find_breakeven_option(-1.0, 100.0, 100.0).is_err());
    }

    #[test]
    fn test_leveraged_breakeven_is_true_root() {
        for &expense in &[0.0095, 0.02, 0.05, 0.20] {
            let f = fund(expense);
            let b = find_breakeven_leveraged(&f, 30, 0.015).unwrap();
            let drop = b.drop_value().expect("root should exist");
            assert!(drop < 0.0, "breakeven {drop} must be a loss");

            let path = gradual_path(drop, 30).unwrap();
            let res = f.simulate(&path.returns).unwrap();
            assert_relative_eq!(res.compounded_value, f.capital, max_relative = 1e-8);
        }
    }

    #[test]
    fn test_higher_cost_needs_bigger_drop() {
        let cheap = find_breakeven_leveraged(&fund(0.0095), 60, 0.015).unwrap();
        let dear = find_breakeven_leveraged(&fund(0.05), 60, 0.015).unwrap();
        assert!(dear.drop_value().unwrap() < cheap.drop_value().unwrap());
    }

    #[test]
    fn test_long_fund_has_no_breakeven_on_drops() {
        let long = LeveragedInstrument {
            leverage: 3.0,
            ..fund(0.0095)
        };
        let b = find_breakeven_leveraged(&long, 30, 0.015).unwrap();
        assert!(matches!(b, Breakeven::None { .. }));
    }

    #[test]
    fn test_zero_cost_has_no_interior_root() {
        // Without costs any drop is a gain, so the bracket never straddles zero
        let b = find_breakeven_leveraged(&fund(0.0), 30, 0.015).unwrap();
        assert!(b.drop_value().is_none());
    }
}
