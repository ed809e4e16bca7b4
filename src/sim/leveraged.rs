use crate::errors::{ensure_finite, ensure_positive, HedgeError, HedgeResult};
use crate::state::SimulationResult;
use serde::{Deserialize, Serialize};

pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// A daily-rebalanced leveraged (usually inverse) fund position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeveragedInstrument {
    pub ticker: String,
    /// Daily multiple of the underlying return, e.g. -3.0
    pub leverage: f64,
    /// Annual expense ratio, e.g. 0.0095
    pub annual_expense_ratio: f64,
    /// Capital committed to the position
    pub capital: f64,
}

impl LeveragedInstrument {
    pub fn validate(&self) -> HedgeResult<()> {
        ensure_finite("leverage", self.leverage)?;
        if self.leverage == 0.0 {
            return Err(HedgeError::invalid("leverage", "must be non-zero"));
        }
        if !self.annual_expense_ratio.is_finite() || self.annual_expense_ratio < 0.0 {
            return Err(HedgeError::invalid(
                "annual_expense_ratio",
                format!("must be >= 0 (got {})", self.annual_expense_ratio),
            ));
        }
        ensure_positive("capital", self.capital)?;
        Ok(())
    }

    #[inline]
    pub fn daily_cost(&self) -> f64 {
        daily_cost_from_annual(self.annual_expense_ratio)
    }

    /// Simulate this instrument over a daily-return path.
    pub fn simulate(&self, daily_returns: &[f64]) -> HedgeResult<SimulationResult> {
        simulate(daily_returns, self.capital, self.leverage, self.daily_cost())
    }
}

/// Expense ratio accrues per trading day.
#[inline]
pub fn daily_cost_from_annual(annual_expense_ratio: f64) -> f64 {
    annual_expense_ratio / TRADING_DAYS_PER_YEAR
}

/// Compound a leveraged position over `daily_returns`.
///
/// value_{t+1} = max(value_t * (1 + leverage * r_t - daily_cost), 0)
///
/// The naive value `initial * (1 + leverage * cumulative_return)` is reported
/// alongside so the path-dependence is always visible. It is not floored.
pub fn simulate(
    daily_returns: &[f64],
    initial_value: f64,
    leverage: f64,
    daily_cost: f64,
) -> HedgeResult<SimulationResult> {
    ensure_positive("initial_value", initial_value)?;
    ensure_finite("leverage", leverage)?;
    ensure_finite("daily_cost", daily_cost)?;

    let mut value = initial_value;
    let mut growth = 1.0_f64;

    for &r in daily_returns {
        if !r.is_finite() || r <= -1.0 {
            return Err(HedgeError::invalid(
                "daily_returns",
                format!("each return must be finite and > -100% (got {r})"),
            ));
        }
        // Leverage can drive a single day below -100%; the fund is wiped out, not short.
        value = (value * (1.0 + leverage * r - daily_cost)).max(0.0);
        growth *= 1.0 + r;
    }

    let cumulative_return = growth - 1.0;
    let naive_value = initial_value * (1.0 + leverage * cumulative_return);

    Ok(SimulationResult::from_values(initial_value, value, naive_value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::paths::generate_paths;
    use approx::assert_relative_eq;

    #[test]
    fn test_constant_return_closed_form() {
        let (r, n, lev, cost) = (-0.004, 40usize, -3.0, 0.0095 / 252.0);
        let res = simulate(&vec![r; n], 10_000.0, lev, cost).unwrap();
        let expected = 10_000.0 * (1.0 + lev * r - cost).powi(n as i32);
        assert_relative_eq!(res.compounded_value, expected, max_relative = 1e-12);
    }

    #[test]
    fn test_flat_market_loses_only_cost() {
        let cost = 0.0095 / 252.0;
        let res = simulate(&[0.0; 60], 1_000.0, -3.0, cost).unwrap();
        let expected = 1_000.0 * (1.0 - cost).powi(60);
        assert_relative_eq!(res.compounded_value, expected, max_relative = 1e-12);
        // Naive ignores costs and sees no move at all
        assert_eq!(res.naive_value, 1_000.0);
    }

    #[test]
    fn test_returns_reported_with_values() {
        let res = simulate(&[-0.10, -0.10], 1_000.0, -3.0, 0.0).unwrap();
        // 1.3 * 1.3 compounded vs 1 + 3 * 0.19 naive
        assert_relative_eq!(res.compounded_return, 0.69, epsilon = 1e-12);
        assert_relative_eq!(res.naive_return, 0.57, epsilon = 1e-12);
        assert_relative_eq!(res.decay_pct, -0.12, epsilon = 1e-12);

        let json = serde_json::to_value(res).unwrap();
        for key in ["compounded_return", "naive_return", "decay_pct"] {
            assert!(json.get(key).is_some(), "{key} missing from serialized result");
        }
    }

    #[test]
    fn test_floored_at_zero() {
        // +40% underlying day on a -3x fund: 1 - 1.2 < 0
        let res = simulate(&[0.01, 0.40, -0.30, 0.05], 1_000.0, -3.0, 0.0).unwrap();
        assert_eq!(res.compounded_value, 0.0);

        let res = simulate(&[-0.5, 0.9, -0.6], 500.0, 3.0, 0.001).unwrap();
        assert!(res.compounded_value >= 0.0);
    }

    #[test]
    fn test_single_day_matches_naive() {
        let res = simulate(&[-0.02], 100.0, -3.0, 0.0).unwrap();
        assert_relative_eq!(res.compounded_value, res.naive_value, epsilon = 1e-12);
        assert_relative_eq!(res.decay, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(simulate(&[0.01], 0.0, -3.0, 0.0).is_err());
        assert!(simulate(&[f64::NAN], 100.0, -3.0, 0.0).is_err());
        assert!(simulate(&[-1.0], 100.0, -3.0, 0.0).is_err());
        assert!(simulate(&[], 100.0, f64::INFINITY, 0.0).is_err());
    }

    #[test]
    fn test_twenty_percent_drop_diverges_from_naive() {
        let fund = LeveragedInstrument {
            ticker: "SQQQ".into(),
            leverage: -3.0,
            annual_expense_ratio: 0.0095,
            capital: 10_000.0,
        };
        let paths = generate_paths(-0.20, 30, 0.015).unwrap();
        for path in paths.iter() {
            let res = fund.simulate(&path.returns).unwrap();
            assert_relative_eq!(res.naive_value, 16_000.0, max_relative = 1e-9);
            assert!(
                res.decay.abs() / res.initial_value > 0.10,
                "{:?}: divergence {} should be material",
                path.kind,
                res.decay
            );
        }
        // Volatility itself erodes value relative to the smooth path
        let smooth = fund.simulate(&paths.gradual().returns).unwrap();
        let noisy = fund.simulate(&paths.noisy().returns).unwrap();
        assert!(noisy.compounded_value < smooth.compounded_value);
    }
}
