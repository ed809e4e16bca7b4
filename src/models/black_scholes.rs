use crate::errors::HedgeResult;
use crate::models::{OptionPricer, PricingOutcome};
use crate::state::{GreeksResult, OptionRight, OptionSpec};
use statrs::distribution::{Continuous, ContinuousCDF, Normal};

/// Tolerance below intrinsic before a raw price is flagged as inconsistent.
const INTRINSIC_TOLERANCE: f64 = 1e-10;

/// Calendar days per year for theta.
const DAYS_PER_YEAR: f64 = 365.0;

/// Generalised Black-Scholes-Merton pricing with continuous carry.
///
/// d1 = (ln(S/K) + (r - q + sigma^2/2) T) / (sigma sqrt(T))
/// d2 = d1 - sigma sqrt(T)
/// C  = S e^{-qT} N(d1) - K e^{-rT} N(d2)
/// P  = K e^{-rT} N(-d2) - S e^{-qT} N(-d1)
///
/// European exercise only. Use `EarlyExercise` for anything exercisable early.
#[derive(Debug, Clone)]
pub struct BlackScholes {
    /// Standard normal distribution (created once, reused)
    normal: Normal,
}

impl BlackScholes {
    pub fn new() -> Self {
        Self {
            normal: Normal::standard(),
        }
    }

    /// Closed form at T > 0. Inputs are already validated.
    fn closed_form(&self, spec: &OptionSpec) -> GreeksResult {
        let OptionSpec {
            spot: s,
            strike: k,
            time_to_expiry: t,
            volatility: sigma,
            rate: r,
            dividend_yield: q,
            right,
        } = *spec;

        let sqrt_t = t.sqrt();
        let sigma_sqrt_t = sigma * sqrt_t;
        let d1 = ((s / k).ln() + (r - q + 0.5 * sigma * sigma) * t) / sigma_sqrt_t;
        let d2 = d1 - sigma_sqrt_t;

        let df = (-r * t).exp();
        let carry_df = (-q * t).exp();
        let pdf_d1 = self.normal.pdf(d1);

        let gamma = carry_df * pdf_d1 / (s * sigma_sqrt_t);
        let vega = s * carry_df * pdf_d1 * sqrt_t / 100.0;
        let decay_term = -s * carry_df * pdf_d1 * sigma / (2.0 * sqrt_t);

        match right {
            OptionRight::Call => {
                let nd1 = self.normal.cdf(d1);
                let nd2 = self.normal.cdf(d2);
                GreeksResult {
                    price: s * carry_df * nd1 - k * df * nd2,
                    delta: carry_df * nd1,
                    gamma,
                    theta: (decay_term - r * k * df * nd2 + q * s * carry_df * nd1) / DAYS_PER_YEAR,
                    vega,
                    rho: k * t * df * nd2 / 100.0,
                }
            }
            OptionRight::Put => {
                let n_neg_d1 = self.normal.cdf(-d1);
                let n_neg_d2 = self.normal.cdf(-d2);
                GreeksResult {
                    price: k * df * n_neg_d2 - s * carry_df * n_neg_d1,
                    delta: -carry_df * n_neg_d1,
                    gamma,
                    theta: (decay_term + r * k * df * n_neg_d2 - q * s * carry_df * n_neg_d1)
                        / DAYS_PER_YEAR,
                    vega,
                    rho: -k * t * df * n_neg_d2 / 100.0,
                }
            }
        }
    }
}

impl Default for BlackScholes {
    fn default() -> Self {
        Self::new()
    }
}

impl OptionPricer for BlackScholes {
    #[inline]
    fn name(&self) -> &'static str {
        "Black-Scholes"
    }

    fn price(&self, spec: &OptionSpec) -> HedgeResult<PricingOutcome> {
        spec.validate()?;

        let intrinsic = spec.intrinsic();

        // At expiry the option is its payoff; no sqrt(T) in any denominator.
        if spec.time_to_expiry == 0.0 {
            return Ok(PricingOutcome::Consistent(GreeksResult::exercise_value(spec)));
        }

        let greeks = self.closed_form(spec);

        let g = &greeks;
        let finite = [g.price, g.delta, g.gamma, g.theta, g.vega, g.rho]
            .iter()
            .all(|v| v.is_finite());

        if !finite || greeks.price < intrinsic - INTRINSIC_TOLERANCE {
            return Ok(PricingOutcome::BelowIntrinsic {
                raw: greeks,
                intrinsic,
            });
        }

        Ok(PricingOutcome::Consistent(greeks))
    }
}

/// Price with a default `BlackScholes` instance.
pub fn price(spec: &OptionSpec) -> HedgeResult<PricingOutcome> {
    BlackScholes::new().price(spec)
}
