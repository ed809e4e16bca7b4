use crate::errors::HedgeResult;
use crate::models::black_scholes::BlackScholes;
use crate::models::{OptionPricer, PricingOutcome};
use crate::state::{GreeksResult, OptionSpec};
use serde::Serialize;

/// Which correction, if any, was applied to the closed-form value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Adjustment {
    None,
    /// Closed-form value was below exercise value; intrinsic returned instead.
    IntrinsicFloor,
}

/// Price of an option that can be exercised at any time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AdjustedPrice {
    /// max(raw closed-form price, intrinsic)
    pub price: f64,
    pub raw_price: f64,
    pub intrinsic: f64,
    pub greeks: GreeksResult,
    pub adjustment: Adjustment,
}

impl AdjustedPrice {
    #[inline]
    pub fn time_value(&self) -> f64 {
        self.price - self.intrinsic
    }

    #[inline]
    pub fn is_floored(&self) -> bool {
        self.adjustment == Adjustment::IntrinsicFloor
    }
}

/// Wraps a European pricer so the result never falls below immediate
/// exercise value. Only invalid input is ever surfaced as an error.
#[derive(Debug, Clone, Default)]
pub struct EarlyExercise<P = BlackScholes> {
    inner: P,
}

impl<P: OptionPricer> EarlyExercise<P> {
    pub fn new(inner: P) -> Self {
        Self { inner }
    }

    pub fn price_adjustable(&self, spec: &OptionSpec) -> HedgeResult<AdjustedPrice> {
        let intrinsic = spec.intrinsic();

        match self.inner.price(spec)? {
            PricingOutcome::Consistent(greeks) => {
                // Consistent already means >= intrinsic - tolerance; clamp the residue.
                let price = greeks.price.max(intrinsic);
                Ok(AdjustedPrice {
                    price,
                    raw_price: greeks.price,
                    intrinsic,
                    greeks: GreeksResult { price, ..greeks },
                    adjustment: Adjustment::None,
                })
            }
            PricingOutcome::BelowIntrinsic { raw, .. } => {
                tracing::debug!(
                    model = self.inner.name(),
                    raw_price = raw.price,
                    intrinsic,
                    spot = spec.spot,
                    strike = spec.strike,
                    "closed-form value below exercise value, flooring at intrinsic"
                );
                Ok(AdjustedPrice {
                    price: intrinsic,
                    raw_price: raw.price,
                    intrinsic,
                    greeks: GreeksResult::exercise_value(spec),
                    adjustment: Adjustment::IntrinsicFloor,
                })
            }
        }
    }
}

/// Early-exercise price using the default closed-form model.
pub fn price_adjustable(spec: &OptionSpec) -> HedgeResult<AdjustedPrice> {
    EarlyExercise::new(BlackScholes::new()).price_adjustable(spec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::OptionRight;

    #[test]
    fn test_floor_applied_deep_itm_put() {
        let s = OptionSpec::new(50.0, 100.0, 0.5, 0.2, 0.05, OptionRight::Put);
        let p = price_adjustable(&s).unwrap();
        assert_eq!(p.adjustment, Adjustment::IntrinsicFloor);
        assert_eq!(p.price, 50.0);
        assert!(p.raw_price < 50.0);
        assert_eq!(p.greeks.delta, -1.0);
        assert_eq!(p.greeks.theta, 0.0);
    }

    #[test]
    fn test_otm_put_untouched() {
        let s = OptionSpec::new(100.0, 90.0, 0.25, 0.25, 0.04, OptionRight::Put);
        let p = price_adjustable(&s).unwrap();
        assert_eq!(p.adjustment, Adjustment::None);
        assert_eq!(p.price, p.raw_price);
        assert!(p.time_value() > 0.0);
    }

    #[test]
    fn test_put_never_below_intrinsic_grid() {
        let spots = [1.0, 20.0, 50.0, 80.0, 95.0, 100.0, 105.0, 150.0, 400.0];
        let times = [0.0, 1.0 / 365.0, 7.0 / 365.0, 0.1, 0.5, 1.0, 3.0];
        let vols = [0.01, 0.05, 0.2, 0.6, 1.5, 5.0];
        let rates = [-0.02, 0.0, 0.05, 0.15];
        for &spot in &spots {
            for &t in &times {
                for &vol in &vols {
                    for &r in &rates {
                        let s = OptionSpec::new(spot, 100.0, t, vol, r, OptionRight::Put);
                        let p = price_adjustable(&s).unwrap();
                        let intrinsic = (100.0 - spot).max(0.0);
                        assert!(
                            p.price >= intrinsic,
                            "S={spot} T={t} vol={vol} r={r}: {} < {intrinsic}",
                            p.price
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_invalid_input_propagates() {
        let s = OptionSpec::new(-1.0, 100.0, 0.5, 0.2, 0.05, OptionRight::Put);
        assert!(price_adjustable(&s).is_err());
    }
}
