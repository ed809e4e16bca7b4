use crate::errors::{ensure_positive, HedgeError, HedgeResult};
use crate::state::MIN_MARKET_DROP;
use serde::Serialize;

/// Ceiling on extrapolated stress-index levels (above the 2008/2020 peaks)
const MAX_STRESS_INDEX: f64 = 150.0;

/// Regime boundaries on the stress index
const ELEVATED_LEVEL: f64 = 20.0;
const STRESSED_LEVEL: f64 = 30.0;
const CRISIS_LEVEL: f64 = 45.0;

pub const VOL_MODEL_CAVEAT: &str = "Volatility expansion is interpolated from a five-point \
     table of historical drawdowns; realized implied volatility in a given selloff can differ \
     substantially.";

/// Historical market drop -> typical stress-index level.
/// Drawn from the 2011, 2018, 2020 and 2008 drawdowns.
const HISTORICAL_POINTS: [(f64, f64); 5] = [
    (0.0, 16.0),
    (-0.05, 22.0),
    (-0.10, 30.0),
    (-0.20, 45.0),
    (-0.40, 70.0),
];

/// How far the estimate had to reach beyond calibrated data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Interpolated,
    Extrapolated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StressRegime {
    Calm,
    Elevated,
    Stressed,
    Crisis,
}

impl StressRegime {
    pub fn from_index(level: f64) -> Self {
        if level < ELEVATED_LEVEL {
            Self::Calm
        } else if level < STRESSED_LEVEL {
            Self::Elevated
        } else if level < CRISIS_LEVEL {
            Self::Stressed
        } else {
            Self::Crisis
        }
    }
}

impl std::fmt::Display for StressRegime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Calm => write!(f, "calm"),
            Self::Elevated => write!(f, "elevated"),
            Self::Stressed => write!(f, "stressed"),
            Self::Crisis => write!(f, "crisis"),
        }
    }
}

/// Immutable drop -> stress-index table. Build once, share by reference.
/// Stored as drop magnitudes in ascending order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalibrationTable {
    magnitudes: Vec<f64>,
    levels: Vec<f64>,
}

impl CalibrationTable {
    /// Points are `(market_drop, stress_index)` with drop <= 0.
    /// Levels must not decrease as the drop deepens.
    pub fn new(points: &[(f64, f64)]) -> HedgeResult<Self> {
        if points.len() < 2 {
            return Err(HedgeError::invalid("calibration_table", "need at least two points"));
        }

        let mut sorted: Vec<(f64, f64)> = Vec::with_capacity(points.len());
        for &(drop, level) in points {
            if !drop.is_finite() || drop > 0.0 {
                return Err(HedgeError::invalid(
                    "calibration_table",
                    format!("drop levels must be <= 0 (got {drop})"),
                ));
            }
            ensure_positive("calibration_table", level)?;
            sorted.push((-drop, level));
        }
        sorted.sort_by(|a, b| a.0.total_cmp(&b.0));

        if sorted.windows(2).any(|w| w[1].0 <= w[0].0) {
            return Err(HedgeError::invalid("calibration_table", "duplicate drop levels"));
        }
        if sorted.windows(2).any(|w| w[1].1 < w[0].1) {
            return Err(HedgeError::invalid(
                "calibration_table",
                "stress levels must be non-decreasing as the drop deepens",
            ));
        }

        Ok(Self {
            magnitudes: sorted.iter().map(|p| p.0).collect(),
            levels: sorted.iter().map(|p| p.1).collect(),
        })
    }

    pub fn historical() -> Self {
        Self {
            magnitudes: HISTORICAL_POINTS.iter().map(|p| -p.0).collect(),
            levels: HISTORICAL_POINTS.iter().map(|p| p.1).collect(),
        }
    }

    /// Piecewise-linear stress index at `drop`, flat below the first node,
    /// linear (capped) beyond the last.
    pub fn stress_index_at(&self, drop: f64) -> (f64, Confidence) {
        let m = (-drop).max(0.0);
        let n = self.magnitudes.len();

        if m <= self.magnitudes[0] {
            let confidence = if m == self.magnitudes[0] {
                Confidence::Interpolated
            } else {
                Confidence::Extrapolated
            };
            return (self.levels[0], confidence);
        }

        if m > self.magnitudes[n - 1] {
            let slope = (self.levels[n - 1] - self.levels[n - 2])
                / (self.magnitudes[n - 1] - self.magnitudes[n - 2]);
            let level = self.levels[n - 1] + slope * (m - self.magnitudes[n - 1]);
            return (level.min(MAX_STRESS_INDEX.max(self.levels[n - 1])), Confidence::Extrapolated);
        }

        let idx = self.magnitudes.partition_point(|v| *v < m).clamp(1, n - 1);
        let (x0, x1) = (self.magnitudes[idx - 1], self.magnitudes[idx]);
        let (y0, y1) = (self.levels[idx - 1], self.levels[idx]);
        let w = (m - x0) / (x1 - x0);
        (y0 + w * (y1 - y0), Confidence::Interpolated)
    }
}

impl Default for CalibrationTable {
    fn default() -> Self {
        Self::historical()
    }
}

/// Output of the regime model. Always carries the caveat.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VolEstimate {
    pub market_drop: f64,
    pub baseline_volatility: f64,
    pub baseline_stress_index: f64,
    /// Raw table value at the drop
    pub stress_index: f64,
    /// adjusted / baseline volatility (>= 1)
    pub expansion_ratio: f64,
    pub adjusted_volatility: f64,
    pub confidence: Confidence,
    pub regime: StressRegime,
    pub caveat: &'static str,
}

/// Scales option volatility by the expected stress-index expansion.
#[derive(Debug, Clone, Copy)]
pub struct VolRegimeModel<'a> {
    table: &'a CalibrationTable,
}

impl<'a> VolRegimeModel<'a> {
    pub fn new(table: &'a CalibrationTable) -> Self {
        Self { table }
    }

    /// adjusted = baseline_vol * max(index_at_drop, baseline_index) / baseline_index
    pub fn estimate_volatility(
        &self,
        baseline_volatility: f64,
        baseline_stress_index: f64,
        market_drop: f64,
    ) -> HedgeResult<VolEstimate> {
        ensure_positive("baseline_volatility", baseline_volatility)?;
        ensure_positive("baseline_stress_index", baseline_stress_index)?;
        if !market_drop.is_finite() || market_drop > 0.0 || market_drop < MIN_MARKET_DROP {
            return Err(HedgeError::invalid(
                "market_drop",
                format!("must be in [{MIN_MARKET_DROP}, 0] (got {market_drop})"),
            ));
        }

        let (stress_index, confidence) = self.table.stress_index_at(market_drop);
        let effective = stress_index.max(baseline_stress_index);
        let expansion_ratio = effective / baseline_stress_index;

        Ok(VolEstimate {
            market_drop,
            baseline_volatility,
            baseline_stress_index,
            stress_index,
            expansion_ratio,
            adjusted_volatility: baseline_volatility * expansion_ratio,
            confidence,
            regime: StressRegime::from_index(effective),
            caveat: VOL_MODEL_CAVEAT,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_table_nodes_and_midpoints() {
        let table = CalibrationTable::historical();
        assert_eq!(table.stress_index_at(0.0), (16.0, Confidence::Interpolated));
        assert_eq!(table.stress_index_at(-0.10).0, 30.0);
        let (mid, conf) = table.stress_index_at(-0.15);
        assert_relative_eq!(mid, 37.5, epsilon = 1e-12);
        assert_eq!(conf, Confidence::Interpolated);
    }

    #[test]
    fn test_extrapolation_beyond_table() {
        let table = CalibrationTable::historical();
        let (level, conf) = table.stress_index_at(-0.50);
        // last segment slope = 25 / 0.20 = 125 per unit drop
        assert_relative_eq!(level, 82.5, epsilon = 1e-9);
        assert_eq!(conf, Confidence::Extrapolated);
        assert!(table.stress_index_at(-0.99).0 <= MAX_STRESS_INDEX);
    }

    #[test]
    fn test_historical_matches_validated_constructor() {
        let built = CalibrationTable::new(&HISTORICAL_POINTS).unwrap();
        assert_eq!(built, CalibrationTable::historical());
    }

    #[test]
    fn test_table_rejects_bad_points() {
        assert!(CalibrationTable::new(&[(0.0, 16.0)]).is_err());
        assert!(CalibrationTable::new(&[(0.0, 16.0), (0.1, 20.0)]).is_err());
        assert!(CalibrationTable::new(&[(0.0, 30.0), (-0.1, 20.0)]).is_err());
        assert!(CalibrationTable::new(&[(0.0, 16.0), (-0.0, 20.0)]).is_err());
    }

    #[test]
    fn test_monotonic_in_drop_magnitude() {
        let table = CalibrationTable::historical();
        let model = VolRegimeModel::new(&table);
        let mut prev = 0.0;
        let mut drop = 0.0;
        while drop >= MIN_MARKET_DROP {
            let est = model.estimate_volatility(0.20, 18.0, drop).unwrap();
            assert!(
                est.adjusted_volatility >= prev,
                "vol decreased at drop {drop}: {} < {prev}",
                est.adjusted_volatility
            );
            prev = est.adjusted_volatility;
            drop -= 0.0025;
        }
    }

    #[test]
    fn test_proportional_scaling() {
        let table = CalibrationTable::historical();
        let est = VolRegimeModel::new(&table)
            .estimate_volatility(0.20, 15.0, -0.20)
            .unwrap();
        assert_relative_eq!(est.expansion_ratio, 3.0, epsilon = 1e-12);
        assert_relative_eq!(est.adjusted_volatility, 0.60, epsilon = 1e-12);
        assert_eq!(est.regime, StressRegime::Crisis);
        assert!(!est.caveat.is_empty());
    }

    #[test]
    fn test_never_contracts_below_baseline() {
        let table = CalibrationTable::historical();
        let est = VolRegimeModel::new(&table)
            .estimate_volatility(0.25, 28.0, -0.02)
            .unwrap();
        assert_eq!(est.expansion_ratio, 1.0);
        assert_eq!(est.adjusted_volatility, 0.25);
    }

    #[test]
    fn test_rejects_positive_drop() {
        let table = CalibrationTable::historical();
        assert!(VolRegimeModel::new(&table)
            .estimate_volatility(0.2, 16.0, 0.05)
            .is_err());
    }
}
