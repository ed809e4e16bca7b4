use crate::errors::{ensure_positive, HedgeError, HedgeResult};
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use rand_pcg::Pcg64;
use serde::Serialize;
use smallvec::SmallVec;

/// Days over which the front-loaded path delivers the whole move
pub const FRONT_LOAD_DAYS: u32 = 5;

/// Fixed seed so the noisy path is reproducible run to run
const NOISE_SEED: u64 = 0x5EED_2008;

/// Smallest daily growth factor a noisy draw may take before rescaling
const MIN_GROWTH_FACTOR: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PathKind {
    Gradual,
    FrontLoaded,
    Noisy,
}

impl std::fmt::Display for PathKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Gradual => write!(f, "gradual"),
            Self::FrontLoaded => write!(f, "front_loaded"),
            Self::Noisy => write!(f, "noisy"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioPath {
    pub kind: PathKind,
    pub returns: Vec<f64>,
}

impl ScenarioPath {
    /// Product of (1 + r) over the path
    pub fn compounded_growth(&self) -> f64 {
        self.returns.iter().map(|r| 1.0 + r).product()
    }
}

/// 2-3 daily-return paths that all compound to the same target.
/// Ordered: gradual first, noisy last, front-loaded in between when present.
#[derive(Debug, Clone, Serialize)]
pub struct PathSet {
    pub target_return: f64,
    pub horizon_days: u32,
    paths: SmallVec<[ScenarioPath; 3]>,
}

impl PathSet {
    /// Deterministic point-estimate path
    #[inline]
    pub fn gradual(&self) -> &ScenarioPath {
        &self.paths[0]
    }

    #[inline]
    pub fn noisy(&self) -> &ScenarioPath {
        &self.paths[self.paths.len() - 1]
    }

    pub fn get(&self, kind: PathKind) -> Option<&ScenarioPath> {
        self.paths.iter().find(|p| p.kind == kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScenarioPath> {
        self.paths.iter()
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

fn validate_target(target: f64, horizon_days: u32) -> HedgeResult<()> {
    if !target.is_finite() || target <= -1.0 {
        return Err(HedgeError::invalid(
            "target_cumulative_return",
            format!("must be finite and > -100% (got {target})"),
        ));
    }
    if horizon_days == 0 {
        return Err(HedgeError::invalid("horizon_days", "must be at least 1 trading day"));
    }
    Ok(())
}

/// Identical daily return r with (1 + r)^n = 1 + target.
pub fn gradual_path(target: f64, horizon_days: u32) -> HedgeResult<ScenarioPath> {
    validate_target(target, horizon_days)?;
    let r = (1.0 + target).powf(1.0 / horizon_days as f64) - 1.0;
    Ok(ScenarioPath {
        kind: PathKind::Gradual,
        returns: vec![r; horizon_days as usize],
    })
}

fn front_loaded_path(target: f64, horizon_days: u32) -> ScenarioPath {
    let shock_days = horizon_days.min(FRONT_LOAD_DAYS);
    let r = (1.0 + target).powf(1.0 / shock_days as f64) - 1.0;
    let mut returns = vec![r; shock_days as usize];
    returns.resize(horizon_days as usize, 0.0);
    ScenarioPath {
        kind: PathKind::FrontLoaded,
        returns,
    }
}

/// Seeded Gaussian daily returns around the gradual mean, rescaled
/// multiplicatively so the compounded product hits the target exactly.
fn noisy_path(target: f64, horizon_days: u32, daily_volatility: f64) -> HedgeResult<ScenarioPath> {
    let n = horizon_days as usize;
    let mean = (1.0 + target).powf(1.0 / n as f64) - 1.0;
    let normal = Normal::new(mean, daily_volatility)
        .map_err(|e| HedgeError::invalid("daily_volatility", e.to_string()))?;
    let mut rng = Pcg64::seed_from_u64(NOISE_SEED);

    let factors: Vec<f64> = (0..n)
        .map(|_| (1.0 + normal.sample(&mut rng)).max(MIN_GROWTH_FACTOR))
        .collect();

    let log_product: f64 = factors.iter().map(|f| f.ln()).sum();
    let scale = (((1.0 + target).ln() - log_product) / n as f64).exp();

    Ok(ScenarioPath {
        kind: PathKind::Noisy,
        returns: factors.iter().map(|f| f * scale - 1.0).collect(),
    })
}

/// Build the representative paths for one scenario.
/// The front-loaded path is omitted when it would equal the gradual one.
pub fn generate_paths(
    target_cumulative_return: f64,
    horizon_days: u32,
    daily_volatility: f64,
) -> HedgeResult<PathSet> {
    validate_target(target_cumulative_return, horizon_days)?;
    ensure_positive("daily_volatility", daily_volatility)?;

    let mut paths: SmallVec<[ScenarioPath; 3]> = SmallVec::new();
    paths.push(gradual_path(target_cumulative_return, horizon_days)?);
    if horizon_days > FRONT_LOAD_DAYS {
        paths.push(front_loaded_path(target_cumulative_return, horizon_days));
    }
    paths.push(noisy_path(target_cumulative_return, horizon_days, daily_volatility)?);

    Ok(PathSet {
        target_return: target_cumulative_return,
        horizon_days,
        paths,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_all_paths_hit_target() {
        for &(target, days) in &[(-0.2, 30), (-0.05, 10), (-0.5, 60), (-0.01, 1), (-0.35, 4)] {
            let set = generate_paths(target, days, 0.015).unwrap();
            for path in set.iter() {
                assert_eq!(path.returns.len(), days as usize);
                assert_relative_eq!(path.compounded_growth(), 1.0 + target, max_relative = 1e-9);
            }
        }
    }

    #[test]
    fn test_front_loaded_shape() {
        let set = generate_paths(-0.2, 30, 0.015).unwrap();
        assert_eq!(set.len(), 3);
        let fl = set.get(PathKind::FrontLoaded).unwrap();
        assert!(fl.returns[..5].iter().all(|r| *r < 0.0));
        assert!(fl.returns[5..].iter().all(|r| *r == 0.0));
    }

    #[test]
    fn test_short_horizon_drops_front_loaded() {
        let set = generate_paths(-0.1, 5, 0.02).unwrap();
        assert_eq!(set.len(), 2);
        assert!(set.get(PathKind::FrontLoaded).is_none());
        assert_eq!(set.gradual().kind, PathKind::Gradual);
        assert_eq!(set.noisy().kind, PathKind::Noisy);
    }

    #[test]
    fn test_noisy_is_reproducible_and_noisy() {
        let a = generate_paths(-0.2, 30, 0.015).unwrap();
        let b = generate_paths(-0.2, 30, 0.015).unwrap();
        assert_eq!(a.noisy().returns, b.noisy().returns);

        let r = &a.noisy().returns;
        let mean = r.iter().sum::<f64>() / r.len() as f64;
        let sd = (r.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (r.len() - 1) as f64).sqrt();
        assert!(sd > 0.005, "noisy path sd {sd} should reflect the input volatility");
    }

    #[test]
    fn test_rejects_bad_inputs() {
        assert!(generate_paths(-1.0, 30, 0.015).is_err());
        assert!(generate_paths(-0.2, 0, 0.015).is_err());
        assert!(generate_paths(-0.2, 30, 0.0).is_err());
        assert!(gradual_path(f64::NAN, 30).is_err());
    }
}
