use crate::errors::{HedgeError, HedgeResult};
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct HedgeConfig {
    pub monthly_budget: f64,
    pub roll_window_days: u32,
    /// Per-underlying budget weights, normalized at allocation time
    pub weights: BTreeMap<String, f64>,
    pub target_moneyness: f64,
    pub moneyness_tolerance: f64,
    pub min_dte: u32,
    pub max_dte: u32,
    pub target_dte: u32,
    pub data_timeout_secs: u64,
    pub store_dir: PathBuf,
    pub risk_free_rate: f64,
    pub default_volatility: f64,
    pub contract_multiplier: f64,
    pub market_data_url: String,
    pub market_data_key: Option<String>,
    pub leveraged_ticker: String,
    pub leveraged_expense_ratio: f64,
    pub leverage: f64,
}

impl HedgeConfig {
    pub fn from_env() -> HedgeResult<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> HedgeResult<Self> {
        let env = Env { lookup };

        let cfg = Self {
            monthly_budget: env.parse_or("HEDGE_MONTHLY_BUDGET", "500")?,
            roll_window_days: env.parse_or("HEDGE_ROLL_WINDOW_DAYS", "21")?,
            weights: parse_weights(&env.var_or("HEDGE_WEIGHTS", ""))?,
            target_moneyness: env.parse_or("HEDGE_TARGET_MONEYNESS", "0.90")?,
            moneyness_tolerance: env.parse_or("HEDGE_MONEYNESS_TOLERANCE", "0.05")?,
            min_dte: env.parse_or("HEDGE_MIN_DTE", "30")?,
            max_dte: env.parse_or("HEDGE_MAX_DTE", "120")?,
            target_dte: env.parse_or("HEDGE_TARGET_DTE", "60")?,
            data_timeout_secs: env.parse_or("MARKET_DATA_TIMEOUT_SECS", "8")?,
            store_dir: PathBuf::from(env.var_or("HEDGE_STORE_DIR", "data")),
            risk_free_rate: env.parse_or("RISK_FREE_RATE", "0.04")?,
            default_volatility: env.parse_or("DEFAULT_VOLATILITY", "0.25")?,
            contract_multiplier: env.parse_or("CONTRACT_MULTIPLIER", "100")?,
            market_data_url: env.var_or("MARKET_DATA_BASE_URL", "http://127.0.0.1:8080/v1"),
            market_data_key: (env.lookup)("MARKET_DATA_API_KEY").filter(|k| !k.is_empty()),
            leveraged_ticker: env.var_or("LEVERAGED_TICKER", "SQQQ"),
            leveraged_expense_ratio: env.parse_or("LEVERAGED_EXPENSE_RATIO", "0.0095")?,
            leverage: env.parse_or("LEVERAGE", "-3")?,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> HedgeResult<()> {
        let positive = [
            ("HEDGE_MONTHLY_BUDGET", self.monthly_budget),
            ("HEDGE_TARGET_MONEYNESS", self.target_moneyness),
            ("HEDGE_MONEYNESS_TOLERANCE", self.moneyness_tolerance),
            ("DEFAULT_VOLATILITY", self.default_volatility),
            ("CONTRACT_MULTIPLIER", self.contract_multiplier),
        ];
        for (key, v) in positive {
            if !v.is_finite() || v <= 0.0 {
                return Err(HedgeError::Config(format!("{key}: must be > 0 (got {v})")));
            }
        }
        if self.min_dte >= self.max_dte {
            return Err(HedgeError::Config(format!(
                "HEDGE_MIN_DTE ({}) must be below HEDGE_MAX_DTE ({})",
                self.min_dte, self.max_dte
            )));
        }
        if !(self.min_dte..=self.max_dte).contains(&self.target_dte) {
            return Err(HedgeError::Config(format!(
                "HEDGE_TARGET_DTE ({}) must lie in [{}, {}]",
                self.target_dte, self.min_dte, self.max_dte
            )));
        }
        if self.data_timeout_secs == 0 {
            return Err(HedgeError::Config("MARKET_DATA_TIMEOUT_SECS: must be > 0".into()));
        }
        if self.leverage == 0.0 || !self.leverage.is_finite() {
            return Err(HedgeError::Config(format!(
                "LEVERAGE: must be non-zero (got {})",
                self.leverage
            )));
        }
        if !self.leveraged_expense_ratio.is_finite() || self.leveraged_expense_ratio < 0.0 {
            return Err(HedgeError::Config(format!(
                "LEVERAGED_EXPENSE_RATIO: must be >= 0 (got {})",
                self.leveraged_expense_ratio
            )));
        }
        Ok(())
    }
}

struct Env<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> Env<F> {
    fn var_or(&self, key: &str, default: &str) -> String {
        (self.lookup)(key).unwrap_or_else(|| default.to_string())
    }

    fn parse_or<T>(&self, key: &str, default: &str) -> HedgeResult<T>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        self.var_or(key, default)
            .trim()
            .parse::<T>()
            .map_err(|e| HedgeError::Config(format!("{key}: {e}")))
    }
}

/// `"QQQ:0.6,SPY:0.4"` -> {QQQ: 0.6, SPY: 0.4}. Empty input means no weights.
pub fn parse_weights(raw: &str) -> HedgeResult<BTreeMap<String, f64>> {
    let mut weights = BTreeMap::new();
    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (ticker, weight) = entry.split_once(':').ok_or_else(|| {
            HedgeError::Config(format!("HEDGE_WEIGHTS: expected TICKER:WEIGHT, got {entry:?}"))
        })?;
        let ticker = ticker.trim().to_ascii_uppercase();
        if ticker.is_empty() {
            return Err(HedgeError::Config(format!("HEDGE_WEIGHTS: empty ticker in {entry:?}")));
        }
        let weight: f64 = weight
            .trim()
            .parse()
            .map_err(|e| HedgeError::Config(format!("HEDGE_WEIGHTS: {ticker}: {e}")))?;
        if !weight.is_finite() || weight <= 0.0 {
            return Err(HedgeError::Config(format!("HEDGE_WEIGHTS: {ticker} weight must be > 0")));
        }
        weights.insert(ticker, weight);
    }
    Ok(weights)
}
