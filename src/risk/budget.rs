use crate::errors::{ensure_positive, HedgeError, HedgeResult};
use serde::Serialize;
use std::collections::BTreeMap;

/// Monthly hedge spend for one underlying.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetAllocation {
    pub ticker: String,
    /// Normalized weight in [0, 1]
    pub weight: f64,
    pub amount: f64,
}

/// Splits the monthly budget across underlyings by configured weight.
/// Weights need not sum to 1; they are normalized. An empty weight map
/// gives every ticker the full budget.
#[derive(Debug, Clone, Copy)]
pub struct BudgetAllocator<'a> {
    monthly_budget: f64,
    weights: &'a BTreeMap<String, f64>,
}

impl<'a> BudgetAllocator<'a> {
    pub fn new(monthly_budget: f64, weights: &'a BTreeMap<String, f64>) -> HedgeResult<Self> {
        ensure_positive("monthly_budget", monthly_budget)?;
        if let Some((ticker, w)) = weights.iter().find(|(_, w)| !w.is_finite() || **w < 0.0) {
            return Err(HedgeError::invalid(
                "weights",
                format!("weight for {ticker} must be >= 0 (got {w})"),
            ));
        }
        Ok(Self {
            monthly_budget,
            weights,
        })
    }

    fn total_weight(&self) -> f64 {
        self.weights.values().sum()
    }

    pub fn allocation_for(&self, ticker: &str) -> BudgetAllocation {
        let total = self.total_weight();
        let weight = if self.weights.is_empty() {
            1.0
        } else if total > 0.0 {
            self.weights.get(ticker).copied().unwrap_or(0.0) / total
        } else {
            0.0
        };
        BudgetAllocation {
            ticker: ticker.to_string(),
            weight,
            amount: self.monthly_budget * weight,
        }
    }

    pub fn allocations(&self) -> Vec<BudgetAllocation> {
        self.weights.keys().map(|t| self.allocation_for(t)).collect()
    }
}

/// Whole contracts purchasable with `amount` at a per-share premium.
pub fn affordable_contracts(amount: f64, premium_per_share: f64, multiplier: f64) -> u32 {
    let per_contract = premium_per_share * multiplier;
    if per_contract.is_nan() || per_contract <= 0.0 || !amount.is_finite() || amount <= 0.0 {
        return 0;
    }
    (amount / per_contract).floor().min(u32::MAX as f64) as u32
}

/// Contracts for a comparison leg that must stay within `capital`.
/// Fails, naming `capital`, when not even one contract fits.
pub fn contracts_within_capital(
    capital: f64,
    premium_per_share: f64,
    multiplier: f64,
) -> HedgeResult<u32> {
    ensure_positive("capital", capital)?;
    match affordable_contracts(capital, premium_per_share, multiplier) {
        0 => Err(HedgeError::invalid(
            "capital",
            format!(
                "{capital:.2} cannot buy one contract at {:.2} per contract",
                premium_per_share * multiplier
            ),
        )),
        n => Ok(n),
    }
}
