pub mod quote_api;

pub use quote_api::QuoteApiClient;

use crate::errors::HedgeResult;
use crate::state::OptionRight;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Calendar-day expiry window for chain requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DteWindow {
    pub min_days: u32,
    pub max_days: u32,
}

impl DteWindow {
    pub fn contains(&self, dte: i64) -> bool {
        dte >= self.min_days as i64 && dte <= self.max_days as i64
    }

    pub fn span(&self) -> f64 {
        (self.max_days.saturating_sub(self.min_days)).max(1) as f64
    }
}

/// One listed contract from a chain snapshot. Quote fields are optional:
/// providers routinely return null or zero bids for illiquid strikes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainContract {
    pub strike: f64,
    pub expiry: NaiveDate,
    pub right: OptionRight,
    #[serde(default)]
    pub bid: Option<f64>,
    #[serde(default)]
    pub ask: Option<f64>,
    #[serde(default)]
    pub implied_vol: Option<f64>,
}

impl ChainContract {
    /// Two-sided, positive, uncrossed quote or nothing.
    pub fn quote(&self) -> Option<(f64, f64)> {
        let bid = self.bid.filter(|b| b.is_finite() && *b > 0.0)?;
        let ask = self.ask.filter(|a| a.is_finite() && *a > 0.0)?;
        if ask < bid || !self.strike.is_finite() || self.strike <= 0.0 {
            return None;
        }
        Some((bid, ask))
    }

    pub fn mid(&self) -> Option<f64> {
        self.quote().map(|(b, a)| 0.5 * (b + a))
    }

    pub fn usable_vol(&self) -> Option<f64> {
        self.implied_vol.filter(|v| v.is_finite() && *v > 0.0)
    }

    pub fn days_to_expiry(&self, today: NaiveDate) -> i64 {
        (self.expiry - today).num_days()
    }
}

/// External market-data collaborator.
#[allow(async_fn_in_trait)]
pub trait MarketData: Send + Sync {
    fn name(&self) -> &'static str;

    async fn get_spot(&self, ticker: &str) -> HedgeResult<f64>;

    async fn get_option_chain(
        &self,
        ticker: &str,
        window: DteWindow,
        right: OptionRight,
    ) -> HedgeResult<Vec<ChainContract>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contract(bid: Option<f64>, ask: Option<f64>) -> ChainContract {
        ChainContract {
            strike: 450.0,
            expiry: NaiveDate::from_ymd_opt(2026, 12, 18).unwrap(),
            right: OptionRight::Put,
            bid,
            ask,
            implied_vol: Some(0.24),
        }
    }

    #[test]
    fn test_quote_filter() {
        assert_eq!(contract(Some(2.0), Some(2.4)).mid(), Some(2.2));
        assert!(contract(None, Some(2.4)).quote().is_none());
        assert!(contract(Some(f64::NAN), Some(2.4)).quote().is_none());
        assert!(contract(Some(0.0), Some(2.4)).quote().is_none());
        assert!(contract(Some(2.5), Some(2.4)).quote().is_none(), "crossed");
    }

    #[test]
    fn test_window_and_dte() {
        let w = DteWindow { min_days: 30, max_days: 120 };
        let c = contract(Some(1.0), Some(1.1));
        let today = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();
        assert_eq!(c.days_to_expiry(today), 61);
        assert!(w.contains(61));
        assert!(!w.contains(121));
        assert_eq!(w.span(), 90.0);
    }

    #[test]
    fn test_contract_json_tolerates_nulls() {
        let c: ChainContract = serde_json::from_str(
            r#"{"strike":400,"expiry":"2026-12-18","right":"put","bid":null}"#,
        )
        .unwrap();
        assert!(c.quote().is_none());
        assert!(c.usable_vol().is_none());
    }
}
