use super::{ChainContract, DteWindow, MarketData};
use crate::errors::{HedgeError, HedgeResult};
use crate::state::OptionRight;
use chrono::NaiveDate;
use reqwest::Client;

/// REST quote / option-chain client. All methods return Result, never panic.
#[derive(Clone)]
pub struct QuoteApiClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

// Response formats:
// GET /quote?symbol=QQQ
//   { "symbol": "QQQ", "price": 498.12 }
// GET /options?symbol=QQQ&type=put&min_dte=30&max_dte=120
//   { "contracts": [ { "strike": 450, "expiry": "2026-12-18", "type": "put",
//                      "bid": 6.1, "ask": 6.4, "implied_volatility": 0.23 } ] }

#[derive(serde::Deserialize)]
struct QuoteResponse {
    #[allow(dead_code)]
    symbol: Option<String>,
    price: Option<f64>,
}

#[derive(serde::Deserialize)]
struct OptionsResponse {
    #[serde(default)]
    contracts: Vec<WireContract>,
}

#[derive(serde::Deserialize)]
struct WireContract {
    strike: Option<f64>,
    expiry: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    bid: Option<f64>,
    ask: Option<f64>,
    implied_volatility: Option<f64>,
}

impl WireContract {
    fn into_contract(self, fallback_right: OptionRight) -> Option<ChainContract> {
        let strike = self.strike.filter(|s| s.is_finite() && *s > 0.0)?;
        let expiry = NaiveDate::parse_from_str(self.expiry.as_deref()?, "%Y-%m-%d").ok()?;
        let right = match self.kind.as_deref() {
            Some(k) => k.parse().ok()?,
            None => fallback_right,
        };
        Some(ChainContract {
            strike,
            expiry,
            right,
            bid: self.bid,
            ask: self.ask,
            implied_vol: self.implied_volatility,
        })
    }
}

impl QuoteApiClient {
    pub fn new(base_url: &str, api_key: Option<String>) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(10))
                .pool_max_idle_per_host(4)
                .build()
                .unwrap_or_default(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> HedgeResult<T> {
        let url = format!("{}{}", self.base_url, path);
        let mut req = self.client.get(&url).query(query);
        if let Some(key) = &self.api_key {
            req = req.header("Authorization", format!("Bearer {key}"));
        }

        let resp = req
            .send()
            .await
            .map_err(|e| HedgeError::ExternalUnavailable(format!("GET {path}: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(HedgeError::ExternalUnavailable(format!(
                "GET {path}: HTTP {status}: {body}"
            )));
        }

        resp.json::<T>()
            .await
            .map_err(|e| HedgeError::Parse(format!("GET {path}: {e}")))
    }
}

impl MarketData for QuoteApiClient {
    fn name(&self) -> &'static str {
        "quote_api"
    }

    async fn get_spot(&self, ticker: &str) -> HedgeResult<f64> {
        let data: QuoteResponse = self
            .get_json("/quote", &[("symbol", ticker.to_string())])
            .await?;

        match data.price {
            Some(p) if p.is_finite() && p > 0.0 => Ok(p),
            other => Err(HedgeError::ExternalUnavailable(format!(
                "invalid spot for {ticker}: {other:?}"
            ))),
        }
    }

    async fn get_option_chain(
        &self,
        ticker: &str,
        window: DteWindow,
        right: OptionRight,
    ) -> HedgeResult<Vec<ChainContract>> {
        let data: OptionsResponse = self
            .get_json(
                "/options",
                &[
                    ("symbol", ticker.to_string()),
                    ("type", right.to_string()),
                    ("min_dte", window.min_days.to_string()),
                    ("max_dte", window.max_days.to_string()),
                ],
            )
            .await?;

        let total = data.contracts.len();
        let contracts: Vec<ChainContract> = data
            .contracts
            .into_iter()
            .filter_map(|c| c.into_contract(right))
            .filter(|c| c.right == right)
            .collect();

        if contracts.len() < total {
            tracing::debug!(
                ticker,
                dropped = total - contracts.len(),
                "malformed chain rows skipped"
            );
        }
        Ok(contracts)
    }
}
