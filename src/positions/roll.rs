use super::store::{CachedChain, ChainCache, PositionStore};
use super::{
    classify, ArchiveReason, ArchivedPosition, HedgePosition, Instrument, NewPositionSpec,
    PositionState, RollRecord, Urgency,
};
use crate::config::HedgeConfig;
use crate::errors::{HedgeError, HedgeResult};
use crate::feeds::{ChainContract, DteWindow, MarketData};
use crate::models::early_exercise::EarlyExercise;
use crate::risk::budget::{affordable_contracts, BudgetAllocation, BudgetAllocator};
use crate::state::{OptionRight, OptionSpec};
use chrono::{DateTime, NaiveDate, Utc};
use futures_util::future::join_all;
use serde::Serialize;
use smallvec::SmallVec;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

const MAX_CANDIDATES: usize = 3;

/// Roll parameters, normally taken from `HedgeConfig`.
#[derive(Debug, Clone)]
pub struct RollSettings {
    pub roll_window_days: u32,
    pub target_moneyness: f64,
    pub moneyness_tolerance: f64,
    pub dte_window: DteWindow,
    pub target_dte: u32,
    pub data_timeout: Duration,
    pub risk_free_rate: f64,
    pub default_volatility: f64,
    pub contract_multiplier: f64,
    pub monthly_budget: f64,
    pub weights: BTreeMap<String, f64>,
}

impl RollSettings {
    pub fn from_config(cfg: &HedgeConfig) -> Self {
        Self {
            roll_window_days: cfg.roll_window_days,
            target_moneyness: cfg.target_moneyness,
            moneyness_tolerance: cfg.moneyness_tolerance,
            dte_window: DteWindow {
                min_days: cfg.min_dte,
                max_days: cfg.max_dte,
            },
            target_dte: cfg.target_dte,
            data_timeout: Duration::from_secs(cfg.data_timeout_secs),
            risk_free_rate: cfg.risk_free_rate,
            default_volatility: cfg.default_volatility,
            contract_multiplier: cfg.contract_multiplier,
            monthly_budget: cfg.monthly_budget,
            weights: cfg.weights.clone(),
        }
    }
}

// ── Reports ──

#[derive(Debug, Clone, Serialize)]
pub struct PositionView {
    pub position: HedgePosition,
    pub days_to_expiry: Option<i64>,
    pub state: PositionState,
    pub urgency: Urgency,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub as_of: NaiveDate,
    pub active: Vec<PositionView>,
    /// Positions archived by this call
    pub newly_archived: Vec<ArchivedPosition>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DataQuality {
    Live,
    /// Fetch failed; served from the last good snapshot
    Stale,
    Unavailable,
}

#[derive(Debug, Clone, Serialize)]
pub struct RollCandidate {
    pub strike: f64,
    pub expiry: NaiveDate,
    pub days_to_expiry: i64,
    pub bid: f64,
    pub ask: f64,
    pub mid: f64,
    pub moneyness: f64,
    /// Lower is closer to target
    pub score: f64,
    pub model_price: f64,
    pub model_volatility: f64,
    pub intrinsic_floor_applied: bool,
    pub affordable_contracts: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct RollSuggestion {
    pub position: PositionView,
    pub status: &'static str,
    pub data: DataQuality,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_as_of: Option<DateTime<Utc>>,
    pub spot: Option<f64>,
    pub budget: BudgetAllocation,
    pub candidates: SmallVec<[RollCandidate; MAX_CANDIDATES]>,
    pub no_candidates: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

// ── Chain snapshots ──

type ChainKey = (String, OptionRight);

fn cache_key((ticker, right): &ChainKey) -> String {
    format!("{ticker}:{right}")
}

struct FetchOutcome {
    snapshot: Option<CachedChain>,
    quality: DataQuality,
    error: Option<String>,
}

/// Drives position lifecycle against a market-data source and a store.
pub struct RollManager<M: MarketData> {
    market: M,
    store: PositionStore,
    settings: RollSettings,
    pricer: EarlyExercise,
    /// Last good chain per key; loaded from and mirrored to the store
    cache: Mutex<ChainCache>,
}

impl<M: MarketData> RollManager<M> {
    pub fn new(market: M, store: PositionStore, settings: RollSettings) -> Self {
        let cache = Mutex::new(store.load_chain_cache());
        Self {
            market,
            store,
            settings,
            pricer: EarlyExercise::default(),
            cache,
        }
    }

    fn cache(&self) -> MutexGuard<'_, ChainCache> {
        self.cache.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("chain cache lock poisoned, continuing with its last contents");
            poisoned.into_inner()
        })
    }

    fn remember(&self, key: &ChainKey, snapshot: &CachedChain) {
        let persisted = {
            let mut cache = self.cache();
            cache.insert(cache_key(key), snapshot.clone());
            cache.clone()
        };
        if let Err(e) = self.store.save_chain_cache(&persisted) {
            tracing::warn!(error = %e, "could not persist chain cache");
        }
    }

    pub fn store(&self) -> &PositionStore {
        &self.store
    }

    fn view(&self, position: HedgePosition, today: NaiveDate) -> PositionView {
        let days_to_expiry = position.days_to_expiry(today);
        let (state, urgency) = classify(days_to_expiry, self.settings.roll_window_days);
        PositionView {
            position,
            days_to_expiry,
            state,
            urgency,
        }
    }

    /// Recompute DTE for every held position, archiving any that have expired.
    pub fn get_status(&self, today: NaiveDate) -> HedgeResult<StatusReport> {
        let positions = self.store.load_positions();
        let (expired, live): (Vec<_>, Vec<_>) = positions
            .into_iter()
            .partition(|p| p.days_to_expiry(today).is_some_and(|d| d <= 0));

        let newly_archived: Vec<ArchivedPosition> = expired
            .into_iter()
            .map(|position| ArchivedPosition {
                position,
                reason: ArchiveReason::Expired,
                archived_on: today,
            })
            .collect();

        if !newly_archived.is_empty() {
            let mut history = self.store.load_history();
            history.archived.extend(newly_archived.iter().cloned());
            // History first: a crash between the writes duplicates, never loses
            self.store.save_history(&history)?;
            self.store.save_positions(&live)?;
            for a in &newly_archived {
                tracing::info!(
                    id = %a.position.id,
                    instrument = %a.position.instrument,
                    "position expired and archived"
                );
            }
        }

        let active = live.into_iter().map(|p| self.view(p, today)).collect();
        Ok(StatusReport {
            as_of: today,
            active,
            newly_archived,
        })
    }

    async fn fetch_snapshot(&self, key: &ChainKey) -> FetchOutcome {
        let (ticker, right) = key;
        let fetch = async {
            let spot = self.market.get_spot(ticker).await?;
            let contracts = self
                .market
                .get_option_chain(ticker, self.settings.dte_window, *right)
                .await?;
            Ok::<_, HedgeError>(CachedChain {
                spot,
                contracts,
                fetched_at: Utc::now(),
            })
        };

        let error = match tokio::time::timeout(self.settings.data_timeout, fetch).await {
            Ok(Ok(snapshot)) => {
                self.remember(key, &snapshot);
                return FetchOutcome {
                    snapshot: Some(snapshot),
                    quality: DataQuality::Live,
                    error: None,
                };
            }
            Ok(Err(e)) => e,
            Err(_) => HedgeError::ExternalUnavailable(format!(
                "{} timed out after {:?}",
                self.market.name(),
                self.settings.data_timeout
            )),
        };

        let cached = self.cache().get(&cache_key(key)).cloned();
        tracing::warn!(
            ticker = %ticker,
            source = self.market.name(),
            error = %error,
            cached = cached.is_some(),
            "option chain fetch failed"
        );
        FetchOutcome {
            quality: if cached.is_some() {
                DataQuality::Stale
            } else {
                DataQuality::Unavailable
            },
            snapshot: cached,
            error: Some(error.to_string()),
        }
    }

    /// Rank up to three replacement contracts for every position inside the
    /// roll window. Positions are reported even when no candidate is found.
    pub async fn suggest_rolls(&self, today: NaiveDate) -> HedgeResult<Vec<RollSuggestion>> {
        let status = self.get_status(today)?;
        let due: Vec<PositionView> = status
            .active
            .into_iter()
            .filter(|v| v.state == PositionState::NearRollWindow)
            .collect();

        let mut keys: Vec<ChainKey> = Vec::new();
        for v in &due {
            if let Some(right) = v.position.instrument.right() {
                let key = (v.position.instrument.ticker().to_string(), right);
                if !keys.contains(&key) {
                    keys.push(key);
                }
            }
        }

        let outcomes = join_all(keys.iter().map(|k| self.fetch_snapshot(k))).await;
        let snapshots: HashMap<&ChainKey, FetchOutcome> = keys.iter().zip(outcomes).collect();

        let allocator = BudgetAllocator::new(self.settings.monthly_budget, &self.settings.weights)?;

        let mut suggestions = Vec::with_capacity(due.len());
        for view in due {
            let ticker = view.position.instrument.ticker().to_string();
            let budget = allocator.allocation_for(&ticker);
            let outcome = view
                .position
                .instrument
                .right()
                .and_then(|r| snapshots.get(&(ticker.clone(), r)));

            let (candidates, spot, data, data_as_of, error) = match outcome {
                Some(FetchOutcome {
                    snapshot: Some(snap),
                    quality,
                    error,
                }) => (
                    self.rank_candidates(snap, &view.position.instrument, &budget, today),
                    Some(snap.spot),
                    *quality,
                    Some(snap.fetched_at),
                    error.clone(),
                ),
                Some(FetchOutcome { quality, error, .. }) => {
                    (SmallVec::new(), None, *quality, None, error.clone())
                }
                None => (SmallVec::new(), None, DataQuality::Unavailable, None, None),
            };

            let no_candidates = candidates.is_empty();
            let note = match (no_candidates, data, error) {
                (true, _, Some(e)) => Some(format!("no candidates: {e}")),
                (true, _, None) => Some("no quoted contracts inside the target window".to_string()),
                (false, DataQuality::Stale, Some(e)) => Some(format!("stale chain: {e}")),
                _ => None,
            };

            tracing::info!(
                id = %view.position.id,
                ticker = %ticker,
                urgency = ?view.urgency,
                candidates = candidates.len(),
                data = ?data,
                "roll suggestion"
            );

            suggestions.push(RollSuggestion {
                position: view,
                status: "roll_needed",
                data,
                data_as_of,
                spot,
                budget,
                candidates,
                no_candidates,
                note,
            });
        }
        Ok(suggestions)
    }

    /// Score = |moneyness - target| / tolerance + |dte - target_dte| / window span.
    fn rank_candidates(
        &self,
        snap: &CachedChain,
        held: &Instrument,
        budget: &BudgetAllocation,
        today: NaiveDate,
    ) -> SmallVec<[RollCandidate; MAX_CANDIDATES]> {
        let s = &self.settings;
        let Some(right) = held.right() else {
            return SmallVec::new();
        };

        let mut scored: Vec<(f64, &ChainContract, (f64, f64), i64)> = snap
            .contracts
            .iter()
            .filter(|c| c.right == right)
            .filter_map(|c| {
                let quote = c.quote()?;
                let dte = c.days_to_expiry(today);
                if !s.dte_window.contains(dte) {
                    return None;
                }
                let moneyness = c.strike / snap.spot;
                let score = (moneyness - s.target_moneyness).abs() / s.moneyness_tolerance
                    + (dte - s.target_dte as i64).abs() as f64 / s.dte_window.span();
                Some((score, c, quote, dte))
            })
            .collect();
        scored.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut out = SmallVec::new();
        for (score, c, (bid, ask), dte) in scored {
            if out.len() == MAX_CANDIDATES {
                break;
            }
            let vol = c.usable_vol().unwrap_or(s.default_volatility);
            let years = dte as f64 / 365.0;
            let spec = OptionSpec::new(snap.spot, c.strike, years, vol, s.risk_free_rate, right);
            let priced = match self.pricer.price_adjustable(&spec) {
                Ok(p) => p,
                Err(e) => {
                    tracing::debug!(strike = c.strike, error = %e, "candidate skipped");
                    continue;
                }
            };
            let mid = 0.5 * (bid + ask);
            out.push(RollCandidate {
                strike: c.strike,
                expiry: c.expiry,
                days_to_expiry: dte,
                bid,
                ask,
                mid,
                moneyness: c.strike / snap.spot,
                score,
                model_price: priced.price,
                model_volatility: vol,
                intrinsic_floor_applied: priced.is_floored(),
                affordable_contracts: affordable_contracts(
                    budget.amount,
                    ask,
                    s.contract_multiplier,
                ),
            });
        }
        out
    }

    /// Close `old_id` into history and open its replacement with the same quantity.
    pub fn log_roll(
        &self,
        old_id: &str,
        new_spec: NewPositionSpec,
        close_price: Option<f64>,
        today: NaiveDate,
    ) -> HedgeResult<RollRecord> {
        if let Some(p) = close_price {
            if !p.is_finite() || p < 0.0 {
                return Err(HedgeError::invalid("close_price", format!("must be >= 0 (got {p})")));
            }
        }

        let mut positions = self.store.load_positions();
        let idx = positions
            .iter()
            .position(|p| p.id == old_id)
            .ok_or_else(|| {
                HedgeError::invalid("old_id", format!("no active position with id {old_id}"))
            })?;

        let opened = HedgePosition::open(new_spec, positions[idx].quantity)?;
        let closed = positions.remove(idx);

        let record = RollRecord {
            id: uuid::Uuid::new_v4().to_string(),
            date: today,
            closed: closed.clone(),
            new_position_id: opened.id.clone(),
            close_price,
            opening_cost: opened.cost_basis,
        };

        let mut history = self.store.load_history();
        history.archived.push(ArchivedPosition {
            position: closed,
            reason: ArchiveReason::Rolled,
            archived_on: today,
        });
        history.rolls.push(record.clone());
        positions.push(opened);

        self.store.save_history(&history)?;
        self.store.save_positions(&positions)?;

        tracing::info!(
            old = %record.closed.id,
            new = %record.new_position_id,
            instrument = %record.closed.instrument,
            "roll logged"
        );
        Ok(record)
    }

    /// Manual entry of a new active position.
    pub fn add_position(&self, spec: NewPositionSpec, quantity: f64) -> HedgeResult<HedgePosition> {
        let position = HedgePosition::open(spec, quantity)?;
        let mut positions = self.store.load_positions();
        positions.push(position.clone());
        self.store.save_positions(&positions)?;
        tracing::info!(id = %position.id, instrument = %position.instrument, "position added");
        Ok(position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct FakeMarket {
        spot: f64,
        contracts: Vec<ChainContract>,
        fail: AtomicBool,
        delay: Option<Duration>,
        calls: AtomicUsize,
    }

    impl FakeMarket {
        fn new(contracts: Vec<ChainContract>) -> Self {
            Self {
                spot: 500.0,
                contracts,
                fail: AtomicBool::new(false),
                delay: None,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl MarketData for FakeMarket {
        fn name(&self) -> &'static str {
            "fake"
        }

        async fn get_spot(&self, _ticker: &str) -> HedgeResult<f64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(d) = self.delay {
                tokio::time::sleep(d).await;
            }
            if self.fail.load(Ordering::SeqCst) {
                return Err(HedgeError::ExternalUnavailable("provider down".into()));
            }
            Ok(self.spot)
        }

        async fn get_option_chain(
            &self,
            _ticker: &str,
            _window: DteWindow,
            _right: OptionRight,
        ) -> HedgeResult<Vec<ChainContract>> {
            Ok(self.contracts.clone())
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()
    }

    fn settings() -> RollSettings {
        RollSettings {
            roll_window_days: 21,
            target_moneyness: 0.90,
            moneyness_tolerance: 0.05,
            dte_window: DteWindow {
                min_days: 30,
                max_days: 120,
            },
            target_dte: 60,
            data_timeout: Duration::from_millis(200),
            risk_free_rate: 0.04,
            default_volatility: 0.25,
            contract_multiplier: 100.0,
            monthly_budget: 1_000.0,
            weights: BTreeMap::new(),
        }
    }

    fn put(strike: f64, days_out: i64, bid: Option<f64>, ask: Option<f64>) -> ChainContract {
        ChainContract {
            strike,
            expiry: today() + chrono::Duration::days(days_out),
            right: OptionRight::Put,
            bid,
            ask,
            implied_vol: Some(0.24),
        }
    }

    fn chain() -> Vec<ChainContract> {
        vec![
            put(450.0, 60, Some(6.0), Some(6.4)),
            put(440.0, 62, Some(5.0), Some(5.3)),
            put(475.0, 90, Some(11.0), Some(11.6)),
            put(400.0, 35, Some(1.0), Some(1.2)),
            put(450.0, 61, None, Some(6.4)),
            put(450.0, 59, Some(f64::NAN), Some(6.4)),
            put(450.0, 200, Some(9.0), Some(9.5)),
        ]
    }

    fn option_spec(days_out: i64) -> NewPositionSpec {
        NewPositionSpec {
            instrument: Instrument::Option {
                ticker: "QQQ".into(),
                right: OptionRight::Put,
                strike: 440.0,
                expiry: today() + chrono::Duration::days(days_out),
            },
            cost_basis: 600.0,
            entry_date: today() - chrono::Duration::days(40),
            note: None,
        }
    }

    fn manager(market: FakeMarket) -> (tempfile::TempDir, RollManager<FakeMarket>) {
        let dir = tempfile::tempdir().unwrap();
        let store = PositionStore::open(dir.path()).unwrap();
        (dir, RollManager::new(market, store, settings()))
    }

    #[test]
    fn test_expired_position_archived_on_status() {
        let (_dir, mgr) = manager(FakeMarket::new(chain()));
        let expiring = mgr.add_position(option_spec(0), 2.0).unwrap();
        let live = mgr.add_position(option_spec(45), 1.0).unwrap();
        mgr.add_position(
            NewPositionSpec {
                instrument: Instrument::Leveraged { ticker: "SQQQ".into() },
                ..option_spec(0)
            },
            50.0,
        )
        .unwrap();

        let report = mgr.get_status(today()).unwrap();
        assert_eq!(report.newly_archived.len(), 1);
        assert_eq!(report.newly_archived[0].position.id, expiring.id);
        assert_eq!(report.newly_archived[0].reason, ArchiveReason::Expired);
        assert_eq!(report.active.len(), 2);
        assert!(report.active.iter().all(|v| v.position.id != expiring.id));
        assert!(report.active.iter().any(|v| v.position.id == live.id));

        // Persisted: a second call archives nothing new
        let again = mgr.get_status(today()).unwrap();
        assert!(again.newly_archived.is_empty());
        assert_eq!(mgr.store().load_history().archived.len(), 1);
    }

    #[test]
    fn test_status_urgency() {
        let (_dir, mgr) = manager(FakeMarket::new(chain()));
        mgr.add_position(option_spec(5), 1.0).unwrap();
        mgr.add_position(option_spec(15), 1.0).unwrap();
        mgr.add_position(option_spec(45), 1.0).unwrap();

        let mut urgencies: Vec<Urgency> = mgr
            .get_status(today())
            .unwrap()
            .active
            .iter()
            .map(|v| v.urgency)
            .collect();
        urgencies.sort();
        assert_eq!(urgencies, vec![Urgency::Ok, Urgency::RollSoon, Urgency::Urgent]);
    }

    #[tokio::test]
    async fn test_suggestions_ranked_and_filtered() {
        let (_dir, mgr) = manager(FakeMarket::new(chain()));
        mgr.add_position(option_spec(10), 1.0).unwrap();
        mgr.add_position(option_spec(90), 1.0).unwrap();

        let out = mgr.suggest_rolls(today()).await.unwrap();
        assert_eq!(out.len(), 1, "only the in-window position is suggested");
        let s = &out[0];
        assert_eq!(s.data, DataQuality::Live);
        assert!(!s.no_candidates);
        assert_eq!(s.candidates.len(), 3);
        // 450 / 500 = 0.90 at 60 days is the exact target
        assert_eq!(s.candidates[0].strike, 450.0);
        assert_eq!(s.candidates[0].days_to_expiry, 60);
        assert!(s.candidates.windows(2).all(|w| w[0].score <= w[1].score));
        assert!(s.candidates.iter().all(|c| c.bid > 0.0 && c.days_to_expiry <= 120));
        for c in &s.candidates {
            assert!(c.model_price >= (c.strike - 500.0).max(0.0));
            assert_eq!(c.affordable_contracts, (1_000.0 / (c.ask * 100.0)).floor() as u32);
        }
    }

    #[tokio::test]
    async fn test_no_quotes_keeps_position() {
        let (_dir, mgr) = manager(FakeMarket::new(vec![put(450.0, 60, None, None)]));
        mgr.add_position(option_spec(10), 1.0).unwrap();

        let out = mgr.suggest_rolls(today()).await.unwrap();
        assert_eq!(out.len(), 1);
        assert!(out[0].no_candidates);
        assert_eq!(out[0].status, "roll_needed");
        assert!(out[0].note.is_some());
    }

    #[tokio::test]
    async fn test_failure_uses_cached_chain() {
        let (_dir, mgr) = manager(FakeMarket::new(chain()));
        mgr.add_position(option_spec(10), 1.0).unwrap();

        let first = mgr.suggest_rolls(today()).await.unwrap();
        assert_eq!(first[0].data, DataQuality::Live);

        mgr.market.fail.store(true, Ordering::SeqCst);
        let second = mgr.suggest_rolls(today()).await.unwrap();
        assert_eq!(second[0].data, DataQuality::Stale);
        assert_eq!(second[0].candidates.len(), 3);
        assert!(second[0].note.as_deref().unwrap_or("").contains("stale"));
    }

    #[tokio::test]
    async fn test_stale_chain_survives_restart() {
        let (dir, mgr) = manager(FakeMarket::new(chain()));
        mgr.add_position(option_spec(10), 1.0).unwrap();
        assert_eq!(mgr.suggest_rolls(today()).await.unwrap()[0].data, DataQuality::Live);
        drop(mgr);

        let down = FakeMarket::new(chain());
        down.fail.store(true, Ordering::SeqCst);
        let store = PositionStore::open(dir.path()).unwrap();
        let restarted = RollManager::new(down, store, settings());

        let out = restarted.suggest_rolls(today()).await.unwrap();
        assert_eq!(out[0].data, DataQuality::Stale);
        assert_eq!(out[0].candidates.len(), 3);
        assert!(out[0].data_as_of.is_some());
    }

    #[tokio::test]
    async fn test_poisoned_cache_still_serves() {
        let (_dir, mgr) = manager(FakeMarket::new(chain()));
        mgr.add_position(option_spec(10), 1.0).unwrap();
        mgr.suggest_rolls(today()).await.unwrap();

        std::thread::scope(|s| {
            let handle = s.spawn(|| {
                let _guard = mgr.cache.lock().unwrap();
                panic!("writer died holding the cache");
            });
            assert!(handle.join().is_err());
        });
        assert!(mgr.cache.is_poisoned());

        mgr.market.fail.store(true, Ordering::SeqCst);
        let out = mgr.suggest_rolls(today()).await.unwrap();
        assert_eq!(out[0].data, DataQuality::Stale);
        assert!(!out[0].no_candidates);
    }

    #[tokio::test]
    async fn test_timeout_without_cache_reports_unavailable() {
        let mut market = FakeMarket::new(chain());
        market.delay = Some(Duration::from_secs(5));
        let (_dir, mgr) = manager(market);
        mgr.add_position(option_spec(10), 1.0).unwrap();
        mgr.add_position(option_spec(12), 1.0).unwrap();

        let out = mgr.suggest_rolls(today()).await.unwrap();
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|s| s.no_candidates && s.data == DataQuality::Unavailable));
        // Same ticker and right share a single fetch
        assert_eq!(mgr.market.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_log_roll_inherits_quantity() {
        let (_dir, mgr) = manager(FakeMarket::new(chain()));
        let old = mgr.add_position(option_spec(10), 3.0).unwrap();

        let record = mgr.log_roll(&old.id, option_spec(60), Some(4.5), today()).unwrap();
        assert_eq!(record.closed.id, old.id);

        let positions = mgr.store().load_positions();
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].id, record.new_position_id);
        assert_eq!(positions[0].quantity, 3.0);

        let history = mgr.store().load_history();
        assert_eq!(history.rolls, vec![record]);
        assert_eq!(history.archived[0].reason, ArchiveReason::Rolled);

        assert!(mgr.log_roll("missing", option_spec(60), None, today()).is_err());
        assert!(mgr.log_roll(&positions[0].id, option_spec(60), Some(-1.0), today()).is_err());
    }
}
