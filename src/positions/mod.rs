pub mod roll;
pub mod store;

pub use roll::{RollManager, RollSettings};
pub use store::PositionStore;

use crate::errors::{ensure_positive, HedgeError, HedgeResult};
use crate::state::OptionRight;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Positions this close to expiry are flagged urgent.
pub const URGENT_DTE: i64 = 7;

// ── Holdings ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Instrument {
    Option {
        ticker: String,
        right: OptionRight,
        strike: f64,
        expiry: NaiveDate,
    },
    /// Daily-rebalanced fund, no expiry
    Leveraged { ticker: String },
}

impl Instrument {
    pub fn ticker(&self) -> &str {
        match self {
            Instrument::Option { ticker, .. } | Instrument::Leveraged { ticker } => ticker,
        }
    }

    pub fn expiry(&self) -> Option<NaiveDate> {
        match self {
            Instrument::Option { expiry, .. } => Some(*expiry),
            Instrument::Leveraged { .. } => None,
        }
    }

    pub fn right(&self) -> Option<OptionRight> {
        match self {
            Instrument::Option { right, .. } => Some(*right),
            Instrument::Leveraged { .. } => None,
        }
    }

    fn validate(&self) -> HedgeResult<()> {
        if self.ticker().trim().is_empty() {
            return Err(HedgeError::invalid("ticker", "must not be empty"));
        }
        if let Instrument::Option { strike, .. } = self {
            ensure_positive("strike", *strike)?;
        }
        Ok(())
    }
}

impl std::fmt::Display for Instrument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Instrument::Option {
                ticker,
                right,
                strike,
                expiry,
            } => write!(f, "{ticker} {expiry} {strike} {right}"),
            Instrument::Leveraged { ticker } => write!(f, "{ticker} (leveraged)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HedgePosition {
    pub id: String,
    pub instrument: Instrument,
    pub quantity: f64,
    /// Total cost paid to open
    pub cost_basis: f64,
    pub entry_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl HedgePosition {
    pub fn open(spec: NewPositionSpec, quantity: f64) -> HedgeResult<Self> {
        spec.instrument.validate()?;
        ensure_positive("quantity", quantity)?;
        if !spec.cost_basis.is_finite() || spec.cost_basis < 0.0 {
            return Err(HedgeError::invalid(
                "cost_basis",
                format!("must be >= 0 (got {})", spec.cost_basis),
            ));
        }
        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            instrument: spec.instrument,
            quantity,
            cost_basis: spec.cost_basis,
            entry_date: spec.entry_date,
            note: spec.note,
        })
    }

    /// Calendar days to expiry; None for instruments that never expire.
    pub fn days_to_expiry(&self, today: NaiveDate) -> Option<i64> {
        self.instrument.expiry().map(|e| (e - today).num_days())
    }
}

/// Everything needed to open a position except its quantity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPositionSpec {
    pub instrument: Instrument,
    pub cost_basis: f64,
    pub entry_date: NaiveDate,
    #[serde(default)]
    pub note: Option<String>,
}

// ── History ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchiveReason {
    Expired,
    Rolled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchivedPosition {
    pub position: HedgePosition,
    pub reason: ArchiveReason,
    pub archived_on: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollRecord {
    pub id: String,
    pub date: NaiveDate,
    pub closed: HedgePosition,
    pub new_position_id: String,
    #[serde(default)]
    pub close_price: Option<f64>,
    pub opening_cost: f64,
}

/// Contents of the roll-history file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RollHistory {
    #[serde(default)]
    pub archived: Vec<ArchivedPosition>,
    #[serde(default)]
    pub rolls: Vec<RollRecord>,
}

// ── Lifecycle ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionState {
    Active,
    NearRollWindow,
    Archived,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Ok,
    RollSoon,
    Urgent,
}

/// Map days-to-expiry onto the lifecycle state and its urgency.
pub fn classify(days_to_expiry: Option<i64>, roll_window_days: u32) -> (PositionState, Urgency) {
    match days_to_expiry {
        None => (PositionState::Active, Urgency::Ok),
        Some(d) if d <= 0 => (PositionState::Archived, Urgency::Urgent),
        Some(d) if d <= URGENT_DTE => (PositionState::NearRollWindow, Urgency::Urgent),
        Some(d) if d <= roll_window_days as i64 => {
            (PositionState::NearRollWindow, Urgency::RollSoon)
        }
        Some(_) => (PositionState::Active, Urgency::Ok),
    }
}
