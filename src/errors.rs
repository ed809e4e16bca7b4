/// Domain-specific error types for the hedge engine.
/// Only malformed input and plumbing failures are errors:
/// - Model limitations (intrinsic floor, no breakeven) are returned as values
/// - Market-data outages degrade to annotated stale / empty results
/// - Corrupt store files are logged and read as empty collections
#[derive(Debug, thiserror::Error)]
pub enum HedgeError {
    #[error("invalid input `{field}`: {reason}")]
    InvalidInput { field: &'static str, reason: String },

    #[error("external data unavailable: {0}")]
    ExternalUnavailable(String),

    #[error("corrupt persisted state in {path}: {reason}")]
    CorruptPersistedState { path: String, reason: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("io error: {0}")]
    Io(String),

    #[error("solver error: {0}")]
    Solver(String),

    #[error("config error: {0}")]
    Config(String),
}

impl HedgeError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        HedgeError::InvalidInput {
            field,
            reason: reason.into(),
        }
    }
}

impl From<reqwest::Error> for HedgeError {
    fn from(e: reqwest::Error) -> Self {
        HedgeError::Network(e.to_string())
    }
}

impl From<serde_json::Error> for HedgeError {
    fn from(e: serde_json::Error) -> Self {
        HedgeError::Parse(e.to_string())
    }
}

impl From<std::io::Error> for HedgeError {
    fn from(e: std::io::Error) -> Self {
        HedgeError::Io(e.to_string())
    }
}

pub type HedgeResult<T> = Result<T, HedgeError>;

/// Require a finite, strictly positive value.
pub(crate) fn ensure_positive(field: &'static str, value: f64) -> HedgeResult<f64> {
    if !value.is_finite() || value <= 0.0 {
        return Err(HedgeError::invalid(field, format!("must be > 0 (got {value})")));
    }
    Ok(value)
}

/// Require a finite value.
pub(crate) fn ensure_finite(field: &'static str, value: f64) -> HedgeResult<f64> {
    if !value.is_finite() {
        return Err(HedgeError::invalid(field, format!("must be finite (got {value})")));
    }
    Ok(value)
}
