//! Monitor error kinds

use thiserror::Error;
use uuid::Uuid;

pub type MonitorResult<T> = Result<T, MonitorError>;

/// Failures surfaced by the monitor engine, its store and its collaborators.
///
/// None of these ever stand in for a classification verdict: a failed or
/// timed-out classifier call is reported as `ClassificationUnavailable` and
/// the record it concerned is left exactly as it was persisted.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("classification unavailable for '{domain}': {reason}")]
    ClassificationUnavailable { domain: String, reason: String },

    #[error("record store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("record {id} already exists")]
    DuplicateRecord { id: Uuid },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("record {0} not found")]
    NotFound(Uuid),

    #[error("alert delivery failed: {0}")]
    AlertDelivery(String),
}

impl MonitorError {
    pub fn classification(domain: impl Into<String>, reason: impl ToString) -> Self {
        MonitorError::ClassificationUnavailable {
            domain: domain.into(),
            reason: reason.to_string(),
        }
    }

    /// True for failures that clear up on their own and are worth retrying
    /// on the next tick.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            MonitorError::ClassificationUnavailable { .. }
                | MonitorError::StoreUnavailable(_)
                | MonitorError::AlertDelivery(_)
        )
    }
}

impl From<sqlx::Error> for MonitorError {
    fn from(err: sqlx::Error) -> Self {
        MonitorError::StoreUnavailable(err.to_string())
    }
}

impl From<serde_json::Error> for MonitorError {
    fn from(err: serde_json::Error) -> Self {
        MonitorError::StoreUnavailable(format!("evidence encoding: {}", err))
    }
}
