//! Monitoring record model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use url::Url;
use uuid::Uuid;

use crate::monitor::{MonitorError, MonitorResult};

/// Reason stored on every record that never went Suspected -> Phishing.
pub const NOT_APPLICABLE: &str = "N/A";

/// Elapsed monitoring time is kept in fixed point so that repeated
/// fractional increments land exactly on the horizon.
pub const MILLIUNITS_PER_UNIT: i64 = 1000;

// ============================================================================
// STATE
// ============================================================================

/// Lifecycle state of a monitored domain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordState {
    /// Initial verdict only; never re-evaluated
    Legitimate,
    /// Watched by the scheduler until promotion or expiry
    Suspected,
    /// Classified or promoted as phishing
    Phishing,
    /// Monitoring horizon elapsed without a promotion
    Expired,
}

impl RecordState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordState::Legitimate => "Legitimate",
            RecordState::Suspected => "Suspected",
            RecordState::Phishing => "Phishing",
            RecordState::Expired => "Expired",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Legitimate" => Some(RecordState::Legitimate),
            "Suspected" => Some(RecordState::Suspected),
            "Phishing" => Some(RecordState::Phishing),
            "Expired" => Some(RecordState::Expired),
            _ => None,
        }
    }

    /// Only `Suspected` records keep evolving.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RecordState::Suspected)
    }
}

impl std::fmt::Display for RecordState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// RECORD
// ============================================================================

/// Critical sector entity a domain is suspected of impersonating
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetEntity {
    pub name: String,
    pub domain: String,
}

impl TargetEntity {
    pub fn new(name: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            domain: domain.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoringRecord {
    pub id: Uuid,
    pub domain: String,
    pub target_entity: TargetEntity,
    pub state: RecordState,
    /// Opaque classifier snapshot, replaced wholesale on reclassification
    pub evidence: serde_json::Value,
    pub elapsed_milliunits: i64,
    pub created_at: DateTime<Utc>,
    pub last_transition_at: DateTime<Utc>,
    pub reclassification_reason: String,
}

impl MonitoringRecord {
    /// Fresh record for a domain that was just classified.
    pub fn new(
        domain: String,
        target_entity: TargetEntity,
        state: RecordState,
        evidence: serde_json::Value,
    ) -> Self {
        let now = now_millis();
        Self {
            id: Uuid::new_v4(),
            domain,
            target_entity,
            state,
            evidence,
            elapsed_milliunits: 0,
            created_at: now,
            last_transition_at: now,
            reclassification_reason: NOT_APPLICABLE.to_string(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.state == RecordState::Suspected
    }

    pub fn elapsed_units(&self) -> f64 {
        self.elapsed_milliunits as f64 / MILLIUNITS_PER_UNIT as f64
    }
}

/// Current time truncated to the millisecond precision the store keeps.
pub fn now_millis() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}

/// Reduce user input (bare domain or full URL) to a lower-case host name.
pub fn normalize_domain(input: &str) -> MonitorResult<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(MonitorError::InvalidInput("domain must not be empty".to_string()));
    }

    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    };

    let url = Url::parse(&candidate)
        .map_err(|e| MonitorError::InvalidInput(format!("'{}' is not a domain: {}", trimmed, e)))?;

    let host = url
        .host_str()
        .map(|h| h.trim_end_matches('.').to_lowercase())
        .filter(|h| !h.is_empty())
        .ok_or_else(|| MonitorError::InvalidInput(format!("'{}' has no host", trimmed)))?;

    Ok(host)
}

// ============================================================================
// STORAGE ROW
// ============================================================================

/// Flat row layout of `monitoring_records`
#[derive(Debug, FromRow)]
pub struct RecordRow {
    pub id: String,
    pub domain: String,
    pub target_name: String,
    pub target_domain: String,
    pub state: String,
    pub evidence: String,
    pub elapsed_milliunits: i64,
    pub created_at_ms: i64,
    pub last_transition_at_ms: i64,
    pub reclassification_reason: String,
}

impl TryFrom<RecordRow> for MonitoringRecord {
    type Error = MonitorError;

    fn try_from(row: RecordRow) -> Result<Self, Self::Error> {
        let corrupt = |what: &str| {
            MonitorError::StoreUnavailable(format!("corrupt {} in record {}", what, row.id))
        };

        let id = Uuid::parse_str(&row.id).map_err(|_| corrupt("id"))?;
        let state = RecordState::parse(&row.state).ok_or_else(|| corrupt("state"))?;
        let evidence = serde_json::from_str(&row.evidence).map_err(|_| corrupt("evidence"))?;
        let created_at =
            DateTime::from_timestamp_millis(row.created_at_ms).ok_or_else(|| corrupt("created_at"))?;
        let last_transition_at = DateTime::from_timestamp_millis(row.last_transition_at_ms)
            .ok_or_else(|| corrupt("last_transition_at"))?;

        Ok(Self {
            id,
            domain: row.domain,
            target_entity: TargetEntity {
                name: row.target_name,
                domain: row.target_domain,
            },
            state,
            evidence,
            elapsed_milliunits: row.elapsed_milliunits,
            created_at,
            last_transition_at,
            reclassification_reason: row.reclassification_reason,
        })
    }
}
