//! Alert model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::record::{now_millis, MonitoringRecord};
use crate::monitor::MonitorError;

/// Persisted notice of one Suspected -> Phishing promotion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    pub id: Uuid,
    pub record_id: Uuid,
    pub domain: String,
    pub target_name: String,
    pub message: String,
    pub raised_at: DateTime<Utc>,
}

impl AlertRecord {
    pub fn for_promotion(record: &MonitoringRecord, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            record_id: record.id,
            domain: record.domain.clone(),
            target_name: record.target_entity.name.clone(),
            message: message.into(),
            raised_at: now_millis(),
        }
    }
}

#[derive(Debug, FromRow)]
pub struct AlertRow {
    pub id: String,
    pub record_id: String,
    pub domain: String,
    pub target_name: String,
    pub message: String,
    pub raised_at_ms: i64,
}

impl TryFrom<AlertRow> for AlertRecord {
    type Error = MonitorError;

    fn try_from(row: AlertRow) -> Result<Self, Self::Error> {
        let corrupt =
            |what: &str| MonitorError::StoreUnavailable(format!("corrupt {} in alert {}", what, row.id));

        Ok(Self {
            id: Uuid::parse_str(&row.id).map_err(|_| corrupt("id"))?,
            record_id: Uuid::parse_str(&row.record_id).map_err(|_| corrupt("record_id"))?,
            domain: row.domain,
            target_name: row.target_name,
            message: row.message,
            raised_at: DateTime::from_timestamp_millis(row.raised_at_ms)
                .ok_or_else(|| corrupt("raised_at"))?,
        })
    }
}
