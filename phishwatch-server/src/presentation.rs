//! Read-only projection of monitoring records for display

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::{MonitoringRecord, RecordState, TargetEntity};
use crate::monitor::MonitoringPolicy;

/// Label / color / icon for one state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StateDisplay {
    pub label: &'static str,
    pub color: &'static str,
    pub icon: &'static str,
    pub notice: &'static str,
}

const DISPLAY_TABLE: [(RecordState, StateDisplay); 4] = [
    (
        RecordState::Legitimate,
        StateDisplay {
            label: "Legitimate",
            color: "#10b981",
            icon: "shield",
            notice: "SAFE: No immediate threat detected.",
        },
    ),
    (
        RecordState::Suspected,
        StateDisplay {
            label: "Suspected",
            color: "#f59e0b",
            icon: "help-circle",
            notice: "ALERT: Domain will be added to the monitoring engine.",
        },
    ),
    (
        RecordState::Phishing,
        StateDisplay {
            label: "Phishing",
            color: "#ef4444",
            icon: "zap",
            notice: "URGENT: Initiate takedown and reporting procedures.",
        },
    ),
    (
        RecordState::Expired,
        StateDisplay {
            label: "Expired",
            color: "#6b7280",
            icon: "clock",
            notice: "Monitoring window closed without re-classification.",
        },
    ),
];

pub fn display_for(state: RecordState) -> StateDisplay {
    DISPLAY_TABLE
        .iter()
        .find(|(s, _)| *s == state)
        .map(|(_, d)| *d)
        .unwrap_or(DISPLAY_TABLE[0].1)
}

#[derive(Debug, Clone, Serialize)]
pub struct RecordView {
    pub id: Uuid,
    pub domain: String,
    pub target_entity: TargetEntity,
    pub state: RecordState,
    pub display: StateDisplay,
    pub elapsed_monitoring_units: f64,
    pub monitoring_horizon_units: f64,
    /// Share of the horizon used up, 0-100
    pub monitoring_progress: f64,
    pub reclassification_reason: String,
    pub evidence: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub last_transition_at: DateTime<Utc>,
}

impl RecordView {
    pub fn new(record: MonitoringRecord, policy: &MonitoringPolicy) -> Self {
        let progress = (record.elapsed_milliunits as f64 / policy.horizon_milliunits as f64 * 100.0)
            .clamp(0.0, 100.0);

        Self {
            id: record.id,
            display: display_for(record.state),
            elapsed_monitoring_units: record.elapsed_units(),
            monitoring_horizon_units: policy.horizon_units(),
            monitoring_progress: (progress * 10.0).round() / 10.0,
            domain: record.domain,
            target_entity: record.target_entity,
            state: record.state,
            reclassification_reason: record.reclassification_reason,
            evidence: record.evidence,
            created_at: record.created_at,
            last_transition_at: record.last_transition_at,
        }
    }
}
