//! Detection report model
//!
//! Full report for one record: CSE mapping, final classification,
//! confidence scores, reclassification details and the registration /
//! network attributes carried in the evidence snapshot.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

use super::alert::AlertRecord;
use super::record::{MonitoringRecord, RecordState, NOT_APPLICABLE};

#[derive(Debug, Clone, Serialize)]
pub struct DetectionReport {
    pub report_id: String,
    pub record_id: Uuid,
    pub analysis_timestamp: DateTime<Utc>,
    pub critical_sector_entity: String,
    pub genuine_cse_domain: String,
    pub final_classification: RecordState,
    /// 0 = Legitimate, 1 = Suspected, 2 = Phishing; absent for Expired
    pub classification_id: Option<u8>,
    pub maliciousness_information: MaliciousnessInfo,
    pub domain_attributes: Value,
    pub network_attributes: Value,
    pub alerts: Vec<AlertRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MaliciousnessInfo {
    pub model_confidence: Value,
    pub monitoring_units_elapsed: f64,
    pub reclassification_details: Value,
}

impl DetectionReport {
    pub fn build(record: &MonitoringRecord, alerts: Vec<AlertRecord>) -> Self {
        let now = Utc::now();
        let evidence = &record.evidence;

        let classification_id = match record.state {
            RecordState::Legitimate => Some(0),
            RecordState::Suspected => Some(1),
            RecordState::Phishing => Some(2),
            RecordState::Expired => None,
        };

        let reclassification_details = if record.reclassification_reason == NOT_APPLICABLE {
            Value::String(NOT_APPLICABLE.to_string())
        } else {
            json!({
                "monitoring_units_elapsed": record.elapsed_units(),
                "trigger_type": "Content Change",
                "visual_similarity_score": evidence_field(evidence, &["content_check", "visual_similarity_score"])
                    .or_else(|| evidence_field(evidence, &["visual_similarity_score"])),
                "detection_reason": record.reclassification_reason,
                "reclassified_at": record.last_transition_at,
            })
        };

        Self {
            report_id: format!("REPORT-{}-{}", now.timestamp(), &record.id.simple().to_string()[..8]),
            record_id: record.id,
            analysis_timestamp: now,
            critical_sector_entity: record.target_entity.name.clone(),
            genuine_cse_domain: record.target_entity.domain.clone(),
            final_classification: record.state,
            classification_id,
            maliciousness_information: MaliciousnessInfo {
                model_confidence: evidence_field(evidence, &["model_confidence"])
                    .unwrap_or_else(|| Value::String(NOT_APPLICABLE.to_string())),
                monitoring_units_elapsed: record.elapsed_units(),
                reclassification_details,
            },
            domain_attributes: evidence_field(evidence, &["domain_attributes"])
                .unwrap_or_else(|| json!({ "identified_domain": record.domain })),
            network_attributes: evidence_field(evidence, &["network_attributes"])
                .unwrap_or_else(|| Value::String(NOT_APPLICABLE.to_string())),
            alerts,
        }
    }
}

fn evidence_field(evidence: &Value, path: &[&str]) -> Option<Value> {
    path.iter()
        .try_fold(evidence, |v, key| v.get(key))
        .filter(|v| !v.is_null())
        .cloned()
}
