//! Classifier client
//!
//! The monitor talks to the classification service through the
//! [`Classifier`] trait only:
//! - `classify` gives the initial verdict and evidence for a new domain
//! - `reevaluate` is the periodic re-scan signal for a `Suspected` record
//!
//! Implementations never retry internally and never turn a failure into a
//! verdict. Failures come back as `MonitorError::ClassificationUnavailable`;
//! the caller decides whether to retry. Timeouts are enforced by the engine.

pub mod http;
pub mod simulated;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::{MonitoringRecord, RecordState, TargetEntity};
use crate::monitor::MonitorResult;

pub use http::HttpClassifier;
pub use simulated::SimulatedClassifier;

/// Initial verdicts a classifier may hand out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Legitimate,
    Suspected,
    Phishing,
}

impl Verdict {
    /// Numeric label used by the classification service (0, 1, 2).
    pub fn label_id(&self) -> u8 {
        match self {
            Verdict::Legitimate => 0,
            Verdict::Suspected => 1,
            Verdict::Phishing => 2,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "legitimate" => Some(Verdict::Legitimate),
            "suspected" => Some(Verdict::Suspected),
            "phishing" => Some(Verdict::Phishing),
            _ => None,
        }
    }

    pub fn from_label_id(id: u8) -> Option<Self> {
        match id {
            0 => Some(Verdict::Legitimate),
            1 => Some(Verdict::Suspected),
            2 => Some(Verdict::Phishing),
            _ => None,
        }
    }
}

impl From<Verdict> for RecordState {
    fn from(v: Verdict) -> Self {
        match v {
            Verdict::Legitimate => RecordState::Legitimate,
            Verdict::Suspected => RecordState::Suspected,
            Verdict::Phishing => RecordState::Phishing,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub verdict: Verdict,
    pub evidence: serde_json::Value,
}

/// Outcome of re-scanning a suspected domain
#[derive(Debug, Clone, PartialEq)]
pub struct Reevaluation {
    pub promote: bool,
    pub reason: String,
    pub evidence: serde_json::Value,
}

#[async_trait]
pub trait Classifier: Send + Sync {
    fn name(&self) -> &'static str;

    async fn classify(&self, domain: &str, target: &TargetEntity) -> MonitorResult<Classification>;

    async fn reevaluate(&self, record: &MonitoringRecord) -> MonitorResult<Reevaluation>;
}
