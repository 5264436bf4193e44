//! Shared fakes for unit tests

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use uuid::Uuid;

use crate::alerts::AlertSink;
use crate::classifier::{Classification, Classifier, Reevaluation, Verdict};
use crate::db;
use crate::models::{MonitoringRecord, TargetEntity};
use crate::monitor::{MonitorEngine, MonitorError, MonitorResult, MonitoringPolicy, RecordStore};

/// Classifier whose answers are fixed up front.
///
/// `reevaluate` promotes a domain on the n-th re-evaluation of that domain
/// (counted per domain, starting at 1) and reports "clear" otherwise.
pub struct ScriptedClassifier {
    verdict: Verdict,
    classify_delay: Duration,
    reevaluate_delay: Duration,
    promote_on_call: HashMap<String, u64>,
    failing: HashSet<String>,
    calls: Mutex<HashMap<String, u64>>,
}

impl ScriptedClassifier {
    pub fn new(verdict: Verdict) -> Self {
        Self {
            verdict,
            classify_delay: Duration::ZERO,
            reevaluate_delay: Duration::ZERO,
            promote_on_call: HashMap::new(),
            failing: HashSet::new(),
            calls: Mutex::new(HashMap::new()),
        }
    }

    pub fn promote_on(mut self, domain: &str, call: u64) -> Self {
        self.promote_on_call.insert(domain.to_string(), call);
        self
    }

    pub fn failing_for(mut self, domain: &str) -> Self {
        self.failing.insert(domain.to_string());
        self
    }

    pub fn classify_delay(mut self, delay: Duration) -> Self {
        self.classify_delay = delay;
        self
    }

    pub fn reevaluate_delay(mut self, delay: Duration) -> Self {
        self.reevaluate_delay = delay;
        self
    }

    pub fn reevaluations(&self, domain: &str) -> u64 {
        self.calls.lock().get(domain).copied().unwrap_or(0)
    }
}

#[async_trait]
impl Classifier for ScriptedClassifier {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn classify(&self, domain: &str, target: &TargetEntity) -> MonitorResult<Classification> {
        tokio::time::sleep(self.classify_delay).await;
        if self.failing.contains(domain) {
            return Err(MonitorError::classification(domain, "connection refused"));
        }
        Ok(Classification {
            verdict: self.verdict,
            evidence: json!({ "scripted": true, "target": target.domain }),
        })
    }

    async fn reevaluate(&self, record: &MonitoringRecord) -> MonitorResult<Reevaluation> {
        tokio::time::sleep(self.reevaluate_delay).await;
        if self.failing.contains(&record.domain) {
            return Err(MonitorError::classification(record.domain.as_str(), "connection refused"));
        }

        let call = {
            let mut calls = self.calls.lock();
            let n = calls.entry(record.domain.clone()).or_insert(0);
            *n += 1;
            *n
        };

        let promote = self.promote_on_call.get(&record.domain) == Some(&call);
        Ok(Reevaluation {
            promote,
            reason: if promote { "cloned login page".into() } else { "still parked".into() },
            evidence: json!({ "recheck": call, "visual_similarity_score": if promote { 0.95 } else { 0.1 } }),
        })
    }
}

/// Alert sink that remembers what it was told
#[derive(Default)]
pub struct RecordingAlertSink {
    received: Mutex<Vec<(Uuid, String)>>,
}

impl RecordingAlertSink {
    pub fn messages(&self) -> Vec<(Uuid, String)> {
        self.received.lock().clone()
    }
}

#[async_trait]
impl AlertSink for RecordingAlertSink {
    async fn notify(&self, record: &MonitoringRecord, message: &str) -> MonitorResult<()> {
        self.received.lock().push((record.id, message.to_string()));
        Ok(())
    }
}

/// Engine over a fresh in-memory store
pub async fn memory_engine(
    classifier: Arc<dyn Classifier>,
    alerts: Arc<dyn AlertSink>,
    policy: MonitoringPolicy,
) -> MonitorEngine {
    let pool = db::create_memory_pool().await.expect("in-memory database");
    MonitorEngine::new(RecordStore::new(pool), classifier, alerts, policy)
}

pub fn acme() -> TargetEntity {
    TargetEntity::new("Acme", "acme.com")
}
