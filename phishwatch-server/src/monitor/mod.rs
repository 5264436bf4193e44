//! Monitor engine
//!
//! Owns the reclassification lifecycle of submitted domains:
//!
//! ```text
//!   submit_domain ──► Classifier::classify ──► RecordStore::append_new
//!                                                   │
//!        (Suspected records)                        ▼
//!   Scheduler ──► tick ──► Classifier::reevaluate ──► policy::apply
//!                   │                                    │
//!                   └── RecordStore::commit_tick ◄───────┘
//!                             │
//!                             └──► AlertSink::notify (after commit)
//! ```
//!
//! The store is the only holder of monitoring state. The presentation layer
//! reads it through `list_records` / `find_record` and never sees a tick
//! half-applied.

pub mod error;
pub mod policy;
pub mod scheduler;
pub mod store;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use uuid::Uuid;

pub use error::{MonitorError, MonitorResult};
pub use policy::{MonitoringPolicy, Signal, Transition};
pub use scheduler::{Scheduler, Tick};
pub use store::RecordStore;

use crate::alerts::AlertSink;
use crate::classifier::{Classification, Classifier, Reevaluation};
use crate::models::{
    normalize_domain, now_millis, AlertRecord, MonitoringRecord, TargetEntity,
};

pub const DEFAULT_CLASSIFICATION_TIMEOUT: Duration = Duration::from_secs(5);

/// Counts from one pass over the active records
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    pub tick: u64,
    /// Another tick was already running; nothing was evaluated
    pub skipped: bool,
    pub evaluated: usize,
    pub advanced: usize,
    pub promoted: usize,
    pub expired: usize,
    /// Records left untouched because the classifier failed or timed out
    pub deferred: usize,
}

impl TickReport {
    fn already_running() -> Self {
        Self {
            skipped: true,
            ..Default::default()
        }
    }
}

pub struct MonitorEngine {
    store: RecordStore,
    classifier: Arc<dyn Classifier>,
    alerts: Arc<dyn AlertSink>,
    policy: MonitoringPolicy,
    classification_timeout: Duration,
    tick_lock: tokio::sync::Mutex<()>,
    tick_count: AtomicU64,
}

impl MonitorEngine {
    pub fn new(
        store: RecordStore,
        classifier: Arc<dyn Classifier>,
        alerts: Arc<dyn AlertSink>,
        policy: MonitoringPolicy,
    ) -> Self {
        Self {
            store,
            classifier,
            alerts,
            policy,
            classification_timeout: DEFAULT_CLASSIFICATION_TIMEOUT,
            tick_lock: tokio::sync::Mutex::new(()),
            tick_count: AtomicU64::new(0),
        }
    }

    pub fn with_classification_timeout(mut self, timeout: Duration) -> Self {
        self.classification_timeout = timeout;
        self
    }

    pub fn policy(&self) -> &MonitoringPolicy {
        &self.policy
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn classifier_name(&self) -> &'static str {
        self.classifier.name()
    }

    /// Classify a new domain and persist its initial record.
    ///
    /// Every submission creates a new record, even for a domain that is
    /// already tracked. A classifier failure or timeout creates nothing.
    pub async fn submit_domain(
        &self,
        domain: &str,
        target: TargetEntity,
    ) -> MonitorResult<MonitoringRecord> {
        let domain = normalize_domain(domain)?;
        if target.name.trim().is_empty() {
            return Err(MonitorError::InvalidInput("target entity name must not be empty".into()));
        }
        let target = TargetEntity {
            name: target.name.trim().to_string(),
            domain: normalize_domain(&target.domain)?,
        };

        let Classification { verdict, evidence } = self.classify(&domain, &target).await?;

        let record = MonitoringRecord::new(domain, target, verdict.into(), evidence);
        self.store.append_new(&record).await?;

        tracing::info!(
            record_id = %record.id,
            classifier = self.classifier.name(),
            "Classified {} as {} (target: {})",
            record.domain,
            record.state,
            record.target_entity.name
        );
        if record.is_active() {
            tracing::info!(
                "-> {} enrolled for monitoring ({} units)",
                record.domain,
                self.policy.horizon_units()
            );
        }

        Ok(record)
    }

    /// One re-evaluation pass over every `Suspected` record.
    ///
    /// Never runs concurrently with itself: a call made while another tick
    /// is in progress returns immediately with `skipped` set. All changes
    /// are committed in one transaction; alerts go out only after that
    /// commit succeeds. On a store failure nothing is written and the next
    /// tick starts from the same persisted state.
    pub async fn tick(&self) -> MonitorResult<TickReport> {
        let Ok(_running) = self.tick_lock.try_lock() else {
            tracing::debug!("Tick already in progress, skipping");
            return Ok(TickReport::already_running());
        };

        let tick = self.tick_count.fetch_add(1, Ordering::SeqCst) + 1;
        let active = self.store.load_active().await?;
        let check_signals = self.policy.is_recheck_tick(tick);

        let mut report = TickReport {
            tick,
            evaluated: active.len(),
            ..Default::default()
        };
        let mut changes = Vec::with_capacity(active.len());
        let mut alerts = Vec::new();

        for mut record in active {
            let signal = if check_signals && !self.policy.horizon_reached(&record) {
                match self.reevaluate(&record).await {
                    Ok(re) => Signal::from(re),
                    Err(e) => {
                        tracing::warn!("Re-evaluation of {} deferred: {}", record.domain, e);
                        report.deferred += 1;
                        continue;
                    }
                }
            } else {
                Signal::NotChecked
            };

            match policy::apply(&mut record, signal, &self.policy, now_millis()) {
                Transition::Unchanged => continue,
                Transition::Advanced { .. } => report.advanced += 1,
                Transition::Promoted { reason } => {
                    report.promoted += 1;
                    let message = format!(
                        "{} RE-CLASSIFIED as PHISHING (target: {}): {}",
                        record.domain, record.target_entity.name, reason
                    );
                    alerts.push(AlertRecord::for_promotion(&record, message));
                }
                Transition::Expired => {
                    report.expired += 1;
                    tracing::info!(
                        "-> Monitoring finished for {}. Status: Expired after {:.1} units",
                        record.domain,
                        record.elapsed_units()
                    );
                }
            }
            changes.push(record);
        }

        if let Err(e) = self.store.commit_tick(&changes, &alerts).await {
            tracing::error!("Tick {} not persisted, will retry next interval: {}", tick, e);
            return Err(e);
        }

        for alert in &alerts {
            let Some(record) = changes.iter().find(|r| r.id == alert.record_id) else {
                continue;
            };
            tracing::warn!("!!! URGENT ALERT: {} RE-CLASSIFIED as PHISHING !!!", record.domain);
            if let Err(e) = self.alerts.notify(record, &alert.message).await {
                tracing::error!("Alert {} for {} not delivered: {}", alert.id, record.domain, e);
            }
        }

        tracing::debug!(
            "Tick {} finished: {} evaluated, {} advanced, {} promoted, {} expired, {} deferred",
            tick,
            report.evaluated,
            report.advanced,
            report.promoted,
            report.expired,
            report.deferred
        );
        Ok(report)
    }

    pub async fn list_records(&self) -> MonitorResult<Vec<MonitoringRecord>> {
        self.store.load_all().await
    }

    pub async fn find_record(&self, id: Uuid) -> MonitorResult<MonitoringRecord> {
        self.store.find(id).await?.ok_or(MonitorError::NotFound(id))
    }

    pub async fn list_alerts(&self) -> MonitorResult<Vec<AlertRecord>> {
        self.store.list_alerts().await
    }

    pub async fn active_count(&self) -> MonitorResult<usize> {
        Ok(self.store.load_active().await?.len())
    }

    async fn classify(&self, domain: &str, target: &TargetEntity) -> MonitorResult<Classification> {
        match tokio::time::timeout(self.classification_timeout, self.classifier.classify(domain, target)).await {
            Ok(result) => result,
            Err(_) => Err(MonitorError::classification(
                domain,
                format!("timed out after {:?}", self.classification_timeout),
            )),
        }
    }

    async fn reevaluate(&self, record: &MonitoringRecord) -> MonitorResult<Reevaluation> {
        match tokio::time::timeout(self.classification_timeout, self.classifier.reevaluate(record)).await {
            Ok(result) => result,
            Err(_) => Err(MonitorError::classification(
                record.domain.as_str(),
                format!("timed out after {:?}", self.classification_timeout),
            )),
        }
    }
}

#[cfg(test)]
mod tests;
