//! Alert sinks
//!
//! Receive `Suspected -> Phishing` promotions after the tick that produced
//! them has been committed. Delivery is attempted once; a failed delivery
//! is logged, the persisted alert row stays as the durable record.

pub mod webhook;

use std::sync::Arc;

use async_trait::async_trait;

use crate::models::MonitoringRecord;
use crate::monitor::MonitorResult;

pub use webhook::{WebhookAlertSink, WebhookPlatform};

#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn notify(&self, record: &MonitoringRecord, message: &str) -> MonitorResult<()>;
}

/// Writes promotions to the log
pub struct TracingAlertSink;

#[async_trait]
impl AlertSink for TracingAlertSink {
    async fn notify(&self, record: &MonitoringRecord, message: &str) -> MonitorResult<()> {
        tracing::warn!(
            record_id = %record.id,
            domain = %record.domain,
            target = %record.target_entity.name,
            "URGENT ALERT: {}",
            message
        );
        Ok(())
    }
}

/// Delivers to every configured sink, reporting the first failure
pub struct AlertSinks {
    sinks: Vec<Arc<dyn AlertSink>>,
}

impl AlertSinks {
    pub fn new(sinks: Vec<Arc<dyn AlertSink>>) -> Self {
        Self { sinks }
    }
}

#[async_trait]
impl AlertSink for AlertSinks {
    async fn notify(&self, record: &MonitoringRecord, message: &str) -> MonitorResult<()> {
        let mut first_err = None;
        for sink in &self.sinks {
            if let Err(e) = sink.notify(record, message).await {
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
