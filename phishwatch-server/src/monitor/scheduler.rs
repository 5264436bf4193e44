//! Scheduler - drives engine ticks at a fixed wall-clock interval
//!
//! Ticks run inside the loop task itself, so two ticks from the scheduler
//! can never overlap; an interval that fires while a tick is still running
//! is delayed, not queued. Shutdown is only observed between ticks: a tick
//! that has started always runs to its commit (or its failure).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use super::{MonitorEngine, MonitorResult, TickReport};

pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(10);

/// Something the scheduler can drive
#[async_trait]
pub trait Tick: Send + Sync + 'static {
    async fn tick(&self) -> MonitorResult<TickReport>;
}

#[async_trait]
impl Tick for MonitorEngine {
    async fn tick(&self) -> MonitorResult<TickReport> {
        MonitorEngine::tick(self).await
    }
}

pub struct Scheduler {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl Scheduler {
    /// Spawn the tick loop; the first tick fires one `period` from now.
    pub fn spawn<T: Tick>(target: Arc<T>, period: Duration) -> Self {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            tracing::info!("Monitoring scheduler started (every {:?})", period);

            loop {
                tokio::select! {
                    biased;

                    _ = shutdown_rx.changed() => {
                        tracing::info!("Monitoring scheduler received shutdown signal");
                        break;
                    }

                    _ = ticker.tick() => {
                        match target.tick().await {
                            Ok(report) if report.skipped => {
                                tracing::debug!("Scheduled tick skipped, previous tick still running");
                            }
                            Ok(report) => {
                                if report.promoted > 0 || report.expired > 0 {
                                    tracing::info!(
                                        "Monitoring cycle {} finished: {} promoted, {} expired, {} still monitored",
                                        report.tick,
                                        report.promoted,
                                        report.expired,
                                        report.advanced
                                    );
                                }
                            }
                            Err(e) if e.is_transient() => {
                                tracing::warn!("Monitoring temporarily degraded: {}", e);
                            }
                            Err(e) => {
                                tracing::error!("Monitoring tick failed: {}", e);
                            }
                        }
                    }
                }
            }

            tracing::info!("Monitoring scheduler stopped");
        });

        Self { shutdown_tx, handle }
    }

    /// Stop scheduling and wait for an in-flight tick to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.handle.await {
            tracing::error!("Monitoring scheduler task failed: {}", e);
        }
    }
}
