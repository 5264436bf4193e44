//! Record store - SQLite persistence for monitoring records and alerts
//!
//! Every mutation takes the store's write lock and runs in a transaction,
//! so a submission racing a tick can neither interleave with it nor observe
//! half of it. Reads go straight to the pool and only ever see committed
//! state.

use std::sync::Arc;

use sqlx::SqlitePool;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::error::{MonitorError, MonitorResult};
use crate::models::{AlertRecord, AlertRow, MonitoringRecord, RecordRow, RecordState};

const RECORD_COLUMNS: &str = "id, domain, target_name, target_domain, state, evidence, \
     elapsed_milliunits, created_at_ms, last_transition_at_ms, reclassification_reason";

#[derive(Clone)]
pub struct RecordStore {
    pool: SqlitePool,
    write_lock: Arc<Mutex<()>>,
}

impl RecordStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// All records, most recently created first
    pub async fn load_all(&self) -> MonitorResult<Vec<MonitoringRecord>> {
        let rows = sqlx::query_as::<_, RecordRow>(&format!(
            "SELECT {} FROM monitoring_records ORDER BY created_at_ms DESC, seq DESC",
            RECORD_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(MonitoringRecord::try_from).collect()
    }

    /// Records still under monitoring, oldest first
    pub async fn load_active(&self) -> MonitorResult<Vec<MonitoringRecord>> {
        let rows = sqlx::query_as::<_, RecordRow>(&format!(
            "SELECT {} FROM monitoring_records WHERE state = ? ORDER BY seq ASC",
            RECORD_COLUMNS
        ))
        .bind(RecordState::Suspected.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(MonitoringRecord::try_from).collect()
    }

    pub async fn find(&self, id: Uuid) -> MonitorResult<Option<MonitoringRecord>> {
        let row = sqlx::query_as::<_, RecordRow>(&format!(
            "SELECT {} FROM monitoring_records WHERE id = ?",
            RECORD_COLUMNS
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(MonitoringRecord::try_from).transpose()
    }

    /// Insert a new record; fails with `DuplicateRecord` on id collision
    pub async fn append_new(&self, record: &MonitoringRecord) -> MonitorResult<()> {
        let _guard = self.write_lock.lock().await;

        let evidence = serde_json::to_string(&record.evidence)?;
        let result = sqlx::query(&format!(
            "INSERT INTO monitoring_records ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            RECORD_COLUMNS
        ))
        .bind(record.id.to_string())
        .bind(&record.domain)
        .bind(&record.target_entity.name)
        .bind(&record.target_entity.domain)
        .bind(record.state.as_str())
        .bind(evidence)
        .bind(record.elapsed_milliunits)
        .bind(record.created_at.timestamp_millis())
        .bind(record.last_transition_at.timestamp_millis())
        .bind(&record.reclassification_reason)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(MonitorError::DuplicateRecord { id: record.id })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Insert or overwrite by id. Identity columns (domain, target) are
    /// never rewritten for an existing id.
    pub async fn upsert(&self, record: &MonitoringRecord) -> MonitorResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;
        upsert_in(&mut tx, record).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Persist the outcome of one tick atomically.
    ///
    /// Each change only applies to a record that is still `Suspected` in
    /// the store; if any of them is not, nothing from this tick is written.
    pub async fn commit_tick(
        &self,
        changes: &[MonitoringRecord],
        alerts: &[AlertRecord],
    ) -> MonitorResult<()> {
        if changes.is_empty() && alerts.is_empty() {
            return Ok(());
        }

        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        for record in changes {
            let evidence = serde_json::to_string(&record.evidence)?;
            let updated = sqlx::query(
                r#"
                UPDATE monitoring_records
                SET state = ?, evidence = ?, elapsed_milliunits = ?,
                    last_transition_at_ms = ?, reclassification_reason = ?
                WHERE id = ? AND state = ?
                "#,
            )
            .bind(record.state.as_str())
            .bind(evidence)
            .bind(record.elapsed_milliunits)
            .bind(record.last_transition_at.timestamp_millis())
            .bind(&record.reclassification_reason)
            .bind(record.id.to_string())
            .bind(RecordState::Suspected.as_str())
            .execute(&mut *tx)
            .await?;

            if updated.rows_affected() != 1 {
                return Err(MonitorError::StoreUnavailable(format!(
                    "record {} is no longer under monitoring",
                    record.id
                )));
            }
        }

        for alert in alerts {
            sqlx::query(
                r#"
                INSERT INTO alerts (id, record_id, domain, target_name, message, raised_at_ms)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(alert.id.to_string())
            .bind(alert.record_id.to_string())
            .bind(&alert.domain)
            .bind(&alert.target_name)
            .bind(&alert.message)
            .bind(alert.raised_at.timestamp_millis())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Alerts, most recent first
    pub async fn list_alerts(&self) -> MonitorResult<Vec<AlertRecord>> {
        let rows = sqlx::query_as::<_, AlertRow>(
            r#"
            SELECT id, record_id, domain, target_name, message, raised_at_ms
            FROM alerts
            ORDER BY raised_at_ms DESC, seq DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(AlertRecord::try_from).collect()
    }

    pub async fn alerts_for(&self, record_id: Uuid) -> MonitorResult<Vec<AlertRecord>> {
        let rows = sqlx::query_as::<_, AlertRow>(
            r#"
            SELECT id, record_id, domain, target_name, message, raised_at_ms
            FROM alerts
            WHERE record_id = ?
            ORDER BY seq ASC
            "#,
        )
        .bind(record_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(AlertRecord::try_from).collect()
    }
}

async fn upsert_in(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    record: &MonitoringRecord,
) -> MonitorResult<()> {
    let evidence = serde_json::to_string(&record.evidence)?;
    sqlx::query(&format!(
        r#"
        INSERT INTO monitoring_records ({})
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT (id) DO UPDATE SET
            state = excluded.state,
            evidence = excluded.evidence,
            elapsed_milliunits = excluded.elapsed_milliunits,
            last_transition_at_ms = excluded.last_transition_at_ms,
            reclassification_reason = excluded.reclassification_reason
        "#,
        RECORD_COLUMNS
    ))
    .bind(record.id.to_string())
    .bind(&record.domain)
    .bind(&record.target_entity.name)
    .bind(&record.target_entity.domain)
    .bind(record.state.as_str())
    .bind(evidence)
    .bind(record.elapsed_milliunits)
    .bind(record.created_at.timestamp_millis())
    .bind(record.last_transition_at.timestamp_millis())
    .bind(&record.reclassification_reason)
    .execute(&mut **tx)
    .await?;

    Ok(())
}
