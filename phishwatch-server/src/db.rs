//! Database module - SQLite connection and migrations

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;

/// Create database connection pool, creating the file if needed
pub async fn create_pool(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    if database_url.contains(":memory:") {
        return create_memory_pool().await;
    }

    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(std::time::Duration::from_secs(5));

    SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
}

/// In-memory database with the schema applied.
///
/// A single connection that is never recycled, since every new connection
/// to `:memory:` would see an empty database.
pub async fn create_memory_pool() -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?;

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;
    Ok(pool)
}

/// Run database migrations
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::raw_sql(SCHEMA_SQL).execute(pool).await?;

    tracing::info!("Database schema applied successfully");
    Ok(())
}

/// Database schema SQL
const SCHEMA_SQL: &str = r#"
-- Monitoring records (one per submitted domain, never deleted)
CREATE TABLE IF NOT EXISTS monitoring_records (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    domain TEXT NOT NULL,
    target_name TEXT NOT NULL,
    target_domain TEXT NOT NULL,
    state TEXT NOT NULL,
    evidence TEXT NOT NULL,
    elapsed_milliunits INTEGER NOT NULL DEFAULT 0,
    created_at_ms INTEGER NOT NULL,
    last_transition_at_ms INTEGER NOT NULL,
    reclassification_reason TEXT NOT NULL
);

-- Promotion alerts
CREATE TABLE IF NOT EXISTS alerts (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    record_id TEXT NOT NULL REFERENCES monitoring_records(id),
    domain TEXT NOT NULL,
    target_name TEXT NOT NULL,
    message TEXT NOT NULL,
    raised_at_ms INTEGER NOT NULL
);

-- Indexes
CREATE INDEX IF NOT EXISTS idx_records_state ON monitoring_records(state);
CREATE INDEX IF NOT EXISTS idx_records_created ON monitoring_records(created_at_ms);
CREATE INDEX IF NOT EXISTS idx_records_domain ON monitoring_records(domain);
CREATE INDEX IF NOT EXISTS idx_alerts_record ON alerts(record_id);
"#;
