//! PhishWatch Server
//!
//! Watches domains classified as Suspected lookalikes of a critical-sector
//! entity and re-classifies them as Phishing when their content changes.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        PHISHWATCH                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌───────────┐  ┌──────────────┐  ┌──────────────────────┐ │
//! │  │  HTTP     │  │  Classifier  │  │  Scheduler           │ │
//! │  │  Facade   │  │  (HTTP/sim)  │  │  (tick every N secs) │ │
//! │  │  (Axum)   │  │              │  │                      │ │
//! │  └─────┬─────┘  └──────┬───────┘  └──────────┬───────────┘ │
//! │        └───────────────┼─────────────────────┘              │
//! │                        ▼                                    │
//! │                 ┌─────────────┐      ┌──────────────┐       │
//! │                 │  Monitor    │ ───► │ Alert sinks  │       │
//! │                 │  Engine     │      └──────────────┘       │
//! │                 └──────┬──────┘                             │
//! │                        ▼                                    │
//! │                 ┌─────────────┐                             │
//! │                 │   SQLite    │                             │
//! │                 └─────────────┘                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```

mod alerts;
mod classifier;
mod config;
mod db;
mod error;
mod handlers;
mod models;
mod monitor;
mod presentation;

#[cfg(test)]
mod test_support;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    cors::{CorsLayer, Any},
    trace::TraceLayer,
    compression::CompressionLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::alerts::{AlertSink, AlertSinks, TracingAlertSink, WebhookAlertSink};
use crate::classifier::{Classifier, HttpClassifier};
use crate::config::{Config, LogFormat};
use crate::monitor::{MonitorEngine, RecordStore, Scheduler};

pub use error::{AppError, AppResult};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env();

    init_tracing(config.log_format);

    tracing::info!("PhishWatch Server starting ({})...", config.environment);
    tracing::info!("Database: {}", config.database_url);

    // Initialize database pool
    let pool = db::create_pool(&config.database_url)
        .await
        .context("Failed to create database pool")?;

    // Run migrations
    tracing::info!("Running database migrations...");
    db::run_migrations(&pool)
        .await
        .context("Failed to run migrations")?;

    let policy = config
        .monitoring_policy()
        .context("Invalid monitoring configuration")?;

    let engine = Arc::new(
        MonitorEngine::new(
            RecordStore::new(pool),
            build_classifier(&config)?,
            build_alert_sinks(&config)?,
            policy,
        )
        .with_classification_timeout(config.classification_timeout),
    );

    tracing::info!(
        "Monitoring: horizon {} units ({} ticks), {} units/tick, re-check every {} tick(s), tick every {:?}",
        policy.horizon_units(),
        policy.ticks_to_horizon(),
        config.units_per_tick,
        policy.recheck_every_ticks,
        config.tick_interval
    );

    let scheduler = Scheduler::spawn(engine.clone(), config.tick_interval);

    // Build application state
    let state = AppState {
        engine,
        config: Arc::new(config.clone()),
    };

    // Build router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("🚀 Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("HTTP server stopped, waiting for the monitor to finish its tick...");
    scheduler.shutdown().await;
    tracing::info!("PhishWatch Server stopped");

    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "phishwatch_server=debug,tower_http=debug".into());

    match format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init(),
    }
}

fn build_classifier(config: &Config) -> anyhow::Result<Arc<dyn Classifier>> {
    match &config.classifier_url {
        Some(url) => {
            tracing::info!("Classifier: {}", url);
            Ok(Arc::new(HttpClassifier::new(url.as_str(), config.classification_timeout)?))
        }
        None => {
            if config.is_production() {
                tracing::warn!("CLASSIFIER_URL not set, running the simulated classifier in production");
            }
            tracing::info!(
                "Classifier: simulated (promotion probability {}, seed {:?}, verdict {:?})",
                config.simulated_promotion_probability,
                config.simulated_seed,
                config.simulated_verdict
            );
            let classifier = config
                .simulated_classifier()
                .context("Invalid simulated classifier configuration")?;
            Ok(Arc::new(classifier))
        }
    }
}

fn build_alert_sinks(config: &Config) -> anyhow::Result<Arc<dyn AlertSink>> {
    let mut sinks: Vec<Arc<dyn AlertSink>> = vec![Arc::new(TracingAlertSink)];

    if let Some(url) = &config.alert_webhook_url {
        tracing::info!("Alert webhook: {} ({})", url, config.alert_webhook_platform.as_str());
        sinks.push(Arc::new(WebhookAlertSink::new(
            url.as_str(),
            config.alert_webhook_platform,
        )?));
    }

    Ok(Arc::new(AlertSinks::new(sinks)))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<MonitorEngine>,
    pub config: Arc<Config>,
}

/// Create the main router with all routes
fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health::check))

        // Submission
        .route("/api/v1/domains", post(handlers::domains::submit))

        // Records
        .route("/api/v1/records", get(handlers::records::list))
        .route("/api/v1/records/:id", get(handlers::records::get))
        .route("/api/v1/records/:id/report", get(handlers::records::report))

        // Alerts
        .route("/api/v1/alerts", get(handlers::alerts::list))

        // Admin
        .route("/api/v1/monitor/tick", post(handlers::monitor::tick))

        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        )
        .with_state(state)
}
