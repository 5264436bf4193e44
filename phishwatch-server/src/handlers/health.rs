//! Health check handler

use axum::{extract::State, Json};
use serde::Serialize;

use crate::{AppResult, AppState};

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
    timestamp: i64,
    active_records: usize,
    classifier: &'static str,
    environment: String,
}

pub async fn check(State(state): State<AppState>) -> AppResult<Json<HealthResponse>> {
    Ok(Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: chrono::Utc::now().timestamp(),
        active_records: state.engine.active_count().await?,
        classifier: state.engine.classifier_name(),
        environment: state.config.environment.clone(),
    }))
}
