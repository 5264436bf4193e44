//! Monitoring record handlers

use axum::{extract::{Path, State}, Json};
use uuid::Uuid;

use crate::models::DetectionReport;
use crate::presentation::RecordView;
use crate::{AppResult, AppState};

/// List every record, most recent first
pub async fn list(State(state): State<AppState>) -> AppResult<Json<Vec<RecordView>>> {
    let policy = *state.engine.policy();
    let records = state.engine.list_records().await?;

    Ok(Json(records.into_iter().map(|r| RecordView::new(r, &policy)).collect()))
}

/// Get single record
pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<RecordView>> {
    let record = state.engine.find_record(id).await?;
    Ok(Json(RecordView::new(record, state.engine.policy())))
}

/// Detection report for a record
pub async fn report(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<DetectionReport>> {
    let record = state.engine.find_record(id).await?;
    let alerts = state.engine.store().alerts_for(id).await?;

    Ok(Json(DetectionReport::build(&record, alerts)))
}
