//! Alert history handler

use axum::{extract::State, Json};

use crate::models::AlertRecord;
use crate::{AppResult, AppState};

pub async fn list(State(state): State<AppState>) -> AppResult<Json<Vec<AlertRecord>>> {
    Ok(Json(state.engine.list_alerts().await?))
}
