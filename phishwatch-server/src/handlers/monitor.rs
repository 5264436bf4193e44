//! Manual tick trigger

use axum::{extract::State, Json};

use crate::monitor::TickReport;
use crate::{AppResult, AppState};

/// Run one tick now. Reports `skipped` if the scheduler's tick is running.
pub async fn tick(State(state): State<AppState>) -> AppResult<Json<TickReport>> {
    Ok(Json(state.engine.tick().await?))
}
