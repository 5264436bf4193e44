//! Domain submission handler

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::TargetEntity;
use crate::presentation::{display_for, RecordView};
use crate::{AppError, AppResult, AppState};

#[derive(Debug, Deserialize, Validate)]
pub struct SubmitDomainRequest {
    /// Full URL; the host is extracted
    #[validate(length(min = 1, max = 2048))]
    pub url: Option<String>,

    #[validate(length(min = 1, max = 253))]
    pub domain: Option<String>,

    #[validate(length(min = 1, max = 253))]
    pub cse_domain: String,

    #[validate(length(min = 1, max = 200))]
    pub cse_name: String,
}

#[derive(Debug, Serialize)]
pub struct SubmitDomainResponse {
    pub record: RecordView,
    pub notice: &'static str,
}

/// Classify a domain and, if Suspected, enroll it for monitoring
pub async fn submit(
    State(state): State<AppState>,
    Json(req): Json<SubmitDomainRequest>,
) -> AppResult<(StatusCode, Json<SubmitDomainResponse>)> {
    req.validate()?;

    let domain = req
        .url
        .as_deref()
        .or(req.domain.as_deref())
        .ok_or_else(|| AppError::ValidationError("either url or domain is required".to_string()))?;

    let record = state
        .engine
        .submit_domain(domain, TargetEntity::new(req.cse_name, req.cse_domain))
        .await?;

    let notice = display_for(record.state).notice;
    Ok((
        StatusCode::CREATED,
        Json(SubmitDomainResponse {
            record: RecordView::new(record, state.engine.policy()),
            notice,
        }),
    ))
}
