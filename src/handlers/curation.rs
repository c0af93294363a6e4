use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;

use crate::{
    models::{
        curation::{AnalysisStatus, CurationQuery, CurationReport},
        error::ErrorResponse,
    },
    services::{
        export::{csv_filename, records_to_csv},
        validators::{sanitize_username, validate_days_back},
    },
    AppState,
};

type HandlerError = (StatusCode, Json<ErrorResponse>);

fn error_response(status: StatusCode, message: impl Into<String>) -> HandlerError {
    (status, Json(ErrorResponse { error: message.into() }))
}

/// Validate input, run the analysis and map failure statuses to HTTP errors
async fn run_analysis(
    state: &AppState,
    username: &str,
    query: &CurationQuery,
) -> Result<CurationReport, HandlerError> {
    let account = sanitize_username(username)
        .map_err(|e| error_response(StatusCode::BAD_REQUEST, e.to_string()))?;
    let days_back = validate_days_back(query.days_back)
        .map_err(|e| error_response(StatusCode::BAD_REQUEST, e.to_string()))?;

    tracing::info!("Analyzing curator {} over {} days", account, days_back);

    let report = state.analyzer.analyze(&account, days_back).await;

    match &report.status {
        AnalysisStatus::NoUsableNode => Err(error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "No usable Steem node, try again later",
        )),
        AnalysisStatus::AccountNotFound => Err(error_response(
            StatusCode::NOT_FOUND,
            format!("Account '{}' not found", account),
        )),
        _ => Ok(report),
    }
}

/// Handler for GET /api/curators/{username}/rewards
/// Returns the full report; an interrupted scan is still 200 with its status
pub async fn get_curator_rewards(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Query(query): Query<CurationQuery>,
) -> Result<Json<CurationReport>, HandlerError> {
    let report = run_analysis(&state, &username, &query).await?;
    Ok(Json(report))
}

/// Handler for GET /api/curators/{username}/rewards.csv
pub async fn export_curator_rewards_csv(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Query(query): Query<CurationQuery>,
) -> Result<Response, HandlerError> {
    let report = run_analysis(&state, &username, &query).await?;

    let body = records_to_csv(&report.records);
    let disposition = format!(
        "attachment; filename=\"{}\"",
        csv_filename(&report.account, Utc::now().date_naive())
    );

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}
