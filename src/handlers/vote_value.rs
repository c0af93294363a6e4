use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};

use crate::{
    models::{
        error::ErrorResponse,
        vote_value::{VoteValueQuery, VoteValueResult},
    },
    services::{
        validators::{sanitize_username, validate_vote_weight, validate_voting_power},
        vote_calculator::FULL_WEIGHT,
    },
    AppState,
};

/// Handler for GET /api/vote-value
/// Estimates a single vote. A failed calculation is still 200 with `error` set.
pub async fn get_vote_value(
    State(state): State<AppState>,
    Query(query): Query<VoteValueQuery>,
) -> Result<Json<VoteValueResult>, (StatusCode, Json<ErrorResponse>)> {
    let bad_request = |message: String| (StatusCode::BAD_REQUEST, Json(ErrorResponse { error: message }));

    let curator = sanitize_username(&query.curator).map_err(|e| bad_request(e.to_string()))?;
    let weight = validate_vote_weight(query.weight.unwrap_or(FULL_WEIGHT)).map_err(|e| bad_request(e.to_string()))?;
    let voting_power = query
        .voting_power
        .map(validate_voting_power)
        .transpose()
        .map_err(|e| bad_request(e.to_string()))?;

    tracing::info!(
        "Vote value request: curator={}, weight={}, voting_power={:?}",
        curator,
        weight,
        voting_power
    );

    let result = state
        .analyzer
        .calculator()
        .calculate_vote_value(&curator, weight, query.effective_vests, voting_power)
        .await;

    Ok(Json(result))
}
