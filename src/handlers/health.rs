use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub working_nodes: Vec<String>,
    pub nodes: Vec<String>,
}

pub async fn banner() -> &'static str {
    "Curation Analyzer: curation reward attribution for Steem accounts"
}

/// Handler for GET /health
/// Probes every configured node; 503 when none answers
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let working_nodes = state.node_pool.working_endpoints().await;
    let nodes = state.node_pool.endpoints().to_vec();

    tracing::debug!("{} of {} nodes reachable", working_nodes.len(), nodes.len());

    let (status_code, status) = if working_nodes.is_empty() {
        tracing::warn!("Health check: no reachable node");
        (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
    } else {
        (StatusCode::OK, "ok")
    };

    (
        status_code,
        Json(HealthResponse {
            status: status.to_string(),
            working_nodes,
            nodes,
        }),
    )
}
