// src/lib.rs

use axum::{routing::get, Router};
use services::{curator_analyzer::CuratorAnalyzer, node_pool::NodePool};

#[derive(Clone)]
pub struct AppState {
    pub analyzer: CuratorAnalyzer,
    pub node_pool: NodePool,
}

pub mod config;

pub mod services {
    pub mod node_pool;
    pub mod steem_api;
    pub mod history_scanner;
    pub mod reward_matcher;
    pub mod vote_calculator;
    pub mod curator_analyzer;
    pub mod validators;
    pub mod export;
}

pub mod models {
    pub mod amount;
    pub mod operation;
    pub mod curation;
    pub mod vote_value;
    pub mod error;
}

pub mod handlers {
    pub mod health;
    pub mod curation;
    pub mod vote_value;
}

pub mod test_utils;

/// All HTTP routes over the given state
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::health::banner))
        .route("/health", get(handlers::health::health_check))
        .route(
            "/api/curators/{username}/rewards",
            get(handlers::curation::get_curator_rewards),
        )
        .route(
            "/api/curators/{username}/rewards.csv",
            get(handlers::curation::export_curator_rewards_csv),
        )
        .route("/api/vote-value", get(handlers::vote_value::get_vote_value))
        .with_state(state)
}
