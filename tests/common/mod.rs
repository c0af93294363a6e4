#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use chrono::Utc;
use httpmock::prelude::*;
use serde_json::{json, Value};

use curation_analyzer::{
    build_router,
    config::AnalyzerConfig,
    services::{
        curator_analyzer::CuratorAnalyzer, node_pool::NodePool, steem_api::ChainApi,
    },
    test_utils::StubChain,
    AppState,
};

/// Nothing listens here, connections are refused immediately
pub const DEAD_NODE: &str = "http://127.0.0.1:1";

/// Chain timestamp `days` days before now
pub fn days_ago(days: f64) -> String {
    let at = Utc::now() - chrono::Duration::seconds((days * 86_400.0) as i64);
    at.format("%Y-%m-%dT%H:%M:%S").to_string()
}

pub fn test_pool(endpoints: Vec<String>) -> NodePool {
    NodePool::new(endpoints, Duration::from_secs(2), Duration::from_millis(1))
        .expect("Failed to build node pool")
}

/// AppState over any chain; the pool only serves /health
pub fn app_state(chain: Arc<dyn ChainApi>, pool: NodePool) -> AppState {
    let config = AnalyzerConfig {
        nodes: pool.endpoints().to_vec(),
        ..AnalyzerConfig::default()
    };

    AppState {
        analyzer: CuratorAnalyzer::from_config(chain, &config),
        node_pool: pool,
    }
}

pub fn stub_router(chain: StubChain) -> Router {
    build_router(app_state(Arc::new(chain), test_pool(vec![DEAD_NODE.to_string()])))
}

/// Network state giving 0.5 STEEM per VEST, rb_prc 0.02 and a 1:1 median
pub fn network(chain: StubChain) -> StubChain {
    chain.with_network(
        rust_decimal::Decimal::from(500),
        rust_decimal::Decimal::from(1000),
        rust_decimal::Decimal::from(20),
        rust_decimal::Decimal::from(1000),
        rust_decimal::Decimal::ONE,
    )
}

/// Answer liveness probes on `/`
pub async fn mock_probe(node: &MockServer) {
    node.mock_async(|when, then| {
        when.method(GET).path("/");
        then.status(200);
    })
    .await;
}

/// Answer one JSON-RPC method/params pair with `result`
pub async fn mock_rpc(node: &MockServer, method: &str, params: Value, result: Value) {
    let expected = json!({ "method": method, "params": params }).to_string();
    node.mock_async(|when, then| {
        when.method(POST).path("/").json_body_partial(expected);
        then.status(200)
            .json_body(json!({ "jsonrpc": "2.0", "id": 1, "result": result }));
    })
    .await;
}
