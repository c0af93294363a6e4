mod common;

use std::str::FromStr;
use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use httpmock::prelude::*;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use tower::ServiceExt;

use curation_analyzer::{
    build_router,
    services::steem_api::SteemRpcClient,
    test_utils::StubChain,
};

use crate::common::{app_state, days_ago, mock_probe, mock_rpc, network, stub_router, test_pool};

async fn get(app: Router, uri: &str) -> (StatusCode, String, Option<String>) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .map(|v| v.to_str().unwrap().to_string());
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();

    (status, String::from_utf8(body.to_vec()).unwrap(), content_type)
}

async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
    let (status, body, _) = get(app, uri).await;
    (status, serde_json::from_str(&body).unwrap())
}

fn decimal(value: &Value) -> Decimal {
    match value {
        Value::String(s) => Decimal::from_str(s).unwrap(),
        other => Decimal::from_str(&other.to_string()).unwrap(),
    }
}

/// One matched reward (bob/matched) and one unmatched (carol/orphan)
fn curator_chain() -> StubChain {
    network(StubChain::new())
        .with_stake("alice", Decimal::from(1000), Decimal::ZERO, Decimal::ZERO)
        .with_content("bob", "matched", &days_ago(9.0), vec![])
        .with_vote(&days_ago(8.99), "alice", "bob", "matched", 10000)
        .with_other(&days_ago(5.0), "custom_json")
        .with_reward(&days_ago(2.0), "alice", "bob", "matched", Decimal::from(30))
        .with_reward(&days_ago(1.0), "alice", "carol", "orphan", Decimal::from(12))
}

/// Banner route answers
#[tokio::test]
async fn test_banner() {
    let (status, body, _) = get(stub_router(StubChain::new()), "/").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Curation Analyzer"));
}

/// Rewards report with matched and unmatched records and statistics
#[tokio::test]
async fn test_curator_rewards_report() {
    let (status, json) = get_json(stub_router(curator_chain()), "/api/curators/@Alice/rewards?days_back=7").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["account"], "alice");
    assert_eq!(json["days_back"], 7);
    assert_eq!(json["status"]["state"], "complete");

    let records = json["records"].as_array().unwrap();
    assert_eq!(records.len(), 2);

    // Newest reward first
    assert_eq!(records[0]["comment_permlink"], "orphan");
    assert!(records[0].get("vote").is_none());
    assert!(records[0].get("vote_value_steem").is_none());

    assert_eq!(records[1]["comment_permlink"], "matched");
    assert_eq!(records[1]["vote"]["weight"], 10000);
    assert_eq!(decimal(&records[1]["reward_sp"]), Decimal::from(15));
    assert_eq!(decimal(&records[1]["vote_value_steem"]), Decimal::from(369960));
    assert_eq!(records[1]["timing_anomaly"], false);

    assert_eq!(json["statistics"]["total_rewards"], 2);
    assert_eq!(json["statistics"]["matched_rewards"], 1);
    assert_eq!(decimal(&json["statistics"]["match_percentage"]), Decimal::from(50));
}

/// Default window is seven days
#[tokio::test]
async fn test_days_back_defaults_to_seven() {
    let (status, json) = get_json(stub_router(curator_chain()), "/api/curators/alice/rewards").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["days_back"], 7);
}

/// An account with no rewards in the window is an empty, complete report
#[tokio::test]
async fn test_no_activity_is_complete_and_empty() {
    let chain = network(StubChain::new()).with_reward(&days_ago(30.0), "alice", "bob", "old", Decimal::ONE);

    let (status, json) = get_json(stub_router(chain), "/api/curators/alice/rewards?days_back=7").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"]["state"], "complete");
    assert!(json["records"].as_array().unwrap().is_empty());
}

/// Invalid input is rejected before any chain access
#[tokio::test]
async fn test_invalid_input_is_bad_request() {
    for uri in [
        "/api/curators/ab/rewards",
        "/api/curators/bad_name/rewards",
        "/api/curators/alice/rewards?days_back=0",
        "/api/curators/alice/rewards?days_back=366",
    ] {
        let (status, json) = get_json(stub_router(StubChain::new().unreachable()), uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
        assert!(json["error"].is_string());
    }
}

/// No reachable node must not look like "no activity"
#[tokio::test]
async fn test_unreachable_network_is_service_unavailable() {
    let (status, json) = get_json(stub_router(StubChain::new().unreachable()), "/api/curators/alice/rewards").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(json["error"].as_str().unwrap().contains("node"));
}

/// Nodes that answer liveness checks but fail every RPC are no usable node either
#[tokio::test]
async fn test_nodes_rejecting_rpc_is_service_unavailable() {
    let mut nodes = Vec::new();
    for _ in 0..3 {
        let node = MockServer::start_async().await;
        mock_probe(&node).await;
        node.mock_async(|when, then| {
            when.method(POST).path("/");
            then.status(502);
        })
        .await;
        nodes.push(node);
    }

    let pool = test_pool(nodes.iter().map(|node| node.base_url()).collect());
    let chain = Arc::new(SteemRpcClient::new(pool.clone()));
    let app = build_router(app_state(chain, pool));

    let (status, json) = get_json(app, "/api/curators/alice/rewards").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(json["error"].as_str().unwrap().contains("node"));
}

#[tokio::test]
async fn test_unknown_account_is_not_found() {
    let (status, _) = get_json(stub_router(StubChain::new().without_account()), "/api/curators/ghost/rewards").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

/// CSV export carries the header and one row per record
#[tokio::test]
async fn test_csv_export() {
    let (status, body, content_type) = get(stub_router(curator_chain()), "/api/curators/alice/rewards.csv?days_back=7").await;

    assert_eq!(status, StatusCode::OK);
    assert!(content_type.unwrap().starts_with("text/csv"));

    let lines: Vec<&str> = body.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("Timestamp,Curator,Author,Permlink"));
    assert!(lines[1].contains(",carol,orphan,"));
    assert!(lines[2].contains(",bob,matched,15,100,369960,"));
}

/// Ad-hoc valuation with supplied stake
#[tokio::test]
async fn test_vote_value_endpoint() {
    let app = stub_router(network(StubChain::new()));
    let (status, json) = get_json(
        app,
        "/api/vote-value?curator=alice&weight=10000&effective_vests=1000&voting_power=9200",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(decimal(&json["steem_value"]), Decimal::from(369960));
    assert_eq!(decimal(&json["sbd_value"]), Decimal::from(369960));
    assert_eq!(decimal(&json["formula"]["p"]), Decimal::from_str("184.98").unwrap());
    assert!(json.get("error").is_none());
}

/// A failed valuation is reported in the body, not as an HTTP error
#[tokio::test]
async fn test_vote_value_failure_is_zeroed() {
    let (status, json) = get_json(stub_router(network(StubChain::new())), "/api/vote-value?curator=ghost").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(decimal(&json["steem_value"]), Decimal::ZERO);
    assert!(json["error"].is_string());
}

#[tokio::test]
async fn test_vote_value_rejects_out_of_range_input() {
    for uri in [
        "/api/vote-value?curator=alice&weight=10001",
        "/api/vote-value?curator=alice&voting_power=10001",
        "/api/vote-value?curator=x",
    ] {
        let (status, _, _) = get(stub_router(network(StubChain::new())), uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
    }
}

/// Health lists reachable nodes and fails when there are none
#[tokio::test]
async fn test_health() {
    let node = MockServer::start_async().await;
    mock_probe(&node).await;

    let pool = test_pool(vec![common::DEAD_NODE.to_string(), node.base_url()]);
    let app = build_router(app_state(Arc::new(StubChain::new()), pool));
    let (status, json) = get_json(app, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["working_nodes"], json!([node.base_url()]));
    assert_eq!(json["nodes"].as_array().unwrap().len(), 2);

    let (status, json) = get_json(stub_router(StubChain::new()), "/health").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["working_nodes"], json!([]));
}

/// Full path over JSON-RPC: failover past a dead node, scan, match, value
#[tokio::test]
async fn test_analysis_over_json_rpc() {
    let node = MockServer::start_async().await;
    mock_probe(&node).await;

    let vote_time = days_ago(3.0);
    let reward_time = days_ago(1.0);
    let vote = json!([0, { "timestamp": vote_time, "op": ["vote", {
        "voter": "alice", "author": "bob", "permlink": "post", "weight": 5000
    }] }]);
    let reward = json!([1, { "timestamp": reward_time, "op": {
        "type": "curation_reward_operation",
        "value": {
            "curator": "alice",
            "reward": { "amount": "30000000", "precision": 6, "nai": "@@000000037" },
            "comment_author": "bob",
            "comment_permlink": "post"
        }
    } }]);

    mock_rpc(&node, "condenser_api.get_accounts", json!([["alice"]]), json!([{
        "name": "alice",
        "vesting_shares": "1000.000000 VESTS",
        "delegated_vesting_shares": "0.000000 VESTS",
        "received_vesting_shares": "0.000000 VESTS"
    }]))
    .await;
    mock_rpc(&node, "condenser_api.get_account_history", json!(["alice", -1, 1]), json!([reward.clone()])).await;
    mock_rpc(&node, "condenser_api.get_account_history", json!(["alice", 1, 1]), json!([vote, reward])).await;
    mock_rpc(&node, "condenser_api.get_dynamic_global_properties", json!([]), json!({
        "total_vesting_fund_steem": "500.000 STEEM",
        "total_vesting_shares": "1000.000000 VESTS"
    }))
    .await;
    mock_rpc(&node, "condenser_api.get_reward_fund", json!(["post"]), json!({
        "name": "post",
        "recent_claims": "1000",
        "reward_balance": "20.000 STEEM"
    }))
    .await;
    mock_rpc(&node, "condenser_api.get_current_median_history_price", json!([]), json!({
        "base": "0.250 SBD",
        "quote": "1.000 STEEM"
    }))
    .await;
    mock_rpc(&node, "condenser_api.get_content", json!(["bob", "post"]), json!({
        "author": "bob",
        "permlink": "post",
        "created": days_ago(3.01),
        "active_votes": [{ "voter": "alice", "percent": 5000, "rshares": "1000", "time": vote_time }]
    }))
    .await;

    let pool = test_pool(vec![common::DEAD_NODE.to_string(), node.base_url()]);
    let chain = Arc::new(SteemRpcClient::new(pool.clone()));
    let app = build_router(app_state(chain, pool));

    let (status, json) = get_json(app, "/api/curators/alice/rewards?days_back=7").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"]["state"], "complete");

    let records = json["records"].as_array().unwrap();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(decimal(&record["reward_vests"]), Decimal::from(30));
    assert_eq!(decimal(&record["reward_sp"]), Decimal::from(15));
    // p = (9200 * 5000 / 10000 + 49) / 50 = 92.98
    assert_eq!(decimal(&record["vote_value_steem"]), Decimal::from(185960));
    assert_eq!(decimal(&record["vote_value_sbd"]), Decimal::from(46490));
    assert!(record["voted_after_minutes"].as_f64().unwrap() > 0.0);
    assert_eq!(record["active_votes"].as_array().unwrap().len(), 1);
    assert!(record.get("enrichment_errors").is_none());
}
