//! Steem node pool
//!
//! Holds the configured RPC endpoints in priority order and turns them into a
//! single "usable node" per call. The pool keeps no notion of a current node:
//! every call probes and selects on its own, so concurrent scans never move
//! each other onto a different endpoint.

use futures_util::future::join_all;
use futures_util::stream::{FuturesUnordered, StreamExt};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Per-request timeout for probes and calls
pub const DEFAULT_TIMEOUT_SECS: u64 = 5;

/// Base delay between failover attempts (doubled after every attempt)
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 250;

/// Error types for node access
#[derive(Debug, Clone, PartialEq)]
pub enum NetworkError {
    NoReachableNode,
    Transport { endpoint: String, message: String },
    HttpStatus { endpoint: String, status: u16 },
    MalformedBody { endpoint: String, message: String },
    Rpc { endpoint: String, message: String },
    MissingResult { endpoint: String },
    Exhausted { method: String, attempts: usize, last_error: String },
}

impl std::fmt::Display for NetworkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NetworkError::NoReachableNode => write!(f, "No usable node: all endpoints unreachable"),
            NetworkError::Transport { endpoint, message } => {
                write!(f, "Transport error on {}: {}", endpoint, message)
            }
            NetworkError::HttpStatus { endpoint, status } => {
                write!(f, "HTTP {} from {}", status, endpoint)
            }
            NetworkError::MalformedBody { endpoint, message } => {
                write!(f, "Malformed response from {}: {}", endpoint, message)
            }
            NetworkError::Rpc { endpoint, message } => {
                write!(f, "RPC error from {}: {}", endpoint, message)
            }
            NetworkError::MissingResult { endpoint } => {
                write!(f, "Response from {} has no result field", endpoint)
            }
            NetworkError::Exhausted { method, attempts, last_error } => write!(
                f,
                "{} failed on all {} candidate node(s), last error: {}",
                method, attempts, last_error
            ),
        }
    }
}

impl std::error::Error for NetworkError {}

#[derive(Clone)]
pub struct NodePool {
    client: Client,
    endpoints: Arc<Vec<String>>,
    retry_base_delay: Duration,
}

impl NodePool {
    pub fn new(
        endpoints: Vec<String>,
        timeout: Duration,
        retry_base_delay: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            endpoints: Arc::new(endpoints),
            retry_base_delay,
        })
    }

    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    /// Liveness probe: a plain GET answered with 2xx. Never fails.
    pub async fn is_reachable(&self, endpoint: &str) -> bool {
        match self.client.get(endpoint).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!(endpoint = %endpoint, error = %e, "Probe failed");
                false
            }
        }
    }

    /// First reachable endpoint in configured order, or `None` if all are down
    pub async fn select_working_endpoint(&self) -> Option<String> {
        self.select_index().await.map(|idx| self.endpoints[idx].clone())
    }

    /// All reachable endpoints, in configured order
    pub async fn working_endpoints(&self) -> Vec<String> {
        let probes = self.endpoints.iter().map(|endpoint| self.is_reachable(endpoint));
        let outcomes = join_all(probes).await;

        self.endpoints
            .iter()
            .zip(outcomes)
            .filter(|(_, reachable)| *reachable)
            .map(|(endpoint, _)| endpoint.clone())
            .collect()
    }

    /// Probes run concurrently; the winner is the lowest-indexed reachable
    /// endpoint, returned as soon as every endpoint ahead of it has failed.
    async fn select_index(&self) -> Option<usize> {
        let mut probes: FuturesUnordered<_> = self
            .endpoints
            .iter()
            .enumerate()
            .map(|(idx, endpoint)| async move { (idx, self.is_reachable(endpoint).await) })
            .collect();

        let mut outcomes: Vec<Option<bool>> = vec![None; self.endpoints.len()];

        while let Some((idx, reachable)) = probes.next().await {
            outcomes[idx] = Some(reachable);
            if !reachable {
                warn!(endpoint = %self.endpoints[idx], "Unable to reach node");
            }

            for (candidate, outcome) in outcomes.iter().enumerate() {
                match outcome {
                    Some(true) => return Some(candidate),
                    Some(false) => continue,
                    None => break,
                }
            }
        }

        error!(nodes = self.endpoints.len(), "All nodes are unreachable");
        None
    }

    /// JSON-RPC call against the first working node, failing over to the
    /// following endpoints in priority order. Each endpoint gets one attempt.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value, NetworkError> {
        let first = self
            .select_index()
            .await
            .ok_or(NetworkError::NoReachableNode)?;

        let candidates = &self.endpoints[first..];
        let mut delay = self.retry_base_delay;
        let mut last_error = None;

        for (attempt, endpoint) in candidates.iter().enumerate() {
            if attempt > 0 {
                tokio::time::sleep(delay).await;
                delay *= 2; // Exponential backoff
            }

            match self.post(endpoint, method, &params).await {
                Ok(result) => {
                    debug!(method = %method, endpoint = %endpoint, "RPC call succeeded");
                    return Ok(result);
                }
                Err(e) => {
                    warn!(
                        method = %method,
                        endpoint = %endpoint,
                        attempt = attempt + 1,
                        max_attempts = candidates.len(),
                        error = %e,
                        "RPC call failed"
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(NetworkError::Exhausted {
            method: method.to_string(),
            attempts: candidates.len(),
            last_error: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "Unknown error".to_string()),
        })
    }

    async fn post(&self, endpoint: &str, method: &str, params: &Value) -> Result<Value, NetworkError> {
        let payload = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        });

        let response = self
            .client
            .post(endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(|e| NetworkError::Transport {
                endpoint: endpoint.to_string(),
                message: e.to_string(),
            })?;

        if response.status() != StatusCode::OK {
            return Err(NetworkError::HttpStatus {
                endpoint: endpoint.to_string(),
                status: response.status().as_u16(),
            });
        }

        let body: Value = response.json().await.map_err(|e| NetworkError::MalformedBody {
            endpoint: endpoint.to_string(),
            message: e.to_string(),
        })?;

        if let Some(rpc_error) = body.get("error") {
            let message = rpc_error
                .get("message")
                .and_then(Value::as_str)
                .map(|s| s.to_string())
                .unwrap_or_else(|| rpc_error.to_string());
            return Err(NetworkError::Rpc {
                endpoint: endpoint.to_string(),
                message,
            });
        }

        body.get("result")
            .cloned()
            .ok_or_else(|| NetworkError::MissingResult {
                endpoint: endpoint.to_string(),
            })
    }
}
