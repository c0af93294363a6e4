//! Runtime configuration
//!
//! Read once at startup from the environment (after `dotenvy` has loaded any
//! `.env` file).
//!
//! # Environment Variables
//!
//! * `STEEM_NODES` - Comma-separated node URLs in priority order
//! * `NODE_TIMEOUT_SECS` - Per-request timeout (default: 5)
//! * `RETRY_BASE_DELAY_MS` - First retry delay, doubled per attempt (default: 250)
//! * `HISTORY_BATCH_SIZE` - History entries per request (default: 500)
//! * `VOTE_BUFFER_DAYS` - Extra days scanned for votes (default: 14)
//! * `DEFAULT_VOTING_POWER` - Voting power used for valuations (default: 9200)
//! * `ENRICHMENT_CONCURRENCY` - Records enriched at once (default: 4)
//! * `BIND_ADDR` - HTTP listen address (default: 0.0.0.0:3000)

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::services::history_scanner::{ScanConfig, DEFAULT_BATCH_SIZE, DEFAULT_VOTE_BUFFER_DAYS};
use crate::services::node_pool::{DEFAULT_RETRY_BASE_DELAY_MS, DEFAULT_TIMEOUT_SECS};
use crate::services::reward_matcher::DEFAULT_ENRICHMENT_CONCURRENCY;
use crate::services::vote_calculator::DEFAULT_VOTING_POWER;

pub const DEFAULT_NODES: [&str; 3] = [
    "https://api.moecki.online",
    "https://api.steemit.com",
    "https://api.justyy.com",
];

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

const ENV_STEEM_NODES: &str = "STEEM_NODES";
const ENV_NODE_TIMEOUT: &str = "NODE_TIMEOUT_SECS";
const ENV_RETRY_BASE_DELAY: &str = "RETRY_BASE_DELAY_MS";
const ENV_BATCH_SIZE: &str = "HISTORY_BATCH_SIZE";
const ENV_VOTE_BUFFER_DAYS: &str = "VOTE_BUFFER_DAYS";
const ENV_VOTING_POWER: &str = "DEFAULT_VOTING_POWER";
const ENV_ENRICHMENT_CONCURRENCY: &str = "ENRICHMENT_CONCURRENCY";
const ENV_BIND_ADDR: &str = "BIND_ADDR";

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    Invalid { key: &'static str, value: String, reason: String },
    NoNodes,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Invalid { key, value, reason } => {
                write!(f, "Invalid {}='{}': {}", key, value, reason)
            }
            ConfigError::NoNodes => write!(f, "{} contains no node URLs", ENV_STEEM_NODES),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzerConfig {
    pub nodes: Vec<String>,
    pub node_timeout: Duration,
    pub retry_base_delay: Duration,
    pub scan: ScanConfig,
    pub default_voting_power: u16,
    pub enrichment_concurrency: usize,
    pub bind_addr: String,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            nodes: DEFAULT_NODES.iter().map(|s| s.to_string()).collect(),
            node_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            retry_base_delay: Duration::from_millis(DEFAULT_RETRY_BASE_DELAY_MS),
            scan: ScanConfig {
                batch_size: DEFAULT_BATCH_SIZE,
                vote_buffer_days: DEFAULT_VOTE_BUFFER_DAYS,
            },
            default_voting_power: DEFAULT_VOTING_POWER,
            enrichment_concurrency: DEFAULT_ENRICHMENT_CONCURRENCY,
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
        }
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            value: raw.clone(),
            reason: e.to_string(),
        }),
        _ => Ok(default),
    }
}

fn positive<T: PartialOrd + Default>(key: &'static str, value: T, raw: impl ToString) -> Result<T, ConfigError> {
    if value > T::default() {
        Ok(value)
    } else {
        Err(ConfigError::Invalid {
            key,
            value: raw.to_string(),
            reason: "must be greater than zero".to_string(),
        })
    }
}

impl AnalyzerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; unset keys take their defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let nodes = match lookup(ENV_STEEM_NODES) {
            Some(raw) => {
                let nodes: Vec<String> = raw
                    .split(',')
                    .map(|s| s.trim().trim_end_matches('/').to_string())
                    .filter(|s| !s.is_empty())
                    .collect();
                if nodes.is_empty() {
                    return Err(ConfigError::NoNodes);
                }
                nodes
            }
            None => defaults.nodes,
        };

        let timeout_secs = parse_or(&lookup, ENV_NODE_TIMEOUT, DEFAULT_TIMEOUT_SECS)?;
        let timeout_secs = positive(ENV_NODE_TIMEOUT, timeout_secs, timeout_secs)?;
        let retry_ms = parse_or(&lookup, ENV_RETRY_BASE_DELAY, DEFAULT_RETRY_BASE_DELAY_MS)?;
        let batch_size = parse_or(&lookup, ENV_BATCH_SIZE, DEFAULT_BATCH_SIZE)?;
        let batch_size = positive(ENV_BATCH_SIZE, batch_size, batch_size)?;
        let vote_buffer_days = parse_or(&lookup, ENV_VOTE_BUFFER_DAYS, DEFAULT_VOTE_BUFFER_DAYS)?;

        let default_voting_power = parse_or(&lookup, ENV_VOTING_POWER, DEFAULT_VOTING_POWER)?;
        if default_voting_power > 10000 {
            return Err(ConfigError::Invalid {
                key: ENV_VOTING_POWER,
                value: default_voting_power.to_string(),
                reason: "must be between 0 and 10000".to_string(),
            });
        }

        let concurrency = parse_or(&lookup, ENV_ENRICHMENT_CONCURRENCY, DEFAULT_ENRICHMENT_CONCURRENCY)?;
        let concurrency = positive(ENV_ENRICHMENT_CONCURRENCY, concurrency, concurrency)?;

        Ok(Self {
            nodes,
            node_timeout: Duration::from_secs(timeout_secs),
            retry_base_delay: Duration::from_millis(retry_ms),
            scan: ScanConfig {
                batch_size,
                vote_buffer_days,
            },
            default_voting_power,
            enrichment_concurrency: concurrency,
            bind_addr: lookup(ENV_BIND_ADDR).unwrap_or(defaults.bind_addr),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<AnalyzerConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AnalyzerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config, AnalyzerConfig::default());
        assert_eq!(config.nodes.len(), 3);
        assert_eq!(config.scan.batch_size, 500);
        assert_eq!(config.default_voting_power, 9200);
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("STEEM_NODES", " https://a.example/ ,https://b.example,, "),
            ("NODE_TIMEOUT_SECS", "10"),
            ("HISTORY_BATCH_SIZE", "100"),
            ("DEFAULT_VOTING_POWER", "10000"),
            ("BIND_ADDR", "127.0.0.1:8080"),
        ])
        .unwrap();

        assert_eq!(config.nodes, vec!["https://a.example", "https://b.example"]);
        assert_eq!(config.node_timeout, Duration::from_secs(10));
        assert_eq!(config.scan.batch_size, 100);
        assert_eq!(config.default_voting_power, 10000);
        assert_eq!(config.bind_addr, "127.0.0.1:8080");
    }

    #[test]
    fn test_invalid_values_fail_fast() {
        assert!(matches!(
            config_from(&[("HISTORY_BATCH_SIZE", "lots")]),
            Err(ConfigError::Invalid { key: "HISTORY_BATCH_SIZE", .. })
        ));
        assert!(matches!(
            config_from(&[("HISTORY_BATCH_SIZE", "0")]),
            Err(ConfigError::Invalid { .. })
        ));
        assert!(matches!(
            config_from(&[("DEFAULT_VOTING_POWER", "12000")]),
            Err(ConfigError::Invalid { .. })
        ));
        assert_eq!(config_from(&[("STEEM_NODES", " , ")]), Err(ConfigError::NoNodes));
    }
}
