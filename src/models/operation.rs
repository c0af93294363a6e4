//! Account history entries and the operation variants the analyzer cares about

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::amount::Amount;

/// Timestamp layouts accepted from nodes, tried before RFC 3339
const CHAIN_TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"];

#[derive(Debug, Clone, PartialEq)]
pub struct TimestampParseError {
    pub raw: String,
}

impl std::fmt::Display for TimestampParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Unparsable timestamp: '{}'", self.raw)
    }
}

impl std::error::Error for TimestampParseError {}

/// Parse a node timestamp. Chain timestamps carry no offset and are UTC.
pub fn parse_chain_timestamp(raw: &str) -> Result<DateTime<Utc>, TimestampParseError> {
    let trimmed = raw.trim();

    for format in CHAIN_TIMESTAMP_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(naive.and_utc());
        }
    }

    DateTime::parse_from_rfc3339(trimmed)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| TimestampParseError {
            raw: raw.to_string(),
        })
}

/// Join key between a vote and the curation reward it produces: `author/permlink`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VoteKey(String);

impl VoteKey {
    pub fn new(author: &str, permlink: &str) -> Self {
        VoteKey(format!("{}/{}", author, permlink))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for VoteKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteOperation {
    pub voter: String,
    pub author: String,
    pub permlink: String,
    pub weight: i32, // -10000..=10000
}

impl VoteOperation {
    pub fn key(&self) -> VoteKey {
        VoteKey::new(&self.author, &self.permlink)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CurationRewardOperation {
    pub curator: String,
    pub reward: Amount, // VESTS
    pub comment_author: String,
    pub comment_permlink: String,
}

impl CurationRewardOperation {
    pub fn key(&self) -> VoteKey {
        VoteKey::new(&self.comment_author, &self.comment_permlink)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Vote(VoteOperation),
    CurationReward(CurationRewardOperation),
    Other(String),
}

impl Operation {
    /// Build from an operation name and body. Both `vote` and the appbase
    /// `vote_operation` spellings are recognized. A known type whose body does
    /// not decode is kept as `Other` so one bad entry cannot stop a scan.
    pub fn from_parts(op_type: &str, body: &Value) -> Self {
        let name = op_type.strip_suffix("_operation").unwrap_or(op_type);

        match name {
            "vote" => match serde_json::from_value::<VoteOperation>(body.clone()) {
                Ok(vote) => Operation::Vote(vote),
                Err(e) => {
                    tracing::debug!(error = %e, "Undecodable vote body, ignoring");
                    Operation::Other(name.to_string())
                }
            },
            "curation_reward" => {
                match serde_json::from_value::<CurationRewardOperation>(body.clone()) {
                    Ok(reward) => Operation::CurationReward(reward),
                    Err(e) => {
                        tracing::debug!(error = %e, "Undecodable curation_reward body, ignoring");
                        Operation::Other(name.to_string())
                    }
                }
            }
            other => Operation::Other(other.to_string()),
        }
    }

    pub fn type_name(&self) -> &str {
        match self {
            Operation::Vote(_) => "vote",
            Operation::CurationReward(_) => "curation_reward",
            Operation::Other(name) => name,
        }
    }
}

/// One entry of `get_account_history`, i.e. `[index, {timestamp, op, ...}]`
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub index: u64,
    pub timestamp_raw: String,
    pub operation: Operation,
}

impl HistoryEntry {
    /// Decode a raw history tuple. The operation may be a legacy
    /// `["vote", {...}]` pair or an appbase `{"type": ..., "value": {...}}`.
    pub fn from_value(raw: &Value) -> Result<Self, String> {
        let index = raw
            .get(0)
            .and_then(Value::as_u64)
            .ok_or_else(|| format!("history entry without index: {}", raw))?;
        let body = raw
            .get(1)
            .ok_or_else(|| format!("history entry {} without body", index))?;

        let timestamp_raw = match body.get("timestamp") {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        };

        let op = body
            .get("op")
            .ok_or_else(|| format!("history entry {} without op", index))?;

        let operation = match op {
            Value::Array(pair) if pair.len() == 2 => match pair[0].as_str() {
                Some(op_type) => Operation::from_parts(op_type, &pair[1]),
                None => return Err(format!("history entry {} has a non-string op type", index)),
            },
            Value::Object(map) => match (map.get("type").and_then(Value::as_str), map.get("value")) {
                (Some(op_type), Some(value)) => Operation::from_parts(op_type, value),
                _ => return Err(format!("history entry {} has an incomplete op object", index)),
            },
            _ => return Err(format!("history entry {} has an unrecognized op shape", index)),
        };

        Ok(HistoryEntry {
            index,
            timestamp_raw,
            operation,
        })
    }

    pub fn timestamp(&self) -> Result<DateTime<Utc>, TimestampParseError> {
        parse_chain_timestamp(&self.timestamp_raw)
    }
}
