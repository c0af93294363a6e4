//! Typed access to the Steem condenser API
//!
//! `ChainApi` is the seam between the analyzer and the network. The real
//! implementation (`SteemRpcClient`) issues JSON-RPC calls through the
//! `NodePool`; tests plug in canned chains instead.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::str::FromStr;

use crate::models::amount::Amount;
use crate::models::curation::ActiveVote;
use crate::models::operation::{parse_chain_timestamp, HistoryEntry};
use crate::services::node_pool::{NetworkError, NodePool};

pub const METHOD_ACCOUNT_HISTORY: &str = "condenser_api.get_account_history";
pub const METHOD_ACCOUNTS: &str = "condenser_api.get_accounts";
pub const METHOD_GLOBAL_PROPERTIES: &str = "condenser_api.get_dynamic_global_properties";
pub const METHOD_REWARD_FUND: &str = "condenser_api.get_reward_fund";
pub const METHOD_MEDIAN_PRICE: &str = "condenser_api.get_current_median_history_price";
pub const METHOD_CONTENT: &str = "condenser_api.get_content";

/// Error types for chain reads
#[derive(Debug, Clone, PartialEq)]
pub enum ChainError {
    Network(NetworkError),
    DataFormat(String),
    NotFound(String),
}

impl ChainError {
    /// True when no configured node could be reached, or every node refused the call
    pub fn is_no_usable_node(&self) -> bool {
        matches!(
            self,
            ChainError::Network(NetworkError::NoReachableNode | NetworkError::Exhausted { .. })
        )
    }
}

impl std::fmt::Display for ChainError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChainError::Network(e) => write!(f, "Network error: {}", e),
            ChainError::DataFormat(msg) => write!(f, "Data format error: {}", msg),
            ChainError::NotFound(msg) => write!(f, "Not found: {}", msg),
        }
    }
}

impl std::error::Error for ChainError {}

impl From<NetworkError> for ChainError {
    fn from(err: NetworkError) -> Self {
        ChainError::Network(err)
    }
}

/// Network-wide vesting totals from the dynamic global properties
#[derive(Debug, Clone, PartialEq)]
pub struct VestingTotals {
    pub total_vesting_fund_steem: Decimal,
    pub total_vesting_shares: Decimal,
}

impl VestingTotals {
    pub fn steem_per_vests(&self) -> Option<Decimal> {
        self.total_vesting_fund_steem.checked_div(self.total_vesting_shares)
    }

    /// Convert VESTS to STEEM Power
    pub fn vests_to_sp(&self, vests: Decimal) -> Option<Decimal> {
        self.steem_per_vests()
            .and_then(|steem_per_vests| vests.checked_mul(steem_per_vests))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AccountStake {
    pub name: String,
    pub vesting_shares: Decimal,
    pub delegated_vesting_shares: Decimal,
    pub received_vesting_shares: Decimal,
}

impl AccountStake {
    /// Owned minus delegated out plus delegated in
    pub fn effective_vests(&self) -> Decimal {
        self.vesting_shares - self.delegated_vesting_shares + self.received_vesting_shares
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RewardFund {
    pub name: String,
    pub recent_claims: Decimal,
    pub reward_balance: Decimal,
}

/// Median STEEM price as `base / quote`, e.g. "0.250 SBD" / "1.000 STEEM"
#[derive(Debug, Clone, PartialEq)]
pub struct MedianPrice {
    pub base: Decimal,
    pub base_symbol: Option<String>,
    pub quote: Decimal,
    pub quote_symbol: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContentInfo {
    pub author: String,
    pub permlink: String,
    pub created: DateTime<Utc>,
    pub active_votes: Vec<ActiveVote>,
}

#[async_trait]
pub trait ChainApi: Send + Sync {
    /// Whether the account exists on chain
    async fn account_exists(&self, account: &str) -> Result<bool, ChainError>;

    /// Index of the newest history entry, `None` for an empty history
    async fn latest_history_index(&self, account: &str) -> Result<Option<u64>, ChainError>;

    /// History entries with indexes in `[start - limit, start]`, oldest first
    async fn account_history(
        &self,
        account: &str,
        start: u64,
        limit: u64,
    ) -> Result<Vec<HistoryEntry>, ChainError>;

    async fn account_stake(&self, account: &str) -> Result<AccountStake, ChainError>;

    async fn vesting_totals(&self) -> Result<VestingTotals, ChainError>;

    async fn reward_fund(&self, fund_name: &str) -> Result<RewardFund, ChainError>;

    async fn median_price(&self) -> Result<MedianPrice, ChainError>;

    async fn content(&self, author: &str, permlink: &str) -> Result<ContentInfo, ChainError>;
}

/// `ChainApi` over JSON-RPC through a `NodePool`
#[derive(Clone)]
pub struct SteemRpcClient {
    pool: NodePool,
}

impl SteemRpcClient {
    pub fn new(pool: NodePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &NodePool {
        &self.pool
    }
}

#[async_trait]
impl ChainApi for SteemRpcClient {
    async fn account_exists(&self, account: &str) -> Result<bool, ChainError> {
        let result = self.pool.call(METHOD_ACCOUNTS, json!([[account]])).await?;
        decode_account_exists(&result)
    }

    async fn latest_history_index(&self, account: &str) -> Result<Option<u64>, ChainError> {
        let result = self
            .pool
            .call(METHOD_ACCOUNT_HISTORY, json!([account, -1, 1]))
            .await?;
        let entries = decode_history(&result)?;
        Ok(entries.iter().map(|entry| entry.index).max())
    }

    async fn account_history(
        &self,
        account: &str,
        start: u64,
        limit: u64,
    ) -> Result<Vec<HistoryEntry>, ChainError> {
        let result = self
            .pool
            .call(METHOD_ACCOUNT_HISTORY, json!([account, start, limit]))
            .await?;
        decode_history(&result)
    }

    async fn account_stake(&self, account: &str) -> Result<AccountStake, ChainError> {
        let result = self.pool.call(METHOD_ACCOUNTS, json!([[account]])).await?;
        decode_account_stake(account, &result)
    }

    async fn vesting_totals(&self) -> Result<VestingTotals, ChainError> {
        let result = self.pool.call(METHOD_GLOBAL_PROPERTIES, json!([])).await?;
        decode_vesting_totals(&result)
    }

    async fn reward_fund(&self, fund_name: &str) -> Result<RewardFund, ChainError> {
        let result = self.pool.call(METHOD_REWARD_FUND, json!([fund_name])).await?;
        decode_reward_fund(&result)
    }

    async fn median_price(&self) -> Result<MedianPrice, ChainError> {
        let result = self.pool.call(METHOD_MEDIAN_PRICE, json!([])).await?;
        decode_median_price(&result)
    }

    async fn content(&self, author: &str, permlink: &str) -> Result<ContentInfo, ChainError> {
        let result = self.pool.call(METHOD_CONTENT, json!([author, permlink])).await?;
        decode_content(author, permlink, &result)
    }
}

pub fn decode_history(result: &Value) -> Result<Vec<HistoryEntry>, ChainError> {
    let entries = result
        .as_array()
        .ok_or_else(|| ChainError::DataFormat(format!("account history is not a list: {}", result)))?;

    entries
        .iter()
        .map(|raw| HistoryEntry::from_value(raw).map_err(ChainError::DataFormat))
        .collect()
}

pub fn decode_account_exists(result: &Value) -> Result<bool, ChainError> {
    result
        .as_array()
        .map(|accounts| !accounts.is_empty())
        .ok_or_else(|| ChainError::DataFormat(format!("get_accounts result is not an array: {}", result)))
}

pub fn decode_account_stake(account: &str, result: &Value) -> Result<AccountStake, ChainError> {
    let record = result
        .as_array()
        .and_then(|accounts| accounts.first())
        .ok_or_else(|| ChainError::NotFound(format!("account '{}'", account)))?;

    Ok(AccountStake {
        name: account.to_string(),
        vesting_shares: amount_field(record, "vesting_shares")?,
        delegated_vesting_shares: amount_field(record, "delegated_vesting_shares")?,
        received_vesting_shares: amount_field(record, "received_vesting_shares")?,
    })
}

pub fn decode_vesting_totals(result: &Value) -> Result<VestingTotals, ChainError> {
    Ok(VestingTotals {
        total_vesting_fund_steem: amount_field(result, "total_vesting_fund_steem")?,
        total_vesting_shares: amount_field(result, "total_vesting_shares")?,
    })
}

pub fn decode_reward_fund(result: &Value) -> Result<RewardFund, ChainError> {
    let recent_claims = match result.get("recent_claims") {
        Some(Value::String(s)) => Decimal::from_str(s.trim())
            .map_err(|e| ChainError::DataFormat(format!("recent_claims '{}': {}", s, e)))?,
        Some(Value::Number(n)) => Decimal::from_str(&n.to_string())
            .map_err(|e| ChainError::DataFormat(format!("recent_claims {}: {}", n, e)))?,
        Some(other) => {
            return Err(ChainError::DataFormat(format!("recent_claims has unexpected shape: {}", other)));
        }
        None => return Err(ChainError::DataFormat("reward fund without recent_claims".to_string())),
    };

    Ok(RewardFund {
        name: result
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or("post")
            .to_string(),
        recent_claims,
        reward_balance: amount_field(result, "reward_balance")?,
    })
}

pub fn decode_median_price(result: &Value) -> Result<MedianPrice, ChainError> {
    let (base, base_symbol) = amount_with_symbol(result, "base")?;
    let (quote, quote_symbol) = amount_with_symbol(result, "quote")?;

    Ok(MedianPrice {
        base,
        base_symbol,
        quote,
        quote_symbol,
    })
}

pub fn decode_content(author: &str, permlink: &str, result: &Value) -> Result<ContentInfo, ChainError> {
    // Nodes answer unknown posts with an empty placeholder instead of an error
    let found_author = result.get("author").and_then(Value::as_str).unwrap_or("");
    if found_author.is_empty() {
        return Err(ChainError::NotFound(format!("post @{}/{}", author, permlink)));
    }

    let created_raw = result
        .get("created")
        .and_then(Value::as_str)
        .ok_or_else(|| ChainError::DataFormat(format!("post @{}/{} without created", author, permlink)))?;
    let created = parse_chain_timestamp(created_raw).map_err(|e| ChainError::DataFormat(e.to_string()))?;

    let active_votes = result
        .get("active_votes")
        .and_then(Value::as_array)
        .map(|votes| votes.iter().filter_map(decode_active_vote).collect())
        .unwrap_or_default();

    Ok(ContentInfo {
        author: found_author.to_string(),
        permlink: permlink.to_string(),
        created,
        active_votes,
    })
}

fn decode_active_vote(raw: &Value) -> Option<ActiveVote> {
    let voter = raw.get("voter")?.as_str()?.to_string();

    Some(ActiveVote {
        voter,
        percent: raw.get("percent").and_then(integer_value).unwrap_or(0),
        rshares: raw.get("rshares").and_then(integer_value).unwrap_or(0),
        time: raw
            .get("time")
            .and_then(Value::as_str)
            .and_then(|t| parse_chain_timestamp(t).ok()),
    })
}

fn integer_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn amount_field(record: &Value, field: &str) -> Result<Decimal, ChainError> {
    amount_with_symbol(record, field).map(|(value, _)| value)
}

fn amount_with_symbol(record: &Value, field: &str) -> Result<(Decimal, Option<String>), ChainError> {
    let raw = record
        .get(field)
        .ok_or_else(|| ChainError::DataFormat(format!("missing field '{}'", field)))?;
    let amount = Amount::from_value(raw)
        .map_err(|e| ChainError::DataFormat(format!("{}: {}", field, e)))?;
    let value = amount
        .to_decimal()
        .map_err(|e| ChainError::DataFormat(format!("{}: {}", field, e)))?;

    Ok((value, amount.symbol()))
}
