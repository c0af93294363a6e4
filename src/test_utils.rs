//! In-memory chain used by unit and integration tests

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::models::amount::Amount;
use crate::models::curation::ActiveVote;
use crate::models::operation::{
    parse_chain_timestamp, CurationRewardOperation, HistoryEntry, Operation, VoteKey, VoteOperation,
};
use crate::services::node_pool::NetworkError;
use crate::services::steem_api::{
    AccountStake, ChainApi, ChainError, ContentInfo, MedianPrice, RewardFund, VestingTotals,
};

/// Parse a chain timestamp, panicking on bad input
pub fn ts(raw: &str) -> DateTime<Utc> {
    parse_chain_timestamp(raw).unwrap_or_else(|e| panic!("bad test timestamp: {}", e))
}

/// A chain whose history and network state are set up front.
///
/// History indexes are assigned in insertion order, so entries must be added
/// oldest first. Network lookups that were never configured answer with a
/// `DataFormat` error.
#[derive(Clone)]
pub struct StubChain {
    exists: bool,
    failure: Option<NetworkError>,
    history: Vec<HistoryEntry>,
    stakes: HashMap<String, AccountStake>,
    totals: Option<VestingTotals>,
    fund: Option<RewardFund>,
    median: Option<MedianPrice>,
    contents: HashMap<VoteKey, ContentInfo>,
    fail_history_after: Option<usize>,
    history_calls: Arc<AtomicUsize>,
}

impl Default for StubChain {
    fn default() -> Self {
        Self::new()
    }
}

impl StubChain {
    pub fn new() -> Self {
        Self {
            exists: true,
            failure: None,
            history: Vec::new(),
            stakes: HashMap::new(),
            totals: None,
            fund: None,
            median: None,
            contents: HashMap::new(),
            fail_history_after: None,
            history_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn push(mut self, timestamp: &str, operation: Operation) -> Self {
        let index = self.history.len() as u64;
        self.history.push(HistoryEntry {
            index,
            timestamp_raw: timestamp.to_string(),
            operation,
        });
        self
    }

    pub fn with_vote(self, timestamp: &str, voter: &str, author: &str, permlink: &str, weight: i32) -> Self {
        self.push(
            timestamp,
            Operation::Vote(VoteOperation {
                voter: voter.to_string(),
                author: author.to_string(),
                permlink: permlink.to_string(),
                weight,
            }),
        )
    }

    pub fn with_reward(self, timestamp: &str, curator: &str, author: &str, permlink: &str, vests: Decimal) -> Self {
        self.push(
            timestamp,
            Operation::CurationReward(CurationRewardOperation {
                curator: curator.to_string(),
                reward: Amount::StringAmount(format!("{} VESTS", vests)),
                comment_author: author.to_string(),
                comment_permlink: permlink.to_string(),
            }),
        )
    }

    pub fn with_other(self, timestamp: &str, op_type: &str) -> Self {
        self.push(timestamp, Operation::Other(op_type.to_string()))
    }

    pub fn with_stake(mut self, account: &str, vesting_shares: Decimal, delegated: Decimal, received: Decimal) -> Self {
        self.stakes.insert(
            account.to_string(),
            AccountStake {
                name: account.to_string(),
                vesting_shares,
                delegated_vesting_shares: delegated,
                received_vesting_shares: received,
            },
        );
        self
    }

    /// Global state: vesting fund and shares, reward fund, median `base / 1.000`
    pub fn with_network(
        mut self,
        total_vesting_fund_steem: Decimal,
        total_vesting_shares: Decimal,
        reward_balance: Decimal,
        recent_claims: Decimal,
        median_base: Decimal,
    ) -> Self {
        self.totals = Some(VestingTotals {
            total_vesting_fund_steem,
            total_vesting_shares,
        });
        self.fund = Some(RewardFund {
            name: "post".to_string(),
            recent_claims,
            reward_balance,
        });
        self.median = Some(MedianPrice {
            base: median_base,
            base_symbol: Some("SBD".to_string()),
            quote: Decimal::ONE,
            quote_symbol: Some("STEEM".to_string()),
        });
        self
    }

    pub fn with_content(mut self, author: &str, permlink: &str, created: &str, active_votes: Vec<ActiveVote>) -> Self {
        self.contents.insert(
            VoteKey::new(author, permlink),
            ContentInfo {
                author: author.to_string(),
                permlink: permlink.to_string(),
                created: ts(created),
                active_votes,
            },
        );
        self
    }

    /// Every call fails as if no node answered
    pub fn unreachable(mut self) -> Self {
        self.failure = Some(NetworkError::NoReachableNode);
        self
    }

    /// Every call fails as if all nodes answered probes but rejected the RPC
    pub fn rejecting_rpc(mut self) -> Self {
        self.failure = Some(NetworkError::Exhausted {
            method: "stub".to_string(),
            attempts: 1,
            last_error: "HTTP 502".to_string(),
        });
        self
    }

    pub fn without_account(mut self) -> Self {
        self.exists = false;
        self
    }

    /// History batches after the first `calls` fail with a transport error
    pub fn fail_history_after(mut self, calls: usize) -> Self {
        self.fail_history_after = Some(calls);
        self
    }

    /// Counter of `account_history` calls, shared across clones
    pub fn history_calls(&self) -> Arc<AtomicUsize> {
        self.history_calls.clone()
    }

    fn reachable(&self) -> Result<(), ChainError> {
        match &self.failure {
            Some(err) => Err(ChainError::Network(err.clone())),
            None => Ok(()),
        }
    }

    fn configured<T: Clone>(value: &Option<T>, what: &str) -> Result<T, ChainError> {
        value
            .clone()
            .ok_or_else(|| ChainError::DataFormat(format!("{} not available", what)))
    }
}

#[async_trait]
impl ChainApi for StubChain {
    async fn account_exists(&self, _account: &str) -> Result<bool, ChainError> {
        self.reachable()?;
        Ok(self.exists)
    }

    async fn latest_history_index(&self, _account: &str) -> Result<Option<u64>, ChainError> {
        self.reachable()?;
        Ok(self.history.last().map(|entry| entry.index))
    }

    async fn account_history(&self, _account: &str, start: u64, limit: u64) -> Result<Vec<HistoryEntry>, ChainError> {
        self.reachable()?;
        let call = self.history_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_history_after.is_some_and(|allowed| call >= allowed) {
            return Err(ChainError::Network(NetworkError::Transport {
                endpoint: "stub".to_string(),
                message: "connection reset".to_string(),
            }));
        }

        let from = start.saturating_sub(limit);
        Ok(self
            .history
            .iter()
            .filter(|entry| entry.index >= from && entry.index <= start)
            .cloned()
            .collect())
    }

    async fn account_stake(&self, account: &str) -> Result<AccountStake, ChainError> {
        self.reachable()?;
        self.stakes
            .get(account)
            .cloned()
            .ok_or_else(|| ChainError::NotFound(format!("account '{}'", account)))
    }

    async fn vesting_totals(&self) -> Result<VestingTotals, ChainError> {
        self.reachable()?;
        Self::configured(&self.totals, "vesting totals")
    }

    async fn reward_fund(&self, _fund_name: &str) -> Result<RewardFund, ChainError> {
        self.reachable()?;
        Self::configured(&self.fund, "reward fund")
    }

    async fn median_price(&self) -> Result<MedianPrice, ChainError> {
        self.reachable()?;
        Self::configured(&self.median, "median price")
    }

    async fn content(&self, author: &str, permlink: &str) -> Result<ContentInfo, ChainError> {
        self.reachable()?;
        self.contents
            .get(&VoteKey::new(author, permlink))
            .cloned()
            .ok_or_else(|| ChainError::NotFound(format!("post @{}/{}", author, permlink)))
    }
}
