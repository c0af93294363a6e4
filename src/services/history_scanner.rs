//! Backward scan of an account's operation history
//!
//! Curation rewards are paid roughly seven days after the vote, so a reward
//! inside the reporting window usually points at a vote from before it. The
//! scan therefore walks further back for votes (`vote_buffer_days`) than for
//! rewards, newest to oldest, and stops at the first entry older than the
//! vote cutoff.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::models::curation::AnalysisStatus;
use crate::models::operation::{CurationRewardOperation, Operation, VoteKey, VoteOperation};
use crate::services::steem_api::{ChainApi, ChainError};

pub const DEFAULT_BATCH_SIZE: u64 = 500;
pub const DEFAULT_VOTE_BUFFER_DAYS: u32 = 14;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanConfig {
    pub batch_size: u64,
    pub vote_buffer_days: u32,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            vote_buffer_days: DEFAULT_VOTE_BUFFER_DAYS,
        }
    }
}

/// A vote cast by the scanned account
#[derive(Debug, Clone, PartialEq)]
pub struct VoteEvent {
    pub index: u64,
    pub timestamp: Option<DateTime<Utc>>,
    pub vote: VoteOperation,
}

/// A curation reward inside the reporting window
#[derive(Debug, Clone, PartialEq)]
pub struct RewardEvent {
    pub index: u64,
    pub timestamp: DateTime<Utc>,
    pub reward: CurationRewardOperation,
}

impl RewardEvent {
    pub fn key(&self) -> VoteKey {
        self.reward.key()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScanResult {
    pub votes_by_key: HashMap<VoteKey, VoteEvent>,
    pub rewards: Vec<RewardEvent>, // newest first
    pub status: AnalysisStatus,
    pub operations_scanned: usize,
    pub batches: usize,
}

impl ScanResult {
    fn empty(status: AnalysisStatus) -> Self {
        Self {
            votes_by_key: HashMap::new(),
            rewards: Vec::new(),
            status,
            operations_scanned: 0,
            batches: 0,
        }
    }
}

/// Map a chain error to the status a scan reports. No reachable node, or every
/// node rejecting the call, before any data was read is "no usable node";
/// anything later is an interruption.
fn status_for(error: &ChainError, batches_read: usize) -> AnalysisStatus {
    match error {
        e if e.is_no_usable_node() && batches_read == 0 => AnalysisStatus::NoUsableNode,
        ChainError::NotFound(_) if batches_read == 0 => AnalysisStatus::AccountNotFound,
        e => AnalysisStatus::Interrupted {
            reason: e.to_string(),
        },
    }
}

#[derive(Clone)]
pub struct HistoryScanner {
    chain: Arc<dyn ChainApi>,
    config: ScanConfig,
}

impl HistoryScanner {
    pub fn new(chain: Arc<dyn ChainApi>, config: ScanConfig) -> Self {
        Self { chain, config }
    }

    pub async fn scan(&self, account: &str, days_back: u32) -> ScanResult {
        self.scan_at(account, days_back, Utc::now()).await
    }

    /// Scan with an explicit "now", so windows are reproducible
    pub async fn scan_at(&self, account: &str, days_back: u32, now: DateTime<Utc>) -> ScanResult {
        let reward_cutoff = now - Duration::days(i64::from(days_back));
        let vote_cutoff = reward_cutoff - Duration::days(i64::from(self.config.vote_buffer_days));
        let batch_size = self.config.batch_size.max(1);

        info!(
            account = %account,
            days_back = days_back,
            reward_cutoff = %reward_cutoff,
            vote_cutoff = %vote_cutoff,
            "Scanning account history"
        );

        match self.chain.account_exists(account).await {
            Ok(true) => {}
            Ok(false) => {
                warn!(account = %account, "Account not found");
                return ScanResult::empty(AnalysisStatus::AccountNotFound);
            }
            Err(e) => {
                warn!(account = %account, error = %e, "Unable to resolve account");
                return ScanResult::empty(status_for(&e, 0));
            }
        }

        let mut cursor = match self.chain.latest_history_index(account).await {
            Ok(Some(index)) => index,
            Ok(None) => {
                info!(account = %account, "Account has no history");
                return ScanResult::empty(AnalysisStatus::Complete);
            }
            Err(e) => {
                warn!(account = %account, error = %e, "Unable to read history size");
                return ScanResult::empty(status_for(&e, 0));
            }
        };

        let mut result = ScanResult::empty(AnalysisStatus::Complete);

        'batches: loop {
            let batch_stop = cursor.saturating_sub(batch_size);

            let entries = match self
                .chain
                .account_history(account, cursor, cursor - batch_stop)
                .await
            {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(
                        account = %account,
                        cursor = cursor,
                        error = %e,
                        "History batch failed, stopping scan"
                    );
                    result.status = status_for(&e, result.batches);
                    break 'batches;
                }
            };
            result.batches += 1;

            debug!(
                account = %account,
                from = batch_stop,
                to = cursor,
                entries = entries.len(),
                "Fetched history batch"
            );

            for entry in entries.iter().rev() {
                // The boundary entry belongs to the next batch
                if entry.index > cursor || (entry.index == batch_stop && batch_stop > 0) {
                    continue;
                }
                result.operations_scanned += 1;

                let timestamp = match entry.timestamp() {
                    Ok(ts) => Some(ts),
                    Err(e) => {
                        debug!(index = entry.index, error = %e, "Skipping window checks for entry");
                        None
                    }
                };

                if let Some(ts) = timestamp {
                    if ts < vote_cutoff {
                        debug!(index = entry.index, timestamp = %ts, "Reached vote cutoff");
                        break 'batches;
                    }
                }

                match &entry.operation {
                    Operation::Vote(vote) if vote.voter == account => {
                        // Walking backward, the first vote seen for a key is the most recent
                        result
                            .votes_by_key
                            .entry(vote.key())
                            .or_insert_with(|| VoteEvent {
                                index: entry.index,
                                timestamp,
                                vote: vote.clone(),
                            });
                    }
                    Operation::CurationReward(reward) => {
                        if let Some(ts) = timestamp.filter(|ts| *ts >= reward_cutoff && *ts <= now) {
                            result.rewards.push(RewardEvent {
                                index: entry.index,
                                timestamp: ts,
                                reward: reward.clone(),
                            });
                        }
                    }
                    _ => {}
                }
            }

            if batch_stop == 0 {
                break;
            }
            cursor = batch_stop;
        }

        info!(
            account = %account,
            batches = result.batches,
            operations = result.operations_scanned,
            votes = result.votes_by_key.len(),
            rewards = result.rewards.len(),
            status = ?result.status,
            "History scan finished"
        );

        result
    }
}
