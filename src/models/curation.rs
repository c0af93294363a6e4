//! Matched reward records and the per-run report handed to presentation layers

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// The vote that earned a curation reward
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteInfo {
    pub weight: i32,
    pub timestamp: Option<DateTime<Utc>>,
}

/// One entry of a post's current vote list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveVote {
    pub voter: String,
    pub percent: i64,
    pub rshares: i64,
    pub time: Option<DateTime<Utc>>,
}

/// A curation reward, enriched with its originating vote when one was found.
///
/// Every vote-derived field is optional: unmatched rewards carry none of them,
/// and matched rewards only lose the fields whose lookup failed (the reason
/// lands in `enrichment_errors`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedRecord {
    pub timestamp: DateTime<Utc>,
    pub curator: String,
    pub comment_author: String,
    pub comment_permlink: String,
    pub reward_vests: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reward_sp: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vote: Option<VoteInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_created: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_votes: Option<Vec<ActiveVote>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voted_after_minutes: Option<f64>, // negative = vote recorded before post creation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days_to_reward: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vote_value_steem: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vote_value_sbd: Option<Decimal>,
    pub timing_anomaly: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub enrichment_errors: Vec<String>,
}

impl MatchedRecord {
    pub fn is_matched(&self) -> bool {
        self.vote.is_some()
    }

    /// Reward SP as a percentage of the estimated vote value, 0 when unknown
    pub fn efficiency(&self) -> Decimal {
        match (self.reward_sp, self.vote_value_steem) {
            (Some(reward_sp), Some(vote_value)) => efficiency(reward_sp, vote_value),
            _ => Decimal::ZERO,
        }
    }

    /// Vote weight in percent (10000 = 100%)
    pub fn vote_weight_percent(&self) -> Option<Decimal> {
        self.vote
            .as_ref()
            .map(|vote| Decimal::from(vote.weight) / Decimal::ONE_HUNDRED)
    }
}

fn efficiency(reward_sp: Decimal, vote_value: Decimal) -> Decimal {
    if vote_value > Decimal::ZERO {
        reward_sp / vote_value * Decimal::ONE_HUNDRED
    } else {
        Decimal::ZERO
    }
}

/// Outcome of an analysis run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AnalysisStatus {
    /// The whole window was scanned
    Complete,
    /// No configured node answered; an empty record list means nothing
    NoUsableNode,
    /// The chain has no such account
    AccountNotFound,
    /// The scan stopped early; records cover only what was read
    Interrupted { reason: String },
}

impl AnalysisStatus {
    pub fn is_complete(&self) -> bool {
        matches!(self, AnalysisStatus::Complete)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CurationStatistics {
    pub total_rewards: usize,
    pub matched_rewards: usize,
    pub match_percentage: Decimal,
    pub total_reward_sp: Decimal,
    pub total_vote_value: Decimal,
    pub average_efficiency: Decimal,
}

impl CurationStatistics {
    pub fn from_records(records: &[MatchedRecord]) -> Self {
        let total_rewards = records.len();
        let matched_rewards = records.iter().filter(|r| r.is_matched()).count();

        let match_percentage = if total_rewards > 0 {
            Decimal::from(matched_rewards) / Decimal::from(total_rewards) * Decimal::ONE_HUNDRED
        } else {
            Decimal::ZERO
        };

        let total_reward_sp: Decimal = records.iter().filter_map(|r| r.reward_sp).sum();
        let total_vote_value: Decimal = records.iter().filter_map(|r| r.vote_value_steem).sum();

        Self {
            total_rewards,
            matched_rewards,
            match_percentage,
            total_reward_sp,
            total_vote_value,
            average_efficiency: efficiency(total_reward_sp, total_vote_value),
        }
    }
}

/// Everything one analysis run produces
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurationReport {
    pub account: String,
    pub days_back: u32,
    pub status: AnalysisStatus,
    pub records: Vec<MatchedRecord>,
    pub statistics: CurationStatistics,
}

impl CurationReport {
    pub fn new(account: &str, days_back: u32, status: AnalysisStatus, records: Vec<MatchedRecord>) -> Self {
        let statistics = CurationStatistics::from_records(&records);
        Self {
            account: account.to_string(),
            days_back,
            status,
            records,
            statistics,
        }
    }
}

/// Query parameters for the curator rewards endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct CurationQuery {
    pub days_back: Option<u32>, // Default: 7
}
