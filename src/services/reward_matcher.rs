//! Pairs curation rewards with the votes that earned them
//!
//! A reward for `author/permlink` belongs to the scanned account's vote on the
//! same post. Matched rewards are enriched with post data, SP conversion and a
//! vote value estimate. Enrichment runs with bounded concurrency and keeps the
//! reward order.

use chrono::{DateTime, Utc};
use futures_util::stream::{self, StreamExt};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::models::curation::{MatchedRecord, VoteInfo};
use crate::models::operation::VoteKey;
use crate::services::history_scanner::{RewardEvent, VoteEvent};
use crate::services::steem_api::ChainApi;
use crate::services::vote_calculator::VoteCalculator;

pub const DEFAULT_ENRICHMENT_CONCURRENCY: usize = 4;

fn minutes_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_seconds() as f64 / 60.0
}

fn days_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_seconds() as f64 / 86_400.0
}

#[derive(Clone)]
pub struct RewardMatcher {
    chain: Arc<dyn ChainApi>,
    calculator: VoteCalculator,
    concurrency: usize,
}

impl RewardMatcher {
    pub fn new(chain: Arc<dyn ChainApi>, calculator: VoteCalculator, concurrency: usize) -> Self {
        Self {
            chain,
            calculator,
            concurrency: concurrency.max(1),
        }
    }

    pub fn calculator(&self) -> &VoteCalculator {
        &self.calculator
    }

    /// One record per reward, in reward order
    pub async fn match_rewards(
        &self,
        account: &str,
        rewards: &[RewardEvent],
        votes_by_key: &HashMap<VoteKey, VoteEvent>,
    ) -> Vec<MatchedRecord> {
        // Futures are built up front so the stream holds no borrowing closure
        let pending: Vec<_> = rewards
            .iter()
            .map(|reward| self.build_record(account, reward, votes_by_key.get(&reward.key())))
            .collect();

        let records: Vec<MatchedRecord> = stream::iter(pending)
            .buffered(self.concurrency)
            .collect()
            .await;

        let matched = records.iter().filter(|r| r.is_matched()).count();
        info!(
            account = %account,
            rewards = records.len(),
            matched = matched,
            unmatched = records.len() - matched,
            "Rewards matched"
        );

        records
    }

    async fn build_record(&self, account: &str, reward: &RewardEvent, vote: Option<&VoteEvent>) -> MatchedRecord {
        let mut enrichment_errors = Vec::new();

        let reward_vests = match reward.reward.reward.to_decimal() {
            Ok(vests) => vests,
            Err(e) => {
                enrichment_errors.push(format!("reward amount: {}", e));
                Decimal::ZERO
            }
        };

        let mut record = MatchedRecord {
            timestamp: reward.timestamp,
            curator: reward.reward.curator.clone(),
            comment_author: reward.reward.comment_author.clone(),
            comment_permlink: reward.reward.comment_permlink.clone(),
            reward_vests,
            reward_sp: None,
            vote: None,
            post_created: None,
            active_votes: None,
            voted_after_minutes: None,
            days_to_reward: None,
            vote_value_steem: None,
            vote_value_sbd: None,
            timing_anomaly: false,
            enrichment_errors,
        };

        let Some(vote) = vote else {
            debug!(key = %reward.key(), "No vote found for reward");
            return record;
        };

        record.vote = Some(VoteInfo {
            weight: vote.vote.weight,
            timestamp: vote.timestamp,
        });
        record.days_to_reward = vote.timestamp.map(|voted| days_between(voted, reward.timestamp));

        let (content, totals, value) = tokio::join!(
            self.chain.content(&vote.vote.author, &vote.vote.permlink),
            self.chain.vesting_totals(),
            self.calculator.calculate_vote_value(account, vote.vote.weight, None, None),
        );

        match content {
            Ok(content) => {
                record.post_created = Some(content.created);
                record.active_votes = Some(content.active_votes);

                if let Some(voted) = vote.timestamp {
                    let minutes = minutes_between(content.created, voted);
                    if minutes < 0.0 {
                        warn!(
                            key = %reward.key(),
                            voted_after_minutes = minutes,
                            "Vote recorded before post creation"
                        );
                        record.timing_anomaly = true;
                    }
                    record.voted_after_minutes = Some(minutes);
                }
            }
            Err(e) => record.enrichment_errors.push(format!("post content: {}", e)),
        }

        match totals {
            Ok(totals) => match totals.vests_to_sp(record.reward_vests) {
                Some(sp) => record.reward_sp = Some(sp),
                None => record
                    .enrichment_errors
                    .push("reward SP: network has no vesting shares".to_string()),
            },
            Err(e) => record.enrichment_errors.push(format!("reward SP: {}", e)),
        }

        match value.error {
            None => {
                record.vote_value_steem = Some(value.steem_value);
                record.vote_value_sbd = Some(value.sbd_value);
            }
            Some(e) => record.enrichment_errors.push(format!("vote value: {}", e)),
        }

        if !record.enrichment_errors.is_empty() {
            debug!(
                key = %reward.key(),
                errors = ?record.enrichment_errors,
                "Record partially enriched"
            );
        }

        record
    }
}
