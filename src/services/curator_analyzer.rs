use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::info;

use crate::config::AnalyzerConfig;
use crate::models::curation::CurationReport;
use crate::services::history_scanner::HistoryScanner;
use crate::services::reward_matcher::RewardMatcher;
use crate::services::steem_api::ChainApi;
use crate::services::vote_calculator::VoteCalculator;

/// Runs a full analysis: history scan, reward matching, report
#[derive(Clone)]
pub struct CuratorAnalyzer {
    scanner: HistoryScanner,
    matcher: RewardMatcher,
}

impl CuratorAnalyzer {
    pub fn new(scanner: HistoryScanner, matcher: RewardMatcher) -> Self {
        Self { scanner, matcher }
    }

    /// Wire scanner, calculator and matcher over one chain
    pub fn from_config(chain: Arc<dyn ChainApi>, config: &AnalyzerConfig) -> Self {
        let calculator = VoteCalculator::new(chain.clone(), config.default_voting_power);
        Self {
            scanner: HistoryScanner::new(chain.clone(), config.scan),
            matcher: RewardMatcher::new(chain, calculator, config.enrichment_concurrency),
        }
    }

    pub fn calculator(&self) -> &VoteCalculator {
        self.matcher.calculator()
    }

    pub async fn analyze(&self, account: &str, days_back: u32) -> CurationReport {
        self.analyze_at(account, days_back, Utc::now()).await
    }

    pub async fn analyze_at(&self, account: &str, days_back: u32, now: DateTime<Utc>) -> CurationReport {
        let scan = self.scanner.scan_at(account, days_back, now).await;
        let records = self
            .matcher
            .match_rewards(account, &scan.rewards, &scan.votes_by_key)
            .await;

        let report = CurationReport::new(account, days_back, scan.status, records);
        info!(
            account = %account,
            days_back = days_back,
            status = ?report.status,
            rewards = report.statistics.total_rewards,
            matched = report.statistics.matched_rewards,
            "Curation analysis finished"
        );
        report
    }
}
