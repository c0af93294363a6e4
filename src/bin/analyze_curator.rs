use std::env;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use curation_analyzer::config::AnalyzerConfig;
use curation_analyzer::models::curation::{AnalysisStatus, CurationReport, MatchedRecord};
use curation_analyzer::services::curator_analyzer::CuratorAnalyzer;
use curation_analyzer::services::node_pool::NodePool;
use curation_analyzer::services::steem_api::SteemRpcClient;
use curation_analyzer::services::validators::{sanitize_username, validate_days_back};

const PERMLINK_WIDTH: usize = 25;

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        text.to_string()
    } else {
        let cut: String = text.chars().take(width - 3).collect();
        format!("{}...", cut)
    }
}

fn or_dash<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

fn print_row(record: &MatchedRecord) {
    println!(
        "{:<19}  {:<16}  {:<25}  {:>16}  {:>8}  {:>8}  {:>14}",
        record.timestamp.format("%Y-%m-%d %H:%M:%S"),
        record.comment_author,
        truncate(&record.comment_permlink, PERMLINK_WIDTH),
        record.reward_vests.round_dp(6),
        or_dash(record.vote_weight_percent().map(|w| format!("{}%", w.normalize()))),
        or_dash(record.days_to_reward.map(|d| format!("{:.2}", d))),
        or_dash(record.vote_value_steem.map(|v| format!("{:.4}", v))),
    );
}

fn print_report(report: &CurationReport) {
    if report.records.is_empty() {
        println!("No curation rewards found.");
    } else {
        println!(
            "{:<19}  {:<16}  {:<25}  {:>16}  {:>8}  {:>8}  {:>14}",
            "Timestamp", "Author", "Permlink", "Reward VESTS", "Weight", "Days", "Value STEEM"
        );
        println!("{}", "-".repeat(19 + 16 + 25 + 16 + 8 + 8 + 14 + 12));
        for record in &report.records {
            print_row(record);
        }
    }

    let stats = &report.statistics;
    println!();
    println!("=== STATISTICS ===");
    println!("Total curation rewards: {}", stats.total_rewards);
    println!("Rewards with matching vote: {}", stats.matched_rewards);
    if stats.total_rewards > 0 {
        println!("Match percentage: {:.1}%", stats.match_percentage);
    } else {
        println!("Match percentage: N/A");
    }
    println!("Total reward SP: {:.4}", stats.total_reward_sp);
    println!("Total estimated vote value: {:.4} STEEM", stats.total_vote_value);
    println!("Average efficiency: {:.2}%", stats.average_efficiency);

    let anomalies = report.records.iter().filter(|r| r.timing_anomaly).count();
    if anomalies > 0 {
        println!("Votes recorded before post creation: {}", anomalies);
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn,curation_analyzer=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: cargo run --bin analyze_curator <username> [days_back]");
        eprintln!("Example: cargo run --bin analyze_curator tasuboyz 7");
        std::process::exit(1);
    }

    let username = sanitize_username(&args[1]).unwrap_or_else(|e| {
        eprintln!("{}", e);
        std::process::exit(1);
    });

    let days_back = match args.get(2) {
        Some(raw) => match raw.parse::<u32>() {
            Ok(days) => Some(days),
            Err(_) => {
                eprintln!("Invalid days_back '{}'. Must be a number.", raw);
                std::process::exit(1);
            }
        },
        None => None,
    };
    let days_back = validate_days_back(days_back).unwrap_or_else(|e| {
        eprintln!("{}", e);
        std::process::exit(1);
    });

    let config = AnalyzerConfig::from_env()?;
    let node_pool = NodePool::new(config.nodes.clone(), config.node_timeout, config.retry_base_delay)?;

    println!("Analyzing @{} over the last {} days...", username, days_back);
    let working = node_pool.working_endpoints().await;
    println!("Reachable nodes: {}/{}", working.len(), node_pool.endpoints().len());
    println!();

    let analyzer = CuratorAnalyzer::from_config(Arc::new(SteemRpcClient::new(node_pool)), &config);
    let report = analyzer.analyze(&username, days_back).await;

    match &report.status {
        AnalysisStatus::NoUsableNode => {
            eprintln!("No usable Steem node: none of {:?} answered.", config.nodes);
            std::process::exit(2);
        }
        AnalysisStatus::AccountNotFound => {
            eprintln!("Account @{} does not exist.", username);
            std::process::exit(1);
        }
        AnalysisStatus::Interrupted { reason } => {
            println!("Warning: scan interrupted ({}); results are partial.", reason);
            println!();
            print_report(&report);
        }
        AnalysisStatus::Complete => print_report(&report),
    }

    Ok(())
}
