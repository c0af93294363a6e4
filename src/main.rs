use std::sync::Arc;

use curation_analyzer::{
    build_router,
    config::AnalyzerConfig,
    services::{curator_analyzer::CuratorAnalyzer, node_pool::NodePool, steem_api::SteemRpcClient},
    AppState,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,curation_analyzer=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    let config = AnalyzerConfig::from_env()?;
    tracing::info!(
        nodes = ?config.nodes,
        batch_size = config.scan.batch_size,
        voting_power = config.default_voting_power,
        "Configuration loaded"
    );

    let node_pool = NodePool::new(config.nodes.clone(), config.node_timeout, config.retry_base_delay)?;
    let chain = Arc::new(SteemRpcClient::new(node_pool.clone()));
    let analyzer = CuratorAnalyzer::from_config(chain, &config);

    let state = AppState { analyzer, node_pool };

    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
