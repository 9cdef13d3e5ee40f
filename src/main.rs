mod api;
mod chart;
mod config;
mod db;
mod error;
mod export;
mod types;

use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::api::{router, ApiState};
use crate::config::Config;
use crate::db::MySqlStore;
use crate::error::Result;

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    // --- Database pool (read-only user) ---
    let store = MySqlStore::connect(&cfg).await?;
    info!(
        "Query caps: trades {}s, item lookups {}s",
        cfg.trade_query_timeout_secs, cfg.item_query_timeout_secs
    );

    // --- HTTP server ---
    let bind_addr = cfg.bind_addr.clone();
    let state = ApiState {
        store: Arc::new(store),
        config: Arc::new(cfg),
    };
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP listening on {bind_addr}");

    axum::serve(listener, app).await?;

    Ok(())
}
