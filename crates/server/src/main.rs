//! swcache entry point.
//!
//! Reads lifecycle and fetch events as JSON lines on stdin and answers on
//! stdout. Logging goes to stderr to keep stdout clean for replies.

use std::sync::Arc;

use anyhow::Result;
use swcache_client::{FetchClient, FetchConfig};
use swcache_core::{AppConfig, CacheDb};
use tokio::io::BufReader;
use tracing_subscriber::EnvFilter;

mod classify;
mod error;
mod handler;
mod host;
mod lifecycle;
mod strategy;

#[cfg(test)]
mod testing;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    tracing::info!(version = %config.version, origin = %config.origin, db = %config.db_path.display(), "starting swcache");

    let store = Arc::new(CacheDb::open(&config.db_path).await?);
    let network = Arc::new(FetchClient::new(FetchConfig::from(&config))?);
    let worker = Arc::new(handler::ServiceWorker::new(config, store, network)?);

    host::run(worker, BufReader::new(tokio::io::stdin()), tokio::io::stdout()).await?;

    tracing::info!("input closed, shutting down");
    Ok(())
}
