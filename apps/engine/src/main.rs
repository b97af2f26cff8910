mod config;
mod db;
mod errors;
mod models;
mod reconcile;
mod store;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::db::create_pool;
use crate::reconcile::sync::{reconcile_batch, BatchSelector};
use crate::store::postgres::PgRecordStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails fast on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting reconciliation engine v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let pool = create_pool(&config.database_url, config.db_max_connections).await?;
    let store = PgRecordStore::new(pool);

    // One batch run over pending records; re-run (or reset records) to retry.
    let selector = BatchSelector {
        job_id: config.job_id,
        limit: config.batch_limit,
    };
    let report = reconcile_batch(&store, &selector).await;

    info!(
        "Reconciliation finished: {} processed, {} skipped, {} failed ({} considered)",
        report.processed, report.skipped, report.failed, report.total
    );

    Ok(())
}
