//! Product Search - catalog worker
//!
//! Wires the record store and search index, then runs the outbox worker
//! until interrupted.

use std::env;

use product_search::{AppError, CatalogConfig, Dependencies};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    if env::var("LOG_FORMAT").map(|v| v == "json").unwrap_or(false) {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    if let Err(e) = run().await {
        error!(error = %e, "Product search worker failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    let config = CatalogConfig::from_env()?;
    let deps = Dependencies::new(&config).await?;

    info!(
        import_batch_size = config.import_batch_size,
        "Product search worker ready"
    );

    deps.worker.run().await;
    Ok(())
}
