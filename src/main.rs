//! tablemap - Main entry point.
//!
//! Validates the catalog entity mappings, connects to the configured
//! database and reports the row count of every catalog table.

use clap::Parser;
use tablemap::catalog::{self, Category, Product, Subcategory};
use tablemap::config::Config;
use tablemap::db::{Database, Session};
use tablemap::error::DbResult;
use tablemap::metadata::{Entity, table_metadata};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber.with(fmt::layer().json()).init();
    } else {
        subscriber
            .with(fmt::layer().with_target(true).with_thread_ids(false))
            .init();
    }
}

/// Log the row count of `T`'s table. A missing table is reported, not fatal.
async fn report_count<T: Entity>(session: &mut Session) -> DbResult<()> {
    let table = table_metadata::<T>()?.table_name().to_string();
    match session.count_all::<T>().await {
        Ok(rows) => info!(table = %table, rows, "Table row count"),
        Err(e) => warn!(table = %table, error = %e, "Could not count rows"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse configuration from command line and environment
    let config = Config::parse();

    // Initialize logging
    init_tracing(&config);

    info!("Starting tablemap v{}", env!("CARGO_PKG_VERSION"));

    // Mapping errors are fatal before any connection is made
    if let Err(e) = catalog::schema().validate() {
        error!(error = %e, "Schema validation failed");
        std::process::exit(1);
    }

    let db_config = config.database().map_err(|e| {
        error!(error = %e, "Invalid database URL");
        e
    })?;
    let db = Database::connect(&db_config).await?;

    let info = db.info();
    info!(
        database_type = %info.database_type,
        server_version = info.server_version.as_deref().unwrap_or("unknown"),
        endpoint = %info.endpoint,
        "Connected"
    );

    let mut session = db.session();
    report_count::<Category>(&mut session).await?;
    report_count::<Subcategory>(&mut session).await?;
    report_count::<Product>(&mut session).await?;

    db.close().await;
    info!("Shutdown complete");
    Ok(())
}
