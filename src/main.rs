use std::process::ExitCode;

use tracing::{error, info};

use tavern::{AccountDirectory, Config, Database, ForumSettings};

#[tokio::main]
async fn main() -> ExitCode {
    // Load configuration
    let mut config = match Config::load("config.toml") {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config.toml: {e}");
            eprintln!("Using default configuration.");
            Config::default()
        }
    };
    config.apply_env_overrides();

    // Initialize logging
    if let Err(e) = tavern::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        // Fall back to console-only logging
        tavern::logging::init_console_only(&config.logging.level);
    }

    info!("Tavern - discussion board backend");

    if let Err(e) = config.validate() {
        error!("Invalid configuration: {e}");
        return ExitCode::FAILURE;
    }

    let db = match Database::open(&config.database.path, config.database.pool_size).await {
        Ok(db) => db,
        Err(e) => {
            error!(path = %config.database.path, "Failed to open database: {e}");
            return ExitCode::FAILURE;
        }
    };

    let settings = ForumSettings::from_config(&config);
    let accounts = AccountDirectory::new(db.pool(), &settings.credentials);
    match accounts.sync_counters().await {
        Ok(changed) => info!(changed, "Account counters checked"),
        Err(e) => {
            error!("Counter consistency pass failed: {e}");
            db.close().await;
            return ExitCode::FAILURE;
        }
    }

    match db.schema_version().await {
        Ok(version) => info!(
            path = %config.database.path,
            pool_size = config.database.pool_size,
            schema_version = version,
            "Database ready"
        ),
        Err(e) => error!("Failed to read schema version: {e}"),
    }

    db.close().await;
    ExitCode::SUCCESS
}
