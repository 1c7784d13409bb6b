//! Logging initialization for Tavern.
//!
//! The configured level applies to Tavern itself. sqlx logs every statement
//! it runs, so it is held at `warn` unless `RUST_LOG` says otherwise.
//! Tokens, salts and password material are never passed to log macros.

use std::fs::{self, File, OpenOptions};
use std::path::Path;
use std::sync::Arc;

use tracing::level_filters::LevelFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::{Result, TavernError};

/// Read a configured level name. Unknown names mean `info`.
fn parse_level(level: &str) -> LevelFilter {
    match level.trim().to_ascii_lowercase().as_str() {
        "warning" => LevelFilter::WARN,
        name => name.parse().unwrap_or(LevelFilter::INFO),
    }
}

/// Combine the configured level with any `RUST_LOG` directives.
///
/// Later directives win, so `RUST_LOG=sqlx=debug` re-enables statement logs.
fn build_filter(level: LevelFilter, overrides: Option<&str>) -> EnvFilter {
    let mut directives = format!("{level},sqlx=warn");
    if let Some(extra) = overrides.map(str::trim).filter(|s| !s.is_empty()) {
        directives.push(',');
        directives.push_str(extra);
    }
    EnvFilter::builder().parse_lossy(directives)
}

fn env_filter(level: &str) -> EnvFilter {
    let overrides = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    build_filter(parse_level(level), overrides.as_deref())
}

/// Open the log file for appending, creating its directory if needed.
fn open_log_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(OpenOptions::new().create(true).append(true).open(path)?)
}

/// Log to stdout and to the configured file.
///
/// Fails if the file cannot be opened or a subscriber is already installed;
/// the caller then falls back to [`init_console_only`].
pub fn init(config: &LoggingConfig) -> Result<()> {
    let log_file = Arc::new(open_log_file(Path::new(&config.file))?);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout.and(log_file))
                .with_ansi(false)
                .with_target(true),
        )
        .with(env_filter(&config.level))
        .try_init()
        .map_err(|e| TavernError::Config(format!("logging already initialized: {e}")))
}

/// Log to stdout only. A second initialization is ignored.
pub fn init_console_only(level: &str) {
    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .with(env_filter(level))
        .try_init();
}
