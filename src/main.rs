// src/main.rs
use anyhow::Result;
use clap::Parser;
use std::fs::OpenOptions;
use std::process::ExitCode;
use transfer_automator::app_log;
use transfer_automator::cli::{self, Cli};

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_LOG_FILE: &str = "/tmp/transfer-automator.log";

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let log_path = std::env::var("TRANSFER_LOG_FILE").unwrap_or_else(|_| DEFAULT_LOG_FILE.to_string());
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true) // Clear file on startup
        .open(&log_path)
        .expect("Failed to open log file");

    let filter = if cli.verbose || cli.quiet {
        EnvFilter::new(cli.log_level())
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .json()
                .with_writer(file)
                .with_current_span(false)
                .with_span_list(false),
        )
        .with(fmt::layer().compact().with_target(false))
        .with(filter)
        .init();

    app_log!(debug, "Logging to {}", log_path);

    match cli::run(cli).await {
        Ok(true) => Ok(ExitCode::SUCCESS),
        Ok(false) => Ok(ExitCode::FAILURE),
        Err(e) => {
            app_log!(error, "{:#}", e);
            Ok(ExitCode::FAILURE)
        }
    }
}
