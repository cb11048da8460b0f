mod cli;
mod commands;
mod error;
mod output;

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tickfresh_core::BufferedLogSink;

use crate::cli::Cli;
use crate::error::CliError;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::from(error.exit_code())
        }
    }
}

async fn run() -> Result<(), CliError> {
    let cli = Cli::parse();
    let log = Arc::new(BufferedLogSink::default());

    let result = commands::run(&cli, log.clone()).await;
    if cli.show_log {
        output::render_log(&log.messages());
    }
    result
}
