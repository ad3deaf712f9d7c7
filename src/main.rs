mod config;
mod error;
mod log_stream;
mod monitor;
mod types;

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info, LevelFilter};
use log_stream::LogStream;
use monitor::Monitor;
use simple_logger::SimpleLogger;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let cli = config::Cli::parse();

    init_logger(cli.verbose)?;
    info!("Starting camera-monitor");

    // Load configuration
    let config = config::load_config(&cli)?;
    info!("Configuration loaded successfully");

    let mut monitor = Monitor::new(std::io::stdout(), config.show_raw);
    monitor.banner().context("Failed to write to stdout")?;

    let mut stream = match LogStream::start(&config) {
        Ok(stream) => stream,
        Err(e) => {
            monitor.report(&e);
            return Ok(());
        }
    };

    let exit = monitor.run(&mut stream, shutdown_signal()).await;
    info!("Monitor stopped: {:?}", exit);

    Ok(())
}

fn init_logger(verbosity: u8) -> Result<()> {
    let level = match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    SimpleLogger::new()
        .with_level(level)
        .with_utc_timestamps()
        .env()
        .init()
        .context("Failed to initialise logger")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}
