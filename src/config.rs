use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(name = "camera-monitor", version, about)]
pub struct Cli {
    /// Path to an optional configuration file
    #[clap(long)]
    pub config: Option<PathBuf>,

    /// Override the log streaming binary
    #[clap(long)]
    pub log_command: Option<String>,

    /// Echo the raw log line after each status line
    #[clap(long)]
    pub raw: bool,

    /// Increase diagnostic verbosity (-v, -vv, -vvv)
    #[clap(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub log_command: String,
    pub show_raw: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_command: "log".to_string(),
            show_raw: false,
        }
    }
}

pub fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match cli.config {
        Some(ref path) => {
            let config_content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;

            toml::from_str(&config_content).context("Failed to parse config file")?
        }
        None => Config::default(),
    };

    // Apply CLI overrides
    if let Some(ref log_command) = cli.log_command {
        config.log_command = log_command.clone();
    }

    if cli.raw {
        config.show_raw = true;
    }

    Ok(config)
}
