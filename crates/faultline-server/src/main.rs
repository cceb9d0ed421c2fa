//! Faultline binary

use anyhow::Context;
use clap::Parser;
use common::LogFormat;
use faultline_server::{Cli, Config, Harness};
use tokio_util::sync::CancellationToken;
use tracing::info;
use validator::Validate;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Tracing is not initialized yet, so configuration errors go to stderr
    let config_path = Config::locate(cli.config.as_deref());
    let mut config = match Config::load(config_path.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return Err(e.into());
        }
    };

    cli.command.apply(&mut config);
    if let Err(e) = config.validate() {
        eprintln!("Configuration error: {}", e);
        return Err(e.into());
    }

    let log_level = cli
        .log_level
        .as_deref()
        .or(config.logging.level.as_deref())
        .unwrap_or("info")
        .to_string();
    let log_format: LogFormat = cli
        .log_format
        .as_deref()
        .or(config.logging.format.as_deref())
        .map(str::parse)
        .transpose()
        .context("invalid log format")?
        .unwrap_or_default();

    common::logging::init_with(&log_level, log_format);

    match &config_path {
        Some(path) => info!("Configuration loaded from: {}", path.display()),
        None => info!("No configuration file found, using defaults"),
    }

    let role = config
        .to_role(cli.command.role_kind())
        .context("invalid role configuration")?;

    Harness::new(role)
        .run_until_signal(CancellationToken::new())
        .await
        .context("harness exited with an error")?;

    Ok(())
}
