//! Command-line interface.
//!
//! Flags mirror the YAML configuration; any flag given on the command line
//! overrides the loaded file.

use crate::config::Config;
use crate::types::RoleKind;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

/// Synthetic traffic harness for exercising resiliency tooling
#[derive(Debug, Parser)]
#[command(name = "faultline", version, about)]
pub struct Cli {
    /// YAML configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Default log level when RUST_LOG is unset
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Log output format: text or json
    #[arg(long, global = true)]
    pub log_format: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Starts a server instance
    Server(ServerArgs),

    /// Starts a worker instance
    Worker(WorkerArgs),
}

#[derive(Debug, Default, Args)]
pub struct ServerArgs {
    /// port to listen on [default: 8080]
    #[arg(short = 'p', long)]
    pub port: Option<u16>,

    /// response delay in ms [default: 0]
    #[arg(short = 'd', long)]
    pub delay: Option<u64>,

    /// % of requests to fail, ex 10 = 10% [default: 0]
    #[arg(short = 'f', long)]
    pub fail: Option<u32>,

    /// % of requests to /healthz to fail, ex 10 = 10% [default: 0]
    #[arg(short = 'F', long = "health-fail")]
    pub health_fail: Option<u32>,
}

#[derive(Debug, Default, Args)]
pub struct WorkerArgs {
    /// target URL [default: http://localhost]
    #[arg(short = 'u', long)]
    pub url: Option<String>,

    /// target port [default: 8080]
    #[arg(short = 'p', long)]
    pub port: Option<u16>,

    /// worker healthcheck port [default: 8081]
    #[arg(short = 'P', long = "health-port")]
    pub health_port: Option<u16>,

    /// rate of requests per second [default: 1]
    #[arg(short = 'r', long)]
    pub rate: Option<u32>,

    /// % of requests to fail, ex 10 = 10% [default: 0]
    #[arg(short = 'f', long)]
    pub fail: Option<u32>,

    /// % of requests to /healthz to fail, ex 10 = 10% [default: 0]
    #[arg(short = 'F', long = "health-fail")]
    pub health_fail: Option<u32>,
}

impl Command {
    /// Role selected by the subcommand
    pub fn role_kind(&self) -> RoleKind {
        match self {
            Command::Server(_) => RoleKind::Server,
            Command::Worker(_) => RoleKind::Worker,
        }
    }

    /// Override `config` with the flags given on the command line
    pub fn apply(&self, config: &mut Config) {
        match self {
            Command::Server(args) => {
                let server = &mut config.server;
                if let Some(port) = args.port {
                    server.port = port;
                }
                if let Some(delay) = args.delay {
                    server.delay = Duration::from_millis(delay);
                }
                if let Some(fail) = args.fail {
                    server.fail = fail;
                }
                if let Some(health_fail) = args.health_fail {
                    server.health_fail = health_fail;
                }
            }
            Command::Worker(args) => {
                let worker = &mut config.worker;
                if let Some(url) = &args.url {
                    worker.url = url.clone();
                }
                if let Some(port) = args.port {
                    worker.port = port;
                }
                if let Some(health_port) = args.health_port {
                    worker.health_port = health_port;
                }
                if let Some(rate) = args.rate {
                    worker.rate = rate;
                }
                if let Some(fail) = args.fail {
                    worker.fail = fail;
                }
                if let Some(health_fail) = args.health_fail {
                    worker.health_fail = health_fail;
                }
            }
        }
    }
}
