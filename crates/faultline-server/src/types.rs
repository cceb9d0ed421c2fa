//! Runtime configuration for the two roles.

use faultline::{FaultConfig, Percent};
use reqwest::Url;
use std::time::Duration;

/// Default drain window applied on shutdown
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Default timeout for the worker's outbound calls
pub const DEFAULT_CLIENT_TIMEOUT: Duration = Duration::from_secs(5);

/// Fault-injecting server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to listen on
    pub port: u16,

    /// Failure percentage and delay for `/`
    pub fault: FaultConfig,

    /// Health endpoint percentage
    pub health_fail: Percent,

    /// Bounded drain window on shutdown
    pub drain_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            fault: FaultConfig::default(),
            health_fail: Percent::ZERO,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
        }
    }
}

/// Rate-limited worker configuration
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Port for the worker's own health listener
    pub health_port: u16,

    /// Target URL including port and trailing slash
    pub target: Url,

    /// Requests per second
    pub rate: u32,

    /// Chance that a call asks for a failure by suffixing its id
    pub fail: Percent,

    /// Health endpoint percentage
    pub health_fail: Percent,

    /// Outbound call timeout
    pub client_timeout: Duration,

    /// Bounded drain window on shutdown
    pub drain_timeout: Duration,
}

impl WorkerConfig {
    /// Create a worker configuration for `target` with default settings
    pub fn new(target: Url) -> Self {
        Self {
            health_port: 8081,
            target,
            rate: 1,
            fail: Percent::ZERO,
            health_fail: Percent::ZERO,
            client_timeout: DEFAULT_CLIENT_TIMEOUT,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
        }
    }
}

/// Role selector, before configuration is resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleKind {
    Server,
    Worker,
}

/// Which role a process plays
#[derive(Debug, Clone)]
pub enum Role {
    Server(ServerConfig),
    Worker(WorkerConfig),
}

impl Role {
    /// Display name used in log lines
    pub fn name(&self) -> &'static str {
        match self {
            Role::Server(_) => "Server",
            Role::Worker(_) => "Worker",
        }
    }

    /// Port the role's HTTP listener binds
    pub fn listen_port(&self) -> u16 {
        match self {
            Role::Server(config) => config.port,
            Role::Worker(config) => config.health_port,
        }
    }

    /// Drain window for the role's listener
    pub fn drain_timeout(&self) -> Duration {
        match self {
            Role::Server(config) => config.drain_timeout,
            Role::Worker(config) => config.drain_timeout,
        }
    }
}

/// Build the worker target `<base>:<port>/`.
///
/// The port always overrides whatever port `base` carries, and the path is
/// reset to the root so correlation ids append as a single segment.
pub fn target_url(base: &str, port: u16) -> Result<Url, TargetUrlError> {
    let mut url = Url::parse(base).map_err(|e| TargetUrlError::Parse(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(TargetUrlError::Scheme(url.scheme().to_string()));
    }
    url.set_port(Some(port))
        .map_err(|()| TargetUrlError::Parse(format!("{base} cannot carry a port")))?;
    url.set_path("/");
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

/// Why a worker target URL was rejected
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TargetUrlError {
    #[error("invalid target URL: {0}")]
    Parse(String),

    #[error("unsupported target URL scheme: {0}")]
    Scheme(String),
}
