//! Configuration loading and validation for faultline

use crate::types::{Role, RoleKind, ServerConfig, TargetUrlError, WorkerConfig, target_url};
use faultline::{FaultConfig, Percent, PercentError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use validator::{Validate, ValidationError};

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Invalid configuration: {0}")]
    InvalidUrl(#[from] TargetUrlError),

    #[error("Invalid configuration: {0}")]
    InvalidPercent(#[from] PercentError),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerSettings,

    #[serde(default)]
    pub worker: WorkerSettings,

    #[serde(default)]
    pub lifecycle: LifecycleSettings,

    #[serde(default)]
    pub client: ClientSettings,

    #[serde(default)]
    pub logging: LoggingSettings,
}

impl Validate for Config {
    fn validate(&self) -> Result<(), validator::ValidationErrors> {
        self.server.validate()?;
        self.worker.validate()?;
        self.lifecycle.validate()?;
        self.client.validate()?;
        Ok(())
    }
}

/// Fault-injecting server settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ServerSettings {
    #[validate(range(min = 1))]
    pub port: u16,

    #[serde(with = "humantime_serde")]
    #[validate(custom = "validate_delay")]
    pub delay: Duration,

    #[validate(range(max = 100))]
    pub fail: u32,

    #[validate(range(max = 100))]
    pub health_fail: u32,
}

/// Worker settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct WorkerSettings {
    #[validate(custom = "validate_target_url")]
    pub url: String,

    /// Target port appended to `url`
    #[validate(range(min = 1))]
    pub port: u16,

    #[validate(range(min = 1))]
    pub health_port: u16,

    /// Requests per second. Zero is rejected here rather than blocking forever.
    #[validate(range(min = 1, max = 100000))]
    pub rate: u32,

    #[validate(range(max = 100))]
    pub fail: u32,

    #[validate(range(max = 100))]
    pub health_fail: u32,
}

/// Shutdown settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct LifecycleSettings {
    #[serde(with = "humantime_serde")]
    #[validate(custom = "validate_drain_timeout")]
    pub drain_timeout: Duration,
}

/// Outbound client settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ClientSettings {
    #[serde(with = "humantime_serde")]
    #[validate(custom = "validate_client_timeout")]
    pub timeout: Duration,
}

/// Logging settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingSettings {
    pub level: Option<String>,
    pub format: Option<String>,
}

// Default implementations

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            port: 8080,
            delay: Duration::ZERO,
            fail: 0,
            health_fail: 0,
        }
    }
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            url: "http://localhost".to_string(),
            port: 8080,
            health_port: 8081,
            rate: 1,
            fail: 0,
            health_fail: 0,
        }
    }
}

impl Default for LifecycleSettings {
    fn default() -> Self {
        Self {
            drain_timeout: crate::types::DEFAULT_DRAIN_TIMEOUT,
        }
    }
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            timeout: crate::types::DEFAULT_CLIENT_TIMEOUT,
        }
    }
}

// Custom validators

fn validate_delay(delay: &Duration) -> Result<(), ValidationError> {
    if *delay > Duration::from_secs(600) {
        return Err(ValidationError::new("delay_out_of_range"));
    }
    Ok(())
}

fn validate_drain_timeout(timeout: &Duration) -> Result<(), ValidationError> {
    let millis = timeout.as_millis();
    if millis < 1 || millis > 600_000 {
        return Err(ValidationError::new("drain_timeout_out_of_range"));
    }
    Ok(())
}

fn validate_client_timeout(timeout: &Duration) -> Result<(), ValidationError> {
    let millis = timeout.as_millis();
    if millis < 1 || millis > 300_000 {
        return Err(ValidationError::new("client_timeout_out_of_range"));
    }
    Ok(())
}

fn validate_target_url(url: &str) -> Result<(), ValidationError> {
    // The port is irrelevant here; it is replaced when the target is built.
    target_url(url.trim(), 80)
        .map(|_| ())
        .map_err(|_| ValidationError::new("target_url_invalid"))
}

// Configuration loading implementation

impl Config {
    /// Load configuration from `path`, or from the default search paths
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match Self::locate(path) {
            Some(path) => Self::load_from_file(path),
            None => Ok(Self::default()),
        }
    }

    /// File `load` reads: `path` when given, else the first default that exists
    pub fn locate(path: Option<&Path>) -> Option<PathBuf> {
        path.map(Path::to_path_buf).or_else(Self::find_config_file)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let config: Config = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Find configuration file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        let mut paths = vec![PathBuf::from("/etc/faultline/faultline.yaml")];

        if let Some(home_path) = Self::home_config_path() {
            paths.push(home_path);
        }

        paths.push(PathBuf::from("./faultline.yaml"));

        paths
            .into_iter()
            .find(|p: &PathBuf| p.exists() && p.is_file())
    }

    /// Get home directory config path
    fn home_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".config/faultline/faultline.yaml"))
    }

    /// Convert to the server role's runtime configuration
    pub fn to_server_config(&self) -> Result<ServerConfig, ConfigError> {
        self.validate()?;
        Ok(ServerConfig {
            port: self.server.port,
            fault: FaultConfig::new(Percent::new(self.server.fail)?, self.server.delay),
            health_fail: Percent::new(self.server.health_fail)?,
            drain_timeout: self.lifecycle.drain_timeout,
        })
    }

    /// Convert to the worker role's runtime configuration
    pub fn to_worker_config(&self) -> Result<WorkerConfig, ConfigError> {
        self.validate()?;
        let target = target_url(self.worker.url.trim(), self.worker.port)?;
        Ok(WorkerConfig {
            health_port: self.worker.health_port,
            target,
            rate: self.worker.rate,
            fail: Percent::new(self.worker.fail)?,
            health_fail: Percent::new(self.worker.health_fail)?,
            client_timeout: self.client.timeout,
            drain_timeout: self.lifecycle.drain_timeout,
        })
    }

    /// Runtime configuration for the selected role
    pub fn to_role(&self, kind: RoleKind) -> Result<Role, ConfigError> {
        match kind {
            RoleKind::Server => self.to_server_config().map(Role::Server),
            RoleKind::Worker => self.to_worker_config().map(Role::Worker),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_valid_yaml_parsing() {
        let yaml = r#"
server:
  port: 9000
  delay: 250ms
  fail: 10
  health_fail: 5

worker:
  url: "http://backend"
  port: 9000
  health_port: 9001
  rate: 20
  fail: 50

lifecycle:
  drain_timeout: 10s

client:
  timeout: 2s
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.delay, Duration::from_millis(250));
        assert_eq!(config.worker.rate, 20);
        assert_eq!(config.lifecycle.drain_timeout, Duration::from_secs(10));
        assert_eq!(config.client.timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_partial_sections_use_defaults() {
        let yaml = r#"
server:
  fail: 25
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.fail, 25);
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.worker.health_port, 8081);
        assert_eq!(config.lifecycle.drain_timeout, Duration::from_secs(30));
        assert_eq!(config.client.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_invalid_fail_percentage() {
        let yaml = r#"
server:
  fail: 101
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_err());

        let yaml = r#"
worker:
  health_fail: 150
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_rate_rejected() {
        let yaml = r#"
worker:
  rate: 0
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_target_url() {
        assert!(validate_target_url("http://localhost").is_ok());
        assert!(validate_target_url("https://10.0.0.1").is_ok());

        assert!(validate_target_url("").is_err());
        assert!(validate_target_url("localhost").is_err());
        assert!(validate_target_url("ftp://localhost").is_err());
    }

    #[test]
    fn test_invalid_durations() {
        let yaml = r#"
lifecycle:
  drain_timeout: 0s
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_err());

        let yaml = r#"
client:
  timeout: 10m
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_err());

        let yaml = r#"
server:
  delay: 11m
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_to_server_config_conversion() {
        let mut config = Config::default();
        config.server.fail = 40;
        config.server.delay = Duration::from_millis(15);

        let server = config.to_server_config().unwrap();
        assert_eq!(server.port, 8080);
        assert_eq!(server.fault.fail.get(), 40);
        assert_eq!(server.fault.delay, Duration::from_millis(15));
        assert_eq!(server.drain_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_config_to_worker_config_conversion() {
        let mut config = Config::default();
        config.worker.url = "http://backend".to_string();
        config.worker.port = 9090;
        config.worker.rate = 7;

        let worker = config.to_worker_config().unwrap();
        assert_eq!(worker.target.as_str(), "http://backend:9090/");
        assert_eq!(worker.rate, 7);
        assert_eq!(worker.health_port, 8081);
        assert_eq!(worker.client_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_conversion_revalidates() {
        let mut config = Config::default();
        config.worker.rate = 0;
        assert!(matches!(
            config.to_worker_config(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_to_role_picks_role() {
        let config = Config::default();
        assert!(matches!(config.to_role(RoleKind::Server), Ok(Role::Server(_))));
        assert!(matches!(config.to_role(RoleKind::Worker), Ok(Role::Worker(_))));
    }

    #[test]
    fn test_load_missing_explicit_file_fails() {
        let result = Config::load(Some(Path::new("/nonexistent/faultline.yaml")));
        assert!(matches!(result, Err(ConfigError::IoError(_))));
    }

    #[test]
    fn test_locate_prefers_explicit_path() {
        let explicit = Path::new("/nonexistent/faultline.yaml");
        assert_eq!(Config::locate(Some(explicit)), Some(explicit.to_path_buf()));
    }

    #[test]
    fn test_load_emits_no_events() {
        use std::sync::Arc;
        use std::sync::atomic::{AtomicUsize, Ordering};
        use tracing_subscriber::layer::{Context, SubscriberExt};

        // Loading runs before logging is initialized, so events would be lost
        struct CountEvents(Arc<AtomicUsize>);

        impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for CountEvents {
            fn on_event(&self, _event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let events = Arc::new(AtomicUsize::new(0));
        let subscriber = tracing_subscriber::registry().with(CountEvents(events.clone()));

        tracing::subscriber::with_default(subscriber, || {
            let _ = Config::load(Some(Path::new("/nonexistent/faultline.yaml")));
            let _ = Config::load(None);
        });

        assert_eq!(events.load(Ordering::SeqCst), 0);
    }
}
