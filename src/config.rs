//! Configuration management for Sitevote.
//!
//! Values come from an optional YAML file, then `SITEVOTE_`-prefixed
//! environment variables with `__` between nested keys, for example
//! `SITEVOTE_VOTING__DEFAULT_WINDOW_MINUTES=10`.

use std::net::SocketAddr;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::client::DEFAULT_IP_LOOKUP_URL;
use crate::error::{Result, SitevoteError};
use crate::ratelimit::{DEFAULT_MAX_WINDOW_MINUTES, DEFAULT_WINDOW_MINUTES};

/// Main configuration for the Sitevote service and client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SitevoteConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Vote limiting configuration
    #[serde(default)]
    pub voting: VotingConfig,

    /// Client configuration
    #[serde(default)]
    pub client: ClientConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// gRPC server address
    #[serde(default = "default_grpc_addr")]
    pub grpc_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            grpc_addr: default_grpc_addr(),
        }
    }
}

fn default_grpc_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8081))
}

/// Vote limiting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VotingConfig {
    /// Window used when a voter does not ask for one
    #[serde(default = "default_window_minutes")]
    pub default_window_minutes: u32,

    /// Largest window the server accepts
    #[serde(default = "default_max_window_minutes")]
    pub max_window_minutes: u32,

    /// How long server vote records are kept after the last vote
    #[serde(default = "default_record_retention")]
    pub record_retention_secs: u64,

    /// How often expired records are pruned
    #[serde(default = "default_prune_interval")]
    pub prune_interval_secs: u64,

    /// YAML catalog of sites to serve
    pub catalog_path: Option<String>,
}

impl Default for VotingConfig {
    fn default() -> Self {
        Self {
            default_window_minutes: default_window_minutes(),
            max_window_minutes: default_max_window_minutes(),
            record_retention_secs: default_record_retention(),
            prune_interval_secs: default_prune_interval(),
            catalog_path: None,
        }
    }
}

fn default_window_minutes() -> u32 {
    DEFAULT_WINDOW_MINUTES
}

fn default_max_window_minutes() -> u32 {
    DEFAULT_MAX_WINDOW_MINUTES
}

fn default_record_retention() -> u64 {
    u64::from(DEFAULT_MAX_WINDOW_MINUTES) * 60
}

/// Longest record retention accepted (ten years).
const MAX_RECORD_RETENTION_SECS: u64 = 10 * 365 * 24 * 60 * 60;

impl VotingConfig {
    /// Record retention as a duration.
    pub fn record_retention(&self) -> Result<chrono::Duration> {
        i64::try_from(self.record_retention_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .ok_or_else(|| {
                SitevoteError::Config(format!(
                    "record_retention_secs ({}) is out of range",
                    self.record_retention_secs
                ))
            })
    }
}

fn default_prune_interval() -> u64 {
    300
}

/// Client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// URL of the Sitevote gRPC server
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// Public IP echo endpoint
    #[serde(default = "default_ip_lookup_url")]
    pub ip_lookup_url: String,

    /// File holding this client's vote records
    #[serde(default = "default_store_path")]
    pub store_path: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            ip_lookup_url: default_ip_lookup_url(),
            store_path: default_store_path(),
        }
    }
}

fn default_server_url() -> String {
    "http://127.0.0.1:8081".to_string()
}

fn default_ip_lookup_url() -> String {
    DEFAULT_IP_LOOKUP_URL.to_string()
}

fn default_store_path() -> String {
    "sitevote-votes.json".to_string()
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl SitevoteConfig {
    /// Load configuration from an optional file plus the environment.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(
                config::File::from(Path::new(path))
                    .format(config::FileFormat::Yaml)
                    .required(true),
            );
        }
        builder = builder.add_source(
            config::Environment::with_prefix("SITEVOTE")
                .prefix_separator("_")
                .separator("__"),
        );

        let config: SitevoteConfig = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| SitevoteError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file path.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: SitevoteConfig =
            serde_yaml::from_str(yaml).map_err(|e| SitevoteError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints.
    ///
    /// Records must outlive the largest window, otherwise pruning would let a
    /// fingerprint vote again before its window closed.
    pub fn validate(&self) -> Result<()> {
        let voting = &self.voting;
        if voting.default_window_minutes == 0 || voting.max_window_minutes == 0 {
            return Err(SitevoteError::Config("vote windows must be positive".to_string()));
        }
        if voting.default_window_minutes > voting.max_window_minutes {
            return Err(SitevoteError::Config(format!(
                "default_window_minutes ({}) exceeds max_window_minutes ({})",
                voting.default_window_minutes, voting.max_window_minutes
            )));
        }
        if u64::from(voting.max_window_minutes) * 60 > voting.record_retention_secs {
            return Err(SitevoteError::Config(format!(
                "record_retention_secs ({}) is shorter than max_window_minutes ({})",
                voting.record_retention_secs, voting.max_window_minutes
            )));
        }
        if voting.record_retention_secs > MAX_RECORD_RETENTION_SECS {
            return Err(SitevoteError::Config(format!(
                "record_retention_secs ({}) exceeds the maximum of {}",
                voting.record_retention_secs, MAX_RECORD_RETENTION_SECS
            )));
        }
        if voting.prune_interval_secs == 0 {
            return Err(SitevoteError::Config("prune_interval_secs must be positive".to_string()));
        }
        Ok(())
    }
}
