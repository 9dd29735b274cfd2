//! Configuration system for the relay server
//!
//! Every section and field is optional; a missing file or an empty file
//! yields the defaults. CLI flags and environment variables are applied on
//! top by the binary.

use crate::tools::builtin::DEFAULT_SUMMARY_ENDPOINT;
use serde::{Deserialize, Serialize};
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RelayConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub pipeline: PipelineSection,
    #[serde(default)]
    pub lookup: LookupSection,
}

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Interval between SSE keep-alive comments while a stage is suspended
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            keep_alive_secs: default_keep_alive_secs(),
        }
    }
}

/// Stage pacing and display settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineSection {
    /// Simulated thinking time before each stage's output, in milliseconds
    #[serde(default = "default_think_time_ms")]
    pub think_time_ms: u64,
    /// Maximum characters of tool output shown in a status event
    #[serde(default = "default_display_budget")]
    pub display_budget: usize,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            think_time_ms: default_think_time_ms(),
            display_budget: default_display_budget(),
        }
    }
}

impl PipelineSection {
    pub fn think_time(&self) -> Duration {
        Duration::from_millis(self.think_time_ms)
    }
}

/// Summary lookup tool settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LookupSection {
    /// Base URL; the topic is appended as the last path segment
    #[serde(default = "default_lookup_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Optional request timeout; unset means the call waits as long as the run lives
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for LookupSection {
    fn default() -> Self {
        Self {
            endpoint: default_lookup_endpoint(),
            user_agent: default_user_agent(),
            timeout_secs: None,
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_keep_alive_secs() -> u64 {
    15
}

fn default_think_time_ms() -> u64 {
    1000
}

fn default_display_budget() -> usize {
    200
}

fn default_lookup_endpoint() -> String {
    DEFAULT_SUMMARY_ENDPOINT.to_string()
}

fn default_user_agent() -> String {
    format!("agent-relay/{}", env!("CARGO_PKG_VERSION"))
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Invalid listen address: {0}")]
    InvalidAddress(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl RelayConfig {
    /// Load configuration from a TOML file and validate it
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: RelayConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints that serde cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.host.trim().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "server.host must not be empty".to_string(),
            ));
        }
        if self.server.port == 0 {
            return Err(ConfigError::InvalidConfig(
                "server.port must be non-zero".to_string(),
            ));
        }
        if self.server.keep_alive_secs == 0 {
            return Err(ConfigError::InvalidConfig(
                "server.keep_alive_secs must be at least 1".to_string(),
            ));
        }
        if self.pipeline.display_budget == 0 {
            return Err(ConfigError::InvalidConfig(
                "pipeline.display_budget must be at least 1".to_string(),
            ));
        }
        validate_endpoint(&self.lookup.endpoint)?;
        Ok(())
    }

    /// Resolve the listen address from host and port
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let target = (self.server.host.as_str(), self.server.port);
        target
            .to_socket_addrs()
            .map_err(|e| {
                ConfigError::InvalidAddress(format!(
                    "{}:{}: {e}",
                    self.server.host, self.server.port
                ))
            })?
            .next()
            .ok_or_else(|| {
                ConfigError::InvalidAddress(format!(
                    "{}:{} resolved to no addresses",
                    self.server.host, self.server.port
                ))
            })
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.server.keep_alive_secs)
    }

    /// Create a test configuration with instant stages
    #[cfg(test)]
    pub fn test_config() -> Self {
        let toml_content = r#"
[server]
host = "127.0.0.1"
port = 8000

[pipeline]
think_time_ms = 0
display_budget = 200
"#;
        toml::from_str(toml_content).expect("Test config should parse")
    }
}

/// Validate the lookup endpoint is an absolute http(s) URL
fn validate_endpoint(endpoint: &str) -> Result<(), ConfigError> {
    let url = Url::parse(endpoint)
        .map_err(|e| ConfigError::InvalidConfig(format!("lookup.endpoint '{endpoint}': {e}")))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidConfig(format!(
            "lookup.endpoint '{endpoint}' must use http or https"
        )));
    }

    Ok(())
}
