//! Configuration management for pulse.
//!
//! Both processes build a validated, immutable configuration record before
//! their core starts. Sources are layered with this precedence:
//! - Defaults (lowest priority)
//! - YAML file
//! - CLI flags
//! - Environment variables (highest priority)

use crate::core::{PulseError, Result};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Default server address used by both processes
pub const DEFAULT_ADDRESS: &str = "localhost:8080";

/// Environment variable overriding the server address
pub const ENV_ADDRESS: &str = "ADDRESS";
/// Environment variable overriding the poll interval (whole seconds)
pub const ENV_POLL_INTERVAL: &str = "POLL_INTERVAL";
/// Environment variable overriding the report interval (whole seconds)
pub const ENV_REPORT_INTERVAL: &str = "REPORT_INTERVAL";

/// Agent configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Server base URL or `host:port`
    pub server_url: String,
    /// Period between two collections
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
    /// Period between two transmissions
    #[serde(with = "humantime_serde")]
    pub report_interval: Duration,
    /// Per-request timeout of the HTTP client
    #[serde(with = "humantime_serde")]
    pub http_timeout: Duration,
    /// Verbose logging
    #[serde(skip)]
    pub verbose: bool,
}

/// Server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address
    pub address: ListenAddress,
    /// How long in-flight requests may drain after cancellation
    #[serde(with = "humantime_serde")]
    pub shutdown_timeout: Duration,
    /// Verbose logging
    #[serde(skip)]
    pub verbose: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        AgentConfig {
            server_url: DEFAULT_ADDRESS.to_string(),
            poll_interval: Duration::from_secs(2),
            report_interval: Duration::from_secs(10),
            http_timeout: Duration::from_secs(10),
            verbose: false,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            address: ListenAddress {
                host: "localhost".to_string(),
                port: 8080,
            },
            shutdown_timeout: Duration::from_secs(5),
            verbose: false,
        }
    }
}

impl AgentConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.server_base_url()?;

        if self.poll_interval.is_zero() {
            return Err(PulseError::config("poll interval must be greater than 0"));
        }
        if self.report_interval.is_zero() {
            return Err(PulseError::config("report interval must be greater than 0"));
        }
        if self.http_timeout.is_zero() {
            return Err(PulseError::config("http timeout must be greater than 0"));
        }

        Ok(())
    }

    /// Base URL of the server, with `http://` prepended to a bare `host:port`.
    pub fn server_base_url(&self) -> Result<Url> {
        let raw = self.server_url.trim();
        if raw.is_empty() {
            return Err(PulseError::config("server address cannot be empty"));
        }

        let candidate = if raw.contains("://") {
            raw.to_string()
        } else {
            format!("http://{raw}")
        };

        let url = Url::parse(&candidate)
            .map_err(|e| PulseError::config(format!("invalid server address {raw:?}: {e}")))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(PulseError::config(format!(
                "unsupported scheme {:?} in server address",
                url.scheme()
            )));
        }
        if url.host_str().map_or(true, str::is_empty) {
            return Err(PulseError::config(format!("server address {raw:?} has no host")));
        }

        Ok(url)
    }
}

impl ServerConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.address.host.is_empty() {
            return Err(PulseError::config("listen host cannot be empty"));
        }
        if self.address.port == 0 {
            return Err(PulseError::config("listen port must be between 1 and 65535"));
        }
        Ok(())
    }
}

/// Listen address accepted as `host:port`, `:port` or a bare port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ListenAddress {
    host: String,
    port: u16,
}

impl ListenAddress {
    /// Parse and validate an address.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(PulseError::config("address cannot be empty"));
        }

        let (host, port) = match raw.rsplit_once(':') {
            Some((host, port)) => (host, port),
            None => ("", raw),
        };
        let host = host.trim_start_matches('[').trim_end_matches(']');

        let port = parse_port(port)?;
        let host = if host.is_empty() { "0.0.0.0" } else { host };

        Ok(ListenAddress {
            host: host.to_string(),
            port,
        })
    }

    /// Host part
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Port part
    pub fn port(&self) -> u16 {
        self.port
    }
}

fn parse_port(raw: &str) -> Result<u16> {
    let port: u32 = raw
        .parse()
        .map_err(|_| PulseError::config(format!("invalid port {raw:?}")))?;
    match u16::try_from(port) {
        Ok(port) if port != 0 => Ok(port),
        _ => Err(PulseError::config(format!("port {port} out of range (1-65535)"))),
    }
}

impl fmt::Display for ListenAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl FromStr for ListenAddress {
    type Err = PulseError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ListenAddress {
    type Error = PulseError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<ListenAddress> for String {
    fn from(value: ListenAddress) -> Self {
        value.to_string()
    }
}

/// Parse an interval given in whole seconds (CLI flags and env vars).
pub fn parse_interval_secs(raw: &str, what: &str) -> Result<Duration> {
    let secs: u64 = raw
        .trim()
        .parse()
        .map_err(|_| PulseError::config(format!("{what} must be an integer number of seconds, got {raw:?}")))?;
    if secs == 0 {
        return Err(PulseError::config(format!("{what} must be at least 1 second")));
    }
    Ok(Duration::from_secs(secs))
}

/// Builder for [`AgentConfig`]
#[derive(Debug, Default)]
pub struct AgentConfigBuilder {
    config: AgentConfig,
}

impl AgentConfigBuilder {
    /// Create a new builder with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from YAML string
    pub fn from_yaml(mut self, yaml: &str) -> Result<Self> {
        self.config = serde_yaml::from_str(yaml)?;
        Ok(self)
    }

    /// Set server address
    pub fn server_url<S: Into<String>>(mut self, url: S) -> Self {
        self.config.server_url = url.into();
        self
    }

    /// Set poll interval
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    /// Set report interval
    pub fn report_interval(mut self, interval: Duration) -> Self {
        self.config.report_interval = interval;
        self
    }

    /// Set HTTP client timeout
    pub fn http_timeout(mut self, timeout: Duration) -> Self {
        self.config.http_timeout = timeout;
        self
    }

    /// Set verbose logging
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.config.verbose = verbose;
        self
    }

    /// Apply `ADDRESS`, `POLL_INTERVAL` and `REPORT_INTERVAL` overrides.
    pub fn apply_env<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(address) = lookup(ENV_ADDRESS) {
            self.config.server_url = address;
        }
        if let Some(raw) = lookup(ENV_POLL_INTERVAL) {
            self.config.poll_interval = parse_interval_secs(&raw, ENV_POLL_INTERVAL)?;
        }
        if let Some(raw) = lookup(ENV_REPORT_INTERVAL) {
            self.config.report_interval = parse_interval_secs(&raw, ENV_REPORT_INTERVAL)?;
        }
        Ok(self)
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<AgentConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Builder for [`ServerConfig`]
#[derive(Debug, Default)]
pub struct ServerConfigBuilder {
    config: ServerConfig,
}

impl ServerConfigBuilder {
    /// Create a new builder with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from YAML string
    pub fn from_yaml(mut self, yaml: &str) -> Result<Self> {
        self.config = serde_yaml::from_str(yaml)?;
        Ok(self)
    }

    /// Set listen address
    pub fn address(mut self, address: ListenAddress) -> Self {
        self.config.address = address;
        self
    }

    /// Set graceful shutdown timeout
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.config.shutdown_timeout = timeout;
        self
    }

    /// Set verbose logging
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.config.verbose = verbose;
        self
    }

    /// Apply the `ADDRESS` override.
    pub fn apply_env<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_ADDRESS) {
            self.config.address = ListenAddress::parse(&raw)?;
        }
        Ok(self)
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<ServerConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
