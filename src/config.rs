//! Configuration System
//!
//! Immutable agent configuration snapshot. Loaded once at startup and shared
//! by reference for the life of the process; the protocol core never reads
//! ambient global state. Supports TOML files with environment variable
//! overrides through the loader.

use crate::error::ConfigError;
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};

mod loader;

pub use loader::ConfigLoader;

/// Root agent configuration.
///
/// Read-only after load. The handshake sends a serialized snapshot of this
/// structure to the collector as the local half of the negotiated
/// configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Primary collector host
    #[serde(default = "default_host")]
    pub host: String,

    /// Collector port. Only set when testing against a local collector;
    /// unset in production, where the scheme's default port applies.
    #[serde(default)]
    pub port: Option<u16>,

    /// Use TLS when talking to the collector
    #[serde(default = "default_true")]
    pub ssl: bool,

    /// Account license key. The shared credential that authenticates every
    /// request; an empty value is replaced on the wire by a sentinel string
    /// so the misconfiguration is visible in collector logs.
    #[serde(default)]
    pub license_key: String,

    /// Primary application name
    #[serde(default = "default_app_name")]
    pub app_name: String,

    /// Additional application names the reported data is linked to
    #[serde(default)]
    pub linked_applications: Vec<String>,

    /// Proxy settings. Both host and port must be set for the proxy to be
    /// used at all.
    #[serde(default)]
    pub proxy_host: Option<String>,

    #[serde(default)]
    pub proxy_port: Option<u16>,

    #[serde(default)]
    pub proxy_user: Option<String>,

    #[serde(default)]
    pub proxy_pass: Option<String>,

    /// Bound on every collector request, connection setup included
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Debug switches
    #[serde(default)]
    pub debug: DebugConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Debug switches. All default to off; payload content never reaches the
/// logs unless explicitly enabled, to avoid leaking telemetry content.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DebugConfig {
    /// Log payload bytes when the collector rejects them as malformed
    #[serde(default)]
    pub log_malformed_payloads: bool,
}

fn default_host() -> String {
    "collector.beaconapm.io".to_string()
}

fn default_app_name() -> String {
    "Rust Application".to_string()
}

fn default_true() -> bool {
    true
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: None,
            ssl: true,
            license_key: String::new(),
            app_name: default_app_name(),
            linked_applications: Vec::new(),
            proxy_host: None,
            proxy_port: None,
            proxy_user: None,
            proxy_pass: None,
            request_timeout_secs: default_request_timeout(),
            debug: DebugConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl AgentConfig {
    /// Validate the configuration snapshot.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.is_empty() {
            return Err(ConfigError::Invalid(
                "Collector host cannot be empty".to_string(),
            ));
        }
        if self.app_name.is_empty() {
            return Err(ConfigError::Invalid(
                "Application name cannot be empty".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "Request timeout must be non-zero".to_string(),
            ));
        }
        if self.proxy_host.is_some() != self.proxy_port.is_some() {
            return Err(ConfigError::Invalid(
                "Proxy host and proxy port must be set together".to_string(),
            ));
        }
        Ok(())
    }

    /// Full application name list: primary name plus linked names, in order.
    pub fn app_names(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(1 + self.linked_applications.len());
        names.push(self.app_name.clone());
        names.extend(self.linked_applications.iter().cloned());
        names
    }

    /// Serialized snapshot of the local settings, sent to the collector
    /// during the handshake and overlaid by the server's response.
    pub fn settings_snapshot(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
