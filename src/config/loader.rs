//! Configuration loader: defaults, optional TOML file, environment overrides.

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File};
use std::path::Path;
use tracing::warn;

use super::AgentConfig;
use crate::error::ConfigError;

/// Loads an [`AgentConfig`] snapshot. Override order, lowest to highest:
/// built-in defaults, the given TOML file, `BEACON_`-prefixed environment
/// variables (e.g. `BEACON_LICENSE_KEY`, `BEACON_PROXY_HOST`).
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration, reading `config_file` when it exists.
    pub fn load(config_file: Option<&Path>) -> Result<AgentConfig, ConfigError> {
        let mut builder = Self::builder_with_defaults()?;

        if let Some(path) = config_file {
            if path.exists() {
                let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
                builder = builder.add_source(
                    File::with_name(&canonical.to_string_lossy()).required(false),
                );
            } else {
                warn!(
                    config_path = %path.display(),
                    "Agent configuration file not found; continuing with defaults"
                );
            }
        }

        builder = builder.add_source(Environment::with_prefix("BEACON"));

        let settings = builder.build()?;
        let config: AgentConfig = settings.try_deserialize().map_err(ConfigError::from)?;
        config.validate()?;
        Ok(config)
    }

    fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        Ok(Config::builder()
            .set_default("host", "collector.beaconapm.io")?
            .set_default("ssl", true)?
            .set_default("app_name", "Rust Application")?
            .set_default("request_timeout_secs", 30i64)?)
    }
}
