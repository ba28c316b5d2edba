//! Configuration loading — TOML file with environment variable overrides.
//!
//! Looks for `hearth.toml` in the working directory. Every field has a
//! sensible default so the file is optional. Environment variables take
//! precedence over file values. Plugins are declared as `[[plugins]]`
//! tables; with no file present a single virtual demo plugin is
//! configured.

use std::collections::HashSet;

use serde::Deserialize;

use hearth_domain::plugin::{PluginDescriptor, PluginKind};

/// Top-level configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server settings.
    pub server: ServerConfig,
    /// Event bus settings.
    pub bus: BusConfig,
    /// Plugin lifecycle settings.
    pub lifecycle: LifecycleConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Plugin declarations.
    pub plugins: Vec<PluginDescriptor>,
}

/// HTTP listener configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to (e.g. `0.0.0.0`).
    pub host: String,
    /// TCP port.
    pub port: u16,
}

/// Event bus configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Per-subscription queue capacity.
    pub capacity: usize,
}

/// Plugin lifecycle configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// How long a stop hook may run before the plugin is abandoned, in
    /// seconds.
    pub stop_timeout_secs: u64,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

impl Config {
    /// Load configuration from `hearth.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if
    /// the result fails validation.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file("hearth.toml")?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("HEARTH_HOST") {
            self.server.host = val;
        }
        if let Ok(val) = std::env::var("HEARTH_PORT") {
            if let Ok(port) = val.parse() {
                self.server.port = port;
            }
        }
        if let Ok(val) = std::env::var("HEARTH_BIND") {
            if let Some((host, port)) = val.rsplit_once(':') {
                self.server.host = host.to_string();
                if let Ok(port) = port.parse() {
                    self.server.port = port;
                }
            }
        }
        if let Ok(val) = std::env::var("HEARTH_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("RUST_LOG") {
            self.logging.filter = val;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Validation("port must be non-zero".to_string()));
        }
        let mut seen = HashSet::new();
        for descriptor in &self.plugins {
            descriptor
                .validate()
                .map_err(|err| ConfigError::Validation(err.to_string()))?;
            if !seen.insert(descriptor.id.clone()) {
                return Err(ConfigError::Validation(format!(
                    "duplicate plugin id {:?}",
                    descriptor.id
                )));
            }
        }
        Ok(())
    }

    /// Return the `host:port` bind address.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            bus: BusConfig::default(),
            lifecycle: LifecycleConfig::default(),
            logging: LoggingConfig::default(),
            plugins: vec![PluginDescriptor::new(
                "virtual",
                PluginKind::Device,
                "virtual",
            )],
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self { capacity: 256 }
    }
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            stop_timeout_secs: 10,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "hearthd=info,hearth=info,tower_http=debug".to_string(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}
