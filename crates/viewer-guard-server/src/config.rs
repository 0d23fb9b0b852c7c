//! Server configuration.

use std::net::SocketAddr;
use std::path::Path;

use serde::{Deserialize, Serialize};
use viewer_guard::GuardConfig;

use crate::error::{ServerError, ServerResult};

/// Default prefix the API is mounted under.
pub const DEFAULT_API_PREFIX: &str = "/api/blacklist";

/// Configuration for the HTTP server and the engine behind it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind the HTTP server to.
    pub bind_addr: SocketAddr,
    /// Path prefix for every route.
    pub api_prefix: String,
    /// CORS allowed origins (empty means all).
    pub cors_origins: Vec<String>,
    /// Engine settings.
    pub guard: GuardConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            api_prefix: DEFAULT_API_PREFIX.to_string(),
            cors_origins: Vec::new(),
            guard: GuardConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Create a new configuration with the specified bind address.
    #[must_use]
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            ..Self::default()
        }
    }

    /// Set the engine configuration.
    #[must_use]
    pub fn with_guard(mut self, guard: GuardConfig) -> Self {
        self.guard = guard;
        self
    }

    /// Set the route prefix.
    #[must_use]
    pub fn with_api_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.api_prefix = prefix.into();
        self
    }

    /// Add a CORS allowed origin.
    #[must_use]
    pub fn with_cors_origin(mut self, origin: impl Into<String>) -> Self {
        self.cors_origins.push(origin.into());
        self
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: impl AsRef<Path>) -> ServerResult<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ServerError::Config(format!(
                "failed to read config file '{}': {e}",
                path.as_ref().display()
            ))
        })?;

        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid or fails validation.
    pub fn from_toml(content: &str) -> ServerResult<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| ServerError::Config(format!("invalid TOML: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> ServerResult<()> {
        if !self.api_prefix.starts_with('/') || self.api_prefix.len() < 2 {
            return Err(ServerError::Config(
                "api_prefix must start with '/' and name a path".to_string(),
            ));
        }

        if self.api_prefix.ends_with('/') {
            return Err(ServerError::Config(
                "api_prefix must not end with '/'".to_string(),
            ));
        }

        let guard = &self.guard;
        if guard.default_blocked_by.trim().is_empty() {
            return Err(ServerError::Config(
                "guard.default_blocked_by cannot be empty".to_string(),
            ));
        }

        if guard.max_per_page == 0 {
            return Err(ServerError::Config(
                "guard.max_per_page must be greater than 0".to_string(),
            ));
        }

        if guard.default_per_page == 0 || guard.default_per_page > guard.max_per_page {
            return Err(ServerError::Config(
                "guard.default_per_page must be between 1 and guard.max_per_page".to_string(),
            ));
        }

        if guard.reaper.enabled && guard.reaper.interval_secs == 0 {
            return Err(ServerError::Config(
                "guard.reaper.interval_secs must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}
