//! Shared state for the HTTP handlers.

use std::sync::Arc;
use std::time::Instant;

use viewer_guard::AccessGuard;

use crate::config::ServerConfig;

/// State handed to every handler.
#[derive(Debug)]
pub struct AppState {
    config: Arc<ServerConfig>,
    guard: Arc<AccessGuard>,
    start_time: Instant,
}

impl AppState {
    /// Create state around an existing guard.
    pub fn new(config: ServerConfig, guard: Arc<AccessGuard>) -> Self {
        Self {
            config: Arc::new(config),
            guard,
            start_time: Instant::now(),
        }
    }

    /// Server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// The access guard.
    #[must_use]
    pub fn guard(&self) -> &AccessGuard {
        &self.guard
    }

    /// A shared handle to the access guard.
    #[must_use]
    pub fn guard_handle(&self) -> Arc<AccessGuard> {
        Arc::clone(&self.guard)
    }

    /// Seconds since the state was created.
    #[must_use]
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
