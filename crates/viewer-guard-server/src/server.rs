//! HTTP server lifecycle.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;
use viewer_guard::AccessGuard;

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::routes::create_router;
use crate::state::AppState;

/// HTTP front end for an [`AccessGuard`].
#[derive(Debug, Clone)]
pub struct GuardServer {
    state: Arc<AppState>,
}

impl GuardServer {
    /// Create a server over an existing guard.
    #[must_use]
    pub fn new(config: ServerConfig, guard: Arc<AccessGuard>) -> Self {
        Self {
            state: Arc::new(AppState::new(config, guard)),
        }
    }

    /// Create a server and the guard its configuration describes.
    ///
    /// # Errors
    ///
    /// Returns an error if a configured snapshot cannot be loaded.
    pub fn from_config(config: ServerConfig) -> ServerResult<Self> {
        let guard = AccessGuard::from_config(config.guard.clone())?;
        Ok(Self::new(config, Arc::new(guard)))
    }

    /// Shared handler state.
    #[must_use]
    pub fn state(&self) -> Arc<AppState> {
        Arc::clone(&self.state)
    }

    /// The guard behind the API.
    #[must_use]
    pub fn guard(&self) -> Arc<AccessGuard> {
        self.state.guard_handle()
    }

    /// Create the router without starting the server.
    pub fn router(&self) -> axum::Router {
        create_router(self.state())
    }

    /// Serve until a fatal error.
    ///
    /// # Errors
    ///
    /// Returns an error if binding to the address fails.
    pub async fn serve(&self, addr: SocketAddr) -> ServerResult<()> {
        self.serve_with_shutdown(addr, std::future::pending()).await
    }

    /// Serve until `shutdown` completes, then drain in-flight requests.
    ///
    /// # Errors
    ///
    /// Returns an error if binding to the address fails.
    pub async fn serve_with_shutdown<F>(&self, addr: SocketAddr, shutdown: F) -> ServerResult<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindFailed(addr, e))?;

        let local = listener.local_addr().unwrap_or(addr);
        info!(
            addr = %local,
            prefix = %self.state.config().api_prefix,
            "Blocklist API listening"
        );

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| ServerError::Serve(e.to_string()))?;

        info!("Blocklist API shut down");
        Ok(())
    }
}
