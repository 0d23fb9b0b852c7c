//! # viewer-guard-server
//!
//! HTTP admin and lookup API for [`viewer_guard`], built on axum.
//!
//! ## Example
//!
//! ```rust,no_run
//! use viewer_guard_server::{GuardServer, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), viewer_guard_server::ServerError> {
//!     let config = ServerConfig::default();
//!     let server = GuardServer::from_config(config.clone())?;
//!     server.serve(config.bind_addr).await
//! }
//! ```
//!
//! ## API Endpoints
//!
//! All routes live under the configured prefix (`/api/blacklist` by default).
//!
//! | Endpoint | Method | Description |
//! |----------|--------|-------------|
//! | `/block` | POST | Create a block rule |
//! | `/unblock/{id}` | POST | Remove one rule by id |
//! | `/unblock` | POST | Remove rules for an address with an exact scope |
//! | `/check` | POST | Decide whether `(ip, path, node)` is blocked |
//! | `/` | GET | Page through rules, most recent first |
//! | `/stats` | GET | Counts over active rules |
//! | `/health` | GET | Liveness probe |
//!
//! Errors are returned as `{"success": false, "error": "..."}` with status
//! 400 for bad input and 500 for storage failures.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod server;
pub mod state;
pub mod types;

// Re-export main types
pub use config::ServerConfig;
pub use error::{ApiError, ApiResult, ServerError, ServerResult};
pub use routes::create_router;
pub use server::GuardServer;
pub use state::AppState;
