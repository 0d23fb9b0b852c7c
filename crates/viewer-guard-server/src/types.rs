//! Request and response bodies.

use serde::{Deserialize, Serialize};
use viewer_guard::{BlockEntry, BlockRequest, CheckQuery, NodeId};

/// Body of `POST /block`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BlockBody {
    /// Address to block.
    pub ip_address: Option<String>,
    /// Operator note.
    pub reason: Option<String>,
    /// Creator.
    pub blocked_by: Option<String>,
    /// Duration token.
    pub duration: Option<String>,
    /// Path glob.
    pub path_pattern: Option<String>,
    /// Node restriction.
    pub node_id: Option<NodeId>,
}

impl From<BlockBody> for BlockRequest {
    fn from(body: BlockBody) -> Self {
        Self {
            ip_address: body.ip_address.unwrap_or_default(),
            reason: body.reason,
            blocked_by: body.blocked_by,
            duration: body.duration,
            path_pattern: body.path_pattern,
            node_id: body.node_id,
        }
    }
}

/// Body of `POST /unblock`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UnblockBody {
    /// Address to unblock.
    pub ip_address: Option<String>,
    /// Exact stored path pattern.
    pub path_pattern: Option<String>,
    /// Exact stored node restriction.
    pub node_id: Option<NodeId>,
}

/// Body of `POST /check`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CheckBody {
    /// Viewer address.
    pub ip_address: Option<String>,
    /// Request path.
    pub path: Option<String>,
    /// Target node.
    pub node_id: Option<NodeId>,
}

impl From<CheckBody> for CheckQuery {
    fn from(body: CheckBody) -> Self {
        Self {
            ip_address: body.ip_address.unwrap_or_default(),
            path: body.path,
            node_id: body.node_id,
        }
    }
}

/// Query string of `GET /`.
///
/// Values are kept as text so a malformed number falls back to the default
/// instead of rejecting the request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    /// 1-indexed page.
    pub page: Option<String>,
    /// Page size.
    pub per_page: Option<String>,
}

impl ListQuery {
    /// Requested page, or the first page.
    #[must_use]
    pub fn page(&self) -> usize {
        parse_or(self.page.as_deref(), 1)
    }

    /// Requested page size, or `default`.
    #[must_use]
    pub fn per_page(&self, default: usize) -> usize {
        parse_or(self.per_page.as_deref(), default)
    }
}

fn parse_or(value: Option<&str>, default: usize) -> usize {
    value.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

/// Response of `POST /block`.
#[derive(Debug, Serialize)]
pub struct BlockResponse {
    /// Always `true`.
    pub success: bool,
    /// The created rule.
    pub entry: BlockEntry,
}

/// Response of `POST /unblock/{id}`.
#[derive(Debug, Serialize)]
pub struct UnblockResponse {
    /// Whether a rule was removed.
    pub success: bool,
}

/// Response of `POST /unblock`.
#[derive(Debug, Serialize)]
pub struct UnblockAddressResponse {
    /// Always `true`.
    pub success: bool,
    /// Number of rules removed.
    pub removed_count: usize,
}

/// Response of `GET /health`.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Status message.
    pub status: String,
    /// Server uptime in seconds.
    pub uptime_secs: u64,
}
