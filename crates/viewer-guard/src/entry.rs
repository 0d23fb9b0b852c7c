//! Block rule data model.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::expiry;

/// Identifier of a stored block entry.
///
/// Assigned by the store in increasing order and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(pub u64);

impl EntryId {
    /// The raw numeric value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for EntryId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Identifier of a media node a rule can be restricted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub i64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for NodeId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// The `(path_pattern, node_id)` pair narrowing where a rule applies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockScope {
    /// Glob over request paths; `None` covers every path.
    pub path_pattern: Option<String>,
    /// Node restriction; `None` covers every node.
    pub node_id: Option<NodeId>,
}

impl BlockScope {
    /// The unscoped rule: every path on every node.
    #[must_use]
    pub const fn global() -> Self {
        Self {
            path_pattern: None,
            node_id: None,
        }
    }

    /// Build a scope from its optional parts.
    #[must_use]
    pub const fn new(path_pattern: Option<String>, node_id: Option<NodeId>) -> Self {
        Self {
            path_pattern,
            node_id,
        }
    }

    /// Number of scope dimensions that are set (0, 1 or 2).
    #[must_use]
    pub fn specificity(&self) -> u8 {
        specificity(self.path_pattern.is_some(), self.node_id.is_some())
    }

    /// Whether neither dimension is set.
    #[must_use]
    pub const fn is_global(&self) -> bool {
        self.path_pattern.is_none() && self.node_id.is_none()
    }
}

fn specificity(has_path: bool, has_node: bool) -> u8 {
    u8::from(has_path) + u8::from(has_node)
}

/// A block rule as handed to the store, before an id is assigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockDraft {
    /// Normalized address the rule applies to.
    pub ip_address: String,
    /// Operator-facing note.
    pub reason: Option<String>,
    /// Who created the rule.
    pub blocked_by: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Expiry; `None` means permanent.
    pub expires_at: Option<DateTime<Utc>>,
    /// Where the rule applies.
    pub scope: BlockScope,
}

impl BlockDraft {
    /// Attach the store-assigned id.
    #[must_use]
    pub fn into_entry(self, id: EntryId) -> BlockEntry {
        BlockEntry {
            id,
            ip_address: self.ip_address,
            reason: self.reason,
            blocked_by: self.blocked_by,
            created_at: self.created_at,
            expires_at: self.expires_at,
            path_pattern: self.scope.path_pattern,
            node_id: self.scope.node_id,
        }
    }
}

/// A stored block rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockEntry {
    /// Unique id.
    pub id: EntryId,
    /// Normalized address the rule applies to.
    pub ip_address: String,
    /// Operator-facing note.
    pub reason: Option<String>,
    /// Who created the rule (`manual` or an automated system name).
    pub blocked_by: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Expiry; `None` means permanent.
    pub expires_at: Option<DateTime<Utc>>,
    /// Glob over request paths; `None` covers every path.
    pub path_pattern: Option<String>,
    /// Node restriction; `None` covers every node.
    pub node_id: Option<NodeId>,
}

impl BlockEntry {
    /// Whether the rule never expires.
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        self.expires_at.is_none()
    }

    /// Whether the rule is in force at `now`.
    #[must_use]
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        expiry::is_active(self, now)
    }

    /// Whether the rule is in force right now.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.is_active_at(Utc::now())
    }

    /// Number of scope dimensions set on this rule.
    #[must_use]
    pub fn specificity(&self) -> u8 {
        specificity(self.path_pattern.is_some(), self.node_id.is_some())
    }

    /// Whether the stored scope is literally `scope` (no glob evaluation).
    #[must_use]
    pub fn has_scope(&self, scope: &BlockScope) -> bool {
        self.path_pattern == scope.path_pattern && self.node_id == scope.node_id
    }

    /// The rule's scope as a value.
    #[must_use]
    pub fn scope(&self) -> BlockScope {
        BlockScope::new(self.path_pattern.clone(), self.node_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn draft(scope: BlockScope) -> BlockDraft {
        BlockDraft {
            ip_address: "1.2.3.4".into(),
            reason: Some("abuse".into()),
            blocked_by: "manual".into(),
            created_at: Utc::now(),
            expires_at: None,
            scope,
        }
    }

    #[test]
    fn test_scope_specificity() {
        assert_eq!(BlockScope::global().specificity(), 0);
        assert!(BlockScope::global().is_global());
        assert_eq!(BlockScope::new(Some("/live/*".into()), None).specificity(), 1);
        assert_eq!(BlockScope::new(None, Some(NodeId(7))).specificity(), 1);
        assert_eq!(
            BlockScope::new(Some("/live/*".into()), Some(NodeId(7))).specificity(),
            2
        );
    }

    #[test]
    fn test_into_entry_keeps_fields() {
        let scope = BlockScope::new(Some("/live/*".into()), Some(NodeId(3)));
        let d = draft(scope.clone());
        let created = d.created_at;
        let entry = d.into_entry(EntryId(9));

        assert_eq!(entry.id, EntryId(9));
        assert_eq!(entry.ip_address, "1.2.3.4");
        assert_eq!(entry.reason.as_deref(), Some("abuse"));
        assert_eq!(entry.created_at, created);
        assert_eq!(entry.scope(), scope);
        assert_eq!(entry.specificity(), 2);
    }

    #[test]
    fn test_entry_specificity_matches_scope() {
        let scopes = [
            BlockScope::global(),
            BlockScope::new(Some("/live/*".into()), None),
            BlockScope::new(None, Some(NodeId(7))),
            BlockScope::new(Some("/live/*".into()), Some(NodeId(7))),
        ];
        for scope in scopes {
            let entry = draft(scope.clone()).into_entry(EntryId(1));
            assert_eq!(entry.specificity(), scope.specificity());
            assert_eq!(entry.scope().is_global(), scope.specificity() == 0);
        }
    }

    #[test]
    fn test_has_scope_is_literal() {
        let entry = draft(BlockScope::new(Some("/live/*".into()), None)).into_entry(EntryId(1));

        assert!(entry.has_scope(&BlockScope::new(Some("/live/*".into()), None)));
        assert!(!entry.has_scope(&BlockScope::new(Some("/live/cam1".into()), None)));
        assert!(!entry.has_scope(&BlockScope::global()));
    }

    #[test]
    fn test_activity() {
        let mut entry = draft(BlockScope::global()).into_entry(EntryId(1));
        assert!(entry.is_permanent());
        assert!(entry.is_active());

        let now = Utc::now();
        entry.expires_at = Some(now + Duration::minutes(5));
        assert!(!entry.is_permanent());
        assert!(entry.is_active_at(now));
        assert!(!entry.is_active_at(now + Duration::minutes(5)));
    }

    #[test]
    fn test_entry_json_shape() {
        let entry = draft(BlockScope::new(None, Some(NodeId(7)))).into_entry(EntryId(12));
        let json = serde_json::to_value(&entry).unwrap();

        assert_eq!(json["id"], 12);
        assert_eq!(json["ip_address"], "1.2.3.4");
        assert_eq!(json["blocked_by"], "manual");
        assert_eq!(json["node_id"], 7);
        assert!(json["path_pattern"].is_null());
        assert!(json["expires_at"].is_null());
        assert!(json["created_at"].is_string());
    }

    #[test]
    fn test_id_display() {
        assert_eq!(EntryId(42).to_string(), "42");
        assert_eq!(NodeId(-1).to_string(), "-1");
        assert_eq!(EntryId::from(5).get(), 5);
    }
}
