//! Block decision: which active rules apply to a request, and which one is
//! reported as the cause.

use serde::Serialize;

use crate::entry::{BlockEntry, NodeId};

/// A request to evaluate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckQuery {
    /// Viewer address (normalized by the facade before matching).
    pub ip_address: String,
    /// Request path, if known.
    pub path: Option<String>,
    /// Target node, if known.
    pub node_id: Option<NodeId>,
}

impl CheckQuery {
    /// Query for an address with no path or node.
    #[must_use]
    pub fn new(ip_address: impl Into<String>) -> Self {
        Self {
            ip_address: ip_address.into(),
            path: None,
            node_id: None,
        }
    }

    /// Set the request path.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Set the target node.
    #[must_use]
    pub const fn with_node(mut self, node_id: NodeId) -> Self {
        self.node_id = Some(node_id);
        self
    }
}

/// Result of a block check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckOutcome {
    /// Whether any active rule applies.
    pub blocked: bool,
    /// The most specific applicable rule.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry: Option<BlockEntry>,
}

impl CheckOutcome {
    /// Nothing applies.
    #[must_use]
    pub const fn allowed() -> Self {
        Self {
            blocked: false,
            entry: None,
        }
    }

    /// `entry` applies.
    #[must_use]
    pub const fn blocked_by(entry: BlockEntry) -> Self {
        Self {
            blocked: true,
            entry: Some(entry),
        }
    }
}

/// Scope filtering and precedence over a candidate set.
///
/// Candidates are expected to be the active rules for the queried address;
/// the matcher itself does not look at addresses or expiry.
#[derive(Debug, Clone, Copy, Default)]
pub struct Matcher;

impl Matcher {
    /// Whether `entry`'s scope covers the query.
    ///
    /// A scoped dimension only matches a query that supplies that dimension,
    /// so node- or path-scoped rules never apply to an unscoped lookup.
    #[must_use]
    pub fn applies(entry: &BlockEntry, query: &CheckQuery) -> bool {
        let node_ok = entry
            .node_id
            .is_none_or(|node| query.node_id == Some(node));

        let path_ok = entry.path_pattern.as_deref().is_none_or(|pattern| {
            query
                .path
                .as_deref()
                .is_some_and(|path| path_matches(pattern, path))
        });

        node_ok && path_ok
    }

    /// Pick the rule to report for `query`, if any applies.
    ///
    /// Precedence: more scope dimensions set, then most recently created,
    /// then highest id.
    #[must_use]
    pub fn select<'a>(candidates: &'a [BlockEntry], query: &CheckQuery) -> Option<&'a BlockEntry> {
        candidates
            .iter()
            .filter(|entry| Self::applies(entry, query))
            .max_by_key(|entry| (entry.specificity(), entry.created_at, entry.id))
    }

    /// Evaluate `query` against `candidates`.
    #[must_use]
    pub fn evaluate(candidates: &[BlockEntry], query: &CheckQuery) -> CheckOutcome {
        Self::select(candidates, query)
            .cloned()
            .map_or_else(CheckOutcome::allowed, CheckOutcome::blocked_by)
    }
}

/// Match a request path against a rule's path pattern.
///
/// An empty path only matches the empty pattern; otherwise this is
/// [`glob_match`].
#[must_use]
pub fn path_matches(pattern: &str, path: &str) -> bool {
    if path.is_empty() {
        return pattern.is_empty();
    }
    glob_match(pattern, path)
}

/// Case-sensitive glob matching where `*` matches any run of characters,
/// including the empty run. Every other character matches itself.
#[must_use]
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern = pattern.as_bytes();
    let text = text.as_bytes();

    let mut p = 0;
    let mut t = 0;
    let mut star: Option<usize> = None;
    let mut star_t = 0;

    while t < text.len() {
        if p < pattern.len() && pattern[p] == b'*' {
            star = Some(p);
            star_t = t;
            p += 1;
        } else if p < pattern.len() && pattern[p] == text[t] {
            p += 1;
            t += 1;
        } else if let Some(sp) = star {
            // Let the last `*` swallow one more byte and retry.
            p = sp + 1;
            star_t += 1;
            t = star_t;
        } else {
            return false;
        }
    }

    pattern[p..].iter().all(|&c| c == b'*')
}
