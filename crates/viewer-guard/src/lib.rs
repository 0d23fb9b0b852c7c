//! # viewer-guard
//!
//! IP access control for a media-serving platform.
//!
//! Operators create block rules against viewer addresses. A rule can be
//! global, limited to one media node, limited to request paths matching a
//! glob, or both, and it expires after a fixed duration or never. Request
//! handlers ask whether a given `(address, path, node)` is blocked.
//!
//! ## Components
//!
//! - [`AccessGuard`] - The facade: block, unblock, check, list, stats
//! - [`RuleStore`] / [`MemoryRuleStore`] - Rule storage, optionally backed by a [`JsonSnapshot`]
//! - [`Matcher`] - Scope filtering and precedence between applicable rules
//! - [`BlockDuration`] - The fixed vocabulary of block durations
//! - [`Reaper`] - Background deletion of expired rules
//!
//! Expiry is evaluated at read time, so decisions never depend on the
//! reaper having run.
//!
//! # Example
//!
//! ```rust
//! use viewer_guard::{AccessGuard, BlockRequest, CheckQuery, GuardConfig, NodeId};
//!
//! let guard = AccessGuard::from_config(GuardConfig::default())?;
//!
//! guard.block(
//!     BlockRequest::new("203.0.113.7")
//!         .with_reason("restreaming")
//!         .with_duration("24h")
//!         .with_node(NodeId(3)),
//! )?;
//!
//! let on_node = guard.check(CheckQuery::new("203.0.113.7").with_node(NodeId(3)))?;
//! assert!(on_node.blocked);
//!
//! let elsewhere = guard.check(CheckQuery::new("203.0.113.7").with_node(NodeId(4)))?;
//! assert!(!elsewhere.blocked);
//! # Ok::<(), viewer_guard::GuardError>(())
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod address;
pub mod config;
pub mod duration;
pub mod entry;
pub mod error;
pub mod expiry;
pub mod guard;
pub mod matcher;
pub mod reaper;
pub mod snapshot;
pub mod stats;
pub mod store;

// Re-export main types
pub use config::{GuardConfig, GuardConfigBuilder, ReaperConfig};
pub use duration::BlockDuration;
pub use entry::{BlockDraft, BlockEntry, BlockScope, EntryId, NodeId};
pub use error::{GuardError, GuardResult};
pub use guard::{AccessGuard, BlockRequest, ListPage, ListedEntry};
pub use matcher::{CheckOutcome, CheckQuery, Matcher};
pub use reaper::Reaper;
pub use snapshot::JsonSnapshot;
pub use stats::BlockStats;
pub use store::{MemoryRuleStore, Page, RuleStore};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::config::GuardConfig;
    pub use crate::duration::BlockDuration;
    pub use crate::entry::{BlockEntry, EntryId, NodeId};
    pub use crate::error::{GuardError, GuardResult};
    pub use crate::guard::{AccessGuard, BlockRequest};
    pub use crate::matcher::{CheckOutcome, CheckQuery};
    pub use crate::stats::BlockStats;
}

#[cfg(test)]
mod tests {
    use super::prelude::*;
    use chrono::{Duration, Utc};

    #[test]
    fn test_basic_block_flow() {
        let guard = AccessGuard::from_config(GuardConfig::default()).unwrap();
        let entry = guard.block(BlockRequest::new("10.0.0.1")).unwrap();

        assert!(guard.check(CheckQuery::new("10.0.0.1")).unwrap().blocked);
        assert!(!guard.check(CheckQuery::new("10.0.0.2")).unwrap().blocked);

        assert!(guard.unblock(entry.id).unwrap());
        assert!(!guard.check(CheckQuery::new("10.0.0.1")).unwrap().blocked);
    }

    #[test]
    fn test_snapshot_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let config = GuardConfig::builder()
            .snapshot_path(dir.path().join("blocks.json"))
            .build();
        let now = Utc::now();

        let first_id = {
            let guard = AccessGuard::from_config(config.clone()).unwrap();
            let kept = guard
                .block_at(
                    BlockRequest::new("10.0.0.1")
                        .with_duration("permanent")
                        .with_path_pattern("/live/*"),
                    now,
                )
                .unwrap();
            let dropped = guard.block_at(BlockRequest::new("10.0.0.2"), now).unwrap();
            guard.unblock(dropped.id).unwrap();
            kept.id
        };

        let guard = AccessGuard::from_config(config).unwrap();
        let outcome = guard
            .check_at(CheckQuery::new("10.0.0.1").with_path("/live/cam"), now + Duration::days(400))
            .unwrap();
        assert_eq!(outcome.entry.map(|e| e.id), Some(first_id));

        let next = guard.block(BlockRequest::new("10.0.0.3")).unwrap();
        assert_eq!(next.id, EntryId(3));
    }

    #[test]
    fn test_corrupt_snapshot_fails_startup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blocks.json");
        std::fs::write(&path, "[]").unwrap();

        let err = AccessGuard::from_config(GuardConfig::builder().snapshot_path(path).build()).unwrap_err();
        assert!(matches!(err, GuardError::Storage(_)));
    }
}
