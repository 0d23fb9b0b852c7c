//! The access guard: the single entry point for admin and request-path
//! callers.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::address;
use crate::config::GuardConfig;
use crate::duration::BlockDuration;
use crate::entry::{BlockDraft, BlockEntry, BlockScope, EntryId, NodeId};
use crate::error::GuardResult;
use crate::matcher::{CheckOutcome, CheckQuery, Matcher};
use crate::stats::BlockStats;
use crate::store::{Page, RuleStore};

/// Parameters for a new block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockRequest {
    /// Address to block; normalized before storage.
    pub ip_address: String,
    /// Operator-facing note.
    pub reason: Option<String>,
    /// Creator; the configured default when unset or blank.
    pub blocked_by: Option<String>,
    /// Duration token; the configured default when unset.
    pub duration: Option<String>,
    /// Path glob restricting the block.
    pub path_pattern: Option<String>,
    /// Node restricting the block.
    pub node_id: Option<NodeId>,
}

impl BlockRequest {
    /// Block `ip_address` everywhere for the default duration.
    #[must_use]
    pub fn new(ip_address: impl Into<String>) -> Self {
        Self {
            ip_address: ip_address.into(),
            ..Self::default()
        }
    }

    /// Set the reason.
    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Set the creator.
    #[must_use]
    pub fn with_blocked_by(mut self, blocked_by: impl Into<String>) -> Self {
        self.blocked_by = Some(blocked_by.into());
        self
    }

    /// Set the duration token (`5m`, `1h`, `permanent`, ...).
    #[must_use]
    pub fn with_duration(mut self, duration: impl Into<String>) -> Self {
        self.duration = Some(duration.into());
        self
    }

    /// Restrict to paths matching `pattern`.
    #[must_use]
    pub fn with_path_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.path_pattern = Some(pattern.into());
        self
    }

    /// Restrict to one node.
    #[must_use]
    pub const fn with_node(mut self, node_id: NodeId) -> Self {
        self.node_id = Some(node_id);
        self
    }
}

/// A listed entry together with whether it is currently in force.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListedEntry {
    /// The stored rule.
    #[serde(flatten)]
    pub entry: BlockEntry,
    /// Whether the rule is active at listing time.
    pub is_active: bool,
}

/// One page of listed entries.
pub type ListPage = Page<ListedEntry>;

/// Viewer access control over a [`RuleStore`].
///
/// Cheap to share behind an `Arc`; all state lives in the store.
#[derive(Debug, Clone)]
pub struct AccessGuard {
    config: GuardConfig,
    store: Arc<dyn RuleStore>,
}

impl AccessGuard {
    /// Create a guard over an existing store.
    #[must_use]
    pub fn new(config: GuardConfig, store: Arc<dyn RuleStore>) -> Self {
        Self { config, store }
    }

    /// Create a guard and the store its configuration describes.
    ///
    /// # Errors
    ///
    /// Returns a storage error if a configured snapshot cannot be loaded.
    pub fn from_config(config: GuardConfig) -> GuardResult<Self> {
        let store = config.build_store()?;
        Ok(Self::new(config, store))
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &GuardConfig {
        &self.config
    }

    /// Block an address.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for a blank address, `InvalidDuration` for an unknown
    /// token, `Storage` if the rule cannot be persisted.
    pub fn block(&self, request: BlockRequest) -> GuardResult<BlockEntry> {
        self.block_at(request, Utc::now())
    }

    /// [`block`](Self::block) with an explicit creation time.
    ///
    /// # Errors
    ///
    /// See [`block`](Self::block).
    pub fn block_at(&self, request: BlockRequest, now: DateTime<Utc>) -> GuardResult<BlockEntry> {
        let ip_address = address::normalize(&request.ip_address)?;
        let duration = match request.duration.as_deref() {
            Some(token) => BlockDuration::parse(token)?,
            None => self.config.default_duration,
        };
        let blocked_by = request
            .blocked_by
            .filter(|by| !by.trim().is_empty())
            .unwrap_or_else(|| self.config.default_blocked_by.clone());

        let entry = self.store.insert(BlockDraft {
            ip_address,
            reason: request.reason,
            blocked_by,
            created_at: now,
            expires_at: duration.expires_at(now),
            scope: BlockScope::new(request.path_pattern, request.node_id),
        })?;

        info!(
            id = %entry.id,
            ip = %entry.ip_address,
            duration = %duration,
            blocked_by = %entry.blocked_by,
            path_pattern = ?entry.path_pattern,
            node_id = ?entry.node_id,
            "IP blocked"
        );
        Ok(entry)
    }

    /// Remove a rule by id. Returns whether a rule was removed.
    ///
    /// # Errors
    ///
    /// `Storage` if the removal cannot be persisted.
    pub fn unblock(&self, id: EntryId) -> GuardResult<bool> {
        let removed = self.store.delete(id)?;
        if removed {
            info!(id = %id, "Block removed");
        }
        Ok(removed)
    }

    /// Remove every rule for `ip_address` whose stored scope is exactly
    /// `(path_pattern, node_id)`. Returns the number removed.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for a blank address, `Storage` if the removal cannot
    /// be persisted.
    pub fn unblock_by_address(
        &self,
        ip_address: &str,
        path_pattern: Option<&str>,
        node_id: Option<NodeId>,
    ) -> GuardResult<usize> {
        let ip_address = address::normalize(ip_address)?;
        let scope = BlockScope::new(path_pattern.map(str::to_string), node_id);
        let removed = self.store.delete_by_address(&ip_address, &scope)?;

        info!(
            ip = %ip_address,
            path_pattern = ?scope.path_pattern,
            node_id = ?scope.node_id,
            removed,
            "IP unblocked"
        );
        Ok(removed)
    }

    /// Decide whether a request is blocked.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for a blank address.
    pub fn check(&self, query: CheckQuery) -> GuardResult<CheckOutcome> {
        self.check_at(query, Utc::now())
    }

    /// [`check`](Self::check) evaluated at `now`.
    ///
    /// # Errors
    ///
    /// See [`check`](Self::check).
    pub fn check_at(&self, query: CheckQuery, now: DateTime<Utc>) -> GuardResult<CheckOutcome> {
        let query = CheckQuery {
            ip_address: address::normalize(&query.ip_address)?,
            ..query
        };
        // Copy out under the read lock, match without it.
        let candidates = self.store.active_for_address(&query.ip_address, now)?;
        let outcome = Matcher::evaluate(&candidates, &query);

        if let Some(entry) = &outcome.entry {
            debug!(
                ip = %query.ip_address,
                path = ?query.path,
                node_id = ?query.node_id,
                entry = %entry.id,
                "Request blocked"
            );
        }
        Ok(outcome)
    }

    /// Page through stored rules, most recent first.
    ///
    /// # Errors
    ///
    /// `Storage` if the store cannot be read.
    pub fn list(&self, page: usize, per_page: usize) -> GuardResult<ListPage> {
        self.list_at(page, per_page, Utc::now())
    }

    /// [`list`](Self::list) with activity evaluated at `now`.
    ///
    /// # Errors
    ///
    /// See [`list`](Self::list).
    pub fn list_at(&self, page: usize, per_page: usize, now: DateTime<Utc>) -> GuardResult<ListPage> {
        Ok(self.store.list_page(page, per_page)?.map(|entry| ListedEntry {
            is_active: entry.is_active_at(now),
            entry,
        }))
    }

    /// Counts over active rules.
    ///
    /// # Errors
    ///
    /// `Storage` if the store cannot be read.
    pub fn stats(&self) -> GuardResult<BlockStats> {
        self.stats_at(Utc::now())
    }

    /// [`stats`](Self::stats) evaluated at `now`.
    ///
    /// # Errors
    ///
    /// See [`stats`](Self::stats).
    pub fn stats_at(&self, now: DateTime<Utc>) -> GuardResult<BlockStats> {
        Ok(BlockStats::from_active(&self.store.all_active(now)?))
    }

    /// Delete expired rules. Returns the number removed.
    ///
    /// # Errors
    ///
    /// `Storage` if the removal cannot be persisted.
    pub fn reap(&self) -> GuardResult<usize> {
        self.reap_at(Utc::now())
    }

    /// [`reap`](Self::reap) relative to `now`.
    ///
    /// # Errors
    ///
    /// See [`reap`](Self::reap).
    pub fn reap_at(&self, now: DateTime<Utc>) -> GuardResult<usize> {
        self.store.reap_expired(now)
    }

    /// Look up a rule by id, whether or not it is active.
    ///
    /// # Errors
    ///
    /// `Storage` if the store cannot be read.
    pub fn get(&self, id: EntryId) -> GuardResult<Option<BlockEntry>> {
        self.store.get(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GuardError;
    use crate::store::MemoryRuleStore;
    use chrono::Duration;
    use test_case::test_case;

    fn guard() -> AccessGuard {
        AccessGuard::new(GuardConfig::default(), Arc::new(MemoryRuleStore::new()))
    }

    fn query(ip: &str) -> CheckQuery {
        CheckQuery::new(ip)
    }

    // ==================== Block ====================

    #[test]
    fn test_block_defaults() {
        let guard = guard();
        let now = Utc::now();

        let entry = guard.block_at(BlockRequest::new("1.2.3.4"), now).unwrap();

        assert_eq!(entry.ip_address, "1.2.3.4");
        assert_eq!(entry.blocked_by, "manual");
        assert_eq!(entry.created_at, now);
        assert_eq!(entry.expires_at, Some(now + Duration::hours(1)));
        assert!(entry.reason.is_none());
        assert!(entry.path_pattern.is_none());
        assert!(entry.node_id.is_none());
    }

    #[test]
    fn test_block_full_request() {
        let guard = guard();
        let now = Utc::now();

        let entry = guard
            .block_at(
                BlockRequest::new("  10.0.0.5  ")
                    .with_reason("scraping")
                    .with_blocked_by("auto-ban")
                    .with_duration("30d")
                    .with_path_pattern("/live/*")
                    .with_node(NodeId(4)),
                now,
            )
            .unwrap();

        assert_eq!(entry.ip_address, "10.0.0.5");
        assert_eq!(entry.reason.as_deref(), Some("scraping"));
        assert_eq!(entry.blocked_by, "auto-ban");
        assert_eq!(entry.expires_at, Some(now + Duration::days(30)));
        assert_eq!(entry.path_pattern.as_deref(), Some("/live/*"));
        assert_eq!(entry.node_id, Some(NodeId(4)));
    }

    #[test]
    fn test_blank_blocked_by_uses_default() {
        let entry = guard()
            .block(BlockRequest::new("1.2.3.4").with_blocked_by("   "))
            .unwrap();
        assert_eq!(entry.blocked_by, "manual");
    }

    #[test]
    fn test_configured_defaults() {
        let config = GuardConfig::builder()
            .default_duration(BlockDuration::Permanent)
            .default_blocked_by("scanner")
            .build();
        let guard = AccessGuard::from_config(config).unwrap();

        let entry = guard.block(BlockRequest::new("1.2.3.4")).unwrap();
        assert!(entry.is_permanent());
        assert_eq!(entry.blocked_by, "scanner");
    }

    #[test_case("" ; "empty")]
    #[test_case("   " ; "whitespace")]
    fn test_block_requires_address(ip: &str) {
        let guard = guard();
        let err = guard.block(BlockRequest::new(ip)).unwrap_err();

        assert_eq!(err, GuardError::missing_address());
        assert_eq!(err.to_string(), "ip_address is required");
        assert_eq!(guard.stats().unwrap().total, 0);
    }

    #[test_case("2h" ; "unknown unit")]
    #[test_case("1H" ; "wrong case")]
    #[test_case("" ; "empty token")]
    #[test_case("forever" ; "word")]
    fn test_block_rejects_unknown_duration(token: &str) {
        let guard = guard();
        let err = guard
            .block(BlockRequest::new("1.2.3.4").with_duration(token))
            .unwrap_err();

        assert!(matches!(err, GuardError::InvalidDuration { .. }));
        assert!(guard.list(1, 50).unwrap().items.is_empty());
    }

    #[test]
    fn test_block_never_upserts() {
        let guard = guard();
        let a = guard.block(BlockRequest::new("1.2.3.4")).unwrap();
        let b = guard.block(BlockRequest::new("1.2.3.4")).unwrap();

        assert_ne!(a.id, b.id);
        assert_eq!(guard.stats().unwrap().total, 2);
    }

    // ==================== Check ====================

    #[test]
    fn test_permanent_block_stays_blocked() {
        let guard = guard();
        let now = Utc::now();
        guard
            .block_at(BlockRequest::new("1.2.3.4").with_duration("permanent"), now)
            .unwrap();

        let far_future = now + Duration::days(365 * 50);
        assert!(guard.check_at(query("1.2.3.4"), far_future).unwrap().blocked);
    }

    #[test]
    fn test_temporary_block_lapses() {
        let guard = guard();
        let now = Utc::now();
        let entry = guard
            .block_at(BlockRequest::new("1.2.3.4").with_duration("5m"), now)
            .unwrap();

        let outcome = guard.check_at(query("1.2.3.4"), now).unwrap();
        assert!(outcome.blocked);
        assert_eq!(outcome.entry.map(|e| e.id), Some(entry.id));

        let outcome = guard.check_at(query("1.2.3.4"), now + Duration::minutes(6)).unwrap();
        assert_eq!(outcome, CheckOutcome::allowed());

        // Not reaped yet, but no longer counted.
        assert_eq!(guard.stats_at(now + Duration::minutes(6)).unwrap().total, 0);
        assert!(guard.get(entry.id).unwrap().is_some());
    }

    #[test]
    fn test_check_unknown_address() {
        assert!(!guard().check(query("8.8.8.8")).unwrap().blocked);
    }

    #[test]
    fn test_check_requires_address() {
        assert_eq!(guard().check(query(" ")).unwrap_err(), GuardError::missing_address());
    }

    #[test]
    fn test_check_normalizes_address() {
        let guard = guard();
        guard.block(BlockRequest::new("::ffff:192.168.1.9")).unwrap();

        assert!(guard.check(query("192.168.1.9")).unwrap().blocked);
        assert!(guard.check(query("192.168.1.9:51234")).unwrap().blocked);
    }

    #[test]
    fn test_node_scoped_block() {
        let guard = guard();
        guard
            .block(BlockRequest::new("1.2.3.4").with_node(NodeId(7)))
            .unwrap();

        assert!(guard.check(query("1.2.3.4").with_node(NodeId(7))).unwrap().blocked);
        assert!(!guard.check(query("1.2.3.4").with_node(NodeId(8))).unwrap().blocked);
        assert!(!guard.check(query("1.2.3.4")).unwrap().blocked);
    }

    #[test]
    fn test_path_scoped_block() {
        let guard = guard();
        guard
            .block(BlockRequest::new("1.2.3.4").with_path_pattern("/live/*"))
            .unwrap();

        assert!(guard.check(query("1.2.3.4").with_path("/live/cam1")).unwrap().blocked);
        assert!(!guard.check(query("1.2.3.4").with_path("/vod/cam1")).unwrap().blocked);
        assert!(!guard.check(query("1.2.3.4")).unwrap().blocked);
    }

    #[test]
    fn test_check_reports_most_specific_rule() {
        let guard = guard();
        let now = Utc::now();
        let scoped = guard
            .block_at(
                BlockRequest::new("1.2.3.4").with_path_pattern("/live/*").with_node(NodeId(1)),
                now,
            )
            .unwrap();
        guard
            .block_at(BlockRequest::new("1.2.3.4"), now + Duration::seconds(5))
            .unwrap();

        let outcome = guard
            .check_at(
                query("1.2.3.4").with_path("/live/a").with_node(NodeId(1)),
                now + Duration::seconds(10),
            )
            .unwrap();
        assert_eq!(outcome.entry.map(|e| e.id), Some(scoped.id));
    }

    // ==================== Unblock ====================

    #[test]
    fn test_unblock_is_idempotent() {
        let guard = guard();
        let entry = guard.block(BlockRequest::new("1.2.3.4")).unwrap();

        assert!(guard.unblock(entry.id).unwrap());
        assert!(!guard.unblock(entry.id).unwrap());
        assert!(!guard.unblock(EntryId(999)).unwrap());
        assert!(!guard.check(query("1.2.3.4")).unwrap().blocked);
    }

    #[test]
    fn test_unblock_by_address_exact_scope() {
        let guard = guard();
        guard.block(BlockRequest::new("1.2.3.4")).unwrap();
        guard
            .block(BlockRequest::new("1.2.3.4").with_path_pattern("/live/*"))
            .unwrap();
        guard
            .block(BlockRequest::new("1.2.3.4").with_node(NodeId(3)))
            .unwrap();

        // A concrete path does not remove a glob rule that would match it.
        assert_eq!(guard.unblock_by_address("1.2.3.4", Some("/live/cam1"), None).unwrap(), 0);

        assert_eq!(guard.unblock_by_address("1.2.3.4", None, None).unwrap(), 1);
        assert!(!guard.check(query("1.2.3.4")).unwrap().blocked);
        assert!(guard.check(query("1.2.3.4").with_path("/live/a")).unwrap().blocked);

        assert_eq!(guard.unblock_by_address("1.2.3.4", Some("/live/*"), None).unwrap(), 1);
        assert_eq!(guard.unblock_by_address(" 1.2.3.4 ", None, Some(NodeId(3))).unwrap(), 1);
        assert_eq!(guard.stats().unwrap().total, 0);
    }

    #[test]
    fn test_unblock_by_address_requires_address() {
        let err = guard().unblock_by_address("", None, None).unwrap_err();
        assert!(err.is_client_error());
    }

    // ==================== List / Stats / Reap ====================

    #[test]
    fn test_list_paging_and_activity() {
        let guard = guard();
        let base = Utc::now() - Duration::hours(2);
        for i in 0..5 {
            guard
                .block_at(
                    BlockRequest::new(format!("10.0.0.{i}")).with_duration("5m"),
                    base + Duration::minutes(i),
                )
                .unwrap();
        }
        guard
            .block_at(BlockRequest::new("10.0.0.9").with_duration("permanent"), base - Duration::hours(1))
            .unwrap();

        let page = guard.list_at(2, 2, base).unwrap();
        assert_eq!(page.total, 6);
        assert_eq!(page.pages, 3);
        let ips: Vec<_> = page.items.iter().map(|l| l.entry.ip_address.as_str()).collect();
        assert_eq!(ips, ["10.0.0.2", "10.0.0.1"]);
        assert!(page.items.iter().all(|l| l.is_active));

        let later = base + Duration::hours(1);
        let page = guard.list_at(1, 50, later).unwrap();
        let active: Vec<_> = page
            .items
            .iter()
            .filter(|l| l.is_active)
            .map(|l| l.entry.ip_address.as_str())
            .collect();
        assert_eq!(active, ["10.0.0.9"]);
    }

    #[test]
    fn test_listed_entry_json_is_flat() {
        let guard = guard();
        guard.block(BlockRequest::new("1.2.3.4")).unwrap();

        let json = serde_json::to_value(guard.list(1, 10).unwrap()).unwrap();
        let item = &json["items"][0];
        assert_eq!(item["ip_address"], "1.2.3.4");
        assert_eq!(item["is_active"], true);
        assert_eq!(json["total"], 1);
        assert_eq!(json["pages"], 1);
    }

    #[test]
    fn test_stats_before_and_after_expiry() {
        let guard = guard();
        let now = Utc::now();
        guard
            .block_at(BlockRequest::new("1.1.1.1").with_duration("permanent"), now)
            .unwrap();
        guard
            .block_at(BlockRequest::new("2.2.2.2").with_duration("5m"), now)
            .unwrap();
        guard
            .block_at(BlockRequest::new("3.3.3.3").with_duration("24h"), now)
            .unwrap();

        assert_eq!(
            guard.stats_at(now).unwrap(),
            BlockStats {
                total: 3,
                permanent: 1,
                temporary: 2
            }
        );
        assert_eq!(
            guard.stats_at(now + Duration::minutes(10)).unwrap(),
            BlockStats {
                total: 2,
                permanent: 1,
                temporary: 1
            }
        );
    }

    #[test]
    fn test_reap_keeps_decisions_unchanged() {
        let guard = guard();
        let now = Utc::now();
        guard
            .block_at(BlockRequest::new("1.1.1.1").with_duration("5m"), now)
            .unwrap();
        guard
            .block_at(BlockRequest::new("1.1.1.1").with_duration("permanent").with_node(NodeId(2)), now)
            .unwrap();

        let later = now + Duration::minutes(10);
        let before = guard.check_at(query("1.1.1.1").with_node(NodeId(2)), later).unwrap();

        assert_eq!(guard.reap_at(later).unwrap(), 1);
        assert_eq!(guard.reap_at(later).unwrap(), 0);

        let after = guard.check_at(query("1.1.1.1").with_node(NodeId(2)), later).unwrap();
        assert_eq!(before, after);
        assert_eq!(guard.list(1, 50).unwrap().total, 1);
    }

    // ==================== Concurrency ====================

    #[test]
    fn test_concurrent_checks_during_blocks_and_unblocks() {
        use std::collections::HashSet;
        use std::sync::atomic::{AtomicBool, Ordering};

        const WRITERS: u8 = 4;
        const PER_WRITER: u8 = 50;

        let guard = guard();
        let now = Utc::now();
        let writing = AtomicBool::new(true);

        let ids: Vec<EntryId> = std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    let mut round = 0u8;
                    while writing.load(Ordering::Acquire) {
                        for w in 0..WRITERS {
                            let ip = format!("10.0.{w}.{round}");
                            let outcome = guard.check_at(query(&ip), now).unwrap();
                            if let Some(entry) = outcome.entry {
                                assert!(outcome.blocked);
                                assert_eq!(entry.ip_address, ip);
                            }
                        }
                        round = (round + 1) % PER_WRITER;
                    }
                });
            }

            let writers: Vec<_> = (0..WRITERS)
                .map(|w| {
                    let guard = &guard;
                    scope.spawn(move || {
                        let mut ids = Vec::new();
                        for i in 0..PER_WRITER {
                            let request = BlockRequest::new(format!("10.0.{w}.{i}")).with_duration("permanent");
                            let entry = guard.block_at(request, now).unwrap();
                            if i % 2 == 0 {
                                assert!(guard.unblock(entry.id).unwrap());
                            }
                            ids.push(entry.id);
                        }
                        ids
                    })
                })
                .collect();

            let joined: Vec<_> = writers.into_iter().map(|h| h.join()).collect();
            writing.store(false, Ordering::Release);
            joined.into_iter().flat_map(|ids| ids.unwrap()).collect()
        });

        let unique: HashSet<_> = ids.iter().collect();
        assert_eq!(unique.len(), ids.len());

        let live = usize::from(WRITERS) * usize::from(PER_WRITER) / 2;
        assert_eq!(guard.stats_at(now).unwrap().total, live);
        assert_eq!(guard.list(1, 500).unwrap().total, live);

        for w in 0..WRITERS {
            assert!(!guard.check_at(query(&format!("10.0.{w}.0")), now).unwrap().blocked);
            assert!(guard.check_at(query(&format!("10.0.{w}.1")), now).unwrap().blocked);
        }
    }
}
