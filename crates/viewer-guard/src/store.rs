//! Rule storage.
//!
//! [`RuleStore`] is the seam between the decision logic and wherever rules
//! live. [`MemoryRuleStore`] keeps everything in memory behind a
//! read/write lock, optionally writing through to a [`JsonSnapshot`].

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::entry::{BlockDraft, BlockEntry, BlockScope, EntryId};
use crate::error::GuardResult;
use crate::expiry;
use crate::snapshot::{JsonSnapshot, SnapshotData};

/// Upper bound on `per_page` unless configured otherwise.
pub const MAX_PER_PAGE: usize = 500;

/// One page of entries, most recently created first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    /// Entries on this page.
    pub items: Vec<T>,
    /// Number of entries across all pages.
    pub total: usize,
    /// 1-indexed page number that was served.
    pub page: usize,
    /// Page size after clamping.
    pub per_page: usize,
    /// Number of pages (`ceil(total / per_page)`).
    pub pages: usize,
}

impl<T> Page<T> {
    /// Transform every item, keeping the paging metadata.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            per_page: self.per_page,
            pages: self.pages,
        }
    }
}

/// Backing store for block rules.
///
/// Implementations must make each operation atomic with respect to the
/// others: readers never observe a partially applied mutation.
pub trait RuleStore: Send + Sync + fmt::Debug {
    /// Store a new rule, assigning it the next id.
    fn insert(&self, draft: BlockDraft) -> GuardResult<BlockEntry>;

    /// Look up a rule by id.
    fn get(&self, id: EntryId) -> GuardResult<Option<BlockEntry>>;

    /// Delete a rule by id. Returns whether anything was removed.
    fn delete(&self, id: EntryId) -> GuardResult<bool>;

    /// Delete every rule for `ip_address` whose stored scope is exactly
    /// `scope`. Returns the number of rules removed.
    fn delete_by_address(&self, ip_address: &str, scope: &BlockScope) -> GuardResult<usize>;

    /// Page through all rules, expired ones included.
    fn list_page(&self, page: usize, per_page: usize) -> GuardResult<Page<BlockEntry>>;

    /// Rules for `ip_address` that are active at `now`.
    fn active_for_address(&self, ip_address: &str, now: DateTime<Utc>)
    -> GuardResult<Vec<BlockEntry>>;

    /// Every rule active at `now`.
    fn all_active(&self, now: DateTime<Utc>) -> GuardResult<Vec<BlockEntry>>;

    /// Delete rules that are no longer active at `now`.
    fn reap_expired(&self, now: DateTime<Utc>) -> GuardResult<usize>;

    /// Number of stored rules, expired ones included.
    fn len(&self) -> usize;

    /// Whether the store holds no rules.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug)]
struct Rules {
    entries: BTreeMap<EntryId, BlockEntry>,
    by_address: HashMap<String, Vec<EntryId>>,
    next_id: u64,
}

impl Default for Rules {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
            by_address: HashMap::new(),
            next_id: 1,
        }
    }
}

impl Rules {
    fn from_snapshot(data: SnapshotData) -> Self {
        let mut rules = Self::default();
        for entry in data.entries {
            rules.put(entry);
        }
        let after_last = rules.entries.keys().next_back().map_or(1, |id| id.0 + 1);
        rules.next_id = data.next_id.max(after_last);
        rules
    }

    /// Snapshot of the state after `entry` is inserted.
    fn snapshot_with(&self, entry: &BlockEntry) -> SnapshotData {
        SnapshotData {
            next_id: entry.id.0 + 1,
            entries: self.entries.values().chain([entry]).cloned().collect(),
        }
    }

    /// Snapshot of the state after `ids` are removed.
    fn snapshot_without(&self, ids: &[EntryId]) -> SnapshotData {
        let removed: BTreeSet<EntryId> = ids.iter().copied().collect();
        SnapshotData {
            next_id: self.next_id,
            entries: self
                .entries
                .values()
                .filter(|entry| !removed.contains(&entry.id))
                .cloned()
                .collect(),
        }
    }

    fn put(&mut self, entry: BlockEntry) {
        self.by_address
            .entry(entry.ip_address.clone())
            .or_default()
            .push(entry.id);
        self.entries.insert(entry.id, entry);
    }

    fn take(&mut self, id: EntryId) -> Option<BlockEntry> {
        let entry = self.entries.remove(&id)?;
        if let Some(ids) = self.by_address.get_mut(&entry.ip_address) {
            ids.retain(|other| *other != id);
            if ids.is_empty() {
                self.by_address.remove(&entry.ip_address);
            }
        }
        Some(entry)
    }

    fn take_all(&mut self, ids: Vec<EntryId>) -> Vec<BlockEntry> {
        ids.into_iter().filter_map(|id| self.take(id)).collect()
    }
}

/// In-memory rule store guarded by a read/write lock.
///
/// Mutations are serialized by a separate commit lock. With a snapshot
/// configured, the next state is written to disk before the rules lock is
/// taken for writing, so readers are only ever blocked for the in-memory
/// update and never observe a change whose write failed.
pub struct MemoryRuleStore {
    rules: RwLock<Rules>,
    commit: Mutex<()>,
    snapshot: Option<JsonSnapshot>,
    max_per_page: usize,
}

impl MemoryRuleStore {
    /// Create an empty, memory-only store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            rules: RwLock::new(Rules::default()),
            commit: Mutex::new(()),
            snapshot: None,
            max_per_page: MAX_PER_PAGE,
        }
    }

    /// Create a store that loads from, and writes every mutation through to,
    /// a JSON snapshot.
    ///
    /// # Errors
    ///
    /// Returns a storage error if an existing snapshot cannot be read.
    pub fn with_snapshot(snapshot: JsonSnapshot) -> GuardResult<Self> {
        let rules = Rules::from_snapshot(snapshot.load()?);
        info!(
            path = %snapshot.path().display(),
            entries = rules.entries.len(),
            "Rule store restored from snapshot"
        );
        Ok(Self {
            rules: RwLock::new(rules),
            commit: Mutex::new(()),
            snapshot: Some(snapshot),
            max_per_page: MAX_PER_PAGE,
        })
    }

    /// Override the `per_page` ceiling used by [`RuleStore::list_page`].
    #[must_use]
    pub fn with_max_per_page(mut self, max_per_page: usize) -> Self {
        self.max_per_page = max_per_page.max(1);
        self
    }

    /// The `per_page` ceiling.
    #[must_use]
    pub const fn max_per_page(&self) -> usize {
        self.max_per_page
    }

    /// Whether mutations are written through to a snapshot.
    #[must_use]
    pub const fn is_persistent(&self) -> bool {
        self.snapshot.is_some()
    }

    /// Write `data` to the snapshot. Must be called with the commit lock held
    /// and the rules lock released.
    fn persist(&self, data: Option<SnapshotData>) -> GuardResult<()> {
        match (&self.snapshot, data) {
            (Some(snapshot), Some(data)) => snapshot.save(&data).inspect_err(|e| {
                warn!(path = %snapshot.path().display(), error = %e, "Snapshot write failed, change discarded");
            }),
            _ => Ok(()),
        }
    }

    /// Remove the ids chosen by `select`, persisting first.
    fn remove_where(
        &self,
        select: impl FnOnce(&Rules) -> Vec<EntryId>,
    ) -> GuardResult<Vec<BlockEntry>> {
        let _commit = self.commit.lock();
        let (ids, data) = {
            let rules = self.rules.read();
            let ids = select(&rules);
            if ids.is_empty() {
                return Ok(Vec::new());
            }
            let data = self.is_persistent().then(|| rules.snapshot_without(&ids));
            (ids, data)
        };

        self.persist(data)?;
        Ok(self.rules.write().take_all(ids))
    }
}

impl Default for MemoryRuleStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MemoryRuleStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryRuleStore")
            .field("entries", &self.len())
            .field("snapshot", &self.snapshot.as_ref().map(JsonSnapshot::path))
            .field("max_per_page", &self.max_per_page)
            .finish()
    }
}

impl RuleStore for MemoryRuleStore {
    fn insert(&self, draft: BlockDraft) -> GuardResult<BlockEntry> {
        let _commit = self.commit.lock();
        let (entry, data) = {
            let rules = self.rules.read();
            let entry = draft.into_entry(EntryId(rules.next_id));
            let data = self.is_persistent().then(|| rules.snapshot_with(&entry));
            (entry, data)
        };

        self.persist(data)?;

        let mut rules = self.rules.write();
        rules.next_id = entry.id.0 + 1;
        rules.put(entry.clone());
        Ok(entry)
    }

    fn get(&self, id: EntryId) -> GuardResult<Option<BlockEntry>> {
        Ok(self.rules.read().entries.get(&id).cloned())
    }

    fn delete(&self, id: EntryId) -> GuardResult<bool> {
        let removed = self.remove_where(|rules| {
            if rules.entries.contains_key(&id) {
                vec![id]
            } else {
                Vec::new()
            }
        })?;
        Ok(!removed.is_empty())
    }

    fn delete_by_address(&self, ip_address: &str, scope: &BlockScope) -> GuardResult<usize> {
        let removed = self.remove_where(|rules| {
            rules
                .by_address
                .get(ip_address)
                .into_iter()
                .flatten()
                .filter(|id| rules.entries.get(id).is_some_and(|e| e.has_scope(scope)))
                .copied()
                .collect()
        })?;
        Ok(removed.len())
    }

    fn list_page(&self, page: usize, per_page: usize) -> GuardResult<Page<BlockEntry>> {
        let page = page.max(1);
        let per_page = per_page.clamp(1, self.max_per_page);

        let rules = self.rules.read();
        let total = rules.entries.len();

        let mut ordered: Vec<&BlockEntry> = rules.entries.values().collect();
        ordered.sort_unstable_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });

        let items = ordered
            .into_iter()
            .skip((page - 1).saturating_mul(per_page))
            .take(per_page)
            .cloned()
            .collect();

        Ok(Page {
            items,
            total,
            page,
            per_page,
            pages: total.div_ceil(per_page),
        })
    }

    fn active_for_address(
        &self,
        ip_address: &str,
        now: DateTime<Utc>,
    ) -> GuardResult<Vec<BlockEntry>> {
        let rules = self.rules.read();
        let Some(ids) = rules.by_address.get(ip_address) else {
            return Ok(Vec::new());
        };
        Ok(ids
            .iter()
            .filter_map(|id| rules.entries.get(id))
            .filter(|entry| expiry::is_active(entry, now))
            .cloned()
            .collect())
    }

    fn all_active(&self, now: DateTime<Utc>) -> GuardResult<Vec<BlockEntry>> {
        Ok(self
            .rules
            .read()
            .entries
            .values()
            .filter(|entry| expiry::is_active(entry, now))
            .cloned()
            .collect())
    }

    fn reap_expired(&self, now: DateTime<Utc>) -> GuardResult<usize> {
        let removed = self.remove_where(|rules| {
            rules
                .entries
                .values()
                .filter(|entry| expiry::is_expired(entry, now))
                .map(|entry| entry.id)
                .collect()
        })?;
        for entry in &removed {
            debug!(id = %entry.id, ip = %entry.ip_address, "Block expired, removing");
        }
        Ok(removed.len())
    }

    fn len(&self) -> usize {
        self.rules.read().entries.len()
    }
}
