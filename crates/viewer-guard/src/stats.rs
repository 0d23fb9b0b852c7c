//! Counts over active rules.

use serde::{Deserialize, Serialize};

use crate::entry::BlockEntry;

/// Summary of the rules currently in force.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockStats {
    /// Active rules.
    pub total: usize,
    /// Active rules without an expiry.
    pub permanent: usize,
    /// Active rules with an expiry.
    pub temporary: usize,
}

impl BlockStats {
    /// Tally `entries`, which must already be filtered to active rules.
    pub fn from_active<'a>(entries: impl IntoIterator<Item = &'a BlockEntry>) -> Self {
        entries.into_iter().fold(Self::default(), |mut stats, entry| {
            stats.total += 1;
            if entry.is_permanent() {
                stats.permanent += 1;
            } else {
                stats.temporary += 1;
            }
            stats
        })
    }
}
