//! Expiry policy.
//!
//! Expiry is evaluated lazily at read time. Reaping expired rows is storage
//! hygiene only and never changes a decision.

use chrono::{DateTime, Utc};

use crate::entry::BlockEntry;

/// Whether `entry` is in force at `now`.
///
/// Permanent rules are always active; temporary rules are active strictly
/// before their expiry instant.
#[must_use]
pub fn is_active(entry: &BlockEntry, now: DateTime<Utc>) -> bool {
    entry.expires_at.is_none_or(|expires_at| expires_at > now)
}

/// Whether `entry` has passed its expiry at `now`.
#[must_use]
pub fn is_expired(entry: &BlockEntry, now: DateTime<Utc>) -> bool {
    !is_active(entry, now)
}
