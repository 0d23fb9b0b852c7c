//! Block duration vocabulary.
//!
//! Durations are a closed set of tokens shared with existing callers; there is
//! no free-form `<number><unit>` parsing.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{GuardError, GuardResult};

/// How long a block rule stays active.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BlockDuration {
    /// `5m`
    FiveMinutes,
    /// `15m`
    FifteenMinutes,
    /// `30m`
    ThirtyMinutes,
    /// `1h`
    #[default]
    OneHour,
    /// `6h`
    SixHours,
    /// `24h`
    OneDay,
    /// `7d`
    SevenDays,
    /// `30d`
    ThirtyDays,
    /// `permanent`
    Permanent,
}

impl BlockDuration {
    /// Every accepted duration, shortest first.
    pub const ALL: [Self; 9] = [
        Self::FiveMinutes,
        Self::FifteenMinutes,
        Self::ThirtyMinutes,
        Self::OneHour,
        Self::SixHours,
        Self::OneDay,
        Self::SevenDays,
        Self::ThirtyDays,
        Self::Permanent,
    ];

    /// Parse a duration token (case-sensitive, exact match).
    ///
    /// # Errors
    ///
    /// Returns [`GuardError::InvalidDuration`] for any token outside the vocabulary.
    pub fn parse(token: &str) -> GuardResult<Self> {
        Self::ALL
            .into_iter()
            .find(|d| d.as_str() == token)
            .ok_or_else(|| GuardError::InvalidDuration {
                token: token.to_string(),
                expected: Self::ALL.map(Self::as_str).join(", "),
            })
    }

    /// The wire token for this duration.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FiveMinutes => "5m",
            Self::FifteenMinutes => "15m",
            Self::ThirtyMinutes => "30m",
            Self::OneHour => "1h",
            Self::SixHours => "6h",
            Self::OneDay => "24h",
            Self::SevenDays => "7d",
            Self::ThirtyDays => "30d",
            Self::Permanent => "permanent",
        }
    }

    /// Time-to-live, or `None` for a permanent block.
    #[must_use]
    pub fn ttl(self) -> Option<Duration> {
        match self {
            Self::FiveMinutes => Some(Duration::minutes(5)),
            Self::FifteenMinutes => Some(Duration::minutes(15)),
            Self::ThirtyMinutes => Some(Duration::minutes(30)),
            Self::OneHour => Some(Duration::hours(1)),
            Self::SixHours => Some(Duration::hours(6)),
            Self::OneDay => Some(Duration::hours(24)),
            Self::SevenDays => Some(Duration::days(7)),
            Self::ThirtyDays => Some(Duration::days(30)),
            Self::Permanent => None,
        }
    }

    /// Whether this is the `permanent` token.
    #[must_use]
    pub const fn is_permanent(self) -> bool {
        matches!(self, Self::Permanent)
    }

    /// Expiry for a rule created at `created_at`.
    #[must_use]
    pub fn expires_at(self, created_at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.ttl().map(|ttl| created_at + ttl)
    }
}

impl fmt::Display for BlockDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BlockDuration {
    type Err = GuardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for BlockDuration {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for BlockDuration {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let token = String::deserialize(deserializer)?;
        Self::parse(&token).map_err(serde::de::Error::custom)
    }
}
