//! Ledger configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How long a trusted URL stays in a tab ledger.
pub const DEFAULT_TTL: Duration = Duration::from_secs(30 * 60);

/// Upper bound on URLs held per tab.
pub const DEFAULT_MAX_ENTRIES: usize = 1000;

/// Expiry and capacity limits applied to every tab ledger of a session.
///
/// Deserializes from `{"ttlMs": 60000, "maxEntries": 50}`; either field may
/// be omitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LedgerConfig {
    /// Time-to-live of each entry.
    #[serde(rename = "ttlMs", with = "duration_ms")]
    pub ttl: Duration,

    /// Maximum number of stored entries. Inserts beyond this are rejected.
    pub max_entries: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }
}

impl LedgerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the entry time-to-live.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the per-tab capacity.
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    pub(crate) fn ttl_ms(&self) -> u64 {
        self.ttl.as_millis() as u64
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
