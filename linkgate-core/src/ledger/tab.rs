//! Per-tab trusted URL storage.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::clock::{Clock, SystemClock};
use super::config::LedgerConfig;
use crate::normalize::{normalize_url, NormalizedUrl};

/// The set of URLs one tab has made available to the agent.
///
/// Entries carry an absolute deadline and are dropped lazily: [`seed`],
/// [`add`] and [`get_all`] sweep the whole map, [`has`] only evicts the
/// entry it looked up. There is no background timer.
///
/// Capacity is a hard limit. Once [`LedgerConfig::max_entries`] is reached,
/// further inserts are rejected; nothing older is evicted to make room.
///
/// [`seed`]: TabLedger::seed
/// [`add`]: TabLedger::add
/// [`get_all`]: TabLedger::get_all
/// [`has`]: TabLedger::has
pub struct TabLedger {
    tab_id: String,
    config: LedgerConfig,
    clock: Arc<dyn Clock>,
    entries: BTreeMap<NormalizedUrl, u64>,
}

impl TabLedger {
    /// Create an empty ledger with default limits and the system clock.
    pub fn new(tab_id: impl Into<String>) -> Self {
        Self::with_config(tab_id, LedgerConfig::default(), Arc::new(SystemClock::new()))
    }

    /// Create an empty ledger with explicit limits and time source.
    pub fn with_config(
        tab_id: impl Into<String>,
        config: LedgerConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            tab_id: tab_id.into(),
            config,
            clock,
            entries: BTreeMap::new(),
        }
    }

    /// The tab this ledger belongs to.
    pub fn tab_id(&self) -> &str {
        &self.tab_id
    }

    /// The limits this ledger enforces.
    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Insert a batch of URLs, all sharing one deadline.
    ///
    /// URLs that fail to normalize are skipped. Insertion stops as soon as
    /// the ledger is full.
    pub fn seed<I, S>(&mut self, urls: I, base_url: Option<&str>)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let now = self.clock.now_ms();
        self.sweep(now);
        let expires_at = now.saturating_add(self.config.ttl_ms());

        for url in urls {
            if self.entries.len() >= self.config.max_entries {
                log::debug!(
                    "ledger for tab {} is full ({} entries), seed truncated",
                    self.tab_id,
                    self.entries.len()
                );
                break;
            }
            if let Ok(key) = normalize_url(url.as_ref(), base_url) {
                self.entries.insert(key, expires_at);
            }
        }
    }

    /// Insert one URL. Returns false if it did not normalize or the ledger
    /// is full.
    pub fn add(&mut self, url: &str, base_url: Option<&str>) -> bool {
        let now = self.clock.now_ms();
        self.sweep(now);

        if self.entries.len() >= self.config.max_entries {
            return false;
        }

        match normalize_url(url, base_url) {
            Ok(key) => {
                self.entries
                    .insert(key, now.saturating_add(self.config.ttl_ms()));
                true
            }
            Err(_) => false,
        }
    }

    /// Returns true if the URL is present and not expired.
    ///
    /// An expired hit is removed on the way out.
    pub fn has(&mut self, url: &str, base_url: Option<&str>) -> bool {
        let Ok(key) = normalize_url(url, base_url) else {
            return false;
        };
        let Some(&expires_at) = self.entries.get(&key) else {
            return false;
        };
        if self.clock.now_ms() > expires_at {
            self.entries.remove(&key);
            return false;
        }
        true
    }

    /// Remove every entry. Limits are unchanged.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of stored entries, counting expired ones not yet swept.
    pub fn size(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sweep, then return every live entry.
    pub fn get_all(&mut self) -> Vec<NormalizedUrl> {
        self.sweep(self.clock.now_ms());
        self.entries.keys().cloned().collect()
    }

    /// Live entries as of `now`, without mutating the ledger.
    pub(crate) fn live_entries(&self, now: u64) -> impl Iterator<Item = &NormalizedUrl> + '_ {
        self.entries
            .iter()
            .filter(move |(_, expires_at)| now <= **expires_at)
            .map(|(key, _)| key)
    }

    fn sweep(&mut self, now: u64) {
        self.entries.retain(|_, expires_at| now <= *expires_at);
    }
}

impl std::fmt::Debug for TabLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TabLedger")
            .field("tab_id", &self.tab_id)
            .field("config", &self.config)
            .field("entries", &self.entries.len())
            .finish()
    }
}
