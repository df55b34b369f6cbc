//! Session-wide container of tab ledgers.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use super::clock::{Clock, SystemClock};
use super::config::LedgerConfig;
use super::tab::TabLedger;
use crate::normalize::{normalize_url, NormalizedUrl};

/// All tab ledgers of one assistant session.
///
/// Lives in memory only and is discarded with the session. Each tab gets at
/// most one ledger, created the first time the tab is referenced.
pub struct SessionLedger {
    session_id: String,
    config: LedgerConfig,
    clock: Arc<dyn Clock>,
    tabs: HashMap<String, TabLedger>,
}

impl SessionLedger {
    /// Create an empty session with default ledger limits and the system clock.
    pub fn new(session_id: impl Into<String>) -> Self {
        Self::with_config(
            session_id,
            LedgerConfig::default(),
            Arc::new(SystemClock::new()),
        )
    }

    /// Create an empty session whose tab ledgers share `config` and `clock`.
    pub fn with_config(
        session_id: impl Into<String>,
        config: LedgerConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            config,
            clock,
            tabs: HashMap::new(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// The ledger for `tab_id`, created on first use.
    pub fn for_tab(&mut self, tab_id: &str) -> &mut TabLedger {
        let config = self.config;
        let clock = &self.clock;
        self.tabs
            .entry(tab_id.to_string())
            .or_insert_with(|| TabLedger::with_config(tab_id, config, Arc::clone(clock)))
    }

    /// The ledger for `tab_id`, if the tab has been referenced.
    pub fn get_tab(&self, tab_id: &str) -> Option<&TabLedger> {
        self.tabs.get(tab_id)
    }

    /// Snapshot the live entries of several tabs into one read-only view.
    ///
    /// Used for a single request that spans the current tab and any tabs the
    /// user explicitly mentioned. Tabs not seen before get an empty ledger.
    /// The view does not follow later changes to the source ledgers.
    pub fn merge<I, S>(&mut self, tab_ids: I) -> MergedView
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let now = self.clock.now_ms();
        let mut urls = BTreeSet::new();
        for tab_id in tab_ids {
            urls.extend(self.for_tab(tab_id.as_ref()).live_entries(now).cloned());
        }
        MergedView { urls }
    }

    /// Drop a tab's ledger entirely.
    pub fn remove_tab(&mut self, tab_id: &str) -> bool {
        self.tabs.remove(tab_id).is_some()
    }

    /// Clear every tab ledger and forget all tabs.
    pub fn clear_all(&mut self) {
        for ledger in self.tabs.values_mut() {
            ledger.clear();
        }
        self.tabs.clear();
    }

    /// Number of tabs with a ledger.
    pub fn tab_count(&self) -> usize {
        self.tabs.len()
    }

    /// Sum of [`TabLedger::size`] over all tabs.
    pub fn total_urls(&self) -> usize {
        self.tabs.values().map(TabLedger::size).sum()
    }
}

impl std::fmt::Debug for SessionLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionLedger")
            .field("session_id", &self.session_id)
            .field("config", &self.config)
            .field("tabs", &self.tabs.len())
            .finish()
    }
}

/// A read-only, point-in-time union of several tab ledgers.
///
/// Exposes membership and size only. A multi-tab request must never gain
/// write access to any of the ledgers it reads from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergedView {
    urls: BTreeSet<NormalizedUrl>,
}

impl MergedView {
    /// An empty view; nothing is trusted.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns true if the URL normalizes to a key held by the view.
    pub fn has(&self, url: &str, base_url: Option<&str>) -> bool {
        match normalize_url(url, base_url) {
            Ok(key) => self.urls.contains(&key),
            Err(_) => false,
        }
    }

    /// Membership test for a key that is already normalized.
    pub fn contains(&self, url: &NormalizedUrl) -> bool {
        self.urls.contains(url)
    }

    /// Number of distinct URLs in the view.
    pub fn size(&self) -> usize {
        self.urls.len()
    }
}
