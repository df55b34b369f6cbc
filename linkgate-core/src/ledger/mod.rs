//! Trusted URL ledgers.
//!
//! A ledger records which URLs a browsing tab has made available to the
//! agent: links on the page it shows, pages the user navigated to. Tool calls
//! that target a URL outside the request's ledgers are refused.
//!
//! # Overview
//!
//! - **[`TabLedger`]**: bounded, time-expiring set of normalized URLs for one tab
//! - **[`SessionLedger`]**: one `TabLedger` per tab for the lifetime of a session
//! - **[`MergedView`]**: read-only snapshot across several tabs for one request
//! - **[`Clock`]**: time source; [`ManualClock`] for deterministic tests
//!
//! # Example
//!
//! ```rust
//! use linkgate_core::ledger::SessionLedger;
//!
//! let mut session = SessionLedger::new("window-1");
//! session
//!     .for_tab("tab-1")
//!     .seed(["https://news.example/a", "https://news.example/b"], None);
//! session.for_tab("tab-2").add("https://docs.example/", None);
//!
//! // Request scoped to the current tab plus one @mentioned tab
//! let view = session.merge(["tab-1", "tab-2"]);
//! assert!(view.has("https://news.example/a#comments", None));
//! assert!(view.has("https://docs.example", None));
//! assert!(!view.has("https://evil.example/a", None));
//! ```

mod clock;
mod config;
mod session;
mod tab;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{LedgerConfig, DEFAULT_MAX_ENTRIES, DEFAULT_TTL};
pub use session::{MergedView, SessionLedger};
pub use tab::TabLedger;
