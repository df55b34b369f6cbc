//! Evaluation context and dot-path resolution.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::ledger::MergedView;

/// Name under which the request-scoped ledger view is exposed to conditions
/// (`context.linkLedger`).
pub const LINK_LEDGER: &str = "linkLedger";

/// Request-scoped data that conditions can read.
///
/// Holds plain JSON fields, addressed as `context.<field>...`, and named
/// ledger views, addressed as `context.<name>` by ledger-aware conditions.
/// Built fresh for every request and discarded afterwards.
#[derive(Debug, Clone)]
pub struct EvaluationContext {
    fields: Value,
    ledgers: BTreeMap<String, MergedView>,
}

impl Default for EvaluationContext {
    fn default() -> Self {
        Self::new()
    }
}

impl EvaluationContext {
    /// An empty context.
    pub fn new() -> Self {
        Self {
            fields: Value::Object(Map::new()),
            ledgers: BTreeMap::new(),
        }
    }

    /// A context seeded with JSON fields.
    pub fn from_fields(fields: Map<String, Value>) -> Self {
        Self {
            fields: Value::Object(fields),
            ledgers: BTreeMap::new(),
        }
    }

    /// Set a JSON field.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        if let Value::Object(map) = &mut self.fields {
            map.insert(name.into(), value.into());
        }
        self
    }

    /// Attach a named ledger view.
    pub fn with_ledger(mut self, name: impl Into<String>, view: MergedView) -> Self {
        self.ledgers.insert(name.into(), view);
        self
    }

    /// Attach the request-scoped link ledger.
    pub fn with_link_ledger(self, view: MergedView) -> Self {
        self.with_ledger(LINK_LEDGER, view)
    }

    /// The JSON fields, as an object.
    pub fn fields(&self) -> &Value {
        &self.fields
    }

    /// Look up a ledger view by path, e.g. `context.linkLedger`.
    pub fn ledger(&self, path: &str) -> Option<&MergedView> {
        let name = path.strip_prefix("context.")?;
        self.ledgers.get(name)
    }

    /// The request-scoped link ledger, if one was attached.
    pub fn link_ledger(&self) -> Option<&MergedView> {
        self.ledgers.get(LINK_LEDGER)
    }
}

/// Resolve a dot path such as `action.tool` or `context.requestId`.
///
/// The first segment picks the root (`action` or `context`); any other root
/// is an authoring error and resolves to nothing. Later segments index
/// objects by key and arrays by position. Walking through a missing value or
/// a null yields `None`; a null at the end of the path is returned as
/// `Some(Value::Null)`.
pub fn resolve_path<'a>(path: &str, action: &'a Value, context: &'a Value) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = match segments.next() {
        Some("action") => action,
        Some("context") => context,
        _ => {
            log::error!("path must start with 'action' or 'context': {:?}", path);
            return None;
        }
    };

    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }

    Some(current)
}
