//! Correlation tables between our requests, the server's handles, and
//! logical subscription types.

use std::collections::HashMap;

use wsload_api::SubscriptionKind;

/// Bucket for notifications whose handle was never confirmed.
pub const UNKNOWN_TYPE: &str = "unknown";

/// Server-assigned subscription handle → logical type.
///
/// Entries are created on confirmation and never removed; cardinality is
/// bounded by the subscriptions issued over the whole run.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionRegistry {
    handles: HashMap<String, String>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite. Last write wins.
    pub fn register(&mut self, handle: impl Into<String>, logical_type: impl Into<String>) {
        self.handles.insert(handle.into(), logical_type.into());
    }

    pub fn lookup(&self, handle: &str) -> Option<&str> {
        self.handles.get(handle).map(String::as_str)
    }

    /// Registered type, or [`UNKNOWN_TYPE`].
    pub fn type_or_unknown(&self, handle: &str) -> &str {
        self.lookup(handle).unwrap_or(UNKNOWN_TYPE)
    }
}

/// Local request id → logical type, for one connection epoch.
///
/// Ids restart at 1 on every connection, so a fresh table is built per
/// connection and dropped with it.
#[derive(Debug)]
pub struct PendingRequests {
    by_id: HashMap<u64, SubscriptionKind>,
    next_id: u64,
}

impl Default for PendingRequests {
    fn default() -> Self {
        Self::new()
    }
}

impl PendingRequests {
    pub fn new() -> Self {
        Self {
            by_id: HashMap::new(),
            next_id: 1,
        }
    }

    /// Reserve the next id. Ids are consumed even if the send later fails.
    pub fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn track(&mut self, id: u64, kind: SubscriptionKind) {
        self.by_id.insert(id, kind);
    }

    pub fn type_of(&self, id: u64) -> Option<&SubscriptionKind> {
        self.by_id.get(&id)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}
