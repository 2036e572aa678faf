//! Most-recent server-wide diagnostics, per client.
//!
//! A secondary store next to the registry, keyed by the same client
//! identifier. The save flow replaces a client's entry after a successful
//! server-diagnostics fetch; the editor glue appends the entry to
//! request-scoped results.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use tether_types::{ClientId, Diagnostic};

#[derive(Default)]
pub struct ServerDiagnosticsCache {
    entries: Mutex<HashMap<ClientId, Vec<Diagnostic>>>,
}

impl ServerDiagnosticsCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the client's cached list with a fresh fetch.
    pub fn replace(&self, client_id: ClientId, items: Vec<Diagnostic>) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(client_id, items);
    }

    /// The most recent server-wide list for the client; empty when no fetch
    /// has succeeded yet.
    #[must_use]
    pub fn get(&self, client_id: &ClientId) -> Vec<Diagnostic> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(client_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Forget the client's entry (paired with session disposal).
    pub fn clear(&self, client_id: &ClientId) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(client_id);
    }
}
