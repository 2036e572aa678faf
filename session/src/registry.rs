//! The session registry — one session per client, lazily created.
//!
//! Owned by the host's composition root and handed to the editor glue; not
//! a process-wide global. The map is guarded by a sync lock that is never
//! held across a suspension point; all mutations happen at well-defined
//! synchronous points.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use tether_types::ClientId;

use crate::backend::BackendSession;
use crate::client::Client;
use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::probe;
use crate::session::{NullSession, Session};

/// Process-lifetime mapping from client identifier to its session.
pub struct SessionRegistry {
    config: SessionConfig,
    sessions: Mutex<HashMap<ClientId, Arc<Session>>>,
}

impl SessionRegistry {
    #[must_use]
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    fn lookup(&self, id: &ClientId) -> Option<Arc<Session>> {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    /// Resolve the session for `client`, creating it on first access.
    ///
    /// Concurrent callers for a key nobody has resolved yet may duplicate
    /// the capability probe (and even the backend spawn); that work is
    /// wasted, not wrong. Exactly one session is ever installed for a key,
    /// and every caller gets that one; losers are shut down in the
    /// background.
    pub async fn get_or_create(
        &self,
        client: &dyn Client,
        start_path: &Path,
    ) -> Result<Arc<Session>, SessionError> {
        let id = client.id();

        // Fast path: no suspension when the session already exists.
        if let Some(existing) = self.lookup(&id) {
            return Ok(existing);
        }

        // The key stays absent while resolution is in flight.
        let capability = probe::probe(client, start_path, &self.config)
            .await
            .map_err(|source| SessionError::Probe {
                client: id.clone(),
                source,
            })?;

        let fresh = match capability.project_root().filter(|_| capability.usable()) {
            Some(root) => {
                let backend = BackendSession::start(&self.config, root).await.map_err(
                    |source| SessionError::Spawn {
                        client: id.clone(),
                        source,
                    },
                )?;
                Session::Backend(backend)
            }
            None => Session::Null(NullSession::new()),
        };

        // Re-check: a concurrent caller may have finished first. Keep the
        // installed entry and discard ours.
        let mut sessions = self
            .sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = sessions.get(&id) {
            let existing = existing.clone();
            drop(sessions);
            tracing::debug!(client = %id, "lost first-access race; discarding duplicate session");
            tokio::spawn(async move { fresh.shutdown().await });
            return Ok(existing);
        }
        let fresh = Arc::new(fresh);
        sessions.insert(id, fresh.clone());
        Ok(fresh)
    }

    /// Drop the entry for `client_id` and shut its session down.
    ///
    /// Unknown keys are a no-op. Callers that never dispose simply keep the
    /// session for the process lifetime.
    pub async fn dispose(&self, client_id: &ClientId) {
        let removed = self
            .sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(client_id);
        if let Some(session) = removed {
            tracing::info!(client = %client_id, "disposing session");
            session.shutdown().await;
        }
    }

    /// Number of installed sessions.
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
