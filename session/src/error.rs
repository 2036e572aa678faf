//! Typed errors for session resolution.

use tether_types::ClientId;

/// A capability sub-probe failed.
///
/// This is a distinct condition from "no backend available": the probe could
/// not produce an answer at all, and callers must not treat it as a quiet
/// downgrade to the null session.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("backend discoverability command failed")]
    Exec(#[source] anyhow::Error),
    #[error("project marker search failed")]
    MarkerSearch(#[source] anyhow::Error),
}

/// Failure while resolving or creating a per-client session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Capability resolution failed for the client.
    #[error("capability resolution failed for client {client}")]
    Probe {
        client: ClientId,
        #[source]
        source: ProbeError,
    },
    /// The probe succeeded but the backend process could not be started.
    #[error("failed to start analysis backend for client {client}")]
    Spawn {
        client: ClientId,
        #[source]
        source: anyhow::Error,
    },
}

impl SessionError {
    /// The client the resolution was running for.
    #[must_use]
    pub fn client(&self) -> &ClientId {
        match self {
            Self::Probe { client, .. } | Self::Spawn { client, .. } => client,
        }
    }
}
