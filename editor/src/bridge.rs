//! EditorBridge — the calling layer over the session registry.
//!
//! One bridge per client connection. It resolves the client's session on
//! demand, translates coordinates at the boundary, merges cached
//! server-wide diagnostics into request results, and keeps save-flow
//! failures contained.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;

use tether_session::{Client, ServerDiagnosticsCache, Session, SessionConfig, SessionRegistry};
use tether_types::{ClientId, Completion, Diagnostic, TypeHint};

use crate::buffer::BufferView;
use crate::position::Definition;

/// Request-scoped results first, then the most recent server-wide list.
fn merge_diagnostics(
    request_scoped: Vec<Diagnostic>,
    server_wide: Vec<Diagnostic>,
) -> Vec<Diagnostic> {
    let mut merged = request_scoped;
    merged.extend(server_wide);
    merged
}

/// Fold a server-diagnostics fetch into the cache.
///
/// A failed fetch is logged and leaves the previous entry in place; it never
/// propagates into the enclosing save flow.
fn absorb_server_diagnostics(
    cache: &ServerDiagnosticsCache,
    client_id: ClientId,
    fetched: Result<Vec<Diagnostic>>,
) {
    match fetched {
        Ok(items) => cache.replace(client_id, items),
        Err(e) => {
            tracing::warn!(client = %client_id, "server diagnostics refresh failed: {e:#}");
        }
    }
}

/// Editor-facing facade over one client's analysis session.
pub struct EditorBridge {
    client: Arc<dyn Client>,
    registry: SessionRegistry,
    cache: ServerDiagnosticsCache,
}

impl EditorBridge {
    #[must_use]
    pub fn new(client: Arc<dyn Client>, config: SessionConfig) -> Self {
        Self {
            client,
            registry: SessionRegistry::new(config),
            cache: ServerDiagnosticsCache::new(),
        }
    }

    async fn session_for(&self, path: &Path) -> Result<Arc<Session>> {
        let session = self
            .registry
            .get_or_create(self.client.as_ref(), path)
            .await?;
        Ok(session)
    }

    /// Diagnostics for the buffer: request-scoped results first, then the
    /// client's most recent server-wide list.
    pub async fn diagnostics_for(&self, buffer: &dyn BufferView) -> Result<Vec<Diagnostic>> {
        let session = self.session_for(buffer.path()).await?;
        let request_scoped = session
            .diagnostics(buffer.path(), buffer.contents())
            .await?;
        Ok(merge_diagnostics(
            request_scoped,
            self.cache.get(&self.client.id()),
        ))
    }

    /// Completion candidates at the cursor.
    pub async fn completions_at(&self, buffer: &dyn BufferView) -> Result<Vec<Completion>> {
        let Some(offset) = buffer.offset_for(buffer.cursor()) else {
            return Ok(Vec::new());
        };
        let session = self.session_for(buffer.path()).await?;
        session
            .completions(buffer.path(), buffer.contents(), offset)
            .await
    }

    /// Type of `word` under the cursor.
    pub async fn type_at_cursor(
        &self,
        buffer: &dyn BufferView,
        word: &str,
    ) -> Result<Option<TypeHint>> {
        let (line, col) = buffer.cursor().to_session_point();
        let session = self.session_for(buffer.path()).await?;
        session
            .type_at(buffer.path(), buffer.contents(), word, line, col)
            .await
    }

    /// Definition candidates for the cursor, in editor coordinates.
    ///
    /// The first element is authoritative; empty means "no definition
    /// found".
    pub async fn definition_at_cursor(&self, buffer: &dyn BufferView) -> Result<Vec<Definition>> {
        let cursor = buffer.cursor();
        let line_text = buffer.line_text(cursor.row).unwrap_or_default();
        let (line, col) = cursor.to_session_point();
        let session = self.session_for(buffer.path()).await?;
        let locations = session
            .definition(buffer.path(), buffer.contents(), line, col, &line_text)
            .await?;
        Ok(locations.into_iter().map(Definition::from_location).collect())
    }

    /// Format `contents[start..end]` of the buffer.
    pub async fn format_buffer(
        &self,
        buffer: &dyn BufferView,
        start: usize,
        end: usize,
    ) -> Result<String> {
        let session = self.session_for(buffer.path()).await?;
        session.format_source(buffer.contents(), start, end).await
    }

    /// The save flow: push the buffer state, refresh the server-wide
    /// diagnostics cache, nudge the dependency scan.
    ///
    /// A failed refresh is contained here: the completed `update_file` is
    /// not undone and the caller sees no error. The dependency nudge never
    /// blocks.
    pub async fn handle_save(&self, buffer: &dyn BufferView) -> Result<()> {
        let session = self.session_for(buffer.path()).await?;
        session
            .update_file(buffer.path(), buffer.contents())
            .await?;
        absorb_server_diagnostics(
            &self.cache,
            self.client.id(),
            session.server_diagnostics().await,
        );
        session.update_dependencies();
        Ok(())
    }

    /// Tear down this client's session and cached state.
    pub async fn dispose(&self) {
        let id = self.client.id();
        self.registry.dispose(&id).await;
        self.cache.clear(&id);
    }

    /// Direct cache access (for testing).
    #[cfg(test)]
    pub(crate) fn cache(&self) -> &ServerDiagnosticsCache {
        &self.cache
    }
}
