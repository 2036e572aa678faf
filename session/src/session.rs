//! The per-client session surface.
//!
//! [`Session`] is a tagged variant over the real backend and the null
//! stand-in; callers are polymorphic over it and never learn which one they
//! hold except through [`Session::is_backend`]. The capability decision is
//! made once, at creation time, and the variant never changes afterwards.

use std::path::Path;

use anyhow::Result;
use tether_types::{Completion, Diagnostic, Location, TypeHint};

use crate::backend::BackendSession;

/// Capability-preserving stand-in used when no backend is usable.
///
/// Every operation returns the empty/neutral value and performs no IO.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSession;

impl NullSession {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    #[must_use]
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        Vec::new()
    }

    #[must_use]
    pub fn completions(&self) -> Vec<Completion> {
        Vec::new()
    }

    #[must_use]
    pub fn type_at(&self) -> Option<TypeHint> {
        None
    }

    #[must_use]
    pub fn definition(&self) -> Vec<Location> {
        Vec::new()
    }

    /// Formatting without a backend returns the selected range unchanged.
    #[must_use]
    pub fn format_source(&self, contents: &str, start: usize, end: usize) -> String {
        contents.get(start..end).unwrap_or("").to_string()
    }
}

/// One client's session: a live backend or the null stand-in.
#[derive(Debug)]
pub enum Session {
    Backend(BackendSession),
    Null(NullSession),
}

impl Session {
    /// Whether a real backend is behind this session.
    #[must_use]
    pub fn is_backend(&self) -> bool {
        matches!(self, Self::Backend(_))
    }

    /// Diagnostics for one file's current contents.
    pub async fn diagnostics(&self, path: &Path, contents: &str) -> Result<Vec<Diagnostic>> {
        match self {
            Self::Backend(backend) => backend.diagnostics(path, contents).await,
            Self::Null(null) => Ok(null.diagnostics()),
        }
    }

    /// Completion candidates at a byte offset.
    pub async fn completions(
        &self,
        path: &Path,
        contents: &str,
        offset: usize,
    ) -> Result<Vec<Completion>> {
        match self {
            Self::Backend(backend) => backend.completions(path, contents, offset).await,
            Self::Null(null) => Ok(null.completions()),
        }
    }

    /// Type of `word` at a 1-based line/column.
    pub async fn type_at(
        &self,
        path: &Path,
        contents: &str,
        word: &str,
        line: u32,
        col: u32,
    ) -> Result<Option<TypeHint>> {
        match self {
            Self::Backend(backend) => backend.type_at(path, contents, word, line, col).await,
            Self::Null(null) => Ok(null.type_at()),
        }
    }

    /// Definition candidates at a 1-based line/column. The first element is
    /// authoritative; empty means "no definition found".
    pub async fn definition(
        &self,
        path: &Path,
        contents: &str,
        line: u32,
        col: u32,
        line_text: &str,
    ) -> Result<Vec<Location>> {
        match self {
            Self::Backend(backend) => {
                backend
                    .definition(path, contents, line, col, line_text)
                    .await
            }
            Self::Null(null) => Ok(null.definition()),
        }
    }

    /// Format `contents[start..end]`.
    pub async fn format_source(&self, contents: &str, start: usize, end: usize) -> Result<String> {
        match self {
            Self::Backend(backend) => backend.format_source(contents, start, end).await,
            Self::Null(null) => Ok(null.format_source(contents, start, end)),
        }
    }

    /// Notify the session of the buffer's current state.
    pub async fn update_file(&self, path: &Path, contents: &str) -> Result<()> {
        match self {
            Self::Backend(backend) => backend.update_file(path, contents).await,
            Self::Null(_) => Ok(()),
        }
    }

    /// Most recent server-wide diagnostics. May fail; callers catch, log,
    /// and continue.
    pub async fn server_diagnostics(&self) -> Result<Vec<Diagnostic>> {
        match self {
            Self::Backend(backend) => backend.server_diagnostics().await,
            Self::Null(null) => Ok(null.diagnostics()),
        }
    }

    /// Fire-and-forget dependency refresh; never blocks the caller.
    pub fn update_dependencies(&self) {
        if let Self::Backend(backend) = self {
            backend.update_dependencies();
        }
    }

    /// Stop the session. A null session has nothing to stop.
    pub async fn shutdown(&self) {
        if let Self::Backend(backend) = self {
            backend.shutdown().await;
        }
    }
}
