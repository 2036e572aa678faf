//! Result payload types for session operations.
//!
//! Payload semantics are pass-through from the backend; these types carry
//! only the fields the editor glue actually consumes.

use std::path::PathBuf;

/// One completion candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    /// Text inserted on acceptance.
    pub label: String,
    /// Human-readable detail (a type signature, a module path).
    pub detail: Option<String>,
    /// Backend-reported kind (e.g. "function", "field"). Opaque.
    pub kind: Option<String>,
}

impl Completion {
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            detail: None,
            kind: None,
        }
    }
}

/// The backend's description of the type of a word at a position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeHint {
    /// The word the hint describes.
    pub word: String,
    /// The backend's rendering of its type.
    pub description: String,
}

/// A source location, 1-based line and column.
///
/// Definition lookups return these; the first element of a result list is
/// authoritative, and an empty list means "no definition found".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub path: PathBuf,
    /// 1-based line number.
    pub line: u32,
    /// 1-based column.
    pub column: u32,
}
