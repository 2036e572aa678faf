//! Wire messages exchanged with the analysis backend.
//!
//! Payload semantics are pass-through: this module builds request frames
//! and lifts the fields the editor glue consumes out of response values,
//! leaving everything else untouched. Coordinates on the wire are 1-based,
//! matching the session-layer convention.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use tether_types::{Completion, Diagnostic, Location, Severity, TypeHint};

#[derive(Debug, thiserror::Error)]
#[error("cannot convert path to file URI: {}", path.display())]
pub(crate) struct UriError {
    path: PathBuf,
}

#[derive(Debug, Serialize)]
pub(crate) struct RequestFrame {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl RequestFrame {
    pub fn new(id: u64, method: &'static str, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method,
            params,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct NotificationFrame {
    pub jsonrpc: &'static str,
    pub method: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl NotificationFrame {
    pub fn new(method: &'static str, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            method,
            params,
        }
    }
}

pub(crate) fn path_to_file_uri(path: &Path) -> Result<url::Url, UriError> {
    url::Url::from_file_path(path).map_err(|()| UriError {
        path: path.to_path_buf(),
    })
}

pub(crate) fn file_uri_to_path(uri: &str) -> Option<PathBuf> {
    url::Url::parse(uri)
        .ok()
        .and_then(|u| u.to_file_path().ok())
}

pub(crate) fn initialize_params(root_uri: &str) -> Value {
    serde_json::json!({
        "processId": std::process::id(),
        "rootUri": root_uri,
        "capabilities": {
            "diagnostics": true,
            "completions": true,
            "typeHints": true,
            "definitions": true,
            "formatting": true
        }
    })
}

// ── Response payload lifting ───────────────────────────────────────────

fn as_u32(value: &Value, key: &str) -> Option<u32> {
    value.get(key).and_then(Value::as_u64).map(|n| n as u32)
}

fn as_string(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(String::from)
}

/// Lift a diagnostics list out of a response payload.
///
/// Items missing a severity default to `Warning`; items missing a message
/// are dropped (there is nothing to show for them).
pub(crate) fn parse_diagnostics(payload: &Value) -> Vec<Diagnostic> {
    let Some(items) = payload.get("diagnostics").and_then(Value::as_array) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| {
            let message = as_string(item, "message")?;
            let severity = item
                .get("severity")
                .and_then(Value::as_u64)
                .and_then(Severity::from_wire)
                .unwrap_or(Severity::Warning);
            Some(Diagnostic::new(
                severity,
                message,
                as_u32(item, "line").unwrap_or(1),
                as_u32(item, "column").unwrap_or(1),
                as_string(item, "source").unwrap_or_else(|| String::from("backend")),
            ))
        })
        .collect()
}

pub(crate) fn parse_completions(payload: &Value) -> Vec<Completion> {
    let Some(items) = payload.get("completions").and_then(Value::as_array) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| {
            let label = as_string(item, "label")?;
            Some(Completion {
                label,
                detail: as_string(item, "detail"),
                kind: as_string(item, "kind"),
            })
        })
        .collect()
}

/// `None` when the backend has no type for the word (null or absent result).
pub(crate) fn parse_type_hint(payload: &Value) -> Option<TypeHint> {
    let hint = payload.get("type")?;
    if hint.is_null() {
        return None;
    }
    Some(TypeHint {
        word: as_string(hint, "word")?,
        description: as_string(hint, "description")?,
    })
}

/// Lift definition locations. The first element is authoritative; an empty
/// list means "no definition found".
pub(crate) fn parse_locations(payload: &Value) -> Vec<Location> {
    let Some(items) = payload.get("locations").and_then(Value::as_array) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| {
            let path = match as_string(item, "uri") {
                Some(uri) => file_uri_to_path(&uri)?,
                None => PathBuf::from(as_string(item, "path")?),
            };
            Some(Location {
                path,
                line: as_u32(item, "line")?,
                column: as_u32(item, "column")?,
            })
        })
        .collect()
}
