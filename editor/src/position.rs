//! Coordinate translation between the editor and the session layer.
//!
//! The editor is 0-based; the session layer is 1-based. +1 on both row and
//! column going in, -1 on both coming out of definition results. The exact
//! round-trip is load-bearing: a drifted conversion points the cursor at
//! the wrong character.

use std::path::PathBuf;

use tether_types::Location;

/// A 0-based row/column position in an editor buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub row: u32,
    pub col: u32,
}

impl Position {
    #[must_use]
    pub fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    /// The session-layer 1-based (line, column) for this position.
    #[must_use]
    pub fn to_session_point(self) -> (u32, u32) {
        (self.row + 1, self.col + 1)
    }
}

/// A definition target in editor coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Definition {
    pub path: PathBuf,
    pub position: Position,
}

impl Definition {
    /// Translate a session-layer location (1-based) into editor coordinates.
    ///
    /// Saturating: a malformed 0 from the wire pins to the first row/column
    /// instead of wrapping.
    #[must_use]
    pub fn from_location(location: Location) -> Self {
        Self {
            path: location.path,
            position: Position {
                row: location.line.saturating_sub(1),
                col: location.column.saturating_sub(1),
            },
        }
    }
}
