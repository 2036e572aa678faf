//! Editor-side glue between text buffers and analysis sessions.
//!
//! The editor's model is 0-based rows and columns; the session layer speaks
//! 1-based lines and columns. This crate owns that translation (both
//! directions), the merge of request-scoped and cached server-wide
//! diagnostics, and the save flow's failure isolation.

mod bridge;
mod buffer;
mod position;

pub use bridge::EditorBridge;
pub use buffer::BufferView;
pub use position::{Definition, Position};
