//! Core domain types for Tether.
//!
//! This crate contains pure domain types with no IO, no async, and minimal
//! dependencies. Everything here can be used from any layer of the plugin.

mod diagnostic;
mod ids;
mod results;

pub use diagnostic::{Diagnostic, Severity};
pub use ids::ClientId;
pub use results::{Completion, Location, TypeHint};
