//! Per-client analysis-backend session management.
//!
//! One connected client (a project/editor scope) maps to at most one
//! [`Session`]: a wrapper around a spawned analysis backend, or a
//! [`NullSession`] stand-in when no backend is usable for that client.
//! The [`SessionRegistry`] owns the lazy resolve-or-create protocol and the
//! single-session-per-client invariant; the [`probe`] module decides, once
//! per client, whether a backend is usable at all.

pub mod client;
pub mod config;
pub mod transport;

pub(crate) mod protocol;

mod backend;
mod cache;
mod error;
mod probe;
mod registry;
mod session;

pub use backend::BackendSession;
pub use cache::ServerDiagnosticsCache;
pub use client::{Client, ExecOutput, LocalClient};
pub use config::SessionConfig;
pub use error::{ProbeError, SessionError};
pub use probe::{Capability, probe};
pub use registry::SessionRegistry;
pub use session::{NullSession, Session};
