//! Session configuration.
//!
//! Construction goes through the deserialization boundary; the editor host
//! hands this crate a validated [`SessionConfig`] loaded from its TOML
//! settings.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

fn default_request_timeout_secs() -> u64 {
    30
}

/// Configuration for one analysis backend.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Backend executable command (resolved through PATH before spawning).
    pub command: String,
    /// Arguments to pass to the command.
    #[serde(default)]
    pub args: Vec<String>,
    /// Marker filename whose presence upward from a source file indicates a
    /// recognized project root (e.g. the backend's rc file).
    pub root_marker: String,
    /// Override for the discoverability probe command. When absent, the
    /// platform lookup of `command` is used.
    #[serde(default)]
    pub probe_command: Option<String>,
    /// Bound on a single backend request round-trip.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl SessionConfig {
    /// The fixed shell command whose non-empty stdout indicates the backend
    /// executable is installed and on the resolution path.
    #[must_use]
    pub fn discoverability_command(&self) -> String {
        if let Some(command) = &self.probe_command {
            return command.clone();
        }

        #[cfg(windows)]
        {
            format!("where {}", self.command)
        }
        #[cfg(not(windows))]
        {
            format!("which {}", self.command)
        }
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Parse a config from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Load a config from a TOML file.
    pub async fn load(path: &Path) -> anyhow::Result<Self> {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading session config {}", path.display()))?;
        Self::from_toml_str(&text)
            .with_context(|| format!("parsing session config {}", path.display()))
    }
}
