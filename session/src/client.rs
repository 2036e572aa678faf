//! The client collaborator boundary.
//!
//! A [`Client`] represents one connected project/editor scope (local or
//! remote) and supplies the two capabilities capability probing needs:
//! executing a shell command, and searching upward for a named marker file.
//! Everything else in this crate is polymorphic over this trait.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tether_types::ClientId;

/// Captured output of a shell command run through a client.
#[derive(Debug, Clone)]
pub struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

/// A handle to one connected client.
///
/// Implementations must be cheap to share; the registry and the editor glue
/// hold them behind `Arc`.
#[async_trait]
pub trait Client: Send + Sync {
    /// Stable identifier for this connection; the session-registry key.
    fn id(&self) -> ClientId;

    /// Run a shell command in the client's environment.
    async fn exec(&self, command: &str) -> Result<ExecOutput>;

    /// Search upward from `from_dir` for a file named `name`, returning the
    /// nearest match.
    async fn find_nearest_file(&self, name: &str, from_dir: &Path) -> Result<Option<PathBuf>>;
}

/// Client implementation for the local machine.
pub struct LocalClient {
    root: PathBuf,
}

impl LocalClient {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl Client for LocalClient {
    fn id(&self) -> ClientId {
        ClientId::new(format!("local:{}", self.root.display()))
    }

    async fn exec(&self, command: &str) -> Result<ExecOutput> {
        #[cfg(windows)]
        let (shell, flag) = ("cmd", "/C");
        #[cfg(not(windows))]
        let (shell, flag) = ("/bin/sh", "-c");

        let output = tokio::process::Command::new(shell)
            .arg(flag)
            .arg(command)
            .output()
            .await
            .with_context(|| format!("running `{command}`"))?;

        Ok(ExecOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code().unwrap_or(-1),
        })
    }

    async fn find_nearest_file(&self, name: &str, from_dir: &Path) -> Result<Option<PathBuf>> {
        let mut dir = from_dir.to_path_buf();
        loop {
            let candidate = dir.join(name);
            let exists = tokio::fs::try_exists(&candidate)
                .await
                .with_context(|| format!("probing {}", candidate.display()))?;
            if exists {
                return Ok(Some(candidate));
            }
            if !dir.pop() {
                return Ok(None);
            }
        }
    }
}
