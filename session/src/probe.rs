//! Capability probing.
//!
//! Decides, once per client, whether a real analysis backend is usable:
//! the backend executable must be discoverable in the client's environment
//! AND a project marker file must exist upward from the file being analyzed.
//! Both legs run concurrently and the combinator waits for both.

use std::path::{Path, PathBuf};

use crate::client::Client;
use crate::config::SessionConfig;
use crate::error::ProbeError;

/// Outcome of a capability probe.
#[derive(Debug, Clone)]
pub struct Capability {
    backend_available: bool,
    project_root: Option<PathBuf>,
}

impl Capability {
    /// Whether a real backend session can be created: the executable is
    /// discoverable and a project root was found.
    #[must_use]
    pub fn usable(&self) -> bool {
        self.backend_available && self.project_root.is_some()
    }

    /// Directory containing the nearest project marker, when one was found.
    #[must_use]
    pub fn project_root(&self) -> Option<&Path> {
        self.project_root.as_deref()
    }
}

/// Probe whether `client` can host a real backend for `start_path`.
///
/// A failed sub-probe surfaces as [`ProbeError`]; it is never folded into a
/// "no backend" answer.
pub async fn probe(
    client: &dyn Client,
    start_path: &Path,
    config: &SessionConfig,
) -> Result<Capability, ProbeError> {
    let start_dir = start_path.parent().unwrap_or_else(|| Path::new("."));
    let command = config.discoverability_command();

    let (exec_result, marker_result) = tokio::join!(
        client.exec(&command),
        client.find_nearest_file(&config.root_marker, start_dir),
    );

    let output = exec_result.map_err(ProbeError::Exec)?;
    let marker = marker_result.map_err(ProbeError::MarkerSearch)?;

    let backend_available = !output.stdout.trim().is_empty();
    if !backend_available {
        tracing::debug!(command = %command, "backend executable not discoverable");
    }

    Ok(Capability {
        backend_available,
        project_root: marker.and_then(|m| m.parent().map(Path::to_path_buf)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ExecOutput;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::path::PathBuf;
    use tether_types::ClientId;

    struct StubClient {
        stdout: Result<&'static str, ()>,
        marker: Result<Option<&'static str>, ()>,
    }

    #[async_trait]
    impl Client for StubClient {
        fn id(&self) -> ClientId {
            ClientId::new("stub")
        }

        async fn exec(&self, _command: &str) -> Result<ExecOutput> {
            match self.stdout {
                Ok(stdout) => Ok(ExecOutput {
                    stdout: stdout.to_string(),
                    stderr: String::new(),
                    exit_code: 0,
                }),
                Err(()) => Err(anyhow::anyhow!("exec exploded")),
            }
        }

        async fn find_nearest_file(
            &self,
            _name: &str,
            _from_dir: &Path,
        ) -> Result<Option<PathBuf>> {
            match self.marker {
                Ok(found) => Ok(found.map(PathBuf::from)),
                Err(()) => Err(anyhow::anyhow!("search exploded")),
            }
        }
    }

    fn config() -> SessionConfig {
        serde_json::from_value(serde_json::json!({
            "command": "tidewater",
            "root_marker": ".tidewater"
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_usable_when_both_legs_succeed() {
        let client = StubClient {
            stdout: Ok("/usr/bin/tidewater\n"),
            marker: Ok(Some("/home/user/project/.tidewater")),
        };
        let cap = probe(&client, Path::new("/home/user/project/src/a.js"), &config())
            .await
            .unwrap();
        assert!(cap.usable());
        assert_eq!(cap.project_root(), Some(Path::new("/home/user/project")));
    }

    #[tokio::test]
    async fn test_not_usable_when_stdout_empty() {
        let client = StubClient {
            stdout: Ok("   \n"),
            marker: Ok(Some("/p/.tidewater")),
        };
        let cap = probe(&client, Path::new("/p/a.js"), &config()).await.unwrap();
        assert!(!cap.usable());
    }

    #[tokio::test]
    async fn test_not_usable_when_marker_missing() {
        let client = StubClient {
            stdout: Ok("/usr/bin/tidewater"),
            marker: Ok(None),
        };
        let cap = probe(&client, Path::new("/p/a.js"), &config()).await.unwrap();
        assert!(!cap.usable());
        assert_eq!(cap.project_root(), None);
    }

    #[tokio::test]
    async fn test_not_usable_when_both_legs_fail_the_check() {
        let client = StubClient {
            stdout: Ok(""),
            marker: Ok(None),
        };
        let cap = probe(&client, Path::new("/p/a.js"), &config()).await.unwrap();
        assert!(!cap.usable());
    }

    #[tokio::test]
    async fn test_exec_failure_surfaces_as_probe_error() {
        let client = StubClient {
            stdout: Err(()),
            marker: Ok(Some("/p/.tidewater")),
        };
        let err = probe(&client, Path::new("/p/a.js"), &config())
            .await
            .unwrap_err();
        assert!(matches!(err, ProbeError::Exec(_)));
    }

    #[tokio::test]
    async fn test_marker_failure_surfaces_as_probe_error() {
        let client = StubClient {
            stdout: Ok("/usr/bin/tidewater"),
            marker: Err(()),
        };
        let err = probe(&client, Path::new("/p/a.js"), &config())
            .await
            .unwrap_err();
        assert!(matches!(err, ProbeError::MarkerSearch(_)));
    }
}
