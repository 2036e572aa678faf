//! Backend session — owns one spawned analysis process for one client.
//!
//! All operations take `&self`: the registry hands the same session out to
//! every caller that resolves the same client, behind an `Arc`. Request ids
//! and the pending-responder map carry the shared-access bookkeeping.

use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde_json::Value;
use tokio::process::{Child, Command};
use tokio::sync::{Mutex, mpsc, oneshot};
use tether_types::{Completion, Diagnostic, Location, TypeHint};

use crate::config::SessionConfig;
use crate::protocol::{self, NotificationFrame, RequestFrame};
use crate::transport::{MessageReader, MessageWriter};

const SHUTDOWN_TIMEOUT_SECS: u64 = 2;

const WRITER_CHANNEL_CAPACITY: usize = 64;

enum WriterCommand {
    Send(Value),
    Shutdown,
}

enum Incoming {
    Reply { id: u64, body: Value },
    BackendRequest { id: Value, method: String },
    Push { method: String },
}

fn classify(frame: Value) -> Option<Incoming> {
    let id = frame.get("id").cloned();
    let method = frame
        .get("method")
        .and_then(Value::as_str)
        .map(String::from);
    let is_reply = frame.get("result").is_some() || frame.get("error").is_some();

    match (id, method, is_reply) {
        (Some(id), None, true) => Some(Incoming::Reply {
            id: id.as_u64()?,
            body: frame,
        }),
        (Some(id), Some(method), _) => Some(Incoming::BackendRequest { id, method }),
        (None, Some(method), _) => Some(Incoming::Push { method }),
        _ => None,
    }
}

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<Value>>>>;

/// A running analysis backend bound to one client's project root.
#[derive(Debug)]
pub struct BackendSession {
    name: String,
    writer_tx: mpsc::Sender<WriterCommand>,
    next_id: AtomicU64,
    pending: PendingMap,
    child: Mutex<Option<Child>>,
    request_timeout: Duration,
}

impl BackendSession {
    /// Spawn the backend and complete the `initialize` handshake.
    pub(crate) async fn start(config: &SessionConfig, project_root: &Path) -> Result<Self> {
        let resolved = which::which(&config.command)
            .with_context(|| format!("{} not found in PATH", config.command))?;
        let mut command = Command::new(&resolved);
        command
            .args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .current_dir(project_root)
            .kill_on_drop(true);

        let mut child = command
            .spawn()
            .with_context(|| format!("spawning {}", config.command))?;
        let stdout = child.stdout.take().context("no stdout from backend")?;
        let stdin = child.stdin.take().context("no stdin from backend")?;

        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));

        let (writer_tx, mut writer_rx) = mpsc::channel::<WriterCommand>(WRITER_CHANNEL_CAPACITY);
        tokio::spawn(async move {
            let mut writer = MessageWriter::new(stdin);
            while let Some(command) = writer_rx.recv().await {
                match command {
                    WriterCommand::Send(frame) => {
                        if let Err(e) = writer.send(&frame).await {
                            tracing::warn!("backend write error: {e}");
                            break;
                        }
                    }
                    WriterCommand::Shutdown => break,
                }
            }
        });

        let reader_pending = pending.clone();
        let reader_writer_tx = writer_tx.clone();
        let reader_name = config.command.clone();
        tokio::spawn(async move {
            let mut reader = MessageReader::new(stdout);
            loop {
                match reader.recv().await {
                    Ok(Some(frame)) => {
                        Self::dispatch(frame, &reader_pending, &reader_writer_tx, &reader_name)
                            .await;
                    }
                    Ok(None) => {
                        tracing::info!("backend '{reader_name}' closed its output");
                        break;
                    }
                    Err(e) => {
                        tracing::warn!("backend '{reader_name}' read error: {e:#}");
                        break;
                    }
                }
            }
            // Fail any in-flight requests fast instead of letting them ride
            // out their timeout.
            reader_pending.lock().await.clear();
        });

        let session = Self {
            name: config.command.clone(),
            writer_tx,
            next_id: AtomicU64::new(1),
            pending,
            child: Mutex::new(Some(child)),
            request_timeout: config.request_timeout(),
        };

        session.initialize(project_root).await?;

        Ok(session)
    }

    async fn dispatch(
        frame: Value,
        pending: &Mutex<HashMap<u64, oneshot::Sender<Value>>>,
        writer_tx: &mpsc::Sender<WriterCommand>,
        name: &str,
    ) {
        match classify(frame) {
            Some(Incoming::Reply { id, body }) => {
                let responder = pending.lock().await.remove(&id);
                match responder {
                    Some(tx) => {
                        let _ = tx.send(body);
                    }
                    None => {
                        tracing::trace!("backend '{name}' replied to unknown request {id}");
                    }
                }
            }
            Some(Incoming::BackendRequest { id, method }) => {
                // The backend may ask things of us; answer so it doesn't
                // block waiting.
                tracing::debug!("backend '{name}' sent request {method}, replying method not found");
                let reply = serde_json::json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "error": {
                        "code": -32601,
                        "message": format!("Method not found: {method}")
                    }
                });
                let _ = writer_tx.send(WriterCommand::Send(reply)).await;
            }
            Some(Incoming::Push { method }) => {
                tracing::trace!("ignoring push from '{name}': {method}");
            }
            None => {
                tracing::trace!("ignoring malformed frame from '{name}'");
            }
        }
    }

    async fn initialize(&self, project_root: &Path) -> Result<()> {
        let root_uri =
            protocol::path_to_file_uri(project_root).context("converting project root to URI")?;
        self.request(
            "initialize",
            Some(protocol::initialize_params(root_uri.as_str())),
        )
        .await?;
        self.notify("initialized", Some(serde_json::json!({})))
            .await
    }

    /// Send a request and wait for its result, bounded by the configured
    /// timeout. Every failure path clears the pending entry so repeated
    /// failures don't grow the map.
    async fn request(&self, method: &'static str, params: Option<Value>) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        let frame = serde_json::to_value(RequestFrame::new(id, method, params))
            .context("encoding request")?;
        if self
            .writer_tx
            .send(WriterCommand::Send(frame))
            .await
            .is_err()
        {
            self.pending.lock().await.remove(&id);
            bail!("backend writer closed");
        }

        let body = match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(body)) => body,
            Ok(Err(_)) => {
                self.pending.lock().await.remove(&id);
                bail!("backend exited before replying to {method}");
            }
            Err(_) => {
                self.pending.lock().await.remove(&id);
                bail!("{method} timed out");
            }
        };

        if let Some(error) = body.get("error") {
            bail!(
                "{method} failed: {}",
                error
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown error")
            );
        }
        Ok(body.get("result").cloned().unwrap_or(Value::Null))
    }

    async fn notify(&self, method: &'static str, params: Option<Value>) -> Result<()> {
        let frame = serde_json::to_value(NotificationFrame::new(method, params))
            .context("encoding notification")?;
        self.writer_tx
            .send(WriterCommand::Send(frame))
            .await
            .map_err(|_| anyhow::anyhow!("backend writer closed"))
    }

    pub async fn diagnostics(&self, path: &Path, contents: &str) -> Result<Vec<Diagnostic>> {
        let uri = protocol::path_to_file_uri(path)?;
        let result = self
            .request(
                "analysis/fileDiagnostics",
                Some(serde_json::json!({ "uri": uri.as_str(), "contents": contents })),
            )
            .await?;
        Ok(protocol::parse_diagnostics(&result))
    }

    pub async fn completions(
        &self,
        path: &Path,
        contents: &str,
        offset: usize,
    ) -> Result<Vec<Completion>> {
        let uri = protocol::path_to_file_uri(path)?;
        let result = self
            .request(
                "analysis/completions",
                Some(serde_json::json!({
                    "uri": uri.as_str(),
                    "contents": contents,
                    "offset": offset
                })),
            )
            .await?;
        Ok(protocol::parse_completions(&result))
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
        let uri = protocol::path_to_file_uri(path)?;
        let result = self
            .request(
                "analysis/typeAtPosition",
                Some(serde_json::json!({
                    "uri": uri.as_str(),
                    "contents": contents,
                    "word": word,
                    "position": { "line": line, "column": col }
                })),
            )
            .await?;
        Ok(protocol::parse_type_hint(&result))
    }

    /// Definition candidates for the position; 1-based coordinates both ways.
    pub async fn definition(
        &self,
        path: &Path,
        contents: &str,
        line: u32,
        col: u32,
        line_text: &str,
    ) -> Result<Vec<Location>> {
        let uri = protocol::path_to_file_uri(path)?;
        let result = self
            .request(
                "analysis/definition",
                Some(serde_json::json!({
                    "uri": uri.as_str(),
                    "contents": contents,
                    "position": { "line": line, "column": col },
                    "lineText": line_text
                })),
            )
            .await?;
        Ok(protocol::parse_locations(&result))
    }

    pub async fn format_source(&self, contents: &str, start: usize, end: usize) -> Result<String> {
        let result = self
            .request(
                "analysis/formatSource",
                Some(serde_json::json!({
                    "contents": contents,
                    "start": start,
                    "end": end
                })),
            )
            .await?;
        result
            .get("formatted")
            .and_then(Value::as_str)
            .map(String::from)
            .context("backend returned no formatted text")
    }

    /// Tell the backend about the buffer's current state.
    pub async fn update_file(&self, path: &Path, contents: &str) -> Result<()> {
        let uri = protocol::path_to_file_uri(path)?;
        self.notify(
            "analysis/updateFile",
            Some(serde_json::json!({ "uri": uri.as_str(), "contents": contents })),
        )
        .await
    }

    /// Most recent server-wide diagnostics. May fail; callers recover.
    pub async fn server_diagnostics(&self) -> Result<Vec<Diagnostic>> {
        let result = self.request("analysis/serverDiagnostics", None).await?;
        Ok(protocol::parse_diagnostics(&result))
    }

    /// Fire-and-forget dependency refresh. Never blocks and never fails the
    /// caller; a full writer queue just drops the nudge.
    pub fn update_dependencies(&self) {
        let frame = serde_json::to_value(NotificationFrame::new(
            "analysis/updateDependencies",
            None,
        ));
        match frame {
            Ok(frame) => {
                if let Err(e) = self.writer_tx.try_send(WriterCommand::Send(frame)) {
                    tracing::debug!("dependency refresh dropped: {e}");
                }
            }
            Err(e) => tracing::debug!("dependency refresh not encodable: {e}"),
        }
    }

    /// Gracefully stop the backend: polite `shutdown`/`exit`, then a bounded
    /// wait before killing the process.
    pub async fn shutdown(&self) {
        let polite = tokio::time::timeout(
            Duration::from_secs(SHUTDOWN_TIMEOUT_SECS),
            self.request("shutdown", None),
        )
        .await;
        if matches!(polite, Ok(Ok(_))) {
            let _ = self.notify("exit", None).await;
        }

        let _ = self.writer_tx.send(WriterCommand::Shutdown).await;

        let child = self.child.lock().await.take();
        if let Some(mut child) = child {
            let waited = tokio::time::timeout(
                Duration::from_secs(SHUTDOWN_TIMEOUT_SECS),
                child.wait(),
            )
            .await;
            if waited.is_err() {
                tracing::debug!("backend '{}' didn't exit in time, killing", self.name);
                let _ = child.kill().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_channels() -> (
        PendingMap,
        mpsc::Sender<WriterCommand>,
        mpsc::Receiver<WriterCommand>,
    ) {
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let (writer_tx, writer_rx) = mpsc::channel(8);
        (pending, writer_tx, writer_rx)
    }

    #[tokio::test]
    async fn test_dispatch_reply_routes_to_pending() {
        let (pending, writer_tx, _writer_rx) = test_channels();
        let (tx, rx) = oneshot::channel();
        pending.lock().await.insert(1, tx);

        let frame = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": { "diagnostics": [] }
        });
        BackendSession::dispatch(frame, &pending, &writer_tx, "test").await;

        let body = rx.await.unwrap();
        assert!(body["result"]["diagnostics"].is_array());
        assert!(pending.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_error_reply_also_routes() {
        let (pending, writer_tx, _writer_rx) = test_channels();
        let (tx, rx) = oneshot::channel();
        pending.lock().await.insert(2, tx);

        let frame = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 2,
            "error": { "code": -32600, "message": "invalid request" }
        });
        BackendSession::dispatch(frame, &pending, &writer_tx, "test").await;

        let body = rx.await.unwrap();
        assert!(body["error"].is_object());
    }

    #[tokio::test]
    async fn test_dispatch_reply_for_unknown_id_is_ignored() {
        let (pending, writer_tx, _writer_rx) = test_channels();
        let frame = serde_json::json!({ "jsonrpc": "2.0", "id": 99, "result": {} });
        BackendSession::dispatch(frame, &pending, &writer_tx, "test").await;
        assert!(pending.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_backend_request_gets_method_not_found() {
        let (pending, writer_tx, mut writer_rx) = test_channels();
        let frame = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 5,
            "method": "host/register",
            "params": {}
        });
        BackendSession::dispatch(frame, &pending, &writer_tx, "test").await;

        match writer_rx.try_recv().unwrap() {
            WriterCommand::Send(reply) => {
                assert_eq!(reply["id"], 5);
                assert_eq!(reply["error"]["code"], -32601);
                assert!(
                    reply["error"]["message"]
                        .as_str()
                        .unwrap()
                        .contains("host/register")
                );
            }
            WriterCommand::Shutdown => panic!("expected Send, got Shutdown"),
        }
    }

    #[tokio::test]
    async fn test_dispatch_push_is_ignored() {
        let (pending, writer_tx, mut writer_rx) = test_channels();
        let frame = serde_json::json!({
            "jsonrpc": "2.0",
            "method": "analysis/progress",
            "params": { "message": "typechecking" }
        });
        BackendSession::dispatch(frame, &pending, &writer_tx, "test").await;
        assert!(writer_rx.try_recv().is_err());
        assert!(pending.lock().await.is_empty());
    }

    #[test]
    fn test_classify_malformed_frame_is_none() {
        assert!(classify(serde_json::json!({"jsonrpc": "2.0"})).is_none());
        assert!(classify(serde_json::json!({"id": "not-a-number", "result": {}})).is_none());
    }
}
