//! Framed message transport for backend stdio.
//!
//! The backend speaks JSON-RPC with `Content-Length: N\r\n\r\n{json}`
//! framing over its stdin/stdout. [`MessageReader`] and [`MessageWriter`]
//! carry one direction each so the session can run them from separate tasks.

use anyhow::{Context, Result, bail};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

/// Upper bound on a single message body, to keep a misbehaving backend from
/// forcing unbounded allocation.
const MAX_MESSAGE_BYTES: usize = 8 * 1024 * 1024;

/// Reads framed JSON-RPC messages from the backend's stdout.
pub struct MessageReader<R> {
    input: BufReader<R>,
}

impl<R: AsyncRead + Unpin> MessageReader<R> {
    pub fn new(input: R) -> Self {
        Self {
            input: BufReader::new(input),
        }
    }

    /// Read the next message.
    ///
    /// `Ok(None)` means the stream ended cleanly between messages. EOF in
    /// the middle of a message is an error, not a shutdown.
    pub async fn recv(&mut self) -> Result<Option<serde_json::Value>> {
        let Some(body_len) = self.read_header_block().await? else {
            return Ok(None);
        };

        if body_len > MAX_MESSAGE_BYTES {
            bail!("backend message of {body_len} bytes exceeds limit {MAX_MESSAGE_BYTES}");
        }

        let mut body = vec![0u8; body_len];
        self.input
            .read_exact(&mut body)
            .await
            .context("reading message body")?;

        serde_json::from_slice(&body)
            .context("decoding message body")
            .map(Some)
    }

    /// Consume one header block, returning its Content-Length.
    ///
    /// `Ok(None)` only when EOF arrives before any header byte.
    async fn read_header_block(&mut self) -> Result<Option<usize>> {
        let mut body_len: Option<usize> = None;
        let mut line = String::new();
        let mut started = false;

        loop {
            line.clear();
            let read = self
                .input
                .read_line(&mut line)
                .await
                .context("reading message header")?;
            if read == 0 {
                if started {
                    bail!("backend stream ended inside a header block");
                }
                return Ok(None);
            }
            started = true;

            let header = line.trim();
            if header.is_empty() {
                break;
            }
            if let Some((key, value)) = header.split_once(':')
                && key.trim().eq_ignore_ascii_case("Content-Length")
            {
                body_len = Some(
                    value
                        .trim()
                        .parse()
                        .context("unparseable Content-Length header")?,
                );
            }
            // Other headers (Content-Type) carry no information we need.
        }

        match body_len {
            Some(len) => Ok(Some(len)),
            None => bail!("header block without Content-Length"),
        }
    }
}

/// Writes framed JSON-RPC messages to the backend's stdin.
pub struct MessageWriter<W> {
    output: W,
}

impl<W: AsyncWrite + Unpin> MessageWriter<W> {
    pub fn new(output: W) -> Self {
        Self { output }
    }

    /// Frame and write one message, flushing before returning.
    pub async fn send(&mut self, message: &serde_json::Value) -> Result<()> {
        let body = serde_json::to_string(message).context("encoding message body")?;
        let framed = format!("Content-Length: {}\r\n\r\n{body}", body.len());
        self.output
            .write_all(framed.as_bytes())
            .await
            .context("writing message")?;
        self.output.flush().await.context("flushing message")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_then_recv_roundtrip() {
        let message = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 7,
            "method": "analysis/fileDiagnostics",
            "params": { "uri": "file:///p/a.js" }
        });

        let mut buf = Vec::new();
        MessageWriter::new(&mut buf).send(&message).await.unwrap();

        let mut reader = MessageReader::new(buf.as_slice());
        assert_eq!(reader.recv().await.unwrap().unwrap(), message);
        assert!(reader.recv().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_back_to_back_messages() {
        let first = serde_json::json!({"jsonrpc": "2.0", "id": 1});
        let second = serde_json::json!({"jsonrpc": "2.0", "id": 2});

        let mut buf = Vec::new();
        let mut writer = MessageWriter::new(&mut buf);
        writer.send(&first).await.unwrap();
        writer.send(&second).await.unwrap();

        let mut reader = MessageReader::new(buf.as_slice());
        assert_eq!(reader.recv().await.unwrap().unwrap(), first);
        assert_eq!(reader.recv().await.unwrap().unwrap(), second);
    }

    #[tokio::test]
    async fn test_clean_eof_is_none() {
        let mut reader = MessageReader::new(&b""[..]);
        assert!(reader.recv().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_eof_inside_headers_is_error() {
        let mut reader = MessageReader::new(&b"Content-Length: 10\r\n"[..]);
        assert!(reader.recv().await.is_err());
    }

    #[tokio::test]
    async fn test_eof_inside_body_is_error() {
        let mut reader = MessageReader::new(&b"Content-Length: 50\r\n\r\n{\"id\""[..]);
        assert!(reader.recv().await.is_err());
    }

    #[tokio::test]
    async fn test_missing_content_length_is_error() {
        let mut reader =
            MessageReader::new(&b"Content-Type: application/json\r\n\r\n{}"[..]);
        assert!(reader.recv().await.is_err());
    }

    #[tokio::test]
    async fn test_unparseable_content_length_is_error() {
        let mut reader = MessageReader::new(&b"Content-Length: many\r\n\r\n{}"[..]);
        assert!(reader.recv().await.is_err());
    }

    #[tokio::test]
    async fn test_extra_headers_are_skipped() {
        let body = r#"{"jsonrpc":"2.0","id":3}"#;
        let framed = format!(
            "Content-Type: application/vscode-jsonrpc; charset=utf-8\r\nContent-Length: {}\r\n\r\n{body}",
            body.len(),
        );
        let mut reader = MessageReader::new(framed.as_bytes());
        assert_eq!(reader.recv().await.unwrap().unwrap()["id"], 3);
    }

    #[tokio::test]
    async fn test_header_name_is_case_insensitive() {
        let body = r#"{"id":4}"#;
        let framed = format!("content-length: {}\r\n\r\n{body}", body.len());
        let mut reader = MessageReader::new(framed.as_bytes());
        assert_eq!(reader.recv().await.unwrap().unwrap()["id"], 4);
    }

    #[tokio::test]
    async fn test_oversized_message_is_rejected() {
        let framed = format!("Content-Length: {}\r\n\r\n", MAX_MESSAGE_BYTES + 1);
        let mut reader = MessageReader::new(framed.as_bytes());
        assert!(reader.recv().await.is_err());
    }

    #[tokio::test]
    async fn test_length_counts_bytes_not_chars() {
        // "ø" is two bytes in UTF-8; the header must count bytes.
        let message = serde_json::json!({"word": "høyde"});
        let mut buf = Vec::new();
        MessageWriter::new(&mut buf).send(&message).await.unwrap();

        let text = String::from_utf8(buf.clone()).unwrap();
        let body = serde_json::to_string(&message).unwrap();
        assert!(text.starts_with(&format!("Content-Length: {}\r\n\r\n", body.len())));

        let mut reader = MessageReader::new(buf.as_slice());
        assert_eq!(reader.recv().await.unwrap().unwrap()["word"], "høyde");
    }

    #[tokio::test]
    async fn test_garbage_body_is_error() {
        let body = b"definitely not json";
        let mut buf = format!("Content-Length: {}\r\n\r\n", body.len()).into_bytes();
        buf.extend_from_slice(body);
        let mut reader = MessageReader::new(buf.as_slice());
        assert!(reader.recv().await.is_err());
    }
}
