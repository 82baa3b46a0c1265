//! JSON-RPC 2.0 message types and stdio framing for MCP.
//!
//! Messages are newline-delimited JSON: one request or response per line.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::Result;

/// MCP protocol revision implemented by the server.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

const JSONRPC_VERSION: &str = "2.0";

/// Reject lines over 16MB.
const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
/// Server-defined: request arrived before `initialize`.
pub const NOT_INITIALIZED: i64 = -32002;

/// Incoming request or notification.
#[derive(Deserialize, Debug, Clone)]
pub struct Request {
    #[serde(default)]
    pub jsonrpc: Option<String>,
    /// Absent for notifications
    #[serde(default)]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

impl Request {
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// Outgoing response.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Response {
    pub jsonrpc: &'static str,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorObject>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ErrorObject {
    pub code: i64,
    pub message: String,
}

impl Response {
    pub fn result(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id: id.unwrap_or(Value::Null),
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Option<Value>, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id: id.unwrap_or(Value::Null),
            result: None,
            error: Some(ErrorObject {
                code,
                message: message.into(),
            }),
        }
    }
}

/// One line read from the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incoming {
    /// A UTF-8 line, trailing newline removed
    Message(String),
    /// A line that cannot be decoded; the reason goes back as a parse error
    Malformed(String),
}

/// Read the next non-blank line, or `None` at end of input.
///
/// Only I/O failures are errors. Oversized or non-UTF-8 lines are consumed
/// and reported as [`Incoming::Malformed`] so the caller can keep reading.
pub async fn read_message<R>(reader: &mut R) -> Result<Option<Incoming>>
where
    R: AsyncBufRead + Unpin,
{
    read_message_limited(reader, MAX_MESSAGE_SIZE).await
}

async fn read_message_limited<R>(reader: &mut R, max_size: usize) -> Result<Option<Incoming>>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = Vec::new();
    loop {
        line.clear();
        // One byte past the limit tells an oversized line from one that fits.
        let read = (&mut *reader)
            .take(max_size as u64 + 1)
            .read_until(b'\n', &mut line)
            .await?;
        if read == 0 {
            return Ok(None);
        }

        if line.last() == Some(&b'\n') {
            line.pop();
        } else if line.len() > max_size {
            skip_line(reader).await?;
            return Ok(Some(Incoming::Malformed(format!(
                "message too large (max {} bytes)",
                max_size
            ))));
        }

        let Ok(text) = std::str::from_utf8(&line) else {
            return Ok(Some(Incoming::Malformed(
                "message is not valid UTF-8".to_string(),
            )));
        };
        if !text.trim().is_empty() {
            return Ok(Some(Incoming::Message(text.trim_end().to_string())));
        }
    }
}

/// Discard input up to and including the next newline without buffering it.
async fn skip_line<R>(reader: &mut R) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let (consumed, done) = {
            let available = reader.fill_buf().await?;
            if available.is_empty() {
                return Ok(());
            }
            match available.iter().position(|&b| b == b'\n') {
                Some(end) => (end + 1, true),
                None => (available.len(), false),
            }
        };
        reader.consume(consumed);
        if done {
            return Ok(());
        }
    }
}

/// Write one message followed by a newline and flush.
pub async fn write_message<T, W>(writer: &mut W, message: &T) -> Result<()>
where
    T: Serialize,
    W: AsyncWrite + Unpin,
{
    let mut json = serde_json::to_vec(message)?;
    json.push(b'\n');
    writer.write_all(&json).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::BufReader;

    #[test]
    fn test_request_parsing() {
        let request: Request =
            serde_json::from_str(r#"{"jsonrpc": "2.0", "id": 7, "method": "tools/list"}"#).unwrap();
        assert_eq!(request.id, Some(json!(7)));
        assert_eq!(request.method, "tools/list");
        assert_eq!(request.params, Value::Null);
        assert!(!request.is_notification());
    }

    #[test]
    fn test_notification_has_no_id() {
        let request: Request =
            serde_json::from_str(r#"{"jsonrpc": "2.0", "method": "notifications/initialized"}"#)
                .unwrap();
        assert!(request.is_notification());
    }

    #[test]
    fn test_response_serialization() {
        let ok = serde_json::to_value(Response::result(Some(json!(1)), json!({}))).unwrap();
        assert_eq!(ok, json!({"jsonrpc": "2.0", "id": 1, "result": {}}));

        let err = serde_json::to_value(Response::error(None, PARSE_ERROR, "bad")).unwrap();
        assert_eq!(
            err,
            json!({"jsonrpc": "2.0", "id": null, "error": {"code": -32700, "message": "bad"}})
        );
    }

    fn message(text: &str) -> Option<Incoming> {
        Some(Incoming::Message(text.to_string()))
    }

    #[tokio::test]
    async fn test_read_skips_blank_lines() {
        let input: &[u8] = b"\n  \n{\"a\":1}\r\n{\"b\":2}";
        let mut reader = BufReader::new(input);

        assert_eq!(read_message(&mut reader).await.unwrap(), message(r#"{"a":1}"#));
        assert_eq!(read_message(&mut reader).await.unwrap(), message(r#"{"b":2}"#));
        assert_eq!(read_message(&mut reader).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_invalid_utf8_line_is_reported_and_skipped() {
        let input: &[u8] = b"\xff\xfe\n{}\n";
        let mut reader = BufReader::new(input);

        assert!(matches!(
            read_message(&mut reader).await.unwrap(),
            Some(Incoming::Malformed(_))
        ));
        assert_eq!(read_message(&mut reader).await.unwrap(), message("{}"));
    }

    #[tokio::test]
    async fn test_oversized_line_is_discarded() {
        let input: &[u8] = b"0123456789abcdef\n12345678\n[1]\n";
        // Small buffer so the oversized line spans several refills.
        let mut reader = BufReader::with_capacity(4, input);

        assert!(matches!(
            read_message_limited(&mut reader, 8).await.unwrap(),
            Some(Incoming::Malformed(reason)) if reason.contains("too large")
        ));
        assert_eq!(read_message_limited(&mut reader, 8).await.unwrap(), message("12345678"));
        assert_eq!(read_message_limited(&mut reader, 8).await.unwrap(), message("[1]"));
        assert_eq!(read_message_limited(&mut reader, 8).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_oversized_last_line_without_newline() {
        let mut reader = BufReader::new(&b"0123456789"[..]);
        assert!(matches!(
            read_message_limited(&mut reader, 8).await.unwrap(),
            Some(Incoming::Malformed(_))
        ));
        assert_eq!(read_message_limited(&mut reader, 8).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_write_appends_newline() {
        let mut out: Vec<u8> = Vec::new();
        write_message(&mut out, &json!({"x": 1})).await.unwrap();
        assert_eq!(out, b"{\"x\":1}\n");
    }
}
