use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::errors::ProtocolError;

/// Read a single JSONL message from an async buffered reader.
///
/// Returns `Ok(None)` on a clean EOF or a blank line (the client closed the
/// connection after its one request, per spec ยง6).
pub async fn read_message<R, T>(reader: &mut R) -> Result<Option<T>, ProtocolError>
where
    R: AsyncBufRead + Unpin,
    T: DeserializeOwned,
{
    let mut line = String::new();
    let bytes_read = reader.read_line(&mut line).await?;
    if bytes_read == 0 {
        return Ok(None);
    }

    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let msg: T = serde_json::from_str(trimmed)
        .map_err(|e| ProtocolError::Malformed(format!("invalid JSON: {e}: {trimmed}")))?;
    Ok(Some(msg))
}

/// Write a single JSONL message (compact JSON + newline) and flush.
pub async fn write_message<W, T>(writer: &mut W, msg: &T) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let json = serde_json::to_string(msg)
        .map_err(|e| ProtocolError::Malformed(format!("failed to serialize response: {e}")))?;
    writer.write_all(json.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{Request, Response};

    #[tokio::test]
    async fn test_roundtrip_request() {
        let req = Request::new("ping", serde_json::Value::Null);
        let mut buf: Vec<u8> = Vec::new();
        write_message(&mut buf, &req).await.unwrap();

        let mut reader = tokio::io::BufReader::new(buf.as_slice());
        let parsed: Option<Request> = read_message(&mut reader).await.unwrap();
        assert_eq!(parsed.unwrap().method, "ping");
    }

    #[tokio::test]
    async fn test_roundtrip_response() {
        let resp = Response::ok(serde_json::json!("pong"));
        let mut buf: Vec<u8> = Vec::new();
        write_message(&mut buf, &resp).await.unwrap();

        let mut reader = tokio::io::BufReader::new(buf.as_slice());
        let parsed: Response = read_message(&mut reader).await.unwrap().unwrap();
        assert!(parsed.is_ok());
    }

    #[tokio::test]
    async fn test_read_eof_returns_none() {
        let buf: &[u8] = b"";
        let mut reader = tokio::io::BufReader::new(buf);
        let result: Option<Request> = read_message(&mut reader).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_read_invalid_json_errors() {
        let buf: &[u8] = b"not json\n";
        let mut reader = tokio::io::BufReader::new(buf);
        let result: Result<Option<Request>, _> = read_message(&mut reader).await;
        assert!(result.is_err());
        assert_eq!(result.unwrap_err().error_code(), "protocol_error");
    }

    #[tokio::test]
    async fn test_sequential_messages_on_one_stream() {
        let req1 = Request::new("ping", serde_json::Value::Null);
        let req2 = Request::new("sessions", serde_json::json!({"include_saved": true}));

        let mut buf: Vec<u8> = Vec::new();
        write_message(&mut buf, &req1).await.unwrap();
        write_message(&mut buf, &req2).await.unwrap();

        let mut reader = tokio::io::BufReader::new(buf.as_slice());
        let parsed1: Request = read_message(&mut reader).await.unwrap().unwrap();
        assert_eq!(parsed1.method, "ping");
        let parsed2: Request = read_message(&mut reader).await.unwrap().unwrap();
        assert_eq!(parsed2.method, "sessions");
        let eof: Option<Request> = read_message(&mut reader).await.unwrap();
        assert!(eof.is_none());
    }
}
