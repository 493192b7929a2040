//! `Content-Length` framing over any async byte stream.

use crate::error::transport::TransportError;

use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

const CONTENT_LENGTH_HEADER: &str = "Content-Length:";
const MAX_MESSAGE_BYTES: usize = 64 * 1024 * 1024;

/// Reads one framed message. Returns `Ok(None)` on a clean EOF between messages.
pub async fn read_message<R>(reader: &mut R, buf: &mut String) -> Result<Option<Value>, TransportError>
where
    R: AsyncBufRead + Unpin,
{
    let mut content_length: Option<usize> = None;
    let mut saw_header = false;

    loop {
        buf.clear();
        let bytes_read = reader.read_line(buf).await?;
        if bytes_read == 0 {
            if saw_header {
                return Err(TransportError::protocol("stream ended inside message headers"));
            }
            return Ok(None);
        }

        let line = buf.trim();
        if line.is_empty() {
            if saw_header {
                break;
            }
            continue;
        }
        saw_header = true;

        if let Some(len) = line.strip_prefix(CONTENT_LENGTH_HEADER) {
            let len = len.trim();
            content_length = Some(len.parse().map_err(|_| {
                TransportError::protocol(format!("invalid Content-Length: {len}"))
            })?);
        }
    }

    let length =
        content_length.ok_or_else(|| TransportError::protocol("missing Content-Length"))?;
    if length > MAX_MESSAGE_BYTES {
        return Err(TransportError::protocol(format!(
            "message of {length} bytes exceeds limit of {MAX_MESSAGE_BYTES}"
        )));
    }

    let mut body = vec![0u8; length];
    reader.read_exact(&mut body).await?;

    Ok(Some(serde_json::from_slice(&body)?))
}

pub async fn write_message<W>(writer: &mut W, value: &Value) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
{
    let json = serde_json::to_string(value)?;
    let frame = format!("{CONTENT_LENGTH_HEADER} {}\r\n\r\n{json}", json.len());
    writer.write_all(frame.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}
