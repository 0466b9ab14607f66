//! Wire framing: a 4-byte big-endian length prefix followed by the JSON
//! payload.

use sylva_error::{OperationalError, Result};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Read one frame. `Ok(None)` means the peer closed the connection cleanly
/// between frames.
pub async fn read_frame<R: AsyncRead + Unpin>(
    reader: &mut R,
    max_frame_bytes: usize,
) -> Result<Option<Vec<u8>>> {
    let mut len_bytes = [0u8; 4];
    match reader.read_exact(&mut len_bytes).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => {
            return Err(OperationalError::Connection {
                message: format!("failed to read frame length: {e}"),
            }
            .into())
        }
    }
    let len = u32::from_be_bytes(len_bytes) as usize;
    if len > max_frame_bytes {
        return Err(OperationalError::Connection {
            message: format!("frame of {len} bytes exceeds the {max_frame_bytes} byte cap"),
        }
        .into());
    }
    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await.map_err(|e| {
        sylva_error::Error::from(OperationalError::Connection {
            message: format!("failed to read frame payload: {e}"),
        })
    })?;
    Ok(Some(payload))
}

pub async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, payload: &[u8]) -> Result<()> {
    let connection_error = |message: String| {
        sylva_error::Error::from(OperationalError::Connection { message })
    };
    let len = u32::try_from(payload.len())
        .map_err(|_| connection_error("frame too large for 4-byte length prefix".into()))?;
    writer
        .write_all(&len.to_be_bytes())
        .await
        .map_err(|e| connection_error(format!("failed to write frame length: {e}")))?;
    writer
        .write_all(payload)
        .await
        .map_err(|e| connection_error(format!("failed to write frame payload: {e}")))?;
    writer
        .flush()
        .await
        .map_err(|e| connection_error(format!("failed to flush frame: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn frames_round_trip() {
        let mut cursor = std::io::Cursor::new(Vec::new());
        write_frame(&mut cursor, br#"{"jsonrpc":"2.0"}"#).await.unwrap();
        let buffer = cursor.into_inner();
        assert_eq!(&buffer[..4], &(17u32.to_be_bytes()));

        let mut reader = buffer.as_slice();
        let frame = read_frame(&mut reader, 1024).await.unwrap().unwrap();
        assert_eq!(frame, br#"{"jsonrpc":"2.0"}"#);
        assert!(read_frame(&mut reader, 1024).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn oversized_frames_are_rejected() {
        let mut cursor = std::io::Cursor::new(Vec::new());
        write_frame(&mut cursor, &vec![b'x'; 100]).await.unwrap();
        let buffer = cursor.into_inner();
        let mut reader = buffer.as_slice();
        assert!(read_frame(&mut reader, 10).await.is_err());
    }

    #[tokio::test]
    async fn truncated_payload_is_a_connection_error() {
        let mut buffer = Vec::new();
        buffer.extend_from_slice(&8u32.to_be_bytes());
        buffer.extend_from_slice(b"abc");
        let mut reader = buffer.as_slice();
        assert!(read_frame(&mut reader, 1024).await.is_err());
    }
}
