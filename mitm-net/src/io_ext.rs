//! Byte-stream primitives (§4.A). Exact-length reads are tokio's
//! `AsyncReadExt::read_exact` directly; this module only adds the two shapes
//! tokio doesn't hand you out of the box.

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::NetError;

/// The chunk size used by [`read_available`] and the default bidirectional pipe.
pub const CHUNK_SIZE: usize = 8192;

/// Read up to and including the next `\n`.
///
/// Used by the HTTP join-patcher to read the request line and each header
/// line without knowing their length in advance (§4.K).
pub async fn read_until_newline(reader: &mut (impl AsyncRead + Unpin)) -> Result<Vec<u8>, NetError> {
    let mut line = Vec::new();
    loop {
        let byte = reader.read_u8().await?;
        line.push(byte);
        if byte == b'\n' {
            return Ok(line);
        }
    }
}

/// Read whatever bytes are immediately available from one underlying read,
/// or an empty vector on EOF (§4.A).
pub async fn read_available(reader: &mut (impl AsyncRead + Unpin)) -> Result<Vec<u8>, NetError> {
    let mut buf = vec![0u8; CHUNK_SIZE];
    let n = reader.read(&mut buf).await?;
    buf.truncate(n);
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn read_until_newline_is_inclusive() {
        let mut input: &[u8] = b"GET / HTTP/1.1\r\nHost: x\r\n";
        let line = read_until_newline(&mut input).await.unwrap();
        assert_eq!(line, b"GET / HTTP/1.1\r\n");
        let line = read_until_newline(&mut input).await.unwrap();
        assert_eq!(line, b"Host: x\r\n");
    }

    #[tokio::test]
    async fn read_available_is_empty_on_eof() {
        let mut input: &[u8] = b"";
        let chunk = read_available(&mut input).await.unwrap();
        assert!(chunk.is_empty());
    }

    #[tokio::test]
    async fn read_available_returns_a_single_readiness_worth() {
        let mut input: &[u8] = b"hello";
        let chunk = read_available(&mut input).await.unwrap();
        assert_eq!(chunk, b"hello");
    }
}
