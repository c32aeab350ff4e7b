//! The HTTP join-patcher (§4.K): intercepts the client's plaintext
//! `exUUIDAuth.php?action=join` request, swaps in the replacement auth digest
//! computed by the public-key MITM (§4.J), and otherwise passes the
//! connection through byte-for-byte.

use std::sync::Arc;

use mitm_net::io_ext::read_until_newline;
use mitm_net::pipe::bidirectional_pipe;
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

use crate::error::{CoreError, HttpPatchError};
use crate::replacement_slot::ReplacementSlot;

/// The path substring that marks a request as the session-join call this
/// patcher exists to intercept (§4.K step 1); any other request is forwarded
/// without being parsed.
const JOIN_PATH_MARKER: &str = "/exUUIDAuth.php?action=join";

/// How long to wait for the PK MITM to publish a replacement digest before
/// giving up (§4.K step 5 "Require a non-empty replacement hash slot"). A
/// join request this proxy intercepts always follows an `EncryptionRequest`/
/// `EncryptionResponse` exchange on the packet connection, so this bounds the
/// pathological case where that handshake never happened rather than the
/// normal timing of the two connections.
const REPLACEMENT_HASH_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

fn split_header_line(line: &[u8]) -> Result<(String, String), HttpPatchError> {
    let text = std::str::from_utf8(line).map_err(|_| HttpPatchError::MalformedHeader(String::from_utf8_lossy(line).into_owned()))?;
    let trimmed = text.trim_end_matches(['\r', '\n']);
    let (name, value) = trimmed
        .split_once(':')
        .ok_or_else(|| HttpPatchError::MalformedHeader(trimmed.to_string()))?;
    Ok((name.trim().to_string(), value.trim().to_string()))
}

fn rewrite_content_length(original_line: &[u8], new_len: usize) -> Vec<u8> {
    let text = String::from_utf8_lossy(original_line);
    let colon = text.find(':').unwrap_or(0);
    let digits_start = colon + text[colon..].len() - text[colon..].trim_start_matches(|c: char| c == ':' || c.is_whitespace()).len();
    let digits_end = digits_start + text[digits_start..].find(|c: char| !c.is_ascii_digit()).unwrap_or(text.len() - digits_start);
    let mut rewritten = String::with_capacity(text.len());
    rewritten.push_str(&text[..digits_start]);
    rewritten.push_str(&new_len.to_string());
    rewritten.push_str(&text[digits_end..]);
    rewritten.into_bytes()
}

/// Read the header block following the request line: every line up to and
/// including the first blank line, returned both as raw bytes (to preserve
/// the request byte-for-byte except for the one line this patcher rewrites)
/// and as parsed `(name, value)` pairs in original order.
async fn read_headers(client: &mut TcpStream) -> Result<(Vec<Vec<u8>>, Vec<(String, String)>), CoreError> {
    let mut raw_lines = Vec::new();
    let mut parsed = Vec::new();
    loop {
        let line = read_until_newline(client).await?;
        if line == b"\r\n" || line == b"\n" {
            raw_lines.push(line);
            break;
        }
        parsed.push(split_header_line(&line)?);
        raw_lines.push(line);
    }
    Ok((raw_lines, parsed))
}

/// Intercept one HTTP/1.1 request on `client`, patching it if it is the
/// session-join call, then forward it to `server` and pipe the remainder of
/// the connection byte-for-byte (§4.K steps 1-7).
///
/// # Errors
/// Returns [`CoreError::HttpPatch`] if the join request's body is not valid
/// JSON, does not round-trip through compact re-serialization, or carries no
/// `Content-Length`. Returns [`CoreError::Net`] on transport failure.
pub async fn run(mut client: TcpStream, mut server: TcpStream, replacement_slot: Arc<ReplacementSlot>) -> Result<(), CoreError> {
    let request_line = read_until_newline(&mut client).await?;
    let request_text = String::from_utf8_lossy(&request_line);

    if !request_text.contains(JOIN_PATH_MARKER) {
        server.write_all(&request_line).await.map_err(HttpPatchError::from)?;
        debug!("http join-patcher: non-join request, passing through unmodified");
        return bidirectional_pipe(client, server).await.map_err(CoreError::from);
    }

    debug!("http join-patcher: intercepted session-join request");
    let (mut raw_header_lines, parsed_headers) = read_headers(&mut client).await?;

    let content_length_idx = parsed_headers
        .iter()
        .position(|(name, _)| name.eq_ignore_ascii_case("content-length"))
        .ok_or(HttpPatchError::MissingContentLength)?;
    let content_length: usize = parsed_headers[content_length_idx]
        .1
        .parse()
        .map_err(|_| HttpPatchError::MalformedHeader(parsed_headers[content_length_idx].1.clone()))?;

    let mut body = vec![0u8; content_length];
    client.read_exact(&mut body).await.map_err(HttpPatchError::from)?;

    let value: Value = serde_json::from_slice(&body).map_err(HttpPatchError::from)?;
    if serde_json::to_vec(&value).map_err(HttpPatchError::from)? != body {
        return Err(HttpPatchError::JsonMismatch.into());
    }

    let mut object = match value {
        Value::Object(object) => object,
        _ => return Err(HttpPatchError::JsonMismatch.into()),
    };
    let digest = replacement_slot
        .get_timeout(REPLACEMENT_HASH_TIMEOUT)
        .await
        .ok_or(HttpPatchError::MissingReplacementHash)?;
    debug!(digest = %mitm_crypto::redacted_hex(digest.as_bytes()), "patching join request with replacement digest");
    object.insert("serverId".to_string(), Value::String(digest));
    let new_body = serde_json::to_vec(&Value::Object(object)).map_err(HttpPatchError::from)?;

    raw_header_lines[content_length_idx] = rewrite_content_length(&raw_header_lines[content_length_idx], new_body.len());

    server.write_all(&request_line).await.map_err(HttpPatchError::from)?;
    for line in &raw_header_lines {
        server.write_all(line).await.map_err(HttpPatchError::from)?;
    }
    server.write_all(&new_body).await.map_err(HttpPatchError::from)?;

    bidirectional_pipe(client, server).await.map_err(CoreError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn socket_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let dial = tokio::spawn(async move { TcpStream::connect(addr).await.unwrap() });
        let (accepted, _) = listener.accept().await.unwrap();
        (dial.await.unwrap(), accepted)
    }

    #[tokio::test]
    async fn passes_through_non_join_requests_unmodified() {
        let (mut probe_client, client_side) = socket_pair().await;
        let (server_side, mut probe_server) = socket_pair().await;
        let slot = Arc::new(ReplacementSlot::new());

        let patcher = tokio::spawn(run(client_side, server_side, slot));
        probe_client.write_all(b"GET /status HTTP/1.1\r\nHost: x\r\n\r\n").await.unwrap();

        let mut received = vec![0u8; "GET /status HTTP/1.1\r\nHost: x\r\n\r\n".len()];
        probe_server.read_exact(&mut received).await.unwrap();
        assert_eq!(received, b"GET /status HTTP/1.1\r\nHost: x\r\n\r\n");

        drop(probe_client);
        let _ = patcher.await;
    }

    #[tokio::test]
    async fn patches_server_id_and_repairs_content_length() {
        let (mut probe_client, client_side) = socket_pair().await;
        let (server_side, mut probe_server) = socket_pair().await;
        let slot = Arc::new(ReplacementSlot::new());
        slot.set("deadbeef".to_string());

        let patcher = tokio::spawn(run(client_side, server_side, slot));

        let body = br#"{"serverId":"-","sharedSecret":"abcd","accessToken":"tok"}"#;
        let request = format!(
            "POST /exUUIDAuth.php?action=join HTTP/1.1\r\nHost: session.minecraft.net\r\nContent-Length: {}\r\n\r\n",
            body.len()
        );
        probe_client.write_all(request.as_bytes()).await.unwrap();
        probe_client.write_all(body).await.unwrap();

        let mut line_buf = Vec::new();
        loop {
            let mut byte = [0u8; 1];
            probe_server.read_exact(&mut byte).await.unwrap();
            line_buf.push(byte[0]);
            if line_buf.ends_with(b"\r\n") {
                break;
            }
        }
        assert_eq!(line_buf, b"POST /exUUIDAuth.php?action=join HTTP/1.1\r\n");

        let mut headers = Vec::new();
        let mut new_content_length = None;
        loop {
            let mut line = Vec::new();
            loop {
                let mut byte = [0u8; 1];
                probe_server.read_exact(&mut byte).await.unwrap();
                line.push(byte[0]);
                if line.ends_with(b"\r\n") {
                    break;
                }
            }
            if line == b"\r\n" {
                break;
            }
            let text = String::from_utf8(line.clone()).unwrap();
            if let Some((name, value)) = text.trim_end().split_once(':') {
                if name.eq_ignore_ascii_case("content-length") {
                    new_content_length = Some(value.trim().parse::<usize>().unwrap());
                }
            }
            headers.push(line);
        }

        let new_content_length = new_content_length.expect("content-length header forwarded");
        let mut new_body = vec![0u8; new_content_length];
        probe_server.read_exact(&mut new_body).await.unwrap();

        let parsed: Value = serde_json::from_slice(&new_body).unwrap();
        assert_eq!(parsed["serverId"], "deadbeef");
        assert_eq!(parsed["sharedSecret"], "abcd");
        assert_eq!(new_body.len(), new_content_length);

        drop(probe_client);
        let _ = patcher.await;
    }

    #[tokio::test]
    async fn rejects_a_join_body_that_does_not_round_trip_compactly() {
        let (mut probe_client, client_side) = socket_pair().await;
        let (server_side, _probe_server) = socket_pair().await;
        let slot = Arc::new(ReplacementSlot::new());

        let patcher = tokio::spawn(run(client_side, server_side, slot));

        // Extra whitespace: valid JSON, but its compact re-serialization
        // won't match these bytes.
        let body = br#"{ "serverId": "-" }"#;
        let request = format!(
            "POST /exUUIDAuth.php?action=join HTTP/1.1\r\nContent-Length: {}\r\n\r\n",
            body.len()
        );
        probe_client.write_all(request.as_bytes()).await.unwrap();
        probe_client.write_all(body).await.unwrap();

        let result = patcher.await.unwrap();
        assert!(matches!(result, Err(CoreError::HttpPatch(HttpPatchError::JsonMismatch))));
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_if_no_replacement_hash_ever_arrives() {
        let (mut probe_client, client_side) = socket_pair().await;
        let (server_side, _probe_server) = socket_pair().await;
        let slot = Arc::new(ReplacementSlot::new());

        let patcher = tokio::spawn(run(client_side, server_side, slot));

        let body = br#"{"serverId":"-"}"#;
        let request = format!(
            "POST /exUUIDAuth.php?action=join HTTP/1.1\r\nContent-Length: {}\r\n\r\n",
            body.len()
        );
        probe_client.write_all(request.as_bytes()).await.unwrap();
        probe_client.write_all(body).await.unwrap();

        tokio::time::advance(REPLACEMENT_HASH_TIMEOUT + std::time::Duration::from_millis(1)).await;

        let result = patcher.await.unwrap();
        assert!(matches!(result, Err(CoreError::HttpPatch(HttpPatchError::MissingReplacementHash))));
    }
}
