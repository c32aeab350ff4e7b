//! The tab-complete helper (§4.M): a bare request/response round trip over
//! the intercepted channel, built on [`PacketMitm::write_to_server`] and
//! [`PacketMitm::wait_for`]. Not wired into any polling loop or presence
//! tracker -- those are out of scope (§4.M Non-goals).

use mitm_protocol::Packet;
use mitm_protocol::packets::{TabCompleteRequest, TabCompleteResponse};

use crate::packet_mitm::PacketMitm;

/// Ask the server to complete `text` and return the suggested completions.
///
/// This sends a single `TabCompleteRequest` to the server and waits for the
/// next `TabCompleteResponse` the server sends back; it does not attempt to
/// correlate requests and responses beyond ordering, matching the protocol's
/// own lack of a request id on this packet pair.
///
/// # Errors
/// Returns [`crate::error::CoreError`] if the request write fails.
pub async fn request_completions(mitm: &PacketMitm, text: impl Into<String>) -> Result<Vec<String>, crate::error::CoreError> {
    mitm.write_to_server(Packet::TabCompleteRequest(TabCompleteRequest { text: text.into() })).await?;
    let response = mitm.wait_for(TabCompleteResponse::FQID).await;
    match response {
        Packet::TabCompleteResponse(response) => Ok(response.matches),
        other => {
            tracing::warn!(?other, "wait_for(TabCompleteResponse) resolved with an unexpected variant");
            Ok(Vec::new())
        }
    }
}
