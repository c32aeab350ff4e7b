//! The public-key MITM (§4.J): forges the `EncryptionRequest`'s public key so
//! the client encrypts its shared secret under a key this process holds the
//! private half of, while re-wrapping a freshly generated shared secret under
//! the real server's key so the server never sees the client's own secret.
//! Also computes the replacement auth digest the HTTP join-patcher (§4.K)
//! substitutes into the session-join request, and hands it off through a
//! [`ReplacementSlot`].

use std::sync::Arc;

use mitm_crypto::{KeyStore, decode_public_key_der, encrypt_pkcs1v15, generate_shared_secret, redacted_hex, server_hash, signed_hex_digest};
use mitm_protocol::Packet;
use mitm_protocol::packets::{EncryptionRequest, EncryptionResponse};
use mitm_utils::serial::ByteArray;
use parking_lot::Mutex;
use tracing::{debug, error, warn};

use crate::packet_mitm::PacketMitm;
use crate::replacement_slot::ReplacementSlot;

/// Scratch state threaded between the two `EncryptionRequest`/`EncryptionResponse`
/// pre-listeners and the post-listener that arms encryption (§4.J): the
/// client's own shared secret (decrypted under the forged key) and the fresh
/// secret re-wrapped for the real server, plus the verify-token replacement
/// that keeps the server's echo check satisfied.
#[derive(Default)]
struct PkMitmState {
    cli_shared_secret: Option<[u8; 16]>,
    srv_shared_secret: Option<[u8; 16]>,
    verify_token_replacement: Option<ByteArray>,
}

/// Install the three listeners that carry out the public-key MITM: a
/// pre-`EncryptionRequest` listener that forges the server's key and derives
/// the replacement auth digest, a pre-`EncryptionResponse` listener that
/// recovers the client's secret and substitutes the server-bound replacement,
/// and a post-`EncryptionResponse` listener that arms encryption on both
/// streams once both secrets are known (§4.J, §8 scenario 5).
pub fn install_pk_mitm_listeners(mitm: &Arc<PacketMitm>, key_store: Arc<KeyStore>, replacement_slot: Arc<ReplacementSlot>) {
    let state = Arc::new(Mutex::new(PkMitmState::default()));

    let forging_state = Arc::clone(&state);
    let forging_key_store = Arc::clone(&key_store);
    mitm.add_pre_listener(EncryptionRequest::FQID, move |ctx| {
        let Packet::EncryptionRequest(request) = &mut ctx.packet else { return };

        let real_public_key = match decode_public_key_der(&request.public_key.0) {
            Ok(key) => key,
            Err(error) => {
                error!(%error, "failed to decode real server public key, dropping connection");
                ctx.drop = true;
                return;
            }
        };

        let srv_shared_secret = generate_shared_secret();
        debug!(srv_shared_secret = %redacted_hex(&srv_shared_secret), "forged a fresh server-bound shared secret");
        let digest = server_hash(&request.server_id, &srv_shared_secret, &request.public_key.0);
        replacement_slot.set(signed_hex_digest(digest));

        let verify_token_replacement = match encrypt_pkcs1v15(&real_public_key, &request.verify_token.0) {
            Ok(ciphertext) => ByteArray(ciphertext),
            Err(error) => {
                error!(%error, "failed to re-encrypt verify token under the real server key, dropping connection");
                ctx.drop = true;
                return;
            }
        };

        {
            let mut state = forging_state.lock();
            state.srv_shared_secret = Some(srv_shared_secret);
            state.verify_token_replacement = Some(verify_token_replacement);
        }

        request.public_key = ByteArray(forging_key_store.public_key_der.clone());
    });

    let response_state = Arc::clone(&state);
    let response_key_store = Arc::clone(&key_store);
    mitm.add_pre_listener(EncryptionResponse::FQID, move |ctx| {
        let Packet::EncryptionResponse(response) = &mut ctx.packet else { return };

        let cli_secret_bytes = match response_key_store.decrypt(&response.shared_secret.0) {
            Ok(bytes) => bytes,
            Err(error) => {
                error!(%error, "failed to decrypt the client's shared secret, dropping connection");
                ctx.drop = true;
                return;
            }
        };
        let cli_shared_secret: [u8; 16] = match cli_secret_bytes.try_into() {
            Ok(key) => key,
            Err(bytes) => {
                error!(len = bytes.len(), "client shared secret was not 16 bytes, dropping connection");
                ctx.drop = true;
                return;
            }
        };
        debug!(cli_shared_secret = %redacted_hex(&cli_shared_secret), "recovered the client's shared secret");

        let mut state = response_state.lock();
        state.cli_shared_secret = Some(cli_shared_secret);
        let Some(srv_shared_secret) = state.srv_shared_secret else {
            error!("EncryptionResponse arrived with no forged server secret on record, dropping connection");
            ctx.drop = true;
            return;
        };
        let Some(verify_token_replacement) = state.verify_token_replacement.clone() else {
            error!("EncryptionResponse arrived with no verify token replacement on record, dropping connection");
            ctx.drop = true;
            return;
        };

        response.shared_secret = ByteArray(srv_shared_secret.to_vec());
        response.verify_token = verify_token_replacement;
    });

    let cli_handle = mitm.client_handle();
    let srv_handle = mitm.server_handle();
    mitm.add_post_listener(EncryptionResponse::FQID, move |_packet| {
        let state = state.lock();
        match (state.cli_shared_secret, state.srv_shared_secret) {
            (Some(cli_key), Some(srv_key)) => {
                cli_handle.enable_encryption(cli_key);
                srv_handle.enable_encryption(srv_key);
            }
            _ => warn!("EncryptionResponse forwarded with incomplete key state, encryption not armed"),
        }
    });
}
