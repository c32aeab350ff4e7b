//! The packet registry (§4.D): maps `(protocol, side, state, id)` to a known
//! schema, enumerated once at startup from the compiled-in packet types.
//! Unknown ids decode as [`crate::packets::UnknownPacket`] instead of failing.

use std::collections::HashSet;
use std::io::Cursor;

use crate::error::ProtocolError;
use crate::packets::{self, Packet, UnknownPacket};
use crate::state::{Fqid, ProtocolVersion};

/// The read-only registry of known packet FQIDs for a single protocol
/// version. Built once at startup (§3 "The registry is read-only after
/// startup; no concurrent mutation").
#[derive(Debug)]
pub struct Registry {
    protocol: ProtocolVersion,
    known: HashSet<Fqid>,
}

impl Registry {
    /// Enumerate every compiled-in schema for `protocol` and build the
    /// registry. This core only ships schemas for [`ProtocolVersion::V340`];
    /// constructing a registry for any other version is still accepted, it
    /// will simply decode everything as [`UnknownPacket`].
    ///
    /// # Errors
    /// Returns [`ProtocolError::DuplicateRegistration`] if two compiled-in
    /// schemas claim the same FQID -- a process-fatal configuration error.
    pub fn build(protocol: ProtocolVersion) -> Result<Self, ProtocolError> {
        use crate::packets::{
            EncryptionRequest, EncryptionResponse, Handshake, LoginStart, LoginSuccess,
            PingRequest, PingResponse, SetCompression, StatusRequest, StatusResponse,
            TabCompleteRequest, TabCompleteResponse,
        };

        let fqids = [
            Handshake::FQID,
            StatusRequest::FQID,
            StatusResponse::FQID,
            PingRequest::FQID,
            PingResponse::FQID,
            LoginStart::FQID,
            EncryptionRequest::FQID,
            EncryptionResponse::FQID,
            LoginSuccess::FQID,
            SetCompression::FQID,
            TabCompleteRequest::FQID,
            TabCompleteResponse::FQID,
        ];

        let mut known = HashSet::with_capacity(fqids.len());
        for fqid in fqids {
            if !known.insert(fqid) {
                return Err(ProtocolError::DuplicateRegistration(fqid));
            }
        }

        Ok(Self { protocol, known })
    }

    /// The protocol version this registry was built for.
    #[must_use]
    pub fn protocol(&self) -> ProtocolVersion {
        self.protocol
    }

    /// Whether `fqid` has a registered schema.
    #[must_use]
    pub fn contains(&self, fqid: Fqid) -> bool {
        self.known.contains(&fqid)
    }

    /// Decode one packet body (id already parsed out) at `fqid`. Falls back
    /// to [`UnknownPacket`] when no schema is registered for `fqid` (§4.D,
    /// §7 "Unknown packet: non-fatal").
    ///
    /// # Errors
    /// Returns [`ProtocolError::SchemaDecode`] if a known schema's fields
    /// fail to decode.
    pub fn decode(&self, fqid: Fqid, body: &[u8]) -> Result<Packet, ProtocolError> {
        if !self.known.contains(&fqid) {
            return Ok(Packet::Unknown(UnknownPacket {
                fqid,
                payload: body.to_vec(),
            }));
        }
        let mut cursor = Cursor::new(body);
        packets::decode_known(fqid, &mut cursor).map_err(|source| ProtocolError::SchemaDecode {
            fqid,
            source,
        })
    }
}
