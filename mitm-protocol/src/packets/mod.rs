//! Concrete packet schemas (§3 "Wire types", §4.D) and the [`Packet`] tagged
//! union that stands in for the source's dynamic field-name → value mapping
//! (§9 "Dynamic packet-data mapping → tagged variants").

/// `Handshake`.
pub mod handshake;
/// `LoginStart`, `EncryptionRequest`, `EncryptionResponse`, `LoginSuccess`, `SetCompression`.
pub mod login;
/// `TabCompleteRequest`, `TabCompleteResponse`.
pub mod play;
/// `StatusRequest`, `StatusResponse`, `PingRequest`, `PingResponse`.
pub mod status;

use std::io::{Cursor, Write};

use mitm_utils::WriteTo;

use crate::state::Fqid;

pub use handshake::Handshake;
pub use login::{EncryptionRequest, EncryptionResponse, LoginStart, LoginSuccess, SetCompression};
pub use play::{TabCompleteRequest, TabCompleteResponse};
pub use status::{PingRequest, PingResponse, StatusRequest, StatusResponse};

/// A packet whose id did not match any registered schema for its
/// (protocol, side, state). Carries only the fully-qualified id observed at
/// decode time and the raw trailing bytes after the id (§4.D, §7 "Unknown
/// packet: non-fatal; decoded as trailing-bytes and forwarded unchanged").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownPacket {
    /// The (side, state, id) under which this packet was observed.
    pub fqid: Fqid,
    /// The packet body exactly as read off the wire, id already stripped.
    pub payload: Vec<u8>,
}

/// The tagged union over every known schema plus [`UnknownPacket`]. This is
/// the in-memory representation of one decoded packet as it flows through
/// the event bus and the forward loop (§3 "Packet").
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    /// `Handshake`.
    Handshake(Handshake),
    /// `StatusRequest`.
    StatusRequest(StatusRequest),
    /// `StatusResponse`.
    StatusResponse(StatusResponse),
    /// `PingRequest`.
    PingRequest(PingRequest),
    /// `PingResponse`.
    PingResponse(PingResponse),
    /// `LoginStart`.
    LoginStart(LoginStart),
    /// `EncryptionRequest`.
    EncryptionRequest(EncryptionRequest),
    /// `EncryptionResponse`.
    EncryptionResponse(EncryptionResponse),
    /// `LoginSuccess`.
    LoginSuccess(LoginSuccess),
    /// `SetCompression`.
    SetCompression(SetCompression),
    /// `TabCompleteRequest`.
    TabCompleteRequest(TabCompleteRequest),
    /// `TabCompleteResponse`.
    TabCompleteResponse(TabCompleteResponse),
    /// A packet with no matching schema for this (protocol, side, state, id).
    Unknown(UnknownPacket),
}

impl Packet {
    /// The fully-qualified id of this packet, whether known or unknown.
    #[must_use]
    pub fn fqid(&self) -> Fqid {
        match self {
            Self::Handshake(_) => Handshake::FQID,
            Self::StatusRequest(_) => StatusRequest::FQID,
            Self::StatusResponse(_) => StatusResponse::FQID,
            Self::PingRequest(_) => PingRequest::FQID,
            Self::PingResponse(_) => PingResponse::FQID,
            Self::LoginStart(_) => LoginStart::FQID,
            Self::EncryptionRequest(_) => EncryptionRequest::FQID,
            Self::EncryptionResponse(_) => EncryptionResponse::FQID,
            Self::LoginSuccess(_) => LoginSuccess::FQID,
            Self::SetCompression(_) => SetCompression::FQID,
            Self::TabCompleteRequest(_) => TabCompleteRequest::FQID,
            Self::TabCompleteResponse(_) => TabCompleteResponse::FQID,
            Self::Unknown(u) => u.fqid,
        }
    }

    /// Serialize the packet id followed by its body (§4.E write path).
    ///
    /// # Errors
    /// Propagates any I/O error from `writer`.
    pub fn write_body(&self, writer: &mut impl Write) -> std::io::Result<()> {
        match self {
            Self::Handshake(p) => write_with_id(writer, Handshake::FQID.id, p),
            Self::StatusRequest(p) => write_with_id(writer, StatusRequest::FQID.id, p),
            Self::StatusResponse(p) => write_with_id(writer, StatusResponse::FQID.id, p),
            Self::PingRequest(p) => write_with_id(writer, PingRequest::FQID.id, p),
            Self::PingResponse(p) => write_with_id(writer, PingResponse::FQID.id, p),
            Self::LoginStart(p) => write_with_id(writer, LoginStart::FQID.id, p),
            Self::EncryptionRequest(p) => write_with_id(writer, EncryptionRequest::FQID.id, p),
            Self::EncryptionResponse(p) => write_with_id(writer, EncryptionResponse::FQID.id, p),
            Self::LoginSuccess(p) => write_with_id(writer, LoginSuccess::FQID.id, p),
            Self::SetCompression(p) => write_with_id(writer, SetCompression::FQID.id, p),
            Self::TabCompleteRequest(p) => write_with_id(writer, TabCompleteRequest::FQID.id, p),
            Self::TabCompleteResponse(p) => write_with_id(writer, TabCompleteResponse::FQID.id, p),
            Self::Unknown(u) => write_with_id(writer, u.fqid.id, &RawBody(&u.payload)),
        }
    }
}

struct RawBody<'a>(&'a [u8]);

impl WriteTo for RawBody<'_> {
    fn write(&self, writer: &mut impl Write) -> std::io::Result<()> {
        writer.write_all(self.0)
    }
}

fn write_with_id(writer: &mut impl Write, id: i32, body: &impl WriteTo) -> std::io::Result<()> {
    mitm_utils::VarInt(id).write(writer)?;
    body.write(writer)
}

/// Decode a packet body (id already stripped) given the resolved schema
/// FQID, falling back to [`UnknownPacket`] for `None`.
pub(crate) fn decode_known(fqid: Fqid, body: &mut Cursor<&[u8]>) -> std::io::Result<Packet> {
    use mitm_utils::ReadFrom;
    use crate::state::{ConnectionState as S, Side as D};

    Ok(match (fqid.side, fqid.state, fqid.id) {
        (D::Serverbound, S::Handshaking, 0x00) => Packet::Handshake(Handshake::read(body)?),
        (D::Serverbound, S::Status, 0x00) => Packet::StatusRequest(StatusRequest::read(body)?),
        (D::Clientbound, S::Status, 0x00) => Packet::StatusResponse(StatusResponse::read(body)?),
        (D::Serverbound, S::Status, 0x01) => Packet::PingRequest(PingRequest::read(body)?),
        (D::Clientbound, S::Status, 0x01) => Packet::PingResponse(PingResponse::read(body)?),
        (D::Serverbound, S::Login, 0x00) => Packet::LoginStart(LoginStart::read(body)?),
        (D::Clientbound, S::Login, 0x01) => {
            Packet::EncryptionRequest(EncryptionRequest::read(body)?)
        }
        (D::Serverbound, S::Login, 0x01) => {
            Packet::EncryptionResponse(EncryptionResponse::read(body)?)
        }
        (D::Clientbound, S::Login, 0x02) => Packet::LoginSuccess(LoginSuccess::read(body)?),
        (D::Clientbound, S::Login, 0x03) => Packet::SetCompression(SetCompression::read(body)?),
        (D::Serverbound, S::Play, 0x01) => {
            Packet::TabCompleteRequest(TabCompleteRequest::read(body)?)
        }
        (D::Clientbound, S::Play, 0x0E) => {
            Packet::TabCompleteResponse(TabCompleteResponse::read(body)?)
        }
        _ => unreachable!("resolved schema FQID must match one of the arms above"),
    })
}
