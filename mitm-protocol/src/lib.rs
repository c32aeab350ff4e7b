//! The blocky-sandbox wire protocol at revision 340: packet schemas, the
//! (side, state, id) registry (§4.D), and the framed packet stream that
//! layers compression and the tagged-variant [`packets::Packet`] on top of
//! `mitm-crypto`'s optional-CFB byte stream (§4.E).

/// Fallible operations across framing, decoding, and registration.
pub mod error;
/// The framed packet stream: length-prefixing, compression, read/write paths (§4.E).
pub mod framed;
/// Concrete packet schemas and the [`packets::Packet`] tagged union.
pub mod packets;
/// The (protocol, side, state, id) → schema registry (§4.D).
pub mod registry;
/// Connection state, side, protocol version, and FQID (§3).
pub mod state;

pub use error::ProtocolError;
pub use framed::{FramedPacketStream, FramedReadHalf, FramedWriteHalf, StreamHandle};
pub use packets::Packet;
pub use registry::Registry;
pub use state::{ConnectionState, Fqid, ProtocolVersion, Side};
