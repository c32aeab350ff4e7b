use std::io::{Read, Write};

use mitm_utils::{ReadFrom, VarInt, WriteTo};

use crate::state::{ConnectionState, Fqid, Side};

/// `Handshake` (serverbound, handshaking, id 0x00): the first packet of every
/// connection, declaring the protocol version, target address, and the state
/// to transition into (§4.I, "Post-Handshake: set both streams' state to
/// `next_state`").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    /// The client's claimed protocol version.
    pub protocol_version: VarInt,
    /// The address the client believes it is connecting to.
    pub server_address: String,
    /// The address' port.
    pub server_port: u16,
    /// `1` for status, `2` for login.
    pub next_state: VarInt,
}

impl Handshake {
    /// This packet's fully-qualified id.
    pub const FQID: Fqid = Fqid::new(Side::Serverbound, ConnectionState::Handshaking, 0x00);

    /// The [`ConnectionState`] declared by [`Self::next_state`].
    #[must_use]
    pub fn next_connection_state(&self) -> Option<ConnectionState> {
        match self.next_state.0 {
            1 => Some(ConnectionState::Status),
            2 => Some(ConnectionState::Login),
            _ => None,
        }
    }
}

impl ReadFrom for Handshake {
    fn read(read: &mut impl Read) -> std::io::Result<Self> {
        Ok(Self {
            protocol_version: VarInt::read(read)?,
            server_address: String::read(read)?,
            server_port: u16::read(read)?,
            next_state: VarInt::read(read)?,
        })
    }
}

impl WriteTo for Handshake {
    fn write(&self, writer: &mut impl Write) -> std::io::Result<()> {
        self.protocol_version.write(writer)?;
        self.server_address.write(writer)?;
        self.server_port.write(writer)?;
        self.next_state.write(writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn round_trips() {
        let handshake = Handshake {
            protocol_version: VarInt(340),
            server_address: "example.com".to_string(),
            server_port: 25565,
            next_state: VarInt(2),
        };
        let mut buf = Vec::new();
        handshake.write(&mut buf).unwrap();
        let mut cursor = Cursor::new(buf);
        let read_back = Handshake::read(&mut cursor).unwrap();
        assert_eq!(read_back, handshake);
        assert_eq!(read_back.next_connection_state(), Some(ConnectionState::Login));
    }
}
