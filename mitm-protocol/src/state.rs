/// Connection lifecycle phase governing which packet ids are legal (§3).
///
/// Only `Handshaking`, `Login`, and `Play` are ever entered by protocol 340;
/// `Transfer` and `Configuration` exist for forward compatibility with later
/// revisions and are unreachable here.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Before the client has declared its intent (status ping or login).
    Handshaking,
    /// Server-list ping.
    Status,
    /// Authentication and encryption/compression setup.
    Login,
    /// Forward-compatibility placeholder; unreachable in protocol 340.
    Transfer,
    /// Forward-compatibility placeholder; unreachable in protocol 340.
    Configuration,
    /// Normal gameplay.
    Play,
}

/// Direction of a packet relative to the origin server (GLOSSARY).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Side {
    /// Server to client.
    Clientbound,
    /// Client to server.
    Serverbound,
}

/// A wire protocol revision. This core targets the single value 340 (§3).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ProtocolVersion(pub i32);

impl ProtocolVersion {
    /// Protocol revision 340, corresponding to client version 1.12.2.
    pub const V340: ProtocolVersion = ProtocolVersion(340);
}

/// Fully-qualified packet identifier: the triple (side, state, id) (GLOSSARY).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Fqid {
    /// Direction this packet travels.
    pub side: Side,
    /// Connection state this packet is legal in.
    pub state: ConnectionState,
    /// The protocol-specific numeric packet id within (side, state).
    pub id: i32,
}

impl Fqid {
    /// Construct a new FQID.
    #[must_use]
    pub const fn new(side: Side, state: ConnectionState, id: i32) -> Self {
        Self { side, state, id }
    }
}
