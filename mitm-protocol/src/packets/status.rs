use std::io::{Read, Write};

use mitm_utils::{ReadFrom, WriteTo};

use crate::state::{ConnectionState, Fqid, Side};

/// `StatusRequest` (serverbound, status, 0x00): empty body, asks for the
/// server-list JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusRequest;

impl StatusRequest {
    /// This packet's fully-qualified id.
    pub const FQID: Fqid = Fqid::new(Side::Serverbound, ConnectionState::Status, 0x00);
}

impl ReadFrom for StatusRequest {
    fn read(_read: &mut impl Read) -> std::io::Result<Self> {
        Ok(Self)
    }
}

impl WriteTo for StatusRequest {
    fn write(&self, _writer: &mut impl Write) -> std::io::Result<()> {
        Ok(())
    }
}

/// `StatusResponse` (clientbound, status, 0x00): the server-list JSON payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusResponse {
    /// The raw JSON document describing version, players, description, favicon.
    pub json: String,
}

impl StatusResponse {
    /// This packet's fully-qualified id.
    pub const FQID: Fqid = Fqid::new(Side::Clientbound, ConnectionState::Status, 0x00);
}

impl ReadFrom for StatusResponse {
    fn read(read: &mut impl Read) -> std::io::Result<Self> {
        Ok(Self {
            json: String::read(read)?,
        })
    }
}

impl WriteTo for StatusResponse {
    fn write(&self, writer: &mut impl Write) -> std::io::Result<()> {
        self.json.write(writer)
    }
}

/// `PingRequest` (serverbound, status, 0x01): an opaque payload to be echoed back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PingRequest {
    /// Client-chosen opaque payload.
    pub payload: i64,
}

impl PingRequest {
    /// This packet's fully-qualified id.
    pub const FQID: Fqid = Fqid::new(Side::Serverbound, ConnectionState::Status, 0x01);
}

impl ReadFrom for PingRequest {
    fn read(read: &mut impl Read) -> std::io::Result<Self> {
        Ok(Self {
            payload: i64::read(read)?,
        })
    }
}

impl WriteTo for PingRequest {
    fn write(&self, writer: &mut impl Write) -> std::io::Result<()> {
        self.payload.write(writer)
    }
}

/// `PingResponse` (clientbound, status, 0x01): the echoed payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PingResponse {
    /// The payload as received in the matching [`PingRequest`].
    pub payload: i64,
}

impl PingResponse {
    /// This packet's fully-qualified id.
    pub const FQID: Fqid = Fqid::new(Side::Clientbound, ConnectionState::Status, 0x01);
}

impl ReadFrom for PingResponse {
    fn read(read: &mut impl Read) -> std::io::Result<Self> {
        Ok(Self {
            payload: i64::read(read)?,
        })
    }
}

impl WriteTo for PingResponse {
    fn write(&self, writer: &mut impl Write) -> std::io::Result<()> {
        self.payload.write(writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn status_response_round_trips() {
        let resp = StatusResponse {
            json: r#"{"version":{"name":"1.12.2","protocol":340}}"#.to_string(),
        };
        let mut buf = Vec::new();
        resp.write(&mut buf).unwrap();
        let mut cursor = Cursor::new(buf);
        assert_eq!(StatusResponse::read(&mut cursor).unwrap(), resp);
    }

    #[test]
    fn ping_round_trips() {
        let req = PingRequest { payload: -42 };
        let mut buf = Vec::new();
        req.write(&mut buf).unwrap();
        let mut cursor = Cursor::new(buf);
        assert_eq!(PingRequest::read(&mut cursor).unwrap(), req);
    }
}
