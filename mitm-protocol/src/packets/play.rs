use std::io::{Read, Write};

use mitm_utils::{ReadFrom, WriteTo};

use crate::state::{ConnectionState, Fqid, Side};

/// `TabCompleteRequest` (serverbound, play, 0x01): the partial command text
/// the client wants completions for. Used by component M to poll the player
/// list over the intercepted channel; carries no position/looked-at-block
/// fields since this core only ever issues bare text completions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabCompleteRequest {
    /// The partial text to complete (e.g. `"/tell "` to enumerate players).
    pub text: String,
}

impl TabCompleteRequest {
    /// This packet's fully-qualified id.
    pub const FQID: Fqid = Fqid::new(Side::Serverbound, ConnectionState::Play, 0x01);
}

impl ReadFrom for TabCompleteRequest {
    fn read(read: &mut impl Read) -> std::io::Result<Self> {
        Ok(Self {
            text: String::read(read)?,
        })
    }
}

impl WriteTo for TabCompleteRequest {
    fn write(&self, writer: &mut impl Write) -> std::io::Result<()> {
        self.text.write(writer)
    }
}

/// `TabCompleteResponse` (clientbound, play, 0x0E): the matching completions.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TabCompleteResponse {
    /// Suggested completions, in server-chosen order.
    pub matches: Vec<String>,
}

impl TabCompleteResponse {
    /// This packet's fully-qualified id.
    pub const FQID: Fqid = Fqid::new(Side::Clientbound, ConnectionState::Play, 0x0E);
}

impl ReadFrom for TabCompleteResponse {
    fn read(read: &mut impl Read) -> std::io::Result<Self> {
        Ok(Self {
            matches: Vec::<String>::read(read)?,
        })
    }
}

impl WriteTo for TabCompleteResponse {
    fn write(&self, writer: &mut impl Write) -> std::io::Result<()> {
        self.matches.write(writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn tab_complete_response_round_trips() {
        let resp = TabCompleteResponse {
            matches: vec!["Notch".to_string(), "jeb_".to_string()],
        };
        let mut buf = Vec::new();
        resp.write(&mut buf).unwrap();
        let mut cursor = Cursor::new(buf);
        assert_eq!(TabCompleteResponse::read(&mut cursor).unwrap(), resp);
    }

    #[test]
    fn tab_complete_response_empty_round_trips() {
        let resp = TabCompleteResponse::default();
        let mut buf = Vec::new();
        resp.write(&mut buf).unwrap();
        let mut cursor = Cursor::new(buf);
        assert_eq!(TabCompleteResponse::read(&mut cursor).unwrap(), resp);
    }
}
