use std::io::{Read, Write};

use mitm_utils::serial::ByteArray;
use mitm_utils::{ReadFrom, VarInt, WriteTo};

use crate::state::{ConnectionState, Fqid, Side};

/// `LoginStart` (serverbound, login, 0x00): the client's claimed username.
/// Protocol 340 carries no UUID field here (that was added in later revisions).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginStart {
    /// The username the client claims.
    pub name: String,
}

impl LoginStart {
    /// This packet's fully-qualified id.
    pub const FQID: Fqid = Fqid::new(Side::Serverbound, ConnectionState::Login, 0x00);
}

impl ReadFrom for LoginStart {
    fn read(read: &mut impl Read) -> std::io::Result<Self> {
        Ok(Self {
            name: String::read(read)?,
        })
    }
}

impl WriteTo for LoginStart {
    fn write(&self, writer: &mut impl Write) -> std::io::Result<()> {
        self.name.write(writer)
    }
}

/// `EncryptionRequest` (clientbound, login, 0x01): the server's DER public
/// key and verify token, driving §4.J's key-forging pre-listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptionRequest {
    /// The server id string hashed into the auth digest (historically always empty).
    pub server_id: String,
    /// The real server's X.509 SubjectPublicKeyInfo DER blob.
    pub public_key: ByteArray,
    /// A server-chosen nonce echoed back (re-encrypted) in [`EncryptionResponse`].
    pub verify_token: ByteArray,
}

impl EncryptionRequest {
    /// This packet's fully-qualified id.
    pub const FQID: Fqid = Fqid::new(Side::Clientbound, ConnectionState::Login, 0x01);
}

impl ReadFrom for EncryptionRequest {
    fn read(read: &mut impl Read) -> std::io::Result<Self> {
        Ok(Self {
            server_id: String::read(read)?,
            public_key: ByteArray::read(read)?,
            verify_token: ByteArray::read(read)?,
        })
    }
}

impl WriteTo for EncryptionRequest {
    fn write(&self, writer: &mut impl Write) -> std::io::Result<()> {
        self.server_id.write(writer)?;
        self.public_key.write(writer)?;
        self.verify_token.write(writer)
    }
}

/// `EncryptionResponse` (serverbound, login, 0x01): the client's RSA-wrapped
/// shared secret and echoed verify token, driving §4.J's second pre-listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptionResponse {
    /// PKCS#1 v1.5 ciphertext of the client's chosen AES shared secret.
    pub shared_secret: ByteArray,
    /// PKCS#1 v1.5 ciphertext of the verify token the client was sent.
    pub verify_token: ByteArray,
}

impl EncryptionResponse {
    /// This packet's fully-qualified id.
    pub const FQID: Fqid = Fqid::new(Side::Serverbound, ConnectionState::Login, 0x01);
}

impl ReadFrom for EncryptionResponse {
    fn read(read: &mut impl Read) -> std::io::Result<Self> {
        Ok(Self {
            shared_secret: ByteArray::read(read)?,
            verify_token: ByteArray::read(read)?,
        })
    }
}

impl WriteTo for EncryptionResponse {
    fn write(&self, writer: &mut impl Write) -> std::io::Result<()> {
        self.shared_secret.write(writer)?;
        self.verify_token.write(writer)
    }
}

/// `LoginSuccess` (clientbound, login, 0x02): authentication completed, the
/// next packet either side sends is in the play state. Protocol 340 encodes
/// the account id as a hyphenated string rather than 16 raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginSuccess {
    /// Hyphenated account UUID.
    pub uuid: String,
    /// The authenticated username.
    pub username: String,
}

impl LoginSuccess {
    /// This packet's fully-qualified id.
    pub const FQID: Fqid = Fqid::new(Side::Clientbound, ConnectionState::Login, 0x02);
}

impl ReadFrom for LoginSuccess {
    fn read(read: &mut impl Read) -> std::io::Result<Self> {
        Ok(Self {
            uuid: String::read(read)?,
            username: String::read(read)?,
        })
    }
}

impl WriteTo for LoginSuccess {
    fn write(&self, writer: &mut impl Write) -> std::io::Result<()> {
        self.uuid.write(writer)?;
        self.username.write(writer)
    }
}

/// `SetCompression` (clientbound, login, 0x03): arms compression on both
/// streams once forwarded and processed (§4.I "Post-SetCompression").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetCompression {
    /// The compression threshold; negative disables compression (§4.E).
    pub threshold: VarInt,
}

impl SetCompression {
    /// This packet's fully-qualified id.
    pub const FQID: Fqid = Fqid::new(Side::Clientbound, ConnectionState::Login, 0x03);
}

impl ReadFrom for SetCompression {
    fn read(read: &mut impl Read) -> std::io::Result<Self> {
        Ok(Self {
            threshold: VarInt::read(read)?,
        })
    }
}

impl WriteTo for SetCompression {
    fn write(&self, writer: &mut impl Write) -> std::io::Result<()> {
        self.threshold.write(writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn round_trip<T: ReadFrom + WriteTo + PartialEq + std::fmt::Debug>(value: T) {
        let mut buf = Vec::new();
        value.write(&mut buf).unwrap();
        let mut cursor = Cursor::new(buf);
        assert_eq!(T::read(&mut cursor).unwrap(), value);
    }

    #[test]
    fn login_start_round_trips() {
        round_trip(LoginStart {
            name: "Notch".to_string(),
        });
    }

    #[test]
    fn encryption_request_round_trips() {
        round_trip(EncryptionRequest {
            server_id: String::new(),
            public_key: ByteArray(vec![1, 2, 3, 4]),
            verify_token: ByteArray(vec![5, 6, 7, 8]),
        });
    }

    #[test]
    fn encryption_response_round_trips() {
        round_trip(EncryptionResponse {
            shared_secret: ByteArray(vec![0u8; 128]),
            verify_token: ByteArray(vec![1, 2, 3, 4]),
        });
    }

    #[test]
    fn login_success_round_trips() {
        round_trip(LoginSuccess {
            uuid: "069a79f4-44e9-4726-a5be-fca90e38aaf5".to_string(),
            username: "Notch".to_string(),
        });
    }

    #[test]
    fn set_compression_round_trips() {
        round_trip(SetCompression {
            threshold: VarInt(256),
        });
        round_trip(SetCompression {
            threshold: VarInt(-1),
        });
    }
}
