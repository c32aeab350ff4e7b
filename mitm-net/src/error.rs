/// Errors raised by the inbound/outbound transport surfaces (§7: protocol
/// error, transport error).
#[derive(Debug, thiserror::Error)]
pub enum NetError {
    /// The underlying transport returned an I/O error.
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),
    /// A SOCKS5 message did not start with version byte `0x05`.
    #[error("SOCKS5 version mismatch: expected 0x05, got {0:#04x}")]
    VersionMismatch(u8),
    /// The proxy offered `0xFF`: no method it and we both support.
    #[error("SOCKS5 proxy offered no acceptable authentication method")]
    NoAcceptableAuthMethod,
    /// The proxy chose an auth method other than "no auth" (`0x00`).
    #[error("SOCKS5 proxy selected unsupported authentication method {0:#04x}")]
    UnsupportedAuthMethod(u8),
    /// The SOCKS5 CONNECT request was refused; carries the RFC 1928 status string.
    #[error("SOCKS5 request failed: {0}")]
    RequestFailed(&'static str),
    /// An inbound or outbound SOCKS5 frame used an address type this core doesn't handle.
    #[error("SOCKS5 address type {0:#04x} is not implemented")]
    UnsupportedAddressType(u8),
}

impl NetError {
    /// Map an RFC 1928 `REP` status byte to its canonical string, or
    /// `Ok(())` for `0x00` (succeeded).
    pub(crate) fn from_reply_status(status: u8) -> Result<(), Self> {
        let message = match status {
            0x00 => return Ok(()),
            0x01 => "general SOCKS server failure",
            0x02 => "connection not allowed by ruleset",
            0x03 => "network unreachable",
            0x04 => "host unreachable",
            0x05 => "connection refused",
            0x06 => "TTL expired",
            0x07 => "command not supported",
            0x08 => "address type not supported",
            _ => "unassigned",
        };
        Err(Self::RequestFailed(message))
    }
}
