/// Errors raised while parsing and patching the HTTP join request (§4.K).
#[derive(Debug, thiserror::Error)]
pub enum HttpPatchError {
    /// No `Content-Length` header was present; chunked transfer is unsupported.
    #[error("missing Content-Length header (chunked transfer is unsupported)")]
    MissingContentLength,
    /// A header line had no `:` separator.
    #[error("malformed header line: {0:?}")]
    MalformedHeader(String),
    /// The client's compact re-serialization of its own JSON body didn't
    /// round-trip byte-for-byte (§4.K step 4).
    #[error("client JSON does not round-trip through compact re-serialization")]
    JsonMismatch,
    /// No replacement hash was available in the slot for this join request.
    #[error("no replacement hash is available for this join request")]
    MissingReplacementHash,
    /// The request body was not valid JSON.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    /// The underlying transport returned an I/O error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Top-level error composing every fallible seam the packet MITM core and the
/// HTTP join-patcher cross (§7: protocol error, crypto error, decode error).
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// A framed packet stream failed to decode or encode.
    #[error(transparent)]
    Protocol(#[from] mitm_protocol::ProtocolError),
    /// A transport-level surface (SOCKS5, the raw pipe) failed.
    #[error(transparent)]
    Net(#[from] mitm_net::NetError),
    /// An RSA forging/decryption operation failed.
    #[error(transparent)]
    Crypt(#[from] mitm_crypto::CryptError),
    /// The HTTP join-patcher failed to parse or patch a request.
    #[error(transparent)]
    HttpPatch(#[from] HttpPatchError),
    /// A spawned forward-loop task panicked.
    #[error("mitm task panicked: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl CoreError {
    /// Adapt to [`mitm_net::NetError`] so a core-level session fits the
    /// `InterceptFn` signature `mitm-net`'s interceptor loop expects. The
    /// message is preserved; the original variant is not (this crate's own
    /// logging captures the original error before this conversion happens).
    #[must_use]
    pub fn into_net_error(self) -> mitm_net::NetError {
        mitm_net::NetError::Io(std::io::Error::other(self.to_string()))
    }
}
