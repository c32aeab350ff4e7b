/// Errors raised while framing, decoding, or encoding packets (§7: decode error,
/// protocol error, configuration error).
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The underlying transport returned an I/O error (includes EOF on a short read).
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),
    /// A variable-length integer used more continuation bytes than allowed.
    #[error("malformed variable-length integer")]
    MalformedVarInt,
    /// A frame or field declared an impossible length (negative, or exceeding the frame).
    #[error("impossible length: {0}")]
    ImpossibleLength(i32),
    /// The compressed body did not decompress to the declared `data_length`.
    #[error("decompressed length mismatch: expected {expected}, got {actual}")]
    DecompressedLengthMismatch {
        /// Declared `data_length` read from the frame header.
        expected: usize,
        /// Actual number of bytes produced by decompression.
        actual: usize,
    },
    /// A known schema's field decode failed.
    #[error("schema decode failed for {fqid:?}: {source}")]
    SchemaDecode {
        /// The packet whose body failed to decode.
        fqid: crate::state::Fqid,
        /// Underlying I/O-shaped decode failure.
        #[source]
        source: std::io::Error,
    },
    /// Two schemas were registered under the same FQID (§4.D, process-fatal at startup).
    #[error("duplicate packet registration at {0:?}")]
    DuplicateRegistration(crate::state::Fqid),
    /// Compression was armed a second time, or outside the login state (§3 invariants).
    #[error("compression may only be armed once, during login")]
    CompressionAlreadyArmed,
}
