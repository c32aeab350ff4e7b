//! Inbound/outbound TCP transport surfaces: SOCKS5 (§4.F), the raw
//! bidirectional pipe and generic interceptor loop (§4.G), and the small
//! byte-stream primitives (§4.A) the rest of this crate builds on.

/// Fallible transport operations.
pub mod error;
/// The generic accept/resolve/dial/intercept loop and its pluggable strategies.
pub mod interceptor;
/// Exact-length, line, and "whatever's available" reads over `AsyncRead`.
pub mod io_ext;
/// The default raw bidirectional byte pipe.
pub mod pipe;
/// SOCKS5 client and inbound server-side handshake.
pub mod socks5;

pub use error::NetError;
pub use interceptor::{InboundMethod, InterceptFn, OutboundMethod, intercept_fn, raw_pipe, run};
pub use pipe::bidirectional_pipe;
