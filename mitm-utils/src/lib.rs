//! Wire-level primitives shared by the protocol and crypto crates: variable-length
//! integers, the synchronous `ReadFrom`/`WriteTo` codec traits, and the async
//! varint reader needed before a frame's length is fully known.

/// Variable-length integer codecs.
pub mod codec;
/// Synchronous read/write traits for fixed and length-prefixed wire types.
pub mod serial;

pub use codec::{VarInt, VarLong};
pub use serial::{ReadFrom, WriteTo};
