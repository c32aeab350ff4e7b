//! The MITM driver logic: the event bus, the packet-level forward loop and
//! its state-transition listeners (§4.I), the public-key MITM (§4.J), the
//! HTTP join-patcher (§4.K), the cross-subsystem replacement-hash handoff
//! (§5), and the reusable await-matching-response helper built on top of the
//! event bus (§4.M). This crate wires `mitm-protocol`, `mitm-crypto`, and
//! `mitm-net` together into one running MITM session; it does not load
//! configuration or install logging -- that is the `mitm` binary's job.

/// Fallible operations across the packet MITM, the HTTP patcher, and their composition.
pub mod error;
/// The per-session listener table and one-shot waiter registry (§4.H).
pub mod event_bus;
/// The HTTP join-patcher (§4.K).
pub mod http_patch;
/// The packet MITM core: two framed streams, the forward loops, and the
/// core's own state-transition listeners (§4.I).
pub mod packet_mitm;
/// The public-key MITM (§4.J).
pub mod pk_mitm;
/// The single-slot replacement-hash handoff between the PK MITM and the
/// HTTP join-patcher (§5, §9).
pub mod replacement_slot;
/// The generic await-matching-response helper, exercised here via tab-complete (§4.M).
pub mod tab_complete;

pub use error::{CoreError, HttpPatchError};
pub use event_bus::{EventBus, PacketContext};
pub use packet_mitm::PacketMitm;
pub use replacement_slot::ReplacementSlot;
