//! The event bus (§4.H): keyed listener sets dispatched synchronously in
//! pre- and post-forward phases around a single packet write, plus a
//! one-shot `wait_for` so a task can rendezvous on the next post-event for a
//! given FQID (used by §4.I's compression-arming race guard and §4.M's
//! generic response-await helper).
//!
//! Concurrent dispatch safety is not required (§4.H): every `dispatch_pre`/
//! `dispatch_post` call for one MITM session originates from that session's
//! own two forward-loop tasks, never from an external caller mutating the
//! listener table mid-dispatch.

use std::collections::HashMap;

use mitm_protocol::{Fqid, Packet};
use parking_lot::Mutex;
use tokio::sync::oneshot;

/// A packet in flight through one direction of the forward loop, carrying
/// the source's `event_data["drop"]` scratch flag (§3 "Packet") as a plain
/// field: a pre-listener that sets `drop = true` suppresses the forward
/// write and the post-dispatch that would otherwise follow it.
pub struct PacketContext {
    /// The packet as decoded, mutable in place by pre-listeners.
    pub packet: Packet,
    /// Set by a pre-listener to suppress forwarding this packet.
    pub drop: bool,
}

type PreListener = Box<dyn FnMut(&mut PacketContext) + Send>;
type PostListener = Box<dyn Fn(&Packet) + Send + Sync>;

#[derive(Default)]
struct Listeners {
    pre: HashMap<Fqid, Vec<PreListener>>,
    post: HashMap<Fqid, Vec<PostListener>>,
    waiters: HashMap<Fqid, Vec<oneshot::Sender<Packet>>>,
}

/// One MITM session's listener table and one-shot waiter registry.
#[derive(Default)]
pub struct EventBus {
    inner: Mutex<Listeners>,
}

impl EventBus {
    /// A fresh bus with no listeners registered.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pre-forward listener for `fqid`. Pre-listeners run
    /// synchronously and in registration order, with the chance to mutate
    /// the packet (or set `drop`) before it is written downstream (§9
    /// "Pre-listener synchronous mutation").
    pub fn add_pre_listener(&self, fqid: Fqid, listener: impl FnMut(&mut PacketContext) + Send + 'static) {
        self.inner.lock().pre.entry(fqid).or_default().push(Box::new(listener));
    }

    /// Register a post-forward listener for `fqid`, invoked read-only after
    /// the packet has already been written (or dropped).
    pub fn add_post_listener(&self, fqid: Fqid, listener: impl Fn(&Packet) + Send + Sync + 'static) {
        self.inner.lock().post.entry(fqid).or_default().push(Box::new(listener));
    }

    /// Run every pre-listener registered for `ctx.packet`'s FQID, in
    /// registration order.
    pub fn dispatch_pre(&self, ctx: &mut PacketContext) {
        let fqid = ctx.packet.fqid();
        let mut guard = self.inner.lock();
        if let Some(listeners) = guard.pre.get_mut(&fqid) {
            for listener in listeners {
                listener(ctx);
            }
        }
    }

    /// Run every post-listener registered for `packet`'s FQID and wake any
    /// task waiting on this FQID via [`Self::wait_for`].
    pub fn dispatch_post(&self, packet: &Packet) {
        let fqid = packet.fqid();
        let waiters = {
            let mut guard = self.inner.lock();
            if let Some(listeners) = guard.post.get(&fqid) {
                for listener in listeners {
                    listener(packet);
                }
            }
            guard.waiters.remove(&fqid).unwrap_or_default()
        };
        for tx in waiters {
            let _ = tx.send(packet.clone());
        }
    }

    /// Wait for the next post-dispatch at `fqid`, returning the packet that
    /// triggered it. Multiple tasks may wait on the same FQID concurrently;
    /// each is woken with its own copy of the next matching packet.
    pub async fn wait_for(&self, fqid: Fqid) -> Packet {
        let rx = {
            let (tx, rx) = oneshot::channel();
            self.inner.lock().waiters.entry(fqid).or_default().push(tx);
            rx
        };
        rx.await.expect("event bus dropped before the awaited event fired")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mitm_protocol::packets::{Handshake, TabCompleteResponse};
    use mitm_utils::VarInt;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn handshake() -> Packet {
        Packet::Handshake(Handshake {
            protocol_version: VarInt(340),
            server_address: "example.com".to_string(),
            server_port: 25565,
            next_state: VarInt(2),
        })
    }

    #[test]
    fn pre_listener_can_mutate_and_drop() {
        let bus = EventBus::new();
        bus.add_pre_listener(Handshake::FQID, |ctx| {
            if let Packet::Handshake(h) = &mut ctx.packet {
                h.server_port = 1;
            }
            ctx.drop = true;
        });
        let mut ctx = PacketContext { packet: handshake(), drop: false };
        bus.dispatch_pre(&mut ctx);
        assert!(ctx.drop);
        match ctx.packet {
            Packet::Handshake(h) => assert_eq!(h.server_port, 1),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn post_listener_fires_in_registration_order() {
        let bus = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        let a = Arc::clone(&order);
        bus.add_post_listener(Handshake::FQID, move |_| a.lock().push(1));
        let b = Arc::clone(&order);
        bus.add_post_listener(Handshake::FQID, move |_| b.lock().push(2));
        bus.dispatch_post(&handshake());
        assert_eq!(*order.lock(), vec![1, 2]);
    }

    #[tokio::test]
    async fn wait_for_resolves_on_matching_post_dispatch() {
        let bus = Arc::new(EventBus::new());
        let waiter_bus = Arc::clone(&bus);
        let fired = Arc::new(AtomicBool::new(false));
        let fired2 = Arc::clone(&fired);
        let waiter = tokio::spawn(async move {
            let packet = waiter_bus.wait_for(TabCompleteResponse::FQID).await;
            fired2.store(true, Ordering::SeqCst);
            packet
        });

        tokio::task::yield_now().await;
        assert!(!fired.load(Ordering::SeqCst));

        let response = Packet::TabCompleteResponse(TabCompleteResponse {
            matches: vec!["Notch".to_string()],
        });
        bus.dispatch_post(&response);

        let resolved = waiter.await.unwrap();
        assert_eq!(resolved, response);
        assert!(fired.load(Ordering::SeqCst));
    }

    #[test]
    fn dispatch_without_listeners_is_a_no_op() {
        let bus = EventBus::new();
        let mut ctx = PacketContext { packet: handshake(), drop: false };
        bus.dispatch_pre(&mut ctx);
        bus.dispatch_post(&ctx.packet);
        assert!(!ctx.drop);
    }
}
