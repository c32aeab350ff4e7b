//! The packet MITM core (§4.I): runs two framed streams -- client-to-mitm and
//! mitm-to-server -- through a shared event bus, dispatching pre/post
//! listeners around each forward write and sequencing the SetCompression
//! race against LoginSuccess.

use std::sync::Arc;

use mitm_protocol::packets::{EncryptionResponse, Handshake, LoginSuccess, SetCompression};
use mitm_protocol::{ConnectionState, Fqid, FramedPacketStream, FramedReadHalf, FramedWriteHalf, Packet, ProtocolVersion, Registry, Side, StreamHandle};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, warn};

use crate::error::CoreError;
use crate::event_bus::{EventBus, PacketContext};

/// One packet-level MITM session (§5 "Separate connections are independent
/// task-groups"): the shared event bus plus both directions' write halves,
/// kept alive behind `Arc` for the lifetime of the session so that listeners
/// and the generic response-await helper (§4.M) can keep writing and waiting
/// after [`run`] has taken ownership of the read halves.
pub struct PacketMitm {
    bus: EventBus,
    cli_write: AsyncMutex<FramedWriteHalf<OwnedWriteHalf>>,
    srv_write: AsyncMutex<FramedWriteHalf<OwnedWriteHalf>>,
    cli_handle: StreamHandle,
    srv_handle: StreamHandle,
}

impl PacketMitm {
    /// Register a pre-forward listener for `fqid` (§4.H).
    pub fn add_pre_listener(&self, fqid: Fqid, listener: impl FnMut(&mut PacketContext) + Send + 'static) {
        self.bus.add_pre_listener(fqid, listener);
    }

    /// Register a post-forward listener for `fqid` (§4.H).
    pub fn add_post_listener(&self, fqid: Fqid, listener: impl Fn(&Packet) + Send + Sync + 'static) {
        self.bus.add_post_listener(fqid, listener);
    }

    /// The client-facing stream's connection-state/compression/encryption handle.
    #[must_use]
    pub fn client_handle(&self) -> StreamHandle {
        self.cli_handle.clone()
    }

    /// The server-facing stream's connection-state/compression/encryption handle.
    #[must_use]
    pub fn server_handle(&self) -> StreamHandle {
        self.srv_handle.clone()
    }

    /// Write `packet` to the server, dispatching pre/post listeners around
    /// the write exactly as the forward loop does for packets it reads from
    /// the client (§4.I `write_to_server`). Used by component M's
    /// request/response helper.
    ///
    /// # Errors
    /// Returns [`CoreError::Protocol`] if the write itself fails.
    pub async fn write_to_server(&self, packet: Packet) -> Result<(), CoreError> {
        self.write(&self.srv_write, packet).await
    }

    /// Write `packet` to the client, dispatching pre/post listeners around
    /// the write (§4.I `write_to_client`).
    ///
    /// # Errors
    /// Returns [`CoreError::Protocol`] if the write itself fails.
    pub async fn write_to_client(&self, packet: Packet) -> Result<(), CoreError> {
        self.write(&self.cli_write, packet).await
    }

    /// Wait for the next post-dispatch at `fqid` (§4.H `wait_for`, exposed
    /// for component M and any future listener that needs to rendezvous on a
    /// packet arriving on either direction).
    pub async fn wait_for(&self, fqid: Fqid) -> Packet {
        self.bus.wait_for(fqid).await
    }

    async fn write(
        &self,
        writer: &AsyncMutex<FramedWriteHalf<OwnedWriteHalf>>,
        packet: Packet,
    ) -> Result<(), CoreError> {
        let mut ctx = PacketContext { packet, drop: false };
        self.bus.dispatch_pre(&mut ctx);
        if !ctx.drop {
            writer.lock().await.write_packet(&ctx.packet).await?;
        }
        self.bus.dispatch_post(&ctx.packet);
        Ok(())
    }
}

/// Install the three state-transition post-listeners that belong to the core
/// itself, independent of any crypto MITM (§4.I "State transitions are
/// driven by post-listeners, not by the core"):
/// Post-Handshake sets both streams' state to the declared next state,
/// Post-LoginSuccess transitions both to play, and Post-SetCompression arms
/// compression on both with the declared threshold.
fn install_state_listeners(mitm: &Arc<PacketMitm>) {
    let cli = mitm.cli_handle.clone();
    let srv = mitm.srv_handle.clone();
    mitm.bus.add_post_listener(Handshake::FQID, move |packet| {
        let Packet::Handshake(handshake) = packet else { return };
        if let Some(state) = handshake.next_connection_state() {
            debug!(?state, "handshake declared next state");
            cli.set_state(state);
            srv.set_state(state);
        }
    });

    let cli = mitm.cli_handle.clone();
    let srv = mitm.srv_handle.clone();
    mitm.bus.add_post_listener(LoginSuccess::FQID, move |_packet| {
        debug!("login succeeded, transitioning both streams to play");
        cli.set_state(ConnectionState::Play);
        srv.set_state(ConnectionState::Play);
    });

    let cli = mitm.cli_handle.clone();
    let srv = mitm.srv_handle.clone();
    mitm.bus.add_post_listener(SetCompression::FQID, move |packet| {
        let Packet::SetCompression(set_compression) = packet else { return };
        let threshold = set_compression.threshold.0;
        if let Err(error) = cli.enable_compression(threshold) {
            warn!(%error, "client-side compression arm failed");
        }
        if let Err(error) = srv.enable_compression(threshold) {
            warn!(%error, "server-side compression arm failed");
        }
    });
}

/// Which physical connection a `recv_loop` forwards onto.
#[derive(Clone, Copy)]
enum ForwardTarget {
    Server,
    Client,
}

async fn recv_loop(mitm: Arc<PacketMitm>, mut readable: FramedReadHalf<OwnedReadHalf>, target: ForwardTarget) {
    loop {
        let packet = match readable.read_packet().await {
            Ok(packet) => packet,
            Err(error) => {
                debug!(%error, "recv_loop: packet read error (connection closed)");
                return;
            }
        };
        let fqid = packet.fqid();
        let write_result = match target {
            ForwardTarget::Server => mitm.write_to_server(packet).await,
            ForwardTarget::Client => mitm.write_to_client(packet).await,
        };
        if let Err(error) = write_result {
            warn!(%error, "recv_loop: forward write failed");
            return;
        }
        if fqid == EncryptionResponse::FQID {
            mitm.wait_for(LoginSuccess::FQID).await;
        }
    }
}

/// Run one packet MITM session to completion (§4.I `_run`): split `client`
/// and `server` into framed streams, install the core's own state-transition
/// listeners plus whatever `install` adds (e.g. the PK MITM listeners, §4.J),
/// then run both directions' receive loops until either side closes.
///
/// # Errors
/// Returns [`CoreError::Join`] if a forward-loop task panics. Per-packet
/// decode/write failures are logged and simply end that direction's loop,
/// matching the source's "a failed MITM produces a closed connection" (§7).
pub async fn run(
    client: TcpStream,
    server: TcpStream,
    protocol: ProtocolVersion,
    registry: Arc<Registry>,
    install: impl FnOnce(&Arc<PacketMitm>),
) -> Result<(), CoreError> {
    let (cli_r, cli_w) = client.into_split();
    let (srv_r, srv_w) = server.into_split();

    let cli_stream = FramedPacketStream::new(cli_r, cli_w, Side::Serverbound, protocol, Arc::clone(&registry));
    let srv_stream = FramedPacketStream::new(srv_r, srv_w, Side::Clientbound, protocol, registry);
    let cli_handle = cli_stream.handle();
    let srv_handle = srv_stream.handle();
    let (cli_read, cli_write) = cli_stream.split();
    let (srv_read, srv_write) = srv_stream.split();

    let mitm = Arc::new(PacketMitm {
        bus: EventBus::new(),
        cli_write: AsyncMutex::new(cli_write),
        srv_write: AsyncMutex::new(srv_write),
        cli_handle,
        srv_handle,
    });

    install_state_listeners(&mitm);
    install(&mitm);

    debug!("packet MITM is running");
    let loop1 = tokio::spawn(recv_loop(Arc::clone(&mitm), cli_read, ForwardTarget::Server));
    let loop2 = tokio::spawn(recv_loop(Arc::clone(&mitm), srv_read, ForwardTarget::Client));
    loop1.await?;
    loop2.await?;
    Ok(())
}
