use std::io::{Cursor, Read, Write};
use std::sync::Arc;

use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use mitm_crypto::{StreamDecryptor, StreamEncryptor};
use mitm_utils::VarInt;
use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::ProtocolError;
use crate::packets::Packet;
use crate::registry::Registry;
use crate::state::{ConnectionState, Fqid, ProtocolVersion, Side};

/// The maximum length this core will accept for a single frame, guarding
/// against a malformed or malicious length prefix allocating unbounded
/// memory (not specified numerically by §4.E; chosen generously above any
/// legitimate protocol-340 packet).
const MAX_FRAME_LEN: i32 = 2 * 1024 * 1024;

/// The mutable connection properties a [`FramedPacketStream`] shares with
/// whatever else holds a [`StreamHandle`] to it. Kept separate from the
/// reader/writer themselves so that arming compression, encryption, or state
/// never has to wait on an in-flight `read_packet`/`write_packet` call
/// (§5: one task owns the reads, another may arm the stream between them).
struct Shared {
    state: Mutex<ConnectionState>,
    compression: Mutex<Option<i32>>,
    encryption_key: Mutex<Option<[u8; 16]>>,
}

impl Shared {
    fn new() -> Self {
        Self {
            state: Mutex::new(ConnectionState::Handshaking),
            compression: Mutex::new(None),
            encryption_key: Mutex::new(None),
        }
    }
}

/// A cheap, `Send + Sync` handle to one [`FramedPacketStream`]'s shared
/// properties, usable from a task other than the one driving
/// `read_packet`/`write_packet` (§4.I: post-listeners on one direction often
/// need to arm the *other* direction's stream).
#[derive(Clone)]
pub struct StreamHandle(Arc<Shared>);

impl StreamHandle {
    /// The connection state this stream currently decodes/encodes under.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.0.state.lock()
    }

    /// Transition to a new connection state, driven by a post-listener
    /// (§4.I "State transitions are driven by post-listeners, not by the core").
    pub fn set_state(&self, state: ConnectionState) {
        *self.0.state.lock() = state;
    }

    /// Arm AES-128 CFB-8 encryption with `key` (§4.B, §4.J). Takes effect the
    /// next time the owning task calls `read_packet`/`write_packet`; harmless
    /// to call more than once with the same key.
    pub fn enable_encryption(&self, key: [u8; 16]) {
        *self.0.encryption_key.lock() = Some(key);
    }

    /// Whether encryption has been armed (requested), regardless of whether
    /// the owning stream has picked the key up yet.
    #[must_use]
    pub fn is_encryption_armed(&self) -> bool {
        self.0.encryption_key.lock().is_some()
    }

    /// Arm zlib compression with `threshold` (§4.E write path). A negative
    /// threshold is a no-op ("disable compression"); a stream may only be
    /// armed once, matching §3's invariant.
    ///
    /// # Errors
    /// Returns [`ProtocolError::CompressionAlreadyArmed`] if called a second
    /// time with a non-negative threshold.
    pub fn enable_compression(&self, threshold: i32) -> Result<(), ProtocolError> {
        if threshold < 0 {
            return Ok(());
        }
        let mut guard = self.0.compression.lock();
        if guard.is_some() {
            return Err(ProtocolError::CompressionAlreadyArmed);
        }
        *guard = Some(threshold);
        Ok(())
    }

    /// Whether compression has been armed on this stream.
    #[must_use]
    pub fn is_compressed(&self) -> bool {
        self.0.compression.lock().is_some()
    }
}

/// The read half of a [`FramedPacketStream`] (§4.E read path), split off so
/// that one task can drive `read_packet` while a different task drives the
/// *other* physical connection's write half without either contending for
/// access to state it doesn't need (§4.I: the two cross-wired forward loops
/// of a MITM session each read one connection and write the other).
pub struct FramedReadHalf<R> {
    reader: StreamDecryptor<R>,
    /// The side whose packets this half decodes (the sender on the other
    /// end of the wire): `Serverbound` for the client-facing half,
    /// `Clientbound` for the server-facing half.
    read_side: Side,
    shared: Arc<Shared>,
    registry: Arc<Registry>,
}

/// The write half of a [`FramedPacketStream`] (§4.E write path).
pub struct FramedWriteHalf<W> {
    writer: StreamEncryptor<W>,
    shared: Arc<Shared>,
}

impl<R> FramedReadHalf<R> {
    /// A cheap handle other tasks can use to arm this half's shared
    /// connection state without contending for `&mut self`.
    #[must_use]
    pub fn handle(&self) -> StreamHandle {
        StreamHandle(Arc::clone(&self.shared))
    }

    /// The connection state this half currently decodes under.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.handle().state()
    }

    /// See [`StreamHandle::set_state`].
    pub fn set_state(&self, state: ConnectionState) {
        self.handle().set_state(state);
    }

    /// See [`StreamHandle::enable_encryption`].
    pub fn enable_encryption(&self, key: [u8; 16]) {
        self.handle().enable_encryption(key);
    }

    /// See [`StreamHandle::enable_compression`].
    ///
    /// # Errors
    /// Returns [`ProtocolError::CompressionAlreadyArmed`] if called a second
    /// time with a non-negative threshold.
    pub fn enable_compression(&self, threshold: i32) -> Result<(), ProtocolError> {
        self.handle().enable_compression(threshold)
    }

    /// Whether compression has been armed on this connection.
    #[must_use]
    pub fn is_compressed(&self) -> bool {
        self.handle().is_compressed()
    }
}

impl<R: AsyncRead + Unpin> FramedReadHalf<R> {
    /// Whether this half's reader has actually picked up an armed key yet
    /// (as opposed to one merely being requested via a handle).
    #[must_use]
    pub fn is_encrypted(&self) -> bool {
        self.reader.is_encrypted()
    }

    /// Pick up an encryption key armed (possibly from another task, via
    /// [`StreamHandle`]) since the last call, arming the reader's actual
    /// cipher exactly once so its internal CFB-8 chaining state isn't reset
    /// on every packet.
    fn sync_encryption(&mut self) {
        if self.reader.is_encrypted() {
            return;
        }
        if let Some(key) = *self.shared.encryption_key.lock() {
            self.reader.enable_encryption(key);
        }
    }

    /// Read one length-prefixed packet, decompressing if armed, and decode
    /// it through the registry at `(protocol, read_side, state, id)` (§4.E
    /// read path).
    ///
    /// # Errors
    /// Returns [`ProtocolError::Io`] on transport failure or EOF,
    /// [`ProtocolError::ImpossibleLength`] on an out-of-range frame or data
    /// length, [`ProtocolError::DecompressedLengthMismatch`] if the
    /// decompressed body doesn't match the declared length, and
    /// [`ProtocolError::SchemaDecode`] if a known schema's body is malformed.
    pub async fn read_packet(&mut self) -> Result<Packet, ProtocolError> {
        self.sync_encryption();

        let frame_len = VarInt::read_async(&mut self.reader).await?.0;
        if !(0..=MAX_FRAME_LEN).contains(&frame_len) {
            return Err(ProtocolError::ImpossibleLength(frame_len));
        }
        let mut frame = vec![0u8; frame_len as usize];
        self.reader.read_exact(&mut frame).await?;

        let threshold = *self.shared.compression.lock();
        let id_and_body = if threshold.is_some() {
            let mut cursor = Cursor::new(frame.as_slice());
            let data_length = VarInt::read(&mut cursor)?.0;
            if data_length < 0 {
                return Err(ProtocolError::ImpossibleLength(data_length));
            }
            let header_len = cursor.position() as usize;
            let rest = &frame[header_len..];
            if data_length == 0 {
                rest.to_vec()
            } else {
                let mut decompressed = Vec::with_capacity(data_length as usize);
                ZlibDecoder::new(rest)
                    .read_to_end(&mut decompressed)
                    .map_err(|_| ProtocolError::DecompressedLengthMismatch {
                        expected: data_length as usize,
                        actual: 0,
                    })?;
                if decompressed.len() != data_length as usize {
                    return Err(ProtocolError::DecompressedLengthMismatch {
                        expected: data_length as usize,
                        actual: decompressed.len(),
                    });
                }
                decompressed
            }
        } else {
            frame
        };

        let mut cursor = Cursor::new(id_and_body.as_slice());
        let id = VarInt::read(&mut cursor)?.0;
        let body_start = cursor.position() as usize;
        let body = &id_and_body[body_start..];

        let state = *self.shared.state.lock();
        let fqid = Fqid::new(self.read_side, state, id);
        self.registry.decode(fqid, body)
    }
}

impl<W> FramedWriteHalf<W> {
    /// A cheap handle other tasks can use to arm this half's shared
    /// connection state without contending for `&mut self`.
    #[must_use]
    pub fn handle(&self) -> StreamHandle {
        StreamHandle(Arc::clone(&self.shared))
    }

    /// See [`StreamHandle::enable_encryption`].
    pub fn enable_encryption(&self, key: [u8; 16]) {
        self.handle().enable_encryption(key);
    }
}

impl<W: AsyncWrite + Unpin> FramedWriteHalf<W> {
    /// Whether this half's writer has actually picked up an armed key yet.
    #[must_use]
    pub fn is_encrypted(&self) -> bool {
        self.writer.is_encrypted()
    }

    fn sync_encryption(&mut self) {
        if self.writer.is_encrypted() {
            return;
        }
        if let Some(key) = *self.shared.encryption_key.lock() {
            self.writer.enable_encryption(key);
        }
    }

    /// Write one packet, compressing if armed, and flush (§4.E write path;
    /// §9 open question: flush after every complete frame to bound latency).
    ///
    /// # Errors
    /// Returns [`ProtocolError::Io`] on transport failure.
    pub async fn write_packet(&mut self, packet: &Packet) -> Result<(), ProtocolError> {
        self.sync_encryption();

        let mut body = Vec::new();
        packet.write_body(&mut body)?;

        let mut frame = Vec::new();
        let threshold = *self.shared.compression.lock();
        if let Some(threshold) = threshold {
            let data_len = body.len();
            let mut header = Vec::new();
            if data_len as i32 >= threshold {
                let mut compressed = Vec::new();
                {
                    let mut encoder = ZlibEncoder::new(&mut compressed, Compression::default());
                    encoder.write_all(&body)?;
                    encoder.finish()?;
                }
                VarInt(data_len as i32).write(&mut header)?;
                frame.extend_from_slice(&header);
                frame.extend_from_slice(&compressed);
            } else {
                VarInt(0).write(&mut header)?;
                frame.extend_from_slice(&header);
                frame.extend_from_slice(&body);
            }
        } else {
            frame = body;
        }

        VarInt(frame.len() as i32).write_async(&mut self.writer).await?;
        self.writer.write_all(&frame).await?;
        self.writer.flush().await?;
        Ok(())
    }
}

/// One direction's framed packet stream (§4.E): wraps the optional-CFB byte
/// stream (`mitm-crypto`) and adds length-prefixing plus optional zlib
/// compression. A single instance owns both the read and write half of one
/// physical TCP connection (either the client-facing or the server-facing
/// half of a MITM session), so that arming encryption or compression always
/// updates both directions of that connection together (§3 "Stream state").
///
/// `read_packet`/`write_packet` require exclusive (`&mut self`) access and
/// are meant to be driven by a single owning task; [`StreamHandle`] (via
/// [`FramedPacketStream::handle`]) gives any other task a way to arm this
/// stream's state/compression/encryption without contending for that access.
/// [`FramedPacketStream::split`] hands the read and write halves to two
/// *different* tasks, which the packet MITM core (§4.I) needs: the loop that
/// reads a connection's inbound packets and the loop that writes its
/// forwarded outbound packets are different directions of the same
/// connection, driven concurrently.
pub struct FramedPacketStream<R, W> {
    read: FramedReadHalf<R>,
    write: FramedWriteHalf<W>,
}

impl<R: AsyncRead + Unpin, W: AsyncWrite + Unpin> FramedPacketStream<R, W> {
    /// Wrap raw TCP halves, initially unencrypted and uncompressed.
    pub fn new(
        reader: R,
        writer: W,
        read_side: Side,
        _protocol: ProtocolVersion,
        registry: Arc<Registry>,
    ) -> Self {
        let shared = Arc::new(Shared::new());
        Self {
            read: FramedReadHalf {
                reader: StreamDecryptor::new(reader),
                read_side,
                shared: Arc::clone(&shared),
                registry,
            },
            write: FramedWriteHalf {
                writer: StreamEncryptor::new(writer),
                shared,
            },
        }
    }

    /// Split into independently-drivable read and write halves sharing the
    /// same connection state, so that each can be owned by a different task
    /// (§4.I).
    #[must_use]
    pub fn split(self) -> (FramedReadHalf<R>, FramedWriteHalf<W>) {
        (self.read, self.write)
    }

    /// A cheap handle other tasks can use to arm this stream without
    /// competing with an in-flight `read_packet`/`write_packet` call.
    #[must_use]
    pub fn handle(&self) -> StreamHandle {
        self.read.handle()
    }

    /// The connection state this stream currently decodes/encodes under.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.read.state()
    }

    /// See [`StreamHandle::set_state`].
    pub fn set_state(&self, state: ConnectionState) {
        self.read.set_state(state);
    }

    /// See [`StreamHandle::enable_encryption`]. Takes effect on this stream's
    /// own next `read_packet`/`write_packet` call.
    pub fn enable_encryption(&self, key: [u8; 16]) {
        self.read.enable_encryption(key);
    }

    /// Whether this stream's reader has actually picked up an armed key yet
    /// (as opposed to one merely being requested via a handle).
    #[must_use]
    pub fn is_encrypted(&self) -> bool {
        self.read.is_encrypted()
    }

    /// See [`StreamHandle::enable_compression`].
    ///
    /// # Errors
    /// Returns [`ProtocolError::CompressionAlreadyArmed`] if called a second
    /// time with a non-negative threshold.
    pub fn enable_compression(&self, threshold: i32) -> Result<(), ProtocolError> {
        self.read.enable_compression(threshold)
    }

    /// Whether compression has been armed on this stream.
    #[must_use]
    pub fn is_compressed(&self) -> bool {
        self.read.is_compressed()
    }

    /// Read one packet from this stream's read half. See
    /// [`FramedReadHalf::read_packet`].
    ///
    /// # Errors
    /// See [`FramedReadHalf::read_packet`].
    pub async fn read_packet(&mut self) -> Result<Packet, ProtocolError> {
        self.read.read_packet().await
    }

    /// Write one packet to this stream's write half. See
    /// [`FramedWriteHalf::write_packet`].
    ///
    /// # Errors
    /// See [`FramedWriteHalf::write_packet`].
    pub async fn write_packet(&mut self, packet: &Packet) -> Result<(), ProtocolError> {
        self.write.write_packet(packet).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packets::Handshake;
    use crate::registry::Registry;

    fn registry() -> Arc<Registry> {
        Arc::new(Registry::build(ProtocolVersion::V340).unwrap())
    }

    #[tokio::test]
    async fn round_trips_uncompressed_unencrypted() {
        let (client, server) = tokio::io::duplex(4096);
        let (client_r, client_w) = tokio::io::split(client);
        let (server_r, server_w) = tokio::io::split(server);

        let mut writer_side =
            FramedPacketStream::new(client_r, server_w, Side::Serverbound, ProtocolVersion::V340, registry());
        let mut reader_side =
            FramedPacketStream::new(server_r, client_w, Side::Serverbound, ProtocolVersion::V340, registry());

        let packet = Packet::Handshake(Handshake {
            protocol_version: VarInt(340),
            server_address: "example.com".to_string(),
            server_port: 25565,
            next_state: VarInt(2),
        });
        writer_side.write_packet(&packet).await.unwrap();
        let decoded = reader_side.read_packet().await.unwrap();
        assert_eq!(decoded, packet);
    }

    #[tokio::test]
    async fn compression_applies_only_above_threshold() {
        let (client, server) = tokio::io::duplex(8192);
        let (client_r, client_w) = tokio::io::split(client);
        let (server_r, server_w) = tokio::io::split(server);

        let mut writer_side =
            FramedPacketStream::new(client_r, server_w, Side::Serverbound, ProtocolVersion::V340, registry());
        let mut reader_side =
            FramedPacketStream::new(server_r, client_w, Side::Serverbound, ProtocolVersion::V340, registry());

        writer_side.enable_compression(16).unwrap();
        reader_side.enable_compression(16).unwrap();

        let short = Packet::Handshake(Handshake {
            protocol_version: VarInt(1),
            server_address: "a".to_string(),
            server_port: 1,
            next_state: VarInt(1),
        });
        writer_side.write_packet(&short).await.unwrap();
        assert_eq!(reader_side.read_packet().await.unwrap(), short);

        let long = Packet::Handshake(Handshake {
            protocol_version: VarInt(340),
            server_address: "a".repeat(64),
            server_port: 25565,
            next_state: VarInt(2),
        });
        writer_side.write_packet(&long).await.unwrap();
        assert_eq!(reader_side.read_packet().await.unwrap(), long);
    }

    #[tokio::test]
    async fn double_arming_compression_is_an_error() {
        let (client, server) = tokio::io::duplex(1024);
        let (client_r, _client_w) = tokio::io::split(client);
        let (_server_r, server_w) = tokio::io::split(server);
        let stream = FramedPacketStream::new(
            client_r,
            server_w,
            Side::Serverbound,
            ProtocolVersion::V340,
            registry(),
        );
        stream.enable_compression(64).unwrap();
        assert!(stream.enable_compression(64).is_err());
    }

    #[tokio::test]
    async fn negative_threshold_is_a_no_op() {
        let (client, server) = tokio::io::duplex(1024);
        let (client_r, _client_w) = tokio::io::split(client);
        let (_server_r, server_w) = tokio::io::split(server);
        let stream = FramedPacketStream::new(
            client_r,
            server_w,
            Side::Serverbound,
            ProtocolVersion::V340,
            registry(),
        );
        stream.enable_compression(-1).unwrap();
        assert!(!stream.is_compressed());
    }

    #[tokio::test]
    async fn handle_arms_encryption_seen_by_owning_stream() {
        let (client, server) = tokio::io::duplex(4096);
        let (client_r, client_w) = tokio::io::split(client);
        let (server_r, server_w) = tokio::io::split(server);

        let mut writer_side =
            FramedPacketStream::new(client_r, server_w, Side::Serverbound, ProtocolVersion::V340, registry());
        let mut reader_side =
            FramedPacketStream::new(server_r, client_w, Side::Serverbound, ProtocolVersion::V340, registry());

        let key = [9u8; 16];
        // Simulates a different task arming this stream through a handle.
        writer_side.handle().enable_encryption(key);
        reader_side.handle().enable_encryption(key);

        let packet = Packet::Handshake(Handshake {
            protocol_version: VarInt(340),
            server_address: "example.com".to_string(),
            server_port: 25565,
            next_state: VarInt(2),
        });
        writer_side.write_packet(&packet).await.unwrap();
        assert!(writer_side.is_encrypted());
        let decoded = reader_side.read_packet().await.unwrap();
        assert!(reader_side.is_encrypted());
        assert_eq!(decoded, packet);
    }

    #[tokio::test]
    async fn split_halves_can_be_driven_by_different_tasks() {
        let (client, server) = tokio::io::duplex(4096);
        let (client_r, client_w) = tokio::io::split(client);
        let (server_r, server_w) = tokio::io::split(server);

        let writer_side =
            FramedPacketStream::new(client_r, server_w, Side::Serverbound, ProtocolVersion::V340, registry());
        let reader_side =
            FramedPacketStream::new(server_r, client_w, Side::Serverbound, ProtocolVersion::V340, registry());
        let (_writer_read, mut writer_write) = writer_side.split();
        let (mut reader_read, _reader_write) = reader_side.split();

        let packet = Packet::Handshake(Handshake {
            protocol_version: VarInt(340),
            server_address: "example.com".to_string(),
            server_port: 25565,
            next_state: VarInt(2),
        });
        let write_task = tokio::spawn(async move {
            writer_write.write_packet(&packet).await.unwrap();
            packet
        });
        let sent = write_task.await.unwrap();
        let decoded = reader_read.read_packet().await.unwrap();
        assert_eq!(decoded, sent);
    }
}
