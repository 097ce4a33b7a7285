//! Wire protocol and transport primitives.
//!
//! Two channels between exactly two roles:
//! - Reliable ordered (TCP, length-prefixed frames): handshake, session
//!   assignment, disconnect notice.
//! - Unreliable unordered (UDP, one JSON datagram per packet): world
//!   snapshots server -> client, input impulses client -> server.
//!
//! Serialization is a single registered message enum shared verbatim by
//! both endpoints. Malformed datagrams are dropped at this boundary.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream, UdpSocket},
    time,
};

/// Protocol version for compatibility checks.
pub const PROTOCOL_VERSION: u32 = 1;

/// High-level message envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum NetMsg {
    // ─── Connection handshake ───
    Hello {
        protocol: u32,
    },
    /// Client announces its UDP port to the server.
    UdpHello {
        client_udp_port: u16,
    },

    // ─── Session ───
    /// Server -> client, reliable, once per session: which uid is the
    /// local input-driven player and where it starts.
    SessionAssignment(SessionAssignment),

    // ─── Gameplay ───
    /// Server -> client: periodic full state of every replicated entity.
    WorldSnapshot(WorldSnapshot),
    /// Client -> server: the per-tick input impulse, fire-and-forget.
    InputImpulse(InputImpulse),

    // ─── Disconnect ───
    Disconnect {
        reason: String,
    },
}

/// Session assignment payload. Position is in the sender's
/// resolution-normalized units.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SessionAssignment {
    pub uid: i32,
    pub x: f32,
    pub y: f32,
    pub resolution_index: i32,
}

/// Kinematic fields shared by both replicated entity kinds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct EntityState {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub movement_direction: i8,
    pub requests_jump: bool,
    /// Carries the airborne state on the wire.
    pub is_jumping: bool,
}

/// Replicated character state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PlayerState {
    pub entity: EntityState,
    pub uid: i32,
    pub flip: bool,
    pub has_weapon: bool,
    pub requests_attack: bool,
}

/// Replicated projectile state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SpearState {
    pub entity: EntityState,
    pub uid: i32,
    pub last_rotation: f32,
}

/// Periodic world snapshot. Entity lists keep the authority's order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorldSnapshot {
    pub resolution_index: i32,
    pub players: Vec<PlayerState>,
    pub spears: Vec<SpearState>,
}

/// Minimal per-tick client input: jump flag, movement direction id, and
/// the send timestamp. No acknowledgment, retry, or dedup.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct InputImpulse {
    pub jump_flag: bool,
    pub movement_flag: i8,
    pub sent_at_ms: i64,
}

/// Reliable connection over TCP with length-prefixed frames.
#[derive(Debug)]
pub struct ReliableConn {
    stream: TcpStream,
}

impl ReliableConn {
    pub fn new(stream: TcpStream) -> Self {
        Self { stream }
    }

    pub async fn send(&mut self, msg: &NetMsg) -> anyhow::Result<()> {
        let payload = serde_json::to_vec(msg).context("serialize msg")?;
        let mut buf = BytesMut::with_capacity(4 + payload.len());
        buf.put_u32(payload.len() as u32);
        buf.extend_from_slice(&payload);
        self.stream.write_all(&buf).await.context("tcp write")?;
        Ok(())
    }

    pub async fn recv(&mut self) -> anyhow::Result<NetMsg> {
        let mut len_buf = [0u8; 4];
        self.stream
            .read_exact(&mut len_buf)
            .await
            .context("tcp read len")?;
        let len = u32::from_be_bytes(len_buf) as usize;
        let mut payload = vec![0u8; len];
        self.stream
            .read_exact(&mut payload)
            .await
            .context("tcp read payload")?;
        let msg = serde_json::from_slice(&payload).context("deserialize msg")?;
        Ok(msg)
    }

    pub fn peer_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.stream.peer_addr()?)
    }
}

/// Unreliable channel over a connected UDP socket. Cloning shares the
/// socket, so one clone can receive while another sends.
#[derive(Debug, Clone)]
pub struct UnreliableConn {
    socket: Arc<UdpSocket>,
    peer: SocketAddr,
}

impl UnreliableConn {
    pub async fn connect(bind_addr: SocketAddr, peer: SocketAddr) -> anyhow::Result<Self> {
        let socket = UdpSocket::bind(bind_addr).await.context("udp bind")?;
        socket.connect(peer).await.context("udp connect")?;
        Ok(Self {
            socket: Arc::new(socket),
            peer,
        })
    }

    /// Best-effort non-blocking send. A full send buffer drops the
    /// datagram silently, matching the channel's delivery guarantee.
    pub fn try_send(&self, msg: &NetMsg) -> anyhow::Result<()> {
        let payload = serde_json::to_vec(msg).context("serialize udp msg")?;
        match self.socket.try_send(&payload) {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(()),
            Err(e) => Err(e).context("udp send"),
        }
    }

    pub async fn recv(&self) -> anyhow::Result<NetMsg> {
        let mut buf = vec![0u8; 64 * 1024];
        let n = self.socket.recv(&mut buf).await.context("udp recv")?;
        let msg = serde_json::from_slice(&buf[..n]).context("deserialize udp msg")?;
        Ok(msg)
    }

    /// Receives a datagram within the given timeout.
    pub async fn recv_timeout(
        &self,
        timeout: std::time::Duration,
    ) -> anyhow::Result<Option<NetMsg>> {
        let mut buf = vec![0u8; 64 * 1024];
        match time::timeout(timeout, self.socket.recv(&mut buf)).await {
            Ok(Ok(n)) => {
                let msg = serde_json::from_slice(&buf[..n]).context("deserialize udp msg")?;
                Ok(Some(msg))
            }
            Ok(Err(e)) => Err(e).context("udp recv"),
            Err(_) => Ok(None),
        }
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }
}

/// TCP server listener.
pub struct ReliableListener {
    listener: TcpListener,
}

impl ReliableListener {
    pub async fn bind(addr: SocketAddr) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(addr).await.context("tcp bind")?;
        Ok(Self { listener })
    }

    pub async fn accept(&self) -> anyhow::Result<(ReliableConn, SocketAddr)> {
        let (stream, addr) = self.listener.accept().await.context("tcp accept")?;
        Ok((ReliableConn::new(stream), addr))
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }
}

/// Convenience codec helpers.
pub fn encode_to_bytes(msg: &NetMsg) -> anyhow::Result<Bytes> {
    let payload = serde_json::to_vec(msg).context("serialize")?;
    Ok(Bytes::from(payload))
}

pub fn decode_from_bytes(b: &[u8]) -> anyhow::Result<NetMsg> {
    serde_json::from_slice(b).context("deserialize")
}
