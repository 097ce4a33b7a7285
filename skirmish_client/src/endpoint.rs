//! Session endpoint.
//!
//! Owns the per-tick orchestration on the client side: drain inbound,
//! reconcile, integrate physics, emit one input impulse. The transport
//! tasks run on their own and hand messages over a channel; the simulation
//! tick itself never blocks or suspends.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time;
use tracing::{info, trace, warn};

use skirmish_shared::{
    config::GameConfig,
    entity::{MovementDirection, World},
    net::{NetMsg, ReliableConn, UnreliableConn, PROTOCOL_VERSION},
    physics::Integrator,
};

use crate::input::{self, InputState};
use crate::reconcile::StateReconciler;

/// One inbound handoff from a transport task to the simulation tick.
#[derive(Debug)]
enum TransportEvent {
    Message(NetMsg),
    Disconnected { reason: String },
}

/// Endpoint connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointState {
    Connected,
    Disconnected,
}

/// The client's per-session driver: world, reconciler, integrator, and the
/// two transport channels.
pub struct SessionEndpoint {
    pub world: World,
    reconciler: StateReconciler,
    integrator: Integrator,
    inbox: mpsc::UnboundedReceiver<TransportEvent>,
    unreliable: UnreliableConn,
    state: EndpointState,
    /// Pending one-shot disconnect notice, consumed by `take_disconnect`.
    disconnect_reason: Option<String>,
}

impl SessionEndpoint {
    /// Establishes a session: TCP connect bounded by the configured
    /// timeout, handshake, UDP channel setup, and transport task spawn.
    /// Timeout or refusal is fatal; there is no retry here.
    pub async fn connect(cfg: &GameConfig, world: World) -> anyhow::Result<Self> {
        let ip: IpAddr = cfg
            .server_host
            .parse()
            .with_context(|| format!("parse server host {}", cfg.server_host))?;
        let tcp_addr = SocketAddr::new(ip, cfg.tcp_port);
        let udp_addr = SocketAddr::new(ip, cfg.udp_port);

        info!(server = %tcp_addr, "connecting");

        let stream = time::timeout(
            Duration::from_millis(cfg.connect_timeout_ms),
            TcpStream::connect(tcp_addr),
        )
        .await
        .context("connect timed out")?
        .context("tcp connect")?;
        let mut reliable = ReliableConn::new(stream);

        let bind = SocketAddr::new(unspecified_for(ip), 0);
        let unreliable = UnreliableConn::connect(bind, udp_addr).await?;
        let client_udp_port = unreliable.local_addr().context("udp local_addr")?.port();

        reliable
            .send(&NetMsg::Hello {
                protocol: PROTOCOL_VERSION,
            })
            .await?;
        reliable.send(&NetMsg::UdpHello { client_udp_port }).await?;

        info!(udp_port = client_udp_port, "connected");

        let (tx, inbox) = mpsc::unbounded_channel();

        // Reliable reader: forwards frames and reports the disconnect once.
        let tcp_tx = tx.clone();
        tokio::spawn(async move {
            loop {
                match reliable.recv().await {
                    Ok(msg) => {
                        if tcp_tx.send(TransportEvent::Message(msg)).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        let _ = tcp_tx.send(TransportEvent::Disconnected {
                            reason: e.to_string(),
                        });
                        break;
                    }
                }
            }
        });

        // Unreliable reader: datagram loss and decode errors are expected.
        let udp = unreliable.clone();
        tokio::spawn(async move {
            loop {
                match udp.recv().await {
                    Ok(msg) => {
                        if tx.send(TransportEvent::Message(msg)).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        trace!(error = %e, "udp recv error");
                        if tx.is_closed() {
                            break;
                        }
                        time::sleep(Duration::from_millis(50)).await;
                    }
                }
            }
        });

        let reconciler = StateReconciler::new(cfg.resolution_index, &cfg.sim, &world.grid);
        let integrator = Integrator::new(cfg.sim);

        Ok(Self {
            world,
            reconciler,
            integrator,
            inbox,
            unreliable,
            state: EndpointState::Connected,
            disconnect_reason: None,
        })
    }

    /// Advances one endpoint tick.
    pub fn update(&mut self, dt: f32, input: &InputState) {
        input::apply_input(&mut self.world, input);

        // Capture the local flags before reconciliation can overwrite them;
        // the impulse reflects what the player asked for this tick.
        let (jump, direction) = self
            .world
            .local_player()
            .map(|e| (e.body.requests_jump, e.body.movement_direction))
            .unwrap_or((false, MovementDirection::Idle));

        // Atomic drain: everything buffered since the previous tick, in
        // arrival order.
        while let Ok(event) = self.inbox.try_recv() {
            match event {
                TransportEvent::Message(NetMsg::Disconnect { reason }) => {
                    info!(reason = %reason, "server closed the session");
                    self.state = EndpointState::Disconnected;
                    self.disconnect_reason = Some(reason);
                }
                TransportEvent::Message(msg) => self.reconciler.apply(&mut self.world, &msg),
                TransportEvent::Disconnected { reason } => {
                    warn!(reason = %reason, "transport disconnected");
                    self.state = EndpointState::Disconnected;
                    self.disconnect_reason = Some(reason);
                }
            }
        }

        // Client-side simulation over the just-reconciled state; no
        // correction of local-vs-authority divergence.
        self.integrator.step(&mut self.world, dt);

        if self.state == EndpointState::Connected && self.world.local_uid.is_some() {
            let impulse = input::build_impulse(jump, direction);
            if let Err(e) = self.unreliable.try_send(&NetMsg::InputImpulse(impulse)) {
                trace!(error = %e, "impulse send failed");
            }
        }
    }

    pub fn state(&self) -> EndpointState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == EndpointState::Connected
    }

    /// One-shot disconnect notification; returns `Some` exactly once after
    /// the transport reports the loss.
    pub fn take_disconnect(&mut self) -> Option<String> {
        self.disconnect_reason.take()
    }
}

fn unspecified_for(peer: IpAddr) -> IpAddr {
    match peer {
        IpAddr::V4(_) => IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED),
        IpAddr::V6(_) => IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED),
    }
}
