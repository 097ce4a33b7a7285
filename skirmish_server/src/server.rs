//! Server implementation.
//!
//! An authoritative tick-based loop: ingest impulses, step the shared
//! integrator, broadcast snapshots. Client input is applied as-is; there is
//! no server-side validation of it.
//!
//! Determinism notes:
//! - Simulation runs at a fixed timestep.
//! - Entities iterate in insertion order; no wall-clock branching in the
//!   gameplay path.

use anyhow::Context;
use rand::seq::SliceRandom;
use std::{
    collections::HashMap,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    time::Duration,
};
use tokio::{net::UdpSocket, time::Instant};
use tracing::{debug, info, warn};

use skirmish_shared::{
    config::GameConfig,
    entity::{Entity, Kind, MovementDirection, World},
    grid::starter_arena,
    net::{
        EntityState, NetMsg, PlayerState, ReliableConn, ReliableListener, SessionAssignment,
        SpearState, WorldSnapshot, PROTOCOL_VERSION,
    },
    physics::Integrator,
};

/// Connected client bookkeeping.
struct ClientSlot {
    reliable: ReliableConn,
    udp_peer: SocketAddr,
}

/// Authoritative game server.
pub struct GameServer {
    pub cfg: GameConfig,
    world: World,
    integrator: Integrator,
    clients: HashMap<i32, ClientSlot>,

    tcp: ReliableListener,
    udp: UdpSocket,

    tick: u32,
    next_uid: i32,
}

impl GameServer {
    /// Binds both channels and seeds the world with the starter arena.
    pub async fn bind(cfg: GameConfig) -> anyhow::Result<Self> {
        let ip: IpAddr = cfg
            .server_host
            .parse()
            .with_context(|| format!("parse server host {}", cfg.server_host))?;
        let tcp = ReliableListener::bind(SocketAddr::new(ip, cfg.tcp_port)).await?;
        let udp = UdpSocket::bind(SocketAddr::new(ip, cfg.udp_port))
            .await
            .context("udp bind")?;

        let (grid, spawns) = starter_arena();
        let world = World::new(grid, spawns);
        let integrator = Integrator::new(cfg.sim);

        Ok(Self {
            cfg,
            world,
            integrator,
            clients: HashMap::new(),
            tcp,
            udp,
            tick: 0,
            next_uid: 1,
        })
    }

    pub fn tcp_addr(&self) -> anyhow::Result<SocketAddr> {
        self.tcp.local_addr()
    }

    pub fn udp_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.udp.local_addr()?)
    }

    pub fn tick(&self) -> u32 {
        self.tick
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    /// Accepts exactly one client: handshake, uid assignment, spawn, and
    /// the session assignment message.
    pub async fn accept_one(&mut self) -> anyhow::Result<i32> {
        let (conn, peer) = self.tcp.accept().await?;
        self.handle_new_connection(conn, peer).await
    }

    /// Accepts a client if one arrives within the timeout.
    pub async fn try_accept(&mut self, timeout: Duration) -> anyhow::Result<Option<i32>> {
        match tokio::time::timeout(timeout, self.tcp.accept()).await {
            Ok(Ok((conn, peer))) => self.handle_new_connection(conn, peer).await.map(Some),
            Ok(Err(e)) => Err(e),
            Err(_) => Ok(None),
        }
    }

    async fn handle_new_connection(
        &mut self,
        mut conn: ReliableConn,
        peer: SocketAddr,
    ) -> anyhow::Result<i32> {
        let msg = conn.recv().await?;
        let NetMsg::Hello { protocol } = msg else {
            anyhow::bail!("unexpected handshake msg: {msg:?}");
        };
        anyhow::ensure!(
            protocol == PROTOCOL_VERSION,
            "protocol mismatch: client {protocol}, server {PROTOCOL_VERSION}"
        );

        let udp_hello = conn.recv().await?;
        let NetMsg::UdpHello { client_udp_port } = udp_hello else {
            anyhow::bail!("expected UdpHello, got {udp_hello:?}");
        };

        let uid = self.next_uid;
        self.next_uid += 1;

        let (width, height) = self.cfg.sim.player_size(&self.world.grid);
        let spawn = self
            .world
            .spawns
            .choose(&mut rand::thread_rng())
            .cloned()
            .context("no spawn points in world")?;

        let mut player = Entity::player(uid, false, width, height);
        player.body.x = spawn.x + spawn.width / 2.0 - width / 2.0;
        player.body.y = spawn.y;
        let (x, y) = (player.body.x, player.body.y);
        self.world.entities.push(player);

        conn.send(&NetMsg::SessionAssignment(SessionAssignment {
            uid,
            x,
            y,
            resolution_index: self.cfg.resolution_index,
        }))
        .await?;

        let udp_peer = SocketAddr::new(peer.ip(), client_udp_port);
        self.clients.insert(
            uid,
            ClientSlot {
                reliable: conn,
                udp_peer,
            },
        );

        info!(uid, %udp_peer, spawn = %spawn.name, "client connected");
        Ok(uid)
    }

    /// Runs the server for a number of ticks at the configured rate.
    pub async fn run_for_ticks(&mut self, ticks: u32) -> anyhow::Result<()> {
        let dt = Duration::from_secs_f32(1.0 / self.cfg.tick_hz as f32);
        let mut next = Instant::now();

        for _ in 0..ticks {
            next += dt;
            self.step(dt.as_secs_f32()).await?;
            tokio::time::sleep_until(next).await;
        }
        Ok(())
    }

    /// Runs forever, interleaving accepts with simulation ticks.
    pub async fn run(&mut self) -> anyhow::Result<()> {
        let dt = Duration::from_secs_f32(1.0 / self.cfg.tick_hz as f32);
        let mut next = Instant::now();

        loop {
            if let Err(e) = self.try_accept(Duration::from_millis(1)).await {
                warn!(error = %e, "handshake failed");
            }
            next += dt;
            self.step(dt.as_secs_f32()).await?;
            tokio::time::sleep_until(next).await;
        }
    }

    /// Executes one fixed simulation step.
    pub async fn step(&mut self, dt_sec: f32) -> anyhow::Result<()> {
        self.recv_impulses()?;
        self.integrator.step(&mut self.world, dt_sec);
        self.broadcast_snapshot().await?;
        self.tick += 1;
        Ok(())
    }

    /// Drains buffered impulses and applies each to the owning player.
    fn recv_impulses(&mut self) -> anyhow::Result<()> {
        let mut buf = vec![0u8; 64 * 1024];
        loop {
            match self.udp.try_recv_from(&mut buf) {
                Ok((n, from)) => {
                    let Ok(msg) = serde_json::from_slice::<NetMsg>(&buf[..n]) else {
                        debug!(%from, "dropping malformed datagram");
                        continue;
                    };
                    if let NetMsg::InputImpulse(impulse) = msg {
                        self.on_impulse(from, impulse.jump_flag, impulse.movement_flag, impulse.sent_at_ms);
                    } else {
                        debug!(?msg, "unexpected udp message");
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
                Err(e) => return Err(e).context("udp recv"),
            }
        }
        Ok(())
    }

    fn on_impulse(&mut self, from: SocketAddr, jump: bool, movement: i8, sent_at_ms: i64) {
        let Some(uid) = self
            .clients
            .iter()
            .find(|(_, slot)| slot.udp_peer == from)
            .map(|(uid, _)| *uid)
        else {
            debug!(%from, "impulse from unknown peer");
            return;
        };
        debug!(uid, sent_at_ms, "impulse");

        if let Some(ent) = self.world.player_mut(uid) {
            ent.body.movement_direction = MovementDirection::from_id(movement);
            if jump {
                ent.body.requests_jump = true;
            }
        }
    }

    fn build_snapshot(&self) -> WorldSnapshot {
        let mut players = Vec::new();
        let mut spears = Vec::new();

        for ent in &self.world.entities {
            let entity = EntityState {
                x: ent.body.x,
                y: ent.body.y,
                vx: ent.body.vx,
                vy: ent.body.vy,
                movement_direction: ent.body.movement_direction.id(),
                requests_jump: ent.body.requests_jump,
                // The wire flag carries airborne state.
                is_jumping: ent.body.is_in_air,
            };
            match &ent.kind {
                Kind::Player(p) => players.push(PlayerState {
                    entity,
                    uid: p.uid,
                    flip: p.flipped,
                    has_weapon: p.has_weapon,
                    requests_attack: p.requests_attack,
                }),
                Kind::Spear(s) => spears.push(SpearState {
                    entity,
                    uid: s.uid,
                    last_rotation: s.last_rotation,
                }),
            }
        }

        WorldSnapshot {
            resolution_index: self.cfg.resolution_index,
            players,
            spears,
        }
    }

    /// Sends the current snapshot to every client, best effort.
    async fn broadcast_snapshot(&self) -> anyhow::Result<()> {
        if self.clients.is_empty() {
            return Ok(());
        }
        let snap = NetMsg::WorldSnapshot(self.build_snapshot());
        let payload = serde_json::to_vec(&snap).context("serialize snapshot")?;

        for slot in self.clients.values() {
            let _ = self.udp.send_to(&payload, slot.udp_peer).await;
        }
        Ok(())
    }

    /// Notifies clients and drops them. Used on shutdown.
    pub async fn disconnect_all(&mut self, reason: &str) {
        for (uid, slot) in self.clients.iter_mut() {
            if let Err(e) = slot
                .reliable
                .send(&NetMsg::Disconnect {
                    reason: reason.to_string(),
                })
                .await
            {
                debug!(uid, error = %e, "disconnect notice failed");
            }
        }
        self.clients.clear();
    }
}

/// Helper for tests: bind both channels to ephemeral localhost ports and
/// return a config pointing at them.
pub async fn bind_ephemeral(tick_hz: u32) -> anyhow::Result<(GameServer, GameConfig)> {
    let cfg = GameConfig {
        server_host: Ipv4Addr::LOCALHOST.to_string(),
        tcp_port: 0,
        udp_port: 0,
        tick_hz,
        ..GameConfig::default()
    };

    let mut server = GameServer::bind(cfg).await?;
    server.cfg.tcp_port = server.tcp_addr()?.port();
    server.cfg.udp_port = server.udp_addr()?.port();

    let cfg = server.cfg.clone();
    Ok((server, cfg))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn snapshot_reflects_world_entities() -> anyhow::Result<()> {
        let (mut server, _cfg) = bind_ephemeral(60).await?;

        let (w, h) = server.cfg.sim.player_size(&server.world.grid);
        server.world.entities.push(Entity::player(9, false, w, h));
        server.world.entities.push(Entity::spear(1, 16.0, 4.0));

        let snap = server.build_snapshot();
        assert_eq!(snap.players.len(), 1);
        assert_eq!(snap.players[0].uid, 9);
        assert_eq!(snap.spears.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn impulse_from_unknown_peer_is_ignored() -> anyhow::Result<()> {
        let (mut server, _cfg) = bind_ephemeral(60).await?;
        let stranger: SocketAddr = "127.0.0.1:9".parse()?;
        server.on_impulse(stranger, true, 1, 42);
        assert!(server.world.entities.is_empty());
        Ok(())
    }
}
