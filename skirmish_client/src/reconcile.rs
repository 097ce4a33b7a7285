//! State reconciliation.
//!
//! Merges inbound snapshot and assignment messages into the local world by
//! `(kind, uid)` identity: a match overwrites that entity's kinematic state
//! and kind-specific flags, a miss appends a new entity. Exchanged positions
//! arrive in the sender's resolution-normalized units and are rescaled by
//! `sender_scale / local_scale` before use.
//!
//! Remote-disconnect entity removal is a known gap: snapshots only upsert.

use tracing::info;

use skirmish_shared::{
    entity::{Body, Entity, MovementDirection, World},
    grid::TileGrid,
    net::{EntityState, NetMsg, PlayerState, SessionAssignment, SpearState, WorldSnapshot},
    physics::SimConfig,
    resolution,
};

/// Applies authoritative messages to the local entity collection.
#[derive(Debug, Clone)]
pub struct StateReconciler {
    local_resolution: i32,
    player_size: (f32, f32),
    spear_size: (f32, f32),
}

impl StateReconciler {
    pub fn new(local_resolution: i32, sim: &SimConfig, grid: &TileGrid) -> Self {
        Self {
            local_resolution,
            player_size: sim.player_size(grid),
            spear_size: sim.spear_size(grid),
        }
    }

    /// Dispatches one inbound message. Messages this core does not consume
    /// (its own impulse shape, handshake frames) are ignored.
    pub fn apply(&self, world: &mut World, msg: &NetMsg) {
        match msg {
            NetMsg::WorldSnapshot(snap) => self.apply_snapshot(world, snap),
            NetMsg::SessionAssignment(assign) => self.apply_assignment(world, assign),
            _ => {}
        }
    }

    fn apply_snapshot(&self, world: &mut World, snap: &WorldSnapshot) {
        let scale = resolution::scale_between(snap.resolution_index, self.local_resolution);

        for state in &snap.players {
            match world.player_mut(state.uid) {
                Some(ent) => set_player_state(ent, state, scale),
                None => {
                    let mut ent =
                        Entity::player(state.uid, false, self.player_size.0, self.player_size.1);
                    set_player_state(&mut ent, state, scale);
                    info!(uid = state.uid, "remote player sighted");
                    world.entities.push(ent);
                }
            }
        }

        for state in &snap.spears {
            match world.spear_mut(state.uid) {
                Some(ent) => set_spear_state(ent, state, scale),
                None => {
                    let mut ent = Entity::spear(state.uid, self.spear_size.0, self.spear_size.1);
                    set_spear_state(&mut ent, state, scale);
                    world.entities.push(ent);
                }
            }
        }
    }

    /// One-time designation of the local, input-driven player.
    fn apply_assignment(&self, world: &mut World, assign: &SessionAssignment) {
        let scale = resolution::scale_between(assign.resolution_index, self.local_resolution);
        let x = assign.x * scale;
        let y = assign.y * scale;

        if let Some(ent) = world.player_mut(assign.uid) {
            // Repeated assignment repositions rather than duplicating.
            ent.body.x = x;
            ent.body.y = y;
        } else {
            let mut ent = Entity::player(assign.uid, true, self.player_size.0, self.player_size.1);
            ent.body.x = x;
            ent.body.y = y;
            world.entities.push(ent);
        }
        world.local_uid = Some(assign.uid);
        info!(uid = assign.uid, x, y, "session assignment applied");
    }
}

fn set_entity_state(body: &mut Body, state: &EntityState, scale: f32) {
    body.x = state.x * scale;
    body.y = state.y * scale;
    body.vx = state.vx * scale;
    body.vy = state.vy * scale;
    body.movement_direction = MovementDirection::from_id(state.movement_direction);
    body.requests_jump = state.requests_jump;
    // The wire flag carries airborne state; mirror it into both.
    body.is_in_air = state.is_jumping;
    body.is_jumping = state.is_jumping;
}

fn set_player_state(ent: &mut Entity, state: &PlayerState, scale: f32) {
    set_entity_state(&mut ent.body, &state.entity, scale);
    if let Some(p) = ent.player_data_mut() {
        p.flipped = state.flip;
        p.has_weapon = state.has_weapon;
        p.requests_attack = state.requests_attack;
    }
}

fn set_spear_state(ent: &mut Entity, state: &SpearState, scale: f32) {
    set_entity_state(&mut ent.body, &state.entity, scale);
    if let skirmish_shared::entity::Kind::Spear(s) = &mut ent.kind {
        s.last_rotation = state.last_rotation;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skirmish_shared::grid::starter_arena;
    use skirmish_shared::net::InputImpulse;

    fn reconciler() -> (StateReconciler, World) {
        let (grid, spawns) = starter_arena();
        let sim = SimConfig::default();
        let rec = StateReconciler::new(2, &sim, &grid);
        (rec, World::new(grid, spawns))
    }

    fn player_state(uid: i32, x: f32) -> PlayerState {
        PlayerState {
            entity: EntityState {
                x,
                y: 16.0,
                vx: 10.0,
                vy: 0.0,
                movement_direction: 1,
                requests_jump: false,
                is_jumping: true,
            },
            uid,
            flip: false,
            has_weapon: true,
            requests_attack: false,
        }
    }

    fn snapshot(players: Vec<PlayerState>, spears: Vec<SpearState>) -> WorldSnapshot {
        WorldSnapshot {
            resolution_index: 2,
            players,
            spears,
        }
    }

    #[test]
    fn unseen_uid_creates_exactly_one_entity() {
        let (rec, mut world) = reconciler();
        let snap = snapshot(vec![player_state(7, 40.0)], Vec::new());

        rec.apply(&mut world, &NetMsg::WorldSnapshot(snap.clone()));
        assert_eq!(world.entities.len(), 1);
        assert_eq!(world.player(7).unwrap().body.x, 40.0);

        // Second sighting updates, never duplicates.
        let moved = snapshot(vec![player_state(7, 55.0)], Vec::new());
        rec.apply(&mut world, &NetMsg::WorldSnapshot(moved));
        assert_eq!(world.entities.len(), 1);
        assert_eq!(world.player(7).unwrap().body.x, 55.0);
    }

    #[test]
    fn reapplying_a_snapshot_is_idempotent() {
        let (rec, mut world) = reconciler();
        let snap = NetMsg::WorldSnapshot(snapshot(
            vec![player_state(1, 40.0), player_state(2, 90.0)],
            vec![SpearState {
                entity: EntityState {
                    x: 120.0,
                    y: 60.0,
                    vx: 300.0,
                    vy: -40.0,
                    movement_direction: 1,
                    requests_jump: false,
                    is_jumping: false,
                },
                uid: 1,
                last_rotation: 30.0,
            }],
        ));

        rec.apply(&mut world, &snap);
        let once = world.clone();
        rec.apply(&mut world, &snap);
        assert_eq!(world, once);
    }

    #[test]
    fn assignment_creates_scaled_local_player() {
        let (grid, spawns) = starter_arena();
        let sim = SimConfig::default();
        // Local endpoint runs at 720p, sender at 1080p: factor 1.0 / (720/1080).
        let rec = StateReconciler::new(0, &sim, &grid);
        let mut world = World::new(grid, spawns);

        rec.apply(
            &mut world,
            &NetMsg::SessionAssignment(SessionAssignment {
                uid: 4,
                x: 96.0,
                y: 48.0,
                resolution_index: 2,
            }),
        );

        assert_eq!(world.local_uid, Some(4));
        let ent = world.local_player().unwrap();
        assert!((ent.body.x - 96.0 * (1080.0 / 720.0)).abs() < 1e-3);
        assert!(ent.player_data().unwrap().is_local);

        // Repeat repositions rather than duplicating.
        rec.apply(
            &mut world,
            &NetMsg::SessionAssignment(SessionAssignment {
                uid: 4,
                x: 10.0,
                y: 10.0,
                resolution_index: 2,
            }),
        );
        assert_eq!(world.entities.len(), 1);
    }

    #[test]
    fn snapshot_overwrites_airborne_state_from_wire_flag() {
        let (rec, mut world) = reconciler();
        rec.apply(
            &mut world,
            &NetMsg::WorldSnapshot(snapshot(vec![player_state(1, 40.0)], Vec::new())),
        );
        let body = &world.player(1).unwrap().body;
        assert!(body.is_in_air);
        assert!(body.is_jumping);
        assert_eq!(body.movement_direction, MovementDirection::Right);
    }

    #[test]
    fn inbound_impulse_has_no_local_effect() {
        let (rec, mut world) = reconciler();
        rec.apply(
            &mut world,
            &NetMsg::WorldSnapshot(snapshot(vec![player_state(1, 40.0)], Vec::new())),
        );
        let before = world.clone();

        rec.apply(
            &mut world,
            &NetMsg::InputImpulse(InputImpulse {
                jump_flag: false,
                movement_flag: 1,
                sent_at_ms: 123,
            }),
        );
        assert_eq!(world, before);
    }
}
