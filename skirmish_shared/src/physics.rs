//! Physics integrator.
//!
//! Advances every entity one tick: input-to-velocity mapping, gravity with a
//! terminal clamp, then a tunneling-safe substep sweep against the tile
//! grid. The pass is single-threaded, allocation-light, and deterministic:
//! identical state, grid, and delta-time sequence produce bit-identical
//! results.
//!
//! Tuning is expressed in tile units and scaled by the grid's tile size at
//! step time, so the same config behaves identically across display scales.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::entity::{Entity, Kind, MovementDirection, World};
use crate::grid::TileGrid;

/// Physics tuning. Tile-relative; see module docs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Character run speed, tiles/sec.
    pub run_speed: f32,
    /// Jump launch speed, tiles/sec.
    pub jump_impulse: f32,
    /// Downward acceleration, tiles/sec^2.
    pub gravity: f32,
    /// Terminal fall speed, tiles/sec (positive magnitude).
    pub max_fall_speed: f32,
    /// Spear launch speed as a multiple of the jump impulse.
    pub spear_speed_factor: f32,
    /// Collision sweep granularity per axis.
    pub substeps: u32,
    /// Entity dimensions, tiles.
    pub player_width: f32,
    pub player_height: f32,
    pub spear_width: f32,
    pub spear_height: f32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            run_speed: 8.0,
            jump_impulse: 16.0,
            gravity: 42.0,
            max_fall_speed: 18.0,
            spear_speed_factor: 2.0,
            substeps: 8,
            player_width: 0.75,
            player_height: 1.5,
            spear_width: 1.0,
            spear_height: 0.25,
        }
    }
}

impl SimConfig {
    /// Player size in world units for the given grid.
    pub fn player_size(&self, grid: &TileGrid) -> (f32, f32) {
        (
            self.player_width * grid.tile_width(),
            self.player_height * grid.tile_height(),
        )
    }

    /// Spear size in world units for the given grid.
    pub fn spear_size(&self, grid: &TileGrid) -> (f32, f32) {
        (
            self.spear_width * grid.tile_width(),
            self.spear_height * grid.tile_height(),
        )
    }
}

/// Per-tick integrator over a [`World`].
#[derive(Debug, Clone)]
pub struct Integrator {
    cfg: SimConfig,
}

impl Integrator {
    pub fn new(cfg: SimConfig) -> Self {
        Self { cfg }
    }

    pub fn cfg(&self) -> &SimConfig {
        &self.cfg
    }

    /// Advances all entities by `dt` seconds. Entities appended during the
    /// pass (spears launched this tick) are integrated in the same pass.
    pub fn step(&self, world: &mut World, dt: f32) {
        let tile_w = world.grid.tile_width();
        let tile_h = world.grid.tile_height();

        let run_speed = self.cfg.run_speed * tile_w;
        let jump_speed = self.cfg.jump_impulse * tile_h;
        let gravity = self.cfg.gravity * tile_h;
        let max_fall = -(self.cfg.max_fall_speed * tile_h);
        let spear_speed = self.cfg.spear_speed_factor * jump_speed;
        let (spear_w, spear_h) = self.cfg.spear_size(&world.grid);
        let substeps = self.cfg.substeps.max(1);

        let mut i = 0;
        while i < world.entities.len() {
            self.update_facing_and_attack(world, i, spear_speed, spear_w, spear_h);
            Self::update_animation_timer(&mut world.entities[i], dt);
            Self::update_velocity(
                &mut world.entities[i],
                dt,
                run_speed,
                jump_speed,
                gravity,
                max_fall,
            );
            Self::move_and_collide(&world.grid, &mut world.entities[i], dt, substeps);
            i += 1;
        }
    }

    /// Orientation from movement direction, plus the edge-triggered attack:
    /// at most one spear per request, and only while armed.
    fn update_facing_and_attack(
        &self,
        world: &mut World,
        index: usize,
        spear_speed: f32,
        spear_w: f32,
        spear_h: f32,
    ) {
        let mut launch = None;

        let ent = &mut world.entities[index];
        if let Kind::Player(p) = &mut ent.kind {
            match ent.body.movement_direction {
                MovementDirection::Left => p.flipped = true,
                MovementDirection::Right => p.flipped = false,
                MovementDirection::Idle => {}
            }

            if p.requests_attack && p.has_weapon {
                let spawn_x = ent.body.center_x();
                let spawn_y = ent.body.center_y();

                // Angle of the aim offset, then rotate the canonical up
                // vector of fixed magnitude by (angle - 90).
                let angle =
                    (p.attack_y - spawn_y).atan2(p.attack_x - spawn_x).to_degrees() - 90.0;
                let (sin, cos) = angle.to_radians().sin_cos();
                let vx = -spear_speed * sin;
                let vy = spear_speed * cos;

                launch = Some((spawn_x, spawn_y, vx, vy));

                ent.body.animation_timer = 0.0;
                p.has_weapon = false;
            }
            p.requests_attack = false;
        }

        if let Some((x, y, vx, vy)) = launch {
            let uid = world.alloc_spear_uid();
            let mut spear = Entity::spear(uid, spear_w, spear_h);
            spear.body.x = x;
            spear.body.y = y;
            spear.body.vx = vx;
            spear.body.vy = vy;
            spear.body.movement_direction = if vx < 0.0 {
                MovementDirection::Left
            } else {
                MovementDirection::Right
            };
            trace!(uid, vx, vy, "spear launched");
            world.entities.push(spear);
        }
    }

    /// Timer resets on the jump-start transition, otherwise accumulates.
    fn update_animation_timer(ent: &mut Entity, dt: f32) {
        let body = &mut ent.body;
        if body.requests_jump && !body.is_in_air {
            body.animation_timer = 0.0;
        }
        body.animation_timer += dt;
    }

    fn update_velocity(
        ent: &mut Entity,
        dt: f32,
        run_speed: f32,
        jump_speed: f32,
        gravity: f32,
        max_fall: f32,
    ) {
        if ent.is_player() {
            ent.body.vx = ent.body.movement_direction.multiplier() * run_speed;
        }

        // A spear whose direction is Idle has come to rest after impact and
        // must not resume falling.
        let resting_spear =
            ent.is_spear() && ent.body.movement_direction == MovementDirection::Idle;

        let body = &mut ent.body;
        body.is_running = body.vx != 0.0;

        if body.requests_jump {
            body.requests_jump = false;
            if !body.is_in_air {
                body.is_jumping = true;
                body.is_in_air = true;
                body.vy = jump_speed;
            }
        } else if !resting_spear {
            body.vy = (body.vy - gravity * dt).max(max_fall);
        }
    }

    /// Substep sweep: probe fractional displacements largest-first on each
    /// axis in turn, adopting the first fraction whose box clears the grid
    /// (zero if none does). The vertical pass reuses the resolved x.
    fn move_and_collide(grid: &TileGrid, ent: &mut Entity, dt: f32, substeps: u32) {
        let is_spear = ent.is_spear();
        let body = &mut ent.body;

        let dx = body.vx * dt;
        let dy = body.vy * dt;

        let mut fx = 0.0;
        for k in (1..=substeps).rev() {
            let f = k as f32 / substeps as f32;
            let x = body.x + dx * f;
            if !grid.overlaps(x, body.y, x + body.width, body.y + body.height) {
                fx = f;
                break;
            }
        }

        let resolved_x = body.x + dx * fx;

        let mut fy = 0.0;
        for k in (1..=substeps).rev() {
            let f = k as f32 / substeps as f32;
            let y = body.y + dy * f;
            if !grid.overlaps(resolved_x, y, resolved_x + body.width, y + body.height) {
                fy = f;
                body.is_in_air = true;
                break;
            }
        }

        // A spear stopped short on either axis has struck something.
        if is_spear && (fx < 1.0 || fy < 1.0) {
            body.vx = 0.0;
            body.vy = 0.0;
            body.movement_direction = MovementDirection::Idle;
        }

        body.x = resolved_x;
        body.y += dy * fy;

        // Hit a side.
        if fx == 0.0 {
            body.is_running = false;
        }

        // Hit the ground or a ceiling.
        if fy == 0.0 {
            if dy < 0.0 {
                body.is_in_air = false;
            }
            body.vy = 0.0;
        }

        if body.vy <= 0.0 {
            body.is_jumping = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::starter_arena;

    const DT: f32 = 1.0 / 60.0;

    /// 10x1 row, 16-unit tiles, everything empty except tile 5.
    fn single_obstacle_row() -> TileGrid {
        let mut grid = TileGrid::new(10, 1, 16.0, 16.0);
        grid.set(5, 0, 1);
        grid
    }

    fn arena_world_with_player(uid: i32) -> World {
        let (grid, spawns) = starter_arena();
        let mut world = World::new(grid, spawns);
        let mut player = Entity::player(uid, true, 12.0, 24.0);
        let spawn = world.find_spawn("p1_start").unwrap();
        player.body.x = spawn.x;
        player.body.y = spawn.y;
        world.entities.push(player);
        world.local_uid = Some(uid);
        world
    }

    #[test]
    fn identical_runs_are_bit_identical() {
        let integrator = Integrator::new(SimConfig::default());

        let run = || {
            let mut world = arena_world_with_player(1);
            for tick in 0..240 {
                if let Some(ent) = world.local_player_mut() {
                    ent.body.movement_direction = if tick % 80 < 40 {
                        MovementDirection::Right
                    } else {
                        MovementDirection::Left
                    };
                    if tick % 50 == 0 {
                        ent.body.requests_jump = true;
                    }
                    if tick == 30 {
                        let p = ent.player_data_mut().unwrap();
                        p.requests_attack = true;
                        p.attack_x = 300.0;
                        p.attack_y = 120.0;
                    }
                }
                integrator.step(&mut world, DT);
            }
            world
        };

        assert_eq!(run(), run());
    }

    #[test]
    fn resting_on_ground_stays_put() {
        let integrator = Integrator::new(SimConfig::default());
        let mut world = arena_world_with_player(1);

        // Settle onto the floor first.
        for _ in 0..30 {
            integrator.step(&mut world, DT);
        }

        let before = world.local_player().unwrap().body.clone();
        integrator.step(&mut world, DT);
        let after = &world.local_player().unwrap().body;

        assert_eq!(after.vy, 0.0);
        assert!(!after.is_in_air);
        assert_eq!(after.x, before.x);
        assert_eq!(after.y, before.y);
    }

    #[test]
    fn free_fall_converges_to_terminal_speed() {
        let cfg = SimConfig::default();
        let integrator = Integrator::new(cfg);

        // Open void: no solid tiles at all.
        let grid = TileGrid::new(10, 10, 16.0, 16.0);
        let mut world = World::new(grid, Vec::new());
        let mut player = Entity::player(1, true, 12.0, 24.0);
        player.body.y = 100.0;
        player.body.is_in_air = true;
        world.entities.push(player);
        world.local_uid = Some(1);

        let terminal = -(cfg.max_fall_speed * 16.0);
        for _ in 0..600 {
            integrator.step(&mut world, DT);
            assert!(world.local_player().unwrap().body.vy >= terminal);
        }
        assert_eq!(world.local_player().unwrap().body.vy, terminal);
    }

    #[test]
    fn jump_is_edge_triggered() {
        let cfg = SimConfig::default();
        let integrator = Integrator::new(cfg);
        let mut world = arena_world_with_player(1);

        for _ in 0..30 {
            integrator.step(&mut world, DT);
        }
        assert!(!world.local_player().unwrap().body.is_in_air);

        // Hold the jump input: the request flag is re-set every tick.
        let mut impulses = 0;
        let mut prev_vy = 0.0;
        for _ in 0..30 {
            world.local_player_mut().unwrap().body.requests_jump = true;
            integrator.step(&mut world, DT);
            let vy = world.local_player().unwrap().body.vy;
            if vy > prev_vy && vy == cfg.jump_impulse * 16.0 {
                impulses += 1;
            }
            prev_vy = vy;
        }
        assert_eq!(impulses, 1);
        assert!(world.local_player().unwrap().body.is_in_air);
    }

    #[test]
    fn sweep_scenario_does_not_tunnel() {
        // Spec'd scenario: 8x8 entity at the origin, vx=200, dt=0.1, one
        // solid tile at index 5. Gravity zeroed to isolate the sweep.
        let cfg = SimConfig {
            gravity: 0.0,
            run_speed: 12.5, // 200 world units/sec at 16-unit tiles
            ..SimConfig::default()
        };
        let integrator = Integrator::new(cfg);

        let mut world = World::new(single_obstacle_row(), Vec::new());
        let mut player = Entity::player(1, true, 8.0, 8.0);
        player.body.movement_direction = MovementDirection::Right;
        world.entities.push(player);
        world.local_uid = Some(1);

        integrator.step(&mut world, 0.1);
        let body = &world.local_player().unwrap().body;
        assert!(body.x <= 64.0, "x = {}", body.x);
        assert_eq!(body.x, 20.0);
    }

    #[test]
    fn sweep_stops_at_obstacle_face() {
        // One tile short of the obstacle, moving 1.25 tiles this tick.
        let cfg = SimConfig {
            gravity: 0.0,
            run_speed: 12.5,
            ..SimConfig::default()
        };
        let integrator = Integrator::new(cfg);

        let mut world = World::new(single_obstacle_row(), Vec::new());
        let mut player = Entity::player(1, true, 8.0, 8.0);
        player.body.x = 56.0;
        player.body.movement_direction = MovementDirection::Right;
        world.entities.push(player);
        world.local_uid = Some(1);

        integrator.step(&mut world, 0.1);
        let body = &world.local_player().unwrap().body;
        assert!(body.x > 56.0, "should advance up to the face");
        assert!(
            body.x + body.width <= 80.0,
            "right edge {} crossed the obstacle face",
            body.x + body.width
        );
    }

    #[test]
    fn spear_comes_to_rest_on_impact() {
        let integrator = Integrator::new(SimConfig::default());
        let (grid, spawns) = starter_arena();
        let mut world = World::new(grid, spawns);

        let mut spear = Entity::spear(1, 16.0, 4.0);
        spear.body.x = 40.0;
        spear.body.y = 40.0;
        spear.body.vx = 600.0;
        spear.body.vy = -300.0;
        spear.body.movement_direction = MovementDirection::Right;
        world.entities.push(spear);

        for _ in 0..120 {
            integrator.step(&mut world, DT);
        }

        let body = &world.entities[0].body;
        assert_eq!(body.movement_direction, MovementDirection::Idle);
        assert_eq!(body.vx, 0.0);
        assert_eq!(body.vy, 0.0);
    }

    #[test]
    fn resting_spear_is_exempt_from_gravity() {
        let integrator = Integrator::new(SimConfig::default());

        // Void grid: a non-exempt entity here would fall forever.
        let grid = TileGrid::new(10, 10, 16.0, 16.0);
        let mut world = World::new(grid, Vec::new());
        let mut spear = Entity::spear(1, 16.0, 4.0);
        spear.body.y = 80.0;
        spear.body.movement_direction = MovementDirection::Idle;
        world.entities.push(spear);

        for _ in 0..60 {
            integrator.step(&mut world, DT);
        }
        assert_eq!(world.entities[0].body.y, 80.0);
        assert_eq!(world.entities[0].body.vy, 0.0);
    }

    #[test]
    fn attack_launches_exactly_one_spear_and_disarms() {
        let integrator = Integrator::new(SimConfig::default());
        let mut world = arena_world_with_player(1);

        for _ in 0..30 {
            integrator.step(&mut world, DT);
        }

        {
            let ent = world.local_player_mut().unwrap();
            let p = ent.player_data_mut().unwrap();
            p.requests_attack = true;
            p.attack_x = 300.0;
            p.attack_y = 200.0;
        }
        integrator.step(&mut world, DT);

        let spears = world.entities.iter().filter(|e| e.is_spear()).count();
        assert_eq!(spears, 1);
        let p = world.local_player().unwrap().player_data().unwrap();
        assert!(!p.has_weapon);
        assert!(!p.requests_attack);

        // Holding the request without a weapon spawns nothing further.
        for _ in 0..10 {
            if let Some(ent) = world.local_player_mut() {
                ent.player_data_mut().unwrap().requests_attack = true;
            }
            integrator.step(&mut world, DT);
        }
        let spears = world.entities.iter().filter(|e| e.is_spear()).count();
        assert_eq!(spears, 1);
    }

    #[test]
    fn launched_spear_flies_toward_aim_point() {
        let integrator = Integrator::new(SimConfig::default());
        let mut world = arena_world_with_player(1);

        {
            let ent = world.local_player_mut().unwrap();
            let cx = ent.body.center_x();
            let cy = ent.body.center_y();
            let p = ent.player_data_mut().unwrap();
            p.requests_attack = true;
            p.attack_x = cx + 100.0;
            p.attack_y = cy;
        }
        integrator.step(&mut world, DT);

        let spear = world.entities.iter().find(|e| e.is_spear()).unwrap();
        assert_eq!(spear.body.movement_direction, MovementDirection::Right);
        assert!(spear.body.vx > 0.0);
        assert!(spear.body.vy.abs() < spear.body.vx * 0.05);
    }
}
