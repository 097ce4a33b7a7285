//! Entity model and world state.
//!
//! Characters and thrown spears share one physical shape ([`Body`]) and are
//! told apart by a kind discriminant rather than subtype dispatch; the few
//! divergence points in the integrator switch on [`Kind`]. Uids are unique
//! per kind namespace — a player and a spear may share a number.

use serde::{Deserialize, Serialize};

use crate::grid::{SpawnPoint, TileGrid};

/// Horizontal movement intent. The numeric multiplier is the sole driver of
/// character horizontal velocity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum MovementDirection {
    Left,
    #[default]
    Idle,
    Right,
}

impl MovementDirection {
    pub fn multiplier(self) -> f32 {
        match self {
            MovementDirection::Left => -1.0,
            MovementDirection::Idle => 0.0,
            MovementDirection::Right => 1.0,
        }
    }

    /// Wire id.
    pub fn id(self) -> i8 {
        match self {
            MovementDirection::Left => -1,
            MovementDirection::Idle => 0,
            MovementDirection::Right => 1,
        }
    }

    /// Lossy inverse of [`id`](Self::id); unknown values map to `Idle`.
    pub fn from_id(id: i8) -> Self {
        match id {
            -1 => MovementDirection::Left,
            1 => MovementDirection::Right,
            _ => MovementDirection::Idle,
        }
    }
}

/// Physical fields shared by every simulated entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Body {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub width: f32,
    pub height: f32,
    pub movement_direction: MovementDirection,
    pub is_in_air: bool,
    pub is_jumping: bool,
    pub is_running: bool,
    pub requests_jump: bool,
    /// Cosmetic accumulator; the integrator only resets and advances it.
    pub animation_timer: f32,
}

impl Body {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            vx: 0.0,
            vy: 0.0,
            width,
            height,
            movement_direction: MovementDirection::Idle,
            is_in_air: false,
            is_jumping: false,
            is_running: false,
            requests_jump: false,
            animation_timer: 0.0,
        }
    }

    pub fn center_x(&self) -> f32 {
        self.x + self.width / 2.0
    }

    pub fn center_y(&self) -> f32 {
        self.y + self.height / 2.0
    }
}

/// Player-only state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerData {
    pub uid: i32,
    pub is_local: bool,
    /// Mirrored horizontally (facing left).
    pub flipped: bool,
    pub has_weapon: bool,
    pub requests_attack: bool,
    /// Last recorded aim point, world units.
    pub attack_x: f32,
    pub attack_y: f32,
}

/// Spear-only state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpearData {
    pub uid: i32,
    pub last_rotation: f32,
}

/// Kind discriminant plus kind-specific payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Kind {
    Player(PlayerData),
    Spear(SpearData),
}

/// One simulated entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub body: Body,
    pub kind: Kind,
}

impl Entity {
    pub fn player(uid: i32, is_local: bool, width: f32, height: f32) -> Self {
        Self {
            body: Body::new(width, height),
            kind: Kind::Player(PlayerData {
                uid,
                is_local,
                flipped: false,
                has_weapon: true,
                requests_attack: false,
                attack_x: 0.0,
                attack_y: 0.0,
            }),
        }
    }

    pub fn spear(uid: i32, width: f32, height: f32) -> Self {
        Self {
            body: Body::new(width, height),
            kind: Kind::Spear(SpearData {
                uid,
                last_rotation: 0.0,
            }),
        }
    }

    pub fn is_player(&self) -> bool {
        matches!(self.kind, Kind::Player(_))
    }

    pub fn is_spear(&self) -> bool {
        matches!(self.kind, Kind::Spear(_))
    }

    /// Uid within the entity's own kind namespace.
    pub fn uid(&self) -> i32 {
        match &self.kind {
            Kind::Player(p) => p.uid,
            Kind::Spear(s) => s.uid,
        }
    }

    pub fn player_data(&self) -> Option<&PlayerData> {
        match &self.kind {
            Kind::Player(p) => Some(p),
            Kind::Spear(_) => None,
        }
    }

    pub fn player_data_mut(&mut self) -> Option<&mut PlayerData> {
        match &mut self.kind {
            Kind::Player(p) => Some(p),
            Kind::Spear(_) => None,
        }
    }

    pub fn spear_data(&self) -> Option<&SpearData> {
        match &self.kind {
            Kind::Player(_) => None,
            Kind::Spear(s) => Some(s),
        }
    }
}

/// The live simulation state: one grid plus the insertion-ordered entity
/// collection, mutated by the integrator and the reconciler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct World {
    pub grid: TileGrid,
    pub entities: Vec<Entity>,
    pub spawns: Vec<SpawnPoint>,
    /// Uid of the input-driven player, once assigned.
    pub local_uid: Option<i32>,
    next_spear_uid: i32,
}

impl World {
    pub fn new(grid: TileGrid, spawns: Vec<SpawnPoint>) -> Self {
        Self {
            grid,
            entities: Vec::new(),
            spawns,
            local_uid: None,
            next_spear_uid: 1,
        }
    }

    pub fn find_spawn(&self, name: &str) -> Option<&SpawnPoint> {
        self.spawns.iter().find(|s| s.name == name)
    }

    pub fn player(&self, uid: i32) -> Option<&Entity> {
        self.entities
            .iter()
            .find(|e| e.is_player() && e.uid() == uid)
    }

    pub fn player_mut(&mut self, uid: i32) -> Option<&mut Entity> {
        self.entities
            .iter_mut()
            .find(|e| e.is_player() && e.uid() == uid)
    }

    pub fn spear_mut(&mut self, uid: i32) -> Option<&mut Entity> {
        self.entities
            .iter_mut()
            .find(|e| e.is_spear() && e.uid() == uid)
    }

    pub fn local_player(&self) -> Option<&Entity> {
        self.local_uid.and_then(|uid| self.player(uid))
    }

    pub fn local_player_mut(&mut self) -> Option<&mut Entity> {
        self.local_uid.and_then(move |uid| self.player_mut(uid))
    }

    /// Uid for a locally spawned spear. Authority-born spears arrive with
    /// their own uids via snapshots; no dedup between the two is attempted.
    pub fn alloc_spear_uid(&mut self) -> i32 {
        let uid = self.next_spear_uid;
        self.next_spear_uid += 1;
        uid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::starter_arena;

    #[test]
    fn direction_ids_roundtrip() {
        for dir in [
            MovementDirection::Left,
            MovementDirection::Idle,
            MovementDirection::Right,
        ] {
            assert_eq!(MovementDirection::from_id(dir.id()), dir);
        }
        assert_eq!(MovementDirection::from_id(7), MovementDirection::Idle);
    }

    #[test]
    fn uid_namespaces_are_disjoint_by_kind() {
        let (grid, spawns) = starter_arena();
        let mut world = World::new(grid, spawns);
        world.entities.push(Entity::player(7, false, 12.0, 24.0));
        world.entities.push(Entity::spear(7, 16.0, 4.0));

        assert!(world.player(7).unwrap().is_player());
        assert!(world.spear_mut(7).unwrap().is_spear());
    }

    #[test]
    fn local_player_follows_assignment() {
        let (grid, spawns) = starter_arena();
        let mut world = World::new(grid, spawns);
        assert!(world.local_player().is_none());

        world.entities.push(Entity::player(3, true, 12.0, 24.0));
        world.local_uid = Some(3);
        assert_eq!(world.local_player().unwrap().uid(), 3);
    }
}
