//! Input handling.
//!
//! Windowing and key mapping belong to the presentation layer; this module
//! takes an already-sampled [`InputState`] per tick, applies it to the
//! local player's flags, and builds the outbound impulse from them.

use skirmish_shared::{
    entity::{MovementDirection, World},
    net::InputImpulse,
};

/// Sampled user input at a moment in time.
#[derive(Debug, Clone, Copy, Default)]
pub struct InputState {
    pub direction: MovementDirection,
    /// Pressed this tick (edge, not level).
    pub jump: bool,
    /// Aim point in world units, when an attack was triggered this tick.
    pub attack: Option<(f32, f32)>,
}

/// Writes sampled input onto the local player, if one exists yet.
pub fn apply_input(world: &mut World, input: &InputState) {
    let Some(ent) = world.local_player_mut() else {
        return;
    };
    ent.body.movement_direction = input.direction;
    if input.jump {
        ent.body.requests_jump = true;
    }
    if let Some((aim_x, aim_y)) = input.attack {
        if let Some(p) = ent.player_data_mut() {
            p.requests_attack = true;
            p.attack_x = aim_x;
            p.attack_y = aim_y;
        }
    }
}

/// Builds the per-tick impulse from the captured local flags.
pub fn build_impulse(jump: bool, direction: MovementDirection) -> InputImpulse {
    InputImpulse {
        jump_flag: jump,
        movement_flag: direction.id(),
        sent_at_ms: chrono::Utc::now().timestamp_millis(),
    }
}
