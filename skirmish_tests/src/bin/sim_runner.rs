//! Determinism runner.
//!
//! Replays scripted input timelines through the shared integrator twice and
//! byte-compares the serialized world after every tick. Any divergence means
//! the simulation depends on something outside world state and input, which
//! breaks client/server agreement.
//!
//! Usage:
//!   cargo run -p skirmish_tests --bin sim_runner [ticks]

use skirmish_shared::entity::{Entity, MovementDirection, World};
use skirmish_shared::grid::starter_arena;
use skirmish_shared::physics::{Integrator, SimConfig};

const DEFAULT_TICKS: u32 = 600;
const DT: f32 = 1.0 / 60.0;

/// Per-tick scripted input for one player.
#[derive(Clone, Copy)]
struct ScriptedInput {
    uid: i32,
    direction: MovementDirection,
    jump: bool,
    attack: Option<(f32, f32)>,
}

struct Scenario {
    name: &'static str,
    script: fn(u32) -> Vec<ScriptedInput>,
}

fn idle_settle(_tick: u32) -> Vec<ScriptedInput> {
    Vec::new()
}

fn run_and_jump(tick: u32) -> Vec<ScriptedInput> {
    let direction = if tick % 120 < 60 {
        MovementDirection::Right
    } else {
        MovementDirection::Left
    };
    vec![ScriptedInput {
        uid: 1,
        direction,
        jump: tick % 45 == 0,
        attack: None,
    }]
}

fn duel_with_throws(tick: u32) -> Vec<ScriptedInput> {
    vec![
        ScriptedInput {
            uid: 1,
            direction: MovementDirection::Right,
            jump: tick % 60 == 10,
            attack: (tick == 30).then_some((336.0, 48.0)),
        },
        ScriptedInput {
            uid: 2,
            direction: MovementDirection::Left,
            jump: tick % 50 == 25,
            attack: (tick == 90).then_some((32.0, 48.0)),
        },
    ]
}

fn seed_world(cfg: &SimConfig) -> anyhow::Result<World> {
    let (grid, spawns) = starter_arena();
    let mut world = World::new(grid, spawns);
    let (w, h) = cfg.player_size(&world.grid);

    for (uid, spawn_name) in [(1, "p1_start"), (2, "p2_start")] {
        let spawn = world
            .find_spawn(spawn_name)
            .ok_or_else(|| anyhow::anyhow!("missing spawn {spawn_name}"))?
            .clone();
        let mut player = Entity::player(uid, false, w, h);
        player.body.x = spawn.x + spawn.width / 2.0 - w / 2.0;
        player.body.y = spawn.y;
        world.entities.push(player);
    }
    Ok(world)
}

fn apply_script(world: &mut World, inputs: &[ScriptedInput]) {
    for input in inputs {
        if let Some(ent) = world.player_mut(input.uid) {
            ent.body.movement_direction = input.direction;
            if input.jump {
                ent.body.requests_jump = true;
            }
            if let Some((x, y)) = input.attack {
                if let Some(p) = ent.player_data_mut() {
                    p.requests_attack = true;
                    p.attack_x = x;
                    p.attack_y = y;
                }
            }
        }
    }
}

/// Runs the scenario once, returning the serialized world after every tick.
fn run_once(scenario: &Scenario, ticks: u32) -> anyhow::Result<Vec<Vec<u8>>> {
    let cfg = SimConfig::default();
    let mut world = seed_world(&cfg)?;
    let mut integrator = Integrator::new(cfg);

    let mut frames = Vec::with_capacity(ticks as usize);
    for tick in 0..ticks {
        apply_script(&mut world, &(scenario.script)(tick));
        integrator.step(&mut world, DT);
        frames.push(serde_json::to_vec(&world)?);
    }
    Ok(frames)
}

fn run_scenario(scenario: &Scenario, ticks: u32) -> anyhow::Result<Option<u32>> {
    let first = run_once(scenario, ticks)?;
    let second = run_once(scenario, ticks)?;

    for (tick, (a, b)) in first.iter().zip(second.iter()).enumerate() {
        if a != b {
            return Ok(Some(tick as u32));
        }
    }
    Ok(None)
}

fn main() -> anyhow::Result<()> {
    let ticks: u32 = std::env::args()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_TICKS);

    let scenarios = [
        Scenario {
            name: "idle_settle",
            script: idle_settle,
        },
        Scenario {
            name: "run_and_jump",
            script: run_and_jump,
        },
        Scenario {
            name: "duel_with_throws",
            script: duel_with_throws,
        },
    ];

    println!("Determinism runner: {ticks} ticks per scenario, dt = {DT}");
    println!();

    let mut failed = 0;
    for scenario in &scenarios {
        match run_scenario(scenario, ticks)? {
            None => println!("  PASS  {}", scenario.name),
            Some(tick) => {
                failed += 1;
                println!("  FAIL  {} (diverged at tick {tick})", scenario.name);
            }
        }
    }

    println!();
    println!(
        "{} scenario(s), {} failed",
        scenarios.len(),
        failed
    );

    if failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}
