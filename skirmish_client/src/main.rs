//! Standalone client binary.
//!
//! Usage:
//!   cargo run -p skirmish_client -- [--host 127.0.0.1] [--tcp-port 4455] [--udp-port 4456]
//!
//! The client connects to the server, runs the fixed-tick session loop, and
//! takes movement commands from stdin:
//!   left / right / idle   - set movement direction
//!   jump                  - request a jump this tick
//!   attack <x> <y>        - throw toward a world-space aim point
//!   status                - show session status
//!   quit                  - exit

use std::env;
use std::io::BufRead;
use std::time::Duration;

use anyhow::Context;
use skirmish_client::endpoint::SessionEndpoint;
use skirmish_client::input::InputState;
use skirmish_shared::config::GameConfig;
use skirmish_shared::entity::{MovementDirection, World};
use skirmish_shared::grid::starter_arena;
use tokio::sync::mpsc;
use tracing::info;

fn parse_args() -> GameConfig {
    let mut cfg = GameConfig::default();
    let args: Vec<String> = env::args().collect();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--host" if i + 1 < args.len() => {
                cfg.server_host = args[i + 1].clone();
                i += 2;
            }
            "--tcp-port" if i + 1 < args.len() => {
                cfg.tcp_port = args[i + 1].parse().unwrap_or(cfg.tcp_port);
                i += 2;
            }
            "--udp-port" if i + 1 < args.len() => {
                cfg.udp_port = args[i + 1].parse().unwrap_or(cfg.udp_port);
                i += 2;
            }
            "--resolution" if i + 1 < args.len() => {
                cfg.resolution_index = args[i + 1].parse().unwrap_or(cfg.resolution_index);
                i += 2;
            }
            _ => i += 1,
        }
    }
    cfg
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cfg = parse_args();
    info!(host = %cfg.server_host, tcp = cfg.tcp_port, udp = cfg.udp_port, "Starting client");

    let (grid, spawns) = starter_arena();
    let world = World::new(grid, spawns);

    let mut endpoint = SessionEndpoint::connect(&cfg, world).await.context("connect")?;

    // Stdin reader thread feeding the tick loop.
    let (line_tx, mut line_rx) = mpsc::channel::<String>(32);
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            let line = line.trim().to_string();
            if !line.is_empty() && line_tx.blocking_send(line).is_err() {
                break;
            }
        }
    });

    println!("Connected. Commands: left right idle jump attack <x> <y> status quit");

    let dt = 1.0 / cfg.tick_hz as f32;
    let tick_interval = Duration::from_secs_f32(dt);
    let mut direction = MovementDirection::Idle;

    loop {
        let mut input = InputState {
            direction,
            jump: false,
            attack: None,
        };

        while let Ok(line) = line_rx.try_recv() {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            match tokens.as_slice() {
                ["left"] => direction = MovementDirection::Left,
                ["right"] => direction = MovementDirection::Right,
                ["idle"] => direction = MovementDirection::Idle,
                ["jump"] => input.jump = true,
                ["attack", x, y] => {
                    if let (Ok(x), Ok(y)) = (x.parse(), y.parse()) {
                        input.attack = Some((x, y));
                    } else {
                        println!("Usage: attack <x> <y>");
                    }
                }
                ["status"] => {
                    println!("State: {:?}", endpoint.state());
                    println!("Entities: {}", endpoint.world.entities.len());
                    if let Some(ent) = endpoint.world.local_player() {
                        println!(
                            "Local uid {}: x={:.1} y={:.1} in_air={}",
                            ent.uid(),
                            ent.body.x,
                            ent.body.y,
                            ent.body.is_in_air
                        );
                    } else {
                        println!("Awaiting session assignment");
                    }
                }
                ["quit"] | ["exit"] => return Ok(()),
                _ => println!("Unknown command: {line}"),
            }
            input.direction = direction;
        }

        endpoint.update(dt, &input);

        if let Some(reason) = endpoint.take_disconnect() {
            println!("Disconnected from server: {reason}");
            break;
        }

        tokio::time::sleep(tick_interval).await;
    }

    Ok(())
}
