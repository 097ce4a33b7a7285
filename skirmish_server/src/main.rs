//! Standalone server binary.
//!
//! Usage:
//!   cargo run -p skirmish_server -- [--host 0.0.0.0] [--tcp-port 4455] [--udp-port 4456] [--tick-hz 60]

use std::env;

use skirmish_server::GameServer;
use skirmish_shared::config::GameConfig;
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
            "--tick-hz" if i + 1 < args.len() => {
                cfg.tick_hz = args[i + 1].parse().unwrap_or(cfg.tick_hz);
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
    let mut server = GameServer::bind(cfg).await?;

    info!(
        tcp = %server.tcp_addr()?,
        udp = %server.udp_addr()?,
        tick_hz = server.cfg.tick_hz,
        "Server listening"
    );

    server.run().await
}
