//! Cannon Duel Server
//!
//! Hosts one two-participant duel over WebSocket.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use cannon_duel::{
    DuelGame, GameConfig, GameServer, ServerConfig, TICK_RATE, VERSION,
};

#[derive(Parser, Debug)]
#[command(name = "cannon-duel-server")]
#[command(about = "Authoritative server for a two-participant cannon duel")]
struct Args {
    /// Address to listen on
    #[arg(short, long, env = "CANNON_DUEL_BIND", default_value = "0.0.0.0:8080")]
    bind: SocketAddr,

    /// Simulation ticks per second
    #[arg(long, env = "CANNON_DUEL_TICK_RATE", default_value_t = TICK_RATE)]
    tick_rate: u32,

    /// Regular blocks per participant
    #[arg(long, env = "CANNON_DUEL_BLOCKS", default_value_t = 5)]
    blocks: usize,

    /// Seconds between shots of one cannon
    #[arg(long, env = "CANNON_DUEL_COOLDOWN", default_value_t = 1.0)]
    cooldown: f64,

    /// Fire every ready cannon on each tick
    #[arg(long, env = "CANNON_DUEL_AUTO_FIRE")]
    auto_fire: bool,

    /// Let projectiles destroy cannons
    #[arg(long, env = "CANNON_DUEL_DESTRUCTIBLE_CANNONS")]
    destructible_cannons: bool,

    /// Session seed for spawn layouts (random if omitted)
    #[arg(long, env = "CANNON_DUEL_SEED")]
    seed: Option<u64>,
}

impl Args {
    fn game_config(&self) -> GameConfig {
        let mut config = GameConfig::default();
        config.spawn.regular_blocks = self.blocks;
        config.cannon.cooldown = self.cooldown.max(0.0);
        config.projectile.indestructible_cannons = !self.destructible_cannons;
        config.auto_fire = self.auto_fire;
        config
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let seed = args.seed.unwrap_or_else(|| uuid::Uuid::new_v4().as_u64_pair().0);

    info!("Cannon Duel Server v{}", VERSION);
    info!("Tick Rate: {} Hz", args.tick_rate);
    info!("Regular blocks: {}, cooldown: {}s, auto-fire: {}", args.blocks, args.cooldown, args.auto_fire);
    info!("Session seed: {}", seed);

    let config = ServerConfig {
        bind_addr: args.bind,
        tick_rate: args.tick_rate,
        ..ServerConfig::default()
    };
    let server = Arc::new(GameServer::new(config, DuelGame::new(args.game_config(), seed)));

    let listener = server
        .bind()
        .await
        .with_context(|| format!("binding {}", args.bind))?;

    let signal_server = server.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received, shutting down");
            signal_server.shutdown();
        }
    });

    server.serve(listener).await?;
    Ok(())
}
