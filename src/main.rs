//! Gavel command line.
//!
//! `gavel [PLAYER_UUID]` opens the configured store and, given a player,
//! prints their record and history as JSON.

use anyhow::Context;
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use gavel::{AdminManager, Config};

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

fn main() -> anyhow::Result<()> {
    // Load .env file first (before anything else)
    dotenvy::dotenv().ok();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("gavel=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Config::from_env()?;
    info!("Using {:?} storage", config.database.backend);

    let manager = AdminManager::open(&config)?;
    info!("Store ready");

    let Some(arg) = std::env::args().nth(1) else {
        return Ok(());
    };
    let player = Uuid::parse_str(&arg).with_context(|| format!("`{arg}` is not a player UUID"))?;

    let report = json!({
        "player": manager.get_player_record(player),
        "bans": manager.get_ban_records(player, None),
        "mutes": manager.get_mute_records(player, None),
        "kicks": manager.get_kick_records(player, None),
        "comments": manager.get_comment_records(player, None),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
