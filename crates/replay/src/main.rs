//! Session replay - Main Entry Point
//!
//! Usage: `replay <frames.json> [profiles.json] [config.toml]`

use std::path::PathBuf;

use anyhow::Context;
use replay::{init_logging, run_replay, ReplayArgs};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging()?;

    let mut args = std::env::args_os().skip(1).map(PathBuf::from);
    let replay_args = ReplayArgs {
        frames: args
            .next()
            .context("usage: replay <frames.json> [profiles.json] [config.toml]")?,
        profiles: args.next(),
        config: args.next(),
    };

    info!("=== Session replay v{} ===", env!("CARGO_PKG_VERSION"));
    let summary = run_replay(&replay_args).await?;
    println!("{}", serde_json::to_string_pretty(&summary)?);

    Ok(())
}
