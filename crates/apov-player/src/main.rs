//! Entry point for the APoV player.

use anyhow::Result;
use apov_player::{app, config::Config};
use clap::Parser;

fn main() -> Result<()> {
    // Initialize logging; default to "info" if RUST_LOG is unset.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::parse();
    log::debug!("Configuration: {:?}", config);

    app::run(config)
}
