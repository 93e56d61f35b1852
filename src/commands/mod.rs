//! Subcommand implementations

pub mod backtest;
pub mod export;
pub mod import;
pub mod optimize;
pub mod recommend;
pub mod spike;

use anyhow::{Context, Result};
use reversion_reco::store::SqliteBarStore;
use reversion_reco::Config;
use std::path::Path;
use tracing::info;

/// Load configuration, logging where it came from
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = Config::load(path)?;
    match path {
        Some(p) => info!("Loaded configuration from: {}", p.display()),
        None => info!("Using default configuration"),
    }
    Ok(config)
}

/// Open the candle store at `db_override` or the configured path
pub fn open_store(config: &Config, db_override: Option<&str>) -> Result<SqliteBarStore> {
    let db_path = db_override.unwrap_or(&config.store.db_path);
    SqliteBarStore::open(db_path).with_context(|| format!("Failed to open candle store {}", db_path))
}
