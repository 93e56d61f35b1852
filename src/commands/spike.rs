//! Spike command implementation

use anyhow::{Context, Result};
use reversion_reco::alerts::detect_spike;
use reversion_reco::store::BarStore;
use reversion_reco::Timeframe;
use std::path::Path;

pub fn run(config_path: Option<&Path>, timeframe: String) -> Result<()> {
    let config = super::load_config(config_path)?;
    let timeframe: Timeframe = timeframe.parse()?;
    let store = super::open_store(&config, None)?;

    let lookback = config.spike.volume_lookback.max(config.spike.range_lookback) + 1;
    let bars = store.fetch_recent(timeframe, lookback)?;

    match detect_spike(&bars, &config.spike) {
        Some(report) => {
            let json = serde_json::to_string_pretty(&report).context("Failed to serialize spike report")?;
            println!("{}", json);
        }
        None => println!("No spike on the latest {} bar ({} bars checked)", timeframe, bars.len()),
    }
    Ok(())
}
