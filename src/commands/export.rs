//! Export command implementation

use anyhow::{Context, Result};
use reversion_reco::data;
use reversion_reco::store::BarStore;
use std::path::{Path, PathBuf};
use tracing::info;

pub fn run(config_path: Option<&Path>, out_dir: PathBuf, db: Option<String>) -> Result<()> {
    let config = super::load_config(config_path)?;
    let store = super::open_store(&config, db.as_deref())?;

    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("Failed to create {}", out_dir.display()))?;

    let timeframes = store.timeframes_available()?;
    if timeframes.is_empty() {
        println!("Store is empty, nothing to export");
        return Ok(());
    }

    for timeframe in timeframes {
        let bars = store.fetch_range(timeframe, i64::MIN, i64::MAX)?;
        let path = out_dir.join(format!("candles_{}.csv", timeframe));
        data::write_csv(&path, &bars)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Exported {} {} bars", bars.len(), timeframe);
        println!("{:<6} {:>8} bars -> {}", timeframe.as_str(), bars.len(), path.display());
    }
    Ok(())
}
