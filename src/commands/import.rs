//! Import command implementation

use anyhow::{Context, Result};
use reversion_reco::resample::{ingest_bar, partial_bar};
use reversion_reco::store::BarStore;
use reversion_reco::{data, Timeframe};
use std::path::{Path, PathBuf};
use tracing::info;

pub fn run(config_path: Option<&Path>, csv: PathBuf, timeframe: String, db: Option<String>) -> Result<()> {
    let config = super::load_config(config_path)?;
    let timeframe: Timeframe = timeframe.parse()?;
    let store = super::open_store(&config, db.as_deref())?;

    info!("Importing {} as {}", csv.display(), timeframe);
    let bars = data::load_csv(&csv, timeframe)
        .with_context(|| format!("Failed to load {}", csv.display()))?;

    if Timeframe::RESAMPLE_SOURCES.contains(&timeframe) {
        // lower timeframes also fill every 30m/60m/180m bucket they complete
        let mut produced = 0usize;
        for bar in &bars {
            produced += ingest_bar(&store, bar)
                .with_context(|| format!("Failed to ingest bar at {}", bar.timestamp))?
                .len();
        }
        println!("Imported {} {} bars, resampled {} intraday bars", bars.len(), timeframe, produced);

        if timeframe == Timeframe::M1 {
            for target in Timeframe::INTRADAY {
                let last_closed = store.fetch_latest(target)?.map(|b| b.timestamp);
                if let Some(open_bar) = partial_bar(&bars, target, last_closed) {
                    println!(
                        "{:<5} in progress since {}: O {:.2} H {:.2} L {:.2} C {:.2}",
                        target.as_str(),
                        open_bar.timestamp,
                        open_bar.open,
                        open_bar.high,
                        open_bar.low,
                        open_bar.close
                    );
                }
            }
        }
    } else {
        let written = store
            .upsert_many(&bars)
            .context("Failed to write candles")?;
        println!("Imported {} {} bars from {}", written, timeframe, csv.display());
    }

    if let Some(opened) = store.fetch_latest(timeframe)?.and_then(|b| b.datetime()) {
        println!("Latest bar: {}", opened.to_rfc3339());
    }
    Ok(())
}
