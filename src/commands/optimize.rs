//! Optimize command implementation with progress tracking

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use reversion_reco::optimizer::{GridParams, Optimizer};
use reversion_reco::store::BarStore;
use reversion_reco::{Side, Timeframe};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

fn parse_timeframes(raw: Option<&str>) -> Result<Vec<Timeframe>> {
    match raw {
        None => Ok(Timeframe::INTRADAY.to_vec()),
        Some(s) => s
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(|t| t.parse::<Timeframe>().map_err(anyhow::Error::from))
            .collect(),
    }
}

/// One tick per simulator run, baseline included
fn progress_total(grid: &GridParams, timeframes: usize) -> u64 {
    (grid.len() * timeframes) as u64
}

pub fn run(config_path: Option<&Path>, side: String, timeframes: Option<String>) -> Result<()> {
    info!("Starting optimization");

    let config = super::load_config(config_path)?;
    let side: Side = side.parse()?;
    let timeframes = parse_timeframes(timeframes.as_deref())?;

    let store: Arc<dyn BarStore> = Arc::new(super::open_store(&config, None)?);
    let optimizer = Optimizer::from_config(store, &config)?;
    let per_run = optimizer.grid().len();

    info!("Timeframes to test: {:?}", timeframes);
    info!("Combinations per timeframe: {}", per_run);

    let pb = ProgressBar::new(progress_total(optimizer.grid(), timeframes.len()));
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );

    let mut results = Vec::new();
    for tf in &timeframes {
        pb.set_message(format!("{} {}", tf, side));
        match optimizer.optimize_with_progress(*tf, side, Some(&pb))? {
            Some(result) => results.push(result),
            None => info!("No bars stored for {}", tf),
        }
    }
    pb.finish_with_message("done");

    println!("\n{}", "=".repeat(90));
    println!("OPTIMIZATION RESULTS ({})", side);
    println!("{}", "=".repeat(90));
    println!(
        "{:<6} {:>6} {:<13} {:>7} {:>6} {:>7} {:>8} {:>9} {:>8} {:>9}",
        "TF", "Bars", "Mode", "k", "Stop", "Trades", "Win%", "Return%", "MaxDD%", "Score"
    );
    println!("{}", "-".repeat(90));
    for r in &results {
        let b = &r.best;
        println!(
            "{:<6} {:>6} {:<13} {:>7.2} {:>6.2} {:>7} {:>8.2} {:>9.2} {:>8.2} {:>9.4}",
            r.timeframe.as_str(),
            r.bars_used,
            b.entry_mode.as_str(),
            b.entry_offset_mult,
            b.stop_mult,
            b.metrics.trade_count,
            b.metrics.win_rate * 100.0,
            b.metrics.total_return * 100.0,
            b.metrics.max_drawdown * 100.0,
            b.score
        );
    }
    if results.is_empty() {
        println!("No timeframe had stored bars");
    }

    Ok(())
}
