//! Backtest command implementation

use anyhow::Result;
use reversion_reco::backtest::{simulate, SimulationParams};
use reversion_reco::scoring::score_with;
use reversion_reco::store::BarStore;
use reversion_reco::{EntryMode, Side, Timeframe};
use std::path::Path;
use tracing::{info, warn};

fn fmt_opt(value: Option<f64>, scale: f64) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{:.2}", v * scale))
}

pub fn run(
    config_path: Option<&Path>,
    timeframe: String,
    side: String,
    entry_mode: String,
    entry_k: f64,
    stop_mult: f64,
    fee_bps: Option<f64>,
) -> Result<()> {
    info!("Starting backtest");

    let config = super::load_config(config_path)?;
    let timeframe: Timeframe = timeframe.parse()?;
    let side: Side = side.parse()?;
    let entry_mode: EntryMode = entry_mode.parse()?;
    let fee_bps = fee_bps.unwrap_or(config.simulation.fee_bps);

    let params = SimulationParams {
        side,
        entry_mode,
        entry_k,
        stop_mult,
        fee_bps,
    };
    params.validate()?;

    let store = super::open_store(&config, None)?;
    let bars = store.fetch_recent(timeframe, config.simulation.eval_lookback_bars)?;
    info!("Loaded {} {} bars", bars.len(), timeframe);

    let result = simulate(&bars, &params)?;
    if result.insufficient_data {
        warn!("Only {} bars available, metrics are empty", bars.len());
    }
    let m = &result.metrics;
    let score = score_with(m, &config.scoring);

    println!("\n{}", "=".repeat(60));
    println!("BACKTEST RESULTS  {} {} {}", timeframe, side, entry_mode);
    println!("{}", "=".repeat(60));
    println!("Bars:               {}", bars.len());
    println!("Entry k / stop:     {:.2} / {:.2} ATR", entry_k, stop_mult);
    println!("Fee:                {:.1} bps", fee_bps);
    println!("Signals / fills:    {} / {}", result.signals, result.fills);
    println!("Fill rate:          {}%", fmt_opt(m.fill_rate, 100.0));
    println!("Total Trades:       {}", m.trade_count);
    println!("Win Rate:           {:.2}%", m.win_rate * 100.0);
    println!("Total Return:       {:.2}%", m.total_return * 100.0);
    println!("Avg Return:         {}%", fmt_opt(m.avg_return, 100.0));
    println!("Max Drawdown:       {:.2}%", m.max_drawdown * 100.0);
    println!("Profit Factor:      {}", fmt_opt(m.profit_factor, 1.0));
    println!("MAE p95:            {}%", fmt_opt(m.mae_p95, 100.0));
    println!("Score:              {:.4}", score);
    println!("{}", "=".repeat(60));

    Ok(())
}
