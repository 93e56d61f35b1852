//! Configuration management
//!
//! Handles loading of the optional JSON configuration file. Every section has
//! defaults, so a missing file or a partial file is fine. `RECO_*` environment
//! variables (optionally from a `.env` file) override individual fields.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::warn;

use crate::scoring::ScoreWeights;
use crate::types::Timeframe;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub simulation: SimulationConfig,
    pub grid: GridConfig,
    pub scoring: ScoreWeights,
    pub recommend: RecommendConfig,
    pub spike: SpikeConfig,
}

impl Config {
    /// Load configuration from JSON file, then apply environment overrides
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_file_with(path, |key| std::env::var(key).ok())
    }

    /// Load from JSON file, then apply overrides from `lookup`
    pub fn from_file_with<F>(path: impl AsRef<Path>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config: Config =
            serde_json::from_str(&contents).context("Failed to parse config JSON")?;
        config.apply_overrides(lookup);
        Ok(config)
    }

    /// File if given, defaults otherwise; `.env` and `RECO_*` variables on top
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenv::dotenv().ok();
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let mut config = Config::default();
                config.apply_env();
                Ok(config)
            }
        }
    }

    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply `RECO_*` overrides from `lookup`. Malformed values keep the current setting.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("RECO_DB_PATH") {
            self.store.db_path = path;
        }
        override_f64(&lookup, "RECO_MAX_LEVERAGE", &mut self.recommend.max_leverage);
        override_f64(&lookup, "RECO_RISK_PCT_DEFAULT", &mut self.recommend.risk_pct_default);
        override_f64(&lookup, "RECO_STOP_ATR_MULT", &mut self.simulation.baseline_stop_mult);
        override_f64(&lookup, "RECO_FEE_BPS", &mut self.simulation.fee_bps);
        override_f64(&lookup, "RECO_MIN_ATR_PCT", &mut self.recommend.min_atr_pct);
        override_f64(&lookup, "RECO_MAX_ATR_PCT", &mut self.recommend.max_atr_pct);

        if let Some(raw) = lookup("RECO_EVAL_LOOKBACK_BARS") {
            match raw.trim().parse::<usize>() {
                Ok(v) => self.simulation.eval_lookback_bars = v,
                Err(_) => warn!("Ignoring RECO_EVAL_LOOKBACK_BARS={:?}: not an integer", raw),
            }
        }
        override_list(&lookup, "RECO_ENTRY_K_GRID", &mut self.grid.entry_k);
        override_list(&lookup, "RECO_STOP_MULT_GRID", &mut self.grid.stop_mult);
    }
}

fn override_f64<F>(lookup: &F, key: &str, target: &mut f64)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(raw) = lookup(key) {
        match raw.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => *target = v,
            _ => warn!("Ignoring {}={:?}: not a number", key, raw),
        }
    }
}

fn override_list<F>(lookup: &F, key: &str, target: &mut Vec<f64>)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(raw) = lookup(key) {
        match parse_f64_list(&raw) {
            Some(values) if !values.is_empty() => *target = values,
            _ => warn!("Ignoring {}={:?}: expected comma-separated numbers", key, raw),
        }
    }
}

/// Parse "0,0.25,0.5" style lists
pub fn parse_f64_list(raw: &str) -> Option<Vec<f64>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<f64>().ok())
        .collect()
}

/// Candle store location
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub db_path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            db_path: "data/candles.db".to_string(),
        }
    }
}

/// Simulator settings shared by every optimizer run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub fee_bps: f64,
    /// Stop multiple of the market-entry baseline
    pub baseline_stop_mult: f64,
    /// Most recent bars handed to the simulator
    pub eval_lookback_bars: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            fee_bps: 0.0,
            baseline_stop_mult: 1.5,
            eval_lookback_bars: 2000,
        }
    }
}

/// Parameter grids searched in limit-offset mode
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub entry_k: Vec<f64>,
    pub stop_mult: Vec<f64>,
}

impl Default for GridConfig {
    fn default() -> Self {
        GridConfig {
            entry_k: vec![0.0, 0.25, 0.5, 0.75, 1.0],
            stop_mult: vec![1.0, 1.25, 1.5, 1.75, 2.0],
        }
    }
}

/// Recommendation composer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommendConfig {
    pub daily_lookback_bars: usize,
    pub intraday_lookback_bars: usize,
    /// Fewer bars than this and a timeframe is skipped (and the regime is unknown)
    pub min_history_bars: usize,
    /// Percent of account risked per trade when the caller does not say
    pub risk_pct_default: f64,
    pub max_leverage: f64,
    /// ATR as percent of close must lie in `[min_atr_pct, max_atr_pct]`
    pub min_atr_pct: f64,
    pub max_atr_pct: f64,
    /// Entry offset used when the optimizer has nothing for a timeframe
    pub fallback_entry_k: BTreeMap<Timeframe, f64>,
    pub fallback_stop_mult: f64,
}

impl Default for RecommendConfig {
    fn default() -> Self {
        RecommendConfig {
            daily_lookback_bars: 260,
            intraday_lookback_bars: 260,
            min_history_bars: 210,
            risk_pct_default: 0.5,
            max_leverage: 10.0,
            min_atr_pct: 0.15,
            max_atr_pct: 4.0,
            fallback_entry_k: BTreeMap::from([
                (Timeframe::M30, 1.0),
                (Timeframe::H1, 0.25),
                (Timeframe::H3, 0.6),
            ]),
            fallback_stop_mult: 1.5,
        }
    }
}

impl RecommendConfig {
    pub fn fallback_entry_k(&self, timeframe: Timeframe) -> f64 {
        self.fallback_entry_k.get(&timeframe).copied().unwrap_or(0.5)
    }
}

/// Volume/range spike detector thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpikeConfig {
    pub volume_lookback: usize,
    pub range_lookback: usize,
    pub volume_multiple: f64,
    pub range_multiple: f64,
    /// Minimum bar range as percent of close
    pub min_range_pct: f64,
}

impl Default for SpikeConfig {
    fn default() -> Self {
        SpikeConfig {
            volume_lookback: 20,
            range_lookback: 20,
            volume_multiple: 3.0,
            range_multiple: 2.0,
            min_range_pct: 0.4,
        }
    }
}
