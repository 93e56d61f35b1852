//! Parameter grid optimizer
//!
//! Runs the simulator once with a market entry (the baseline) and once per
//! `(entry_k, stop_mult)` pair with a limit-offset entry, scores every run and
//! keeps the best. Candidates are evaluated in parallel with rayon; results are
//! collected in evaluation order so the first maximum wins ties.
//!
//! Results are cached per `(timeframe, side)` and tagged with the timestamp of
//! the newest bar they were computed from. A newer bar in the store
//! invalidates the entry; wall-clock time never does.

use indicatif::ProgressBar;
use itertools::iproduct;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

use crate::backtest::{simulate, BacktestMetrics, SimulationParams, MIN_SIMULATION_BARS};
use crate::config::{Config, GridConfig};
use crate::error::{RecoError, Result};
use crate::scoring::{score_with, ScoreWeights};
use crate::store::BarStore;
use crate::types::{EntryMode, PriceBar, Side, Timeframe};

/// Finite, sorted, de-duplicated search grids
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridParams {
    entry_k: Vec<f64>,
    stop_mult: Vec<f64>,
}

impl GridParams {
    pub fn new(entry_k: Vec<f64>, stop_mult: Vec<f64>) -> Result<Self> {
        if let Some(bad) = entry_k.iter().find(|v| !v.is_finite() || **v < 0.0) {
            return Err(RecoError::invalid("entry_k_grid", format!("values must be >= 0, got {}", bad)));
        }
        if let Some(bad) = stop_mult.iter().find(|v| !v.is_finite() || **v <= 0.0) {
            return Err(RecoError::invalid("stop_mult_grid", format!("values must be > 0, got {}", bad)));
        }
        Ok(Self {
            entry_k: sorted_unique(entry_k),
            stop_mult: sorted_unique(stop_mult),
        })
    }

    pub fn from_config(grid: &GridConfig) -> Result<Self> {
        Self::new(grid.entry_k.clone(), grid.stop_mult.clone())
    }

    pub fn entry_k(&self) -> &[f64] {
        &self.entry_k
    }

    pub fn stop_mult(&self) -> &[f64] {
        &self.stop_mult
    }

    /// Runs per optimization, baseline included
    pub fn len(&self) -> usize {
        1 + self.entry_k.len() * self.stop_mult.len()
    }

    /// Evaluation order: market baseline, then ascending entry_k, then ascending stop_mult
    pub fn candidates(&self, side: Side, baseline_stop_mult: f64, fee_bps: f64) -> Vec<SimulationParams> {
        let mut params = Vec::with_capacity(self.len());
        params.push(SimulationParams::market(side, baseline_stop_mult, fee_bps));
        params.extend(
            iproduct!(self.entry_k.iter(), self.stop_mult.iter())
                .map(|(&k, &s)| SimulationParams::limit_offset(side, k, s, fee_bps)),
        );
        params
    }
}

impl Default for GridParams {
    fn default() -> Self {
        let grid = GridConfig::default();
        Self {
            entry_k: sorted_unique(grid.entry_k),
            stop_mult: sorted_unique(grid.stop_mult),
        }
    }
}

fn sorted_unique(mut values: Vec<f64>) -> Vec<f64> {
    values.sort_by(|a, b| a.total_cmp(b));
    values.dedup();
    values
}

/// One scored simulator run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterCandidate {
    pub entry_mode: EntryMode,
    pub entry_offset_mult: f64,
    pub stop_mult: f64,
    pub metrics: BacktestMetrics,
    pub score: f64,
}

/// Best candidate for a `(timeframe, side)` as of one bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    pub timeframe: Timeframe,
    pub side: Side,
    /// Timestamp of the newest bar in the evaluated window
    pub asof_timestamp: i64,
    pub bars_used: usize,
    pub candidates_evaluated: usize,
    /// The window was shorter than the simulator's minimum: `best` carries no history
    pub insufficient_data: bool,
    pub best: ParameterCandidate,
}

impl OptimizationResult {
    /// `Some(self)` only when the winning parameters come from simulated history
    pub fn usable(&self) -> Option<&Self> {
        (!self.insufficient_data).then_some(self)
    }
}

/// Simulator and scorer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizerSettings {
    pub fee_bps: f64,
    pub baseline_stop_mult: f64,
    pub eval_lookback_bars: usize,
    pub weights: ScoreWeights,
}

impl Default for OptimizerSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl OptimizerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            fee_bps: config.simulation.fee_bps,
            baseline_stop_mult: config.simulation.baseline_stop_mult,
            eval_lookback_bars: config.simulation.eval_lookback_bars,
            weights: config.scoring.clone(),
        }
    }
}

type Slot = Arc<Mutex<Option<Arc<OptimizationResult>>>>;

/// Per-key cache. Each `(timeframe, side)` has its own lock, held across the
/// freshness check and the recomputation, so two requests for one key never
/// race while different keys evaluate concurrently.
#[derive(Debug, Default)]
pub struct OptimizationCache {
    slots: Mutex<HashMap<(Timeframe, Side), Slot>>,
}

impl OptimizationCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, key: (Timeframe, Side)) -> Slot {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.entry(key).or_default().clone()
    }

    /// Cached result regardless of freshness
    pub fn get(&self, timeframe: Timeframe, side: Side) -> Option<Arc<OptimizationResult>> {
        let slot = self.slot((timeframe, side));
        let guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
        guard.clone()
    }

    pub fn clear(&self) {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

/// Grid optimizer over a bar store, memoized per `(timeframe, side)`
pub struct Optimizer {
    store: Arc<dyn BarStore>,
    grid: GridParams,
    settings: OptimizerSettings,
    cache: OptimizationCache,
    evaluations: AtomicUsize,
}

impl Optimizer {
    pub fn new(store: Arc<dyn BarStore>, grid: GridParams, settings: OptimizerSettings) -> Self {
        Self {
            store,
            grid,
            settings,
            cache: OptimizationCache::new(),
            evaluations: AtomicUsize::new(0),
        }
    }

    pub fn from_config(store: Arc<dyn BarStore>, config: &Config) -> Result<Self> {
        let grid = GridParams::from_config(&config.grid)?;
        Ok(Self::new(store, grid, OptimizerSettings::from_config(config)))
    }

    pub fn grid(&self) -> &GridParams {
        &self.grid
    }

    pub fn settings(&self) -> &OptimizerSettings {
        &self.settings
    }

    pub fn cache(&self) -> &OptimizationCache {
        &self.cache
    }

    pub fn store(&self) -> &Arc<dyn BarStore> {
        &self.store
    }

    /// Number of full grid evaluations run so far (cache misses)
    pub fn evaluations(&self) -> usize {
        self.evaluations.load(Ordering::Relaxed)
    }

    /// Best candidate for the pair, `None` when the store has no bars for the timeframe
    pub fn optimize(&self, timeframe: Timeframe, side: Side) -> Result<Option<Arc<OptimizationResult>>> {
        self.optimize_with_progress(timeframe, side, None)
    }

    /// Same as [`Optimizer::optimize`], ticking `progress` once per candidate on a cache miss
    pub fn optimize_with_progress(
        &self,
        timeframe: Timeframe,
        side: Side,
        progress: Option<&ProgressBar>,
    ) -> Result<Option<Arc<OptimizationResult>>> {
        let Some(latest) = self.store.fetch_latest(timeframe)? else {
            return Ok(None);
        };

        let slot = self.cache.slot((timeframe, side));
        let mut cached = slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(result) = cached.as_ref() {
            if result.asof_timestamp == latest.timestamp {
                debug!("Cache hit for {} {} at {}", timeframe, side, latest.timestamp);
                return Ok(Some(Arc::clone(result)));
            }
        }

        let bars = self
            .store
            .fetch_recent(timeframe, self.settings.eval_lookback_bars)?;
        if bars.is_empty() {
            return Ok(None);
        }

        let result = Arc::new(self.evaluate(timeframe, side, &bars, progress)?);
        *cached = Some(Arc::clone(&result));
        Ok(Some(result))
    }

    /// Uncached grid evaluation over `bars`
    pub fn evaluate(
        &self,
        timeframe: Timeframe,
        side: Side,
        bars: &[PriceBar],
        progress: Option<&ProgressBar>,
    ) -> Result<OptimizationResult> {
        let candidates = self
            .grid
            .candidates(side, self.settings.baseline_stop_mult, self.settings.fee_bps);
        let asof_timestamp = bars
            .last()
            .map(|b| b.timestamp)
            .ok_or_else(|| RecoError::invalid("bars", "cannot optimize over an empty window"))?;

        info!(
            "Evaluating {} parameter combinations for {} {} over {} bars",
            candidates.len(),
            timeframe,
            side,
            bars.len()
        );

        let insufficient_data = bars.len() < MIN_SIMULATION_BARS;
        if insufficient_data {
            warn!(
                "{} {}: {} bars, simulator needs {}; result carries no history",
                timeframe,
                side,
                bars.len(),
                MIN_SIMULATION_BARS
            );
        }

        let weights = &self.settings.weights;
        let scored: Vec<ParameterCandidate> = candidates
            .par_iter()
            .map(|params| {
                let run = simulate(bars, params)?;
                if let Some(pb) = progress {
                    pb.inc(1);
                }
                let score = score_with(&run.metrics, weights);
                debug!(
                    mode = %params.entry_mode,
                    entry_k = params.entry_k,
                    stop_mult = params.stop_mult,
                    trades = run.metrics.trade_count,
                    score,
                    "candidate scored"
                );
                Ok(ParameterCandidate {
                    entry_mode: params.entry_mode,
                    entry_offset_mult: params.entry_k,
                    stop_mult: params.stop_mult,
                    metrics: run.metrics,
                    score,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let candidates_evaluated = scored.len();
        let best = pick_best(scored)
            .ok_or_else(|| RecoError::invalid("grid", "no candidates to evaluate"))?;
        self.evaluations.fetch_add(1, Ordering::Relaxed);

        info!(
            "Best {} {}: {} k={} stop={} score={:.4} trades={}",
            timeframe,
            side,
            best.entry_mode,
            best.entry_offset_mult,
            best.stop_mult,
            best.score,
            best.metrics.trade_count
        );

        Ok(OptimizationResult {
            timeframe,
            side,
            asof_timestamp,
            bars_used: bars.len(),
            candidates_evaluated,
            insufficient_data,
            best,
        })
    }
}

/// First candidate reaching the maximum score
pub fn pick_best(candidates: Vec<ParameterCandidate>) -> Option<ParameterCandidate> {
    let mut iter = candidates.into_iter();
    let mut best = iter.next()?;
    for candidate in iter {
        if candidate.score > best.score {
            best = candidate;
        }
    }
    Some(best)
}
