//! Priced trade plan for the selected candidate

use serde::{Deserialize, Serialize};

use super::candidate::TimeframeCandidate;
use crate::config::RecommendConfig;
use crate::optimizer::OptimizationResult;
use crate::types::{EntryMode, Side, Timeframe};

/// Take-profit 2 and 3 as multiples of the entry-to-stop distance
const TP2_RISK_MULTIPLE: f64 = 1.5;
const TP3_RISK_MULTIPLE: f64 = 2.5;

/// Where the entry offset and stop multiple came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamsSource {
    Optimizer,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradePlan {
    pub side: Side,
    pub timeframe: Timeframe,
    pub entry_mode: EntryMode,
    pub entry_price: f64,
    pub stop_price: f64,
    /// Fast average: the mean-reversion target
    pub tp1_price: f64,
    pub tp2_price: f64,
    pub tp3_price: f64,
    pub stop_distance_pct: f64,
    pub risk_pct: f64,
    pub max_leverage: f64,
    pub reward_to_risk_tp1: Option<f64>,
    pub reward_to_risk_tp2: Option<f64>,
    pub entry_offset_mult: f64,
    pub stop_mult: f64,
    pub params_source: ParamsSource,
}

/// Price the plan from the candidate's latest close and ATR.
///
/// Uses the optimizer's winning parameters when the candidate carries them
/// and they were simulated over enough history, else the configured per-timeframe fallback with a limit-offset entry.
pub fn build_plan(candidate: &TimeframeCandidate, side: Side, risk_pct: f64, config: &RecommendConfig) -> TradePlan {
    let usable = candidate.chosen_params.as_ref().and_then(OptimizationResult::usable);
    let (entry_mode, entry_k, stop_mult, params_source) = match usable {
        Some(opt) => (
            opt.best.entry_mode,
            opt.best.entry_offset_mult,
            opt.best.stop_mult,
            ParamsSource::Optimizer,
        ),
        None => (
            EntryMode::LimitOffset,
            config.fallback_entry_k(candidate.timeframe),
            config.fallback_stop_mult,
            ParamsSource::Fallback,
        ),
    };

    let sign = side.sign();
    let atr = candidate.atr;
    let entry_price = match entry_mode {
        EntryMode::Market => candidate.close,
        EntryMode::LimitOffset => candidate.close - sign * entry_k * atr,
    };
    let stop_price = entry_price - sign * stop_mult * atr;

    let stop_distance = (entry_price - stop_price).abs();
    let tp1_price = candidate.sma_fast;
    let tp2_price = entry_price + sign * TP2_RISK_MULTIPLE * stop_distance;
    let tp3_price = entry_price + sign * TP3_RISK_MULTIPLE * stop_distance;

    let stop_distance_pct = if entry_price > 0.0 {
        stop_distance / entry_price * 100.0
    } else {
        0.0
    };
    let max_leverage = if stop_distance_pct > 0.0 {
        (risk_pct / stop_distance_pct).min(config.max_leverage)
    } else {
        0.0
    };

    // positive only when the stop sits on the losing side of entry
    let risk = sign * (entry_price - stop_price);
    let reward_to_risk = |target: f64| (risk > 0.0).then(|| sign * (target - entry_price) / risk);

    TradePlan {
        side,
        timeframe: candidate.timeframe,
        entry_mode,
        entry_price,
        stop_price,
        tp1_price,
        tp2_price,
        tp3_price,
        stop_distance_pct,
        risk_pct,
        max_leverage,
        reward_to_risk_tp1: reward_to_risk(tp1_price),
        reward_to_risk_tp2: reward_to_risk(tp2_price),
        entry_offset_mult: if entry_mode == EntryMode::Market { 0.0 } else { entry_k },
        stop_mult,
        params_source,
    }
}
