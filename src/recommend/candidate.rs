//! Per-timeframe candidate scoring and ranking

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use super::regime::Regime;
use crate::config::RecommendConfig;
use crate::indicators::{atr14_last, rsi2_last, sma_last};
use crate::optimizer::OptimizationResult;
use crate::signal::{RuleInputs, FAST_SMA_PERIOD, RSI_LONG_THRESHOLD, RSI_SHORT_THRESHOLD, TREND_SMA_PERIOD};
use crate::types::{PriceBar, Side, Timeframe};

// Entry-ease terms
const EASE_TRIGGERED: f64 = 100.0;
const EASE_SMA_WEIGHT: f64 = 200.0;
const EASE_RSI_WEIGHT: f64 = 1.0;
const EASE_REGIME_ADJUSTMENT: f64 = 10.0;
const EASE_MAX: f64 = 110.0;

// Composite terms
const BACKTEST_WEIGHT: f64 = 20.0;
const REGIME_CONFIDENCE_WEIGHT: f64 = 10.0;
const ALIGNMENT_BONUS: f64 = 6.0;
const TRIGGER_BONUS: f64 = 6.0;
const TREND_BONUS: f64 = 4.0;
const VOLATILITY_PENALTY: f64 = 12.0;

// Confidence blend
const CONF_EASE_WEIGHT: f64 = 0.5;
const CONF_BACKTEST_WEIGHT: f64 = 0.3;
const CONF_REGIME_WEIGHT: f64 = 0.2;
const CONF_VOL_OK: f64 = 0.05;
const CONF_VOL_BAD: f64 = -0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CandidateStatus {
    Ready,
    Wait,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeframeCandidate {
    pub timeframe: Timeframe,
    pub asof_timestamp: i64,
    pub close: f64,
    pub sma_fast: f64,
    pub sma_trend: f64,
    pub rsi2: f64,
    pub atr: f64,
    /// ATR as a percent of close
    pub atr_pct: f64,
    pub trend_ok: bool,
    pub trigger_now: bool,
    pub vol_ok: bool,
    pub entry_ease_score: f64,
    /// Optimizer score normalized into `[0, 1]`
    pub backtest_norm: f64,
    pub composite_score: f64,
    /// 0..=100
    pub confidence: f64,
    pub status: CandidateStatus,
    /// Seconds until the next bar opens, never negative
    pub time_remaining_secs: i64,
    pub chosen_params: Option<OptimizationResult>,
}

/// How cheaply the entry rule could trigger from here.
///
/// 100 when the pullback trigger already holds. Otherwise 100 minus the
/// fractional distance the close must still travel past the fast average
/// (x200) and the fractional distance RSI(2) must still travel past its
/// threshold (x1). Regime alignment adds or removes 10; the result is
/// clamped to `[0, 110]`.
pub fn entry_ease_score(side: Side, inputs: &RuleInputs, alignment: f64) -> f64 {
    let base = if inputs.trigger(side) {
        EASE_TRIGGERED
    } else {
        let close = inputs.close;
        let (dist_sma, dist_rsi) = match side {
            Side::Long => (
                ratio_or_zero(close - inputs.sma_fast, close),
                (inputs.rsi2 - RSI_LONG_THRESHOLD) / RSI_LONG_THRESHOLD,
            ),
            Side::Short => (
                ratio_or_zero(inputs.sma_fast - close, close),
                (RSI_SHORT_THRESHOLD - inputs.rsi2) / RSI_SHORT_THRESHOLD,
            ),
        };
        EASE_TRIGGERED - (dist_sma.max(0.0) * EASE_SMA_WEIGHT + dist_rsi.max(0.0) * EASE_RSI_WEIGHT)
    };
    (base + EASE_REGIME_ADJUSTMENT * alignment).clamp(0.0, EASE_MAX)
}

fn ratio_or_zero(num: f64, den: f64) -> f64 {
    if den > 0.0 {
        num / den
    } else {
        0.0
    }
}

/// Bounded transform of an unbounded optimizer score; no score maps to 0.5
pub fn normalize_backtest_score(score: Option<f64>) -> f64 {
    match score {
        Some(s) if s.is_finite() => 0.5 + 0.5 * (s / 3.0).tanh(),
        _ => 0.5,
    }
}

/// Latest indicator state of one timeframe
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeframeSnapshot {
    pub timeframe: Timeframe,
    pub asof_timestamp: i64,
    pub inputs: RuleInputs,
    pub atr: f64,
}

impl TimeframeSnapshot {
    /// `None` if any indicator lacks history
    pub fn from_bars(timeframe: Timeframe, bars: &[PriceBar]) -> Option<Self> {
        let last = bars.last()?;
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let highs: Vec<f64> = bars.iter().map(|b| b.high).collect();
        let lows: Vec<f64> = bars.iter().map(|b| b.low).collect();

        Some(Self {
            timeframe,
            asof_timestamp: last.timestamp,
            inputs: RuleInputs {
                close: last.close,
                sma_fast: sma_last(&closes, FAST_SMA_PERIOD)?,
                sma_trend: sma_last(&closes, TREND_SMA_PERIOD)?,
                rsi2: rsi2_last(&closes)?,
            },
            atr: atr14_last(&highs, &lows, &closes)?,
        })
    }
}

/// Score a timeframe snapshot into a rankable candidate
pub fn build_candidate(
    snapshot: &TimeframeSnapshot,
    side: Side,
    regime: &Regime,
    optimization: Option<&OptimizationResult>,
    config: &RecommendConfig,
    now: i64,
) -> TimeframeCandidate {
    let inputs = snapshot.inputs;
    let alignment = regime.bias.alignment(side);

    let trigger_now = inputs.trigger(side);
    let trend_ok = inputs.trend_ok(side);
    let atr_pct = ratio_or_zero(snapshot.atr, inputs.close) * 100.0;
    let vol_ok = inputs.close > 0.0 && atr_pct >= config.min_atr_pct && atr_pct <= config.max_atr_pct;

    let ease = entry_ease_score(side, &inputs, alignment);
    // a result over too short a window scores like no result at all
    let usable = optimization.and_then(OptimizationResult::usable);
    let backtest_norm = normalize_backtest_score(usable.map(|o| o.best.score));

    let mut composite = ease
        + BACKTEST_WEIGHT * backtest_norm
        + REGIME_CONFIDENCE_WEIGHT * regime.confidence
        + ALIGNMENT_BONUS * alignment;
    if trigger_now {
        composite += TRIGGER_BONUS;
    }
    composite += if trend_ok { TREND_BONUS } else { -TREND_BONUS };
    if !vol_ok {
        composite -= VOLATILITY_PENALTY;
    }

    let vol_adjustment = if vol_ok { CONF_VOL_OK } else { CONF_VOL_BAD };
    let confidence = (CONF_EASE_WEIGHT * ease / 100.0
        + CONF_BACKTEST_WEIGHT * backtest_norm
        + CONF_REGIME_WEIGHT * regime.confidence
        + vol_adjustment)
        .clamp(0.0, 1.0)
        * 100.0;

    let status = if trigger_now && trend_ok && vol_ok {
        CandidateStatus::Ready
    } else {
        CandidateStatus::Wait
    };

    TimeframeCandidate {
        timeframe: snapshot.timeframe,
        asof_timestamp: snapshot.asof_timestamp,
        close: inputs.close,
        sma_fast: inputs.sma_fast,
        sma_trend: inputs.sma_trend,
        rsi2: inputs.rsi2,
        atr: snapshot.atr,
        atr_pct,
        trend_ok,
        trigger_now,
        vol_ok,
        entry_ease_score: ease,
        backtest_norm,
        composite_score: composite,
        confidence,
        status,
        time_remaining_secs: (snapshot.asof_timestamp + snapshot.timeframe.seconds() - now).max(0),
        chosen_params: optimization.cloned(),
    }
}

/// Best first: composite, then ease, then triggered, then sooner next bar
pub fn compare_candidates(a: &TimeframeCandidate, b: &TimeframeCandidate) -> Ordering {
    b.composite_score
        .total_cmp(&a.composite_score)
        .then_with(|| b.entry_ease_score.total_cmp(&a.entry_ease_score))
        .then_with(|| b.trigger_now.cmp(&a.trigger_now))
        .then_with(|| a.time_remaining_secs.cmp(&b.time_remaining_secs))
}

pub fn rank_candidates(candidates: &mut [TimeframeCandidate]) {
    candidates.sort_by(compare_candidates);
}
