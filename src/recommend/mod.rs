//! Recommendation composer
//!
//! Combines the daily trend regime, a per-timeframe entry-ease heuristic, the
//! optimizer's historical score and a volatility filter into one ranked list
//! of intraday candidates, then prices a plan for the winner.

pub mod candidate;
pub mod plan;
pub mod regime;

pub use candidate::{
    build_candidate, compare_candidates, entry_ease_score, normalize_backtest_score, rank_candidates,
    CandidateStatus, TimeframeCandidate, TimeframeSnapshot,
};
pub use plan::{build_plan, ParamsSource, TradePlan};
pub use regime::{regime_from_daily, Regime, RegimeBias};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::backtest::MIN_SIMULATION_BARS;
use crate::config::RecommendConfig;
use crate::error::{RecoError, Result};
use crate::optimizer::Optimizer;
use crate::store::BarStore;
use crate::types::{find_gaps, Side, Timeframe};

/// Structured answer of one recommendation request.
///
/// `ok = false` with `error` set when no timeframe had enough history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendResponse {
    pub ok: bool,
    pub side: Side,
    pub regime: Regime,
    pub selected: Option<TimeframeCandidate>,
    pub plan: Option<TradePlan>,
    pub candidates: Vec<TimeframeCandidate>,
    pub notes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub generated_at: i64,
}

impl RecommendResponse {
    pub fn status(&self) -> Option<CandidateStatus> {
        self.selected.as_ref().map(|c| c.status)
    }

    pub fn composite_score(&self) -> f64 {
        self.selected.as_ref().map_or(0.0, |c| c.composite_score)
    }
}

/// Ranked candidates for one side, before plan construction
#[derive(Debug, Clone)]
pub struct RankedCandidates {
    pub regime: Regime,
    pub candidates: Vec<TimeframeCandidate>,
    pub notes: Vec<String>,
}

pub struct Recommender {
    optimizer: Arc<Optimizer>,
    config: RecommendConfig,
}

impl Recommender {
    pub fn new(optimizer: Arc<Optimizer>, config: RecommendConfig) -> Self {
        Self { optimizer, config }
    }

    pub fn optimizer(&self) -> &Arc<Optimizer> {
        &self.optimizer
    }

    pub fn config(&self) -> &RecommendConfig {
        &self.config
    }

    fn store(&self) -> &Arc<dyn BarStore> {
        self.optimizer.store()
    }

    /// Daily regime from the configured lookback
    pub fn regime(&self) -> Result<Regime> {
        let bars = self
            .store()
            .fetch_recent(Timeframe::D1, self.config.daily_lookback_bars)?;
        Ok(regime_from_daily(&bars, self.config.min_history_bars))
    }

    /// Score every intraday timeframe (or only `focus_tf`) and rank them.
    ///
    /// Fails with [`RecoError::NoCandidates`] when no timeframe had enough history.
    pub fn rank(&self, side: Side, focus_tf: Option<Timeframe>, now: i64) -> Result<RankedCandidates> {
        let ranked = self.collect(side, focus_tf, now)?;
        if ranked.candidates.is_empty() {
            return Err(RecoError::NoCandidates);
        }
        Ok(ranked)
    }

    fn collect(&self, side: Side, focus_tf: Option<Timeframe>, now: i64) -> Result<RankedCandidates> {
        let timeframes: Vec<Timeframe> = match focus_tf {
            Some(tf) if tf.is_intraday_candidate() => vec![tf],
            Some(tf) => {
                return Err(RecoError::invalid(
                    "timeframe",
                    format!("{} is not one of 30m, 60m, 180m", tf),
                ))
            }
            None => Timeframe::INTRADAY.to_vec(),
        };

        let mut notes = Vec::new();
        let regime = self.regime()?;
        if regime.bias == RegimeBias::Unknown {
            notes.push(format!(
                "1D regime unknown: {} bars, need {}",
                regime.bars, self.config.min_history_bars
            ));
        }

        let mut candidates = Vec::new();
        for tf in timeframes {
            let bars = self
                .store()
                .fetch_recent(tf, self.config.intraday_lookback_bars)?;
            if bars.len() < self.config.min_history_bars {
                warn!("Skipping {}: {} bars, need {}", tf, bars.len(), self.config.min_history_bars);
                notes.push(format!(
                    "{} skipped: {} bars, need {}",
                    tf,
                    bars.len(),
                    self.config.min_history_bars
                ));
                continue;
            }

            let Some(snapshot) = TimeframeSnapshot::from_bars(tf, &bars) else {
                notes.push(format!("{} skipped: indicators not warmed up", tf));
                continue;
            };

            let gaps = find_gaps(&bars);
            if !gaps.is_empty() {
                warn!("{} window has {} gaps", tf, gaps.len());
                notes.push(format!(
                    "{} window has {} gaps; next-bar execution assumes contiguous bars",
                    tf,
                    gaps.len()
                ));
            }

            let optimization = self.optimizer.optimize(tf, side)?;
            if let Some(opt) = optimization.as_deref().filter(|o| o.insufficient_data) {
                notes.push(format!(
                    "{} backtest skipped: {} bars, need {}; fallback parameters used",
                    tf, opt.bars_used, MIN_SIMULATION_BARS
                ));
            }
            let candidate = build_candidate(
                &snapshot,
                side,
                &regime,
                optimization.as_deref(),
                &self.config,
                now,
            );
            if !candidate.vol_ok {
                notes.push(format!(
                    "{} ATR {:.2}% of close outside [{:.2}, {:.2}]",
                    tf, candidate.atr_pct, self.config.min_atr_pct, self.config.max_atr_pct
                ));
            }
            candidates.push(candidate);
        }

        rank_candidates(&mut candidates);

        Ok(RankedCandidates {
            regime,
            candidates,
            notes,
        })
    }

    /// Recommendation from string arguments.
    ///
    /// A malformed side, timeframe or risk percent is an `InvalidParameter`;
    /// missing history is an `ok = false` response.
    pub fn recommend(&self, side: &str, risk_pct: Option<f64>, focus_tf: Option<&str>) -> Result<RecommendResponse> {
        let side: Side = side.parse()?;
        let focus_tf = focus_tf.map(str::parse::<Timeframe>).transpose()?;
        self.recommend_at(side, risk_pct, focus_tf, Utc::now().timestamp())
    }

    /// Recommendation as of `now` (epoch seconds)
    pub fn recommend_at(
        &self,
        side: Side,
        risk_pct: Option<f64>,
        focus_tf: Option<Timeframe>,
        now: i64,
    ) -> Result<RecommendResponse> {
        let risk_pct = risk_pct.unwrap_or(self.config.risk_pct_default);
        if !risk_pct.is_finite() || risk_pct <= 0.0 {
            return Err(RecoError::invalid("risk_pct", format!("must be > 0, got {}", risk_pct)));
        }

        let ranked = self.collect(side, focus_tf, now)?;
        if ranked.candidates.is_empty() {
            warn!("No timeframe has enough data for a {} recommendation", side);
            return Ok(RecommendResponse {
                ok: false,
                side,
                regime: ranked.regime,
                selected: None,
                plan: None,
                candidates: Vec::new(),
                notes: ranked.notes,
                error: Some(RecoError::NoCandidates.to_string()),
                generated_at: now,
            });
        }

        let selected = ranked.candidates.first().cloned();
        let plan = selected
            .as_ref()
            .map(|c| build_plan(c, side, risk_pct, &self.config));

        if let Some(c) = &selected {
            info!(
                "Recommend {}: {} {:?} composite={:.2} confidence={:.0}",
                side, c.timeframe, c.status, c.composite_score, c.confidence
            );
        }

        Ok(RecommendResponse {
            ok: true,
            side,
            regime: ranked.regime,
            selected,
            plan,
            candidates: ranked.candidates,
            notes: ranked.notes,
            error: None,
            generated_at: now,
        })
    }

    /// Evaluate both sides and return the one [`choose_auto_side`] prefers
    pub fn recommend_auto(
        &self,
        risk_pct: Option<f64>,
        focus_tf: Option<Timeframe>,
        now: i64,
    ) -> Result<RecommendResponse> {
        let long = self.recommend_at(Side::Long, risk_pct, focus_tf, now)?;
        let short = self.recommend_at(Side::Short, risk_pct, focus_tf, now)?;
        let side = choose_auto_side(&long, &short);

        let mut chosen = match side {
            Side::Long => long,
            Side::Short => short,
        };
        chosen.notes.push(format!("auto side: {}", side));
        Ok(chosen)
    }
}

/// Pick a side from both recommendations.
///
/// The only `ok` side wins; then the only `ready` side; then the larger
/// composite score; then short when the daily regime trends down, else long.
pub fn choose_auto_side(long: &RecommendResponse, short: &RecommendResponse) -> Side {
    match (long.ok, short.ok) {
        (true, false) => return Side::Long,
        (false, true) => return Side::Short,
        _ => {}
    }

    let long_ready = long.status() == Some(CandidateStatus::Ready);
    let short_ready = short.status() == Some(CandidateStatus::Ready);
    match (long_ready, short_ready) {
        (true, false) => return Side::Long,
        (false, true) => return Side::Short,
        _ => {}
    }

    let (long_score, short_score) = (long.composite_score(), short.composite_score());
    if long_score > short_score {
        return Side::Long;
    }
    if short_score > long_score {
        return Side::Short;
    }

    let bias = if long.regime.bias != RegimeBias::Unknown {
        long.regime.bias
    } else {
        short.regime.bias
    };
    if bias == RegimeBias::TrendDown {
        Side::Short
    } else {
        Side::Long
    }
}
