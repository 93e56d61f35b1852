//! Scalar ranking of backtest metrics

use serde::{Deserialize, Serialize};

use crate::backtest::BacktestMetrics;

/// Weights and pivots of the score.
///
/// Changing any value changes every ranking the optimizer produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    /// Floor for the drawdown denominator of the Calmar term
    pub calmar_epsilon: f64,
    pub win_rate_pivot: f64,
    pub win_rate_weight: f64,
    pub profit_factor_pivot: f64,
    pub profit_factor_weight: f64,
    pub fill_rate_pivot: f64,
    pub fill_rate_weight: f64,
    pub mae_penalty: f64,
    /// Runs with fewer trades are damped by `thin_sample_factor`
    pub min_trades: usize,
    pub thin_sample_factor: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            calmar_epsilon: 1e-9,
            win_rate_pivot: 0.5,
            win_rate_weight: 0.5,
            profit_factor_pivot: 1.0,
            profit_factor_weight: 0.2,
            fill_rate_pivot: 0.8,
            fill_rate_weight: 0.1,
            mae_penalty: 1.5,
            min_trades: 20,
            thin_sample_factor: 0.5,
        }
    }
}

/// Score with the default weights
pub fn score(metrics: &BacktestMetrics) -> f64 {
    score_with(metrics, &ScoreWeights::default())
}

/// Calmar-like ratio plus win-rate, profit-factor and fill-rate rewards, minus an MAE penalty.
///
/// Undefined profit factor and fill rate count as exactly 1, undefined MAE as 0.
pub fn score_with(metrics: &BacktestMetrics, w: &ScoreWeights) -> f64 {
    let calmar = metrics.total_return / metrics.max_drawdown.max(w.calmar_epsilon);
    let profit_factor = metrics.profit_factor.unwrap_or(1.0);
    let fill_rate = metrics.fill_rate.unwrap_or(1.0);
    let mae = metrics.mae_p95.unwrap_or(0.0);

    let mut s = calmar;
    s += (metrics.win_rate - w.win_rate_pivot) * w.win_rate_weight;
    s += (profit_factor - w.profit_factor_pivot) * w.profit_factor_weight;
    s += (fill_rate - w.fill_rate_pivot) * w.fill_rate_weight;
    s -= mae * w.mae_penalty;

    if metrics.trade_count < w.min_trades {
        s *= w.thin_sample_factor;
    }
    s
}
