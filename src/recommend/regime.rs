//! Higher-timeframe trend regime from daily bars

use serde::{Deserialize, Serialize};

use crate::indicators::sma_last;
use crate::signal::TREND_SMA_PERIOD;
use crate::types::{PriceBar, Side};

/// Distance-from-average multiplier for regime confidence
const CONFIDENCE_SCALE: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegimeBias {
    TrendUp,
    TrendDown,
    Unknown,
}

impl RegimeBias {
    /// +1 when the bias favors `side`, -1 when it opposes it, 0 when unknown
    pub fn alignment(self, side: Side) -> f64 {
        match (self, side) {
            (RegimeBias::Unknown, _) => 0.0,
            (RegimeBias::TrendUp, Side::Long) | (RegimeBias::TrendDown, Side::Short) => 1.0,
            _ => -1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Regime {
    pub bias: RegimeBias,
    /// 0..=1
    pub confidence: f64,
    pub last_close: Option<f64>,
    pub sma_trend: Option<f64>,
    pub asof_timestamp: Option<i64>,
    pub bars: usize,
}

impl Regime {
    pub fn unknown(bars: usize) -> Self {
        Regime {
            bias: RegimeBias::Unknown,
            confidence: 0.0,
            last_close: None,
            sma_trend: None,
            asof_timestamp: None,
            bars,
        }
    }
}

/// Trend-up if the last close is above its 200-bar average, trend-down otherwise.
///
/// Confidence is `|close - sma| / sma * 5` clamped to `[0, 1]`. Fewer than
/// `min_history` bars (or a non-positive average) gives an unknown bias.
pub fn regime_from_daily(bars: &[PriceBar], min_history: usize) -> Regime {
    if bars.len() < min_history {
        return Regime::unknown(bars.len());
    }

    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let (Some(sma), Some(last)) = (sma_last(&closes, TREND_SMA_PERIOD), bars.last()) else {
        return Regime::unknown(bars.len());
    };
    if sma <= 0.0 {
        return Regime::unknown(bars.len());
    }

    let distance = (last.close - sma).abs() / sma;
    let bias = if last.close > sma {
        RegimeBias::TrendUp
    } else {
        RegimeBias::TrendDown
    };

    Regime {
        bias,
        confidence: (distance * CONFIDENCE_SCALE).clamp(0.0, 1.0),
        last_close: Some(last.close),
        sma_trend: Some(sma),
        asof_timestamp: Some(last.timestamp),
        bars: bars.len(),
    }
}
