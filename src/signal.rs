//! Mean-reversion entry rule
//!
//! Buy weakness inside an uptrend, sell strength inside a downtrend:
//!
//! - Long: close above the 200-bar average, close below the 5-bar average,
//!   RSI(2) at or below 5.
//! - Short: close below the 200-bar average, close above the 5-bar average,
//!   RSI(2) at or above 95.
//!
//! The trend half and the pullback half are exposed separately because the
//! recommendation composer scores them separately.

use serde::{Deserialize, Serialize};

use crate::indicators::{atr14, rsi2, sma};
use crate::types::{PriceBar, Side};

/// Fast average: pullback reference and mean-reversion target
pub const FAST_SMA_PERIOD: usize = 5;
/// Trend average
pub const TREND_SMA_PERIOD: usize = 200;
/// RSI(2) level a long pullback must reach
pub const RSI_LONG_THRESHOLD: f64 = 5.0;
/// RSI(2) level a short rally must reach
pub const RSI_SHORT_THRESHOLD: f64 = 95.0;

/// Indicator values the rule reads on one bar
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RuleInputs {
    pub close: f64,
    pub sma_fast: f64,
    pub sma_trend: f64,
    pub rsi2: f64,
}

impl RuleInputs {
    /// Close on the trend side of the 200-bar average
    pub fn trend_ok(&self, side: Side) -> bool {
        match side {
            Side::Long => self.close > self.sma_trend,
            Side::Short => self.close < self.sma_trend,
        }
    }

    /// Pullback half of the rule: stretched against the fast average with an RSI extreme
    pub fn trigger(&self, side: Side) -> bool {
        match side {
            Side::Long => self.close < self.sma_fast && self.rsi2 <= RSI_LONG_THRESHOLD,
            Side::Short => self.close > self.sma_fast && self.rsi2 >= RSI_SHORT_THRESHOLD,
        }
    }

    /// Full entry signal
    pub fn entry_signal(&self, side: Side) -> bool {
        self.trend_ok(side) && self.trigger(side)
    }
}

/// Exit arms once the close is back across the fast average in the position's favor
pub fn exit_armed(side: Side, close: f64, sma_fast: f64) -> bool {
    match side {
        Side::Long => close > sma_fast,
        Side::Short => close < sma_fast,
    }
}

/// Indicator series for a bar slice, aligned by index
#[derive(Debug, Clone)]
pub struct RuleSeries {
    pub sma_fast: Vec<Option<f64>>,
    pub sma_trend: Vec<Option<f64>>,
    pub rsi2: Vec<Option<f64>>,
    pub atr14: Vec<Option<f64>>,
}

impl RuleSeries {
    pub fn compute(bars: &[PriceBar]) -> Self {
        let close: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let high: Vec<f64> = bars.iter().map(|b| b.high).collect();
        let low: Vec<f64> = bars.iter().map(|b| b.low).collect();

        RuleSeries {
            sma_fast: sma(&close, FAST_SMA_PERIOD),
            sma_trend: sma(&close, TREND_SMA_PERIOD),
            rsi2: rsi2(&close),
            atr14: atr14(&high, &low, &close),
        }
    }

    /// Rule inputs and ATR at bar `i`, `None` while any indicator is warming up
    pub fn at(&self, bars: &[PriceBar], i: usize) -> Option<(RuleInputs, f64)> {
        let inputs = RuleInputs {
            close: bars.get(i)?.close,
            sma_fast: (*self.sma_fast.get(i)?)?,
            sma_trend: (*self.sma_trend.get(i)?)?,
            rsi2: (*self.rsi2.get(i)?)?,
        };
        let atr = (*self.atr14.get(i)?)?;
        Some((inputs, atr))
    }
}
