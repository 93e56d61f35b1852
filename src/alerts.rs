//! Volume and volatility spike detection on the latest bar

use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, Median};

use crate::config::SpikeConfig;
use crate::types::{PriceBar, Timeframe};

/// Context of a triggered spike
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpikeReport {
    pub timeframe: Timeframe,
    pub timestamp: i64,
    pub close: f64,
    pub volume: f64,
    pub volume_base: f64,
    pub volume_ratio: f64,
    pub range_pct: f64,
    pub range_base: f64,
    pub range_ratio: f64,
}

/// Bar range as a percent of close, 0 for a non-positive close
fn range_pct(bar: &PriceBar) -> f64 {
    if bar.close <= 0.0 {
        return 0.0;
    }
    (bar.high - bar.low) / bar.close * 100.0
}

fn median(values: Vec<f64>) -> f64 {
    Data::new(values).median()
}

fn ratio(now: f64, base: f64) -> f64 {
    if base > 0.0 {
        now / base
    } else {
        0.0
    }
}

/// Check the last bar of `bars` against the medians of the bars before it.
///
/// Fires when volume and range both reach their multiples of the median and
/// the range is at least `min_range_pct`. `None` when not triggered or when
/// history is too thin: fewer than `max(5, N / 2)` usable points per series.
pub fn detect_spike(bars: &[PriceBar], config: &SpikeConfig) -> Option<SpikeReport> {
    let lookback = config.volume_lookback.max(config.range_lookback);
    if lookback < 5 || bars.len() < lookback + 1 {
        return None;
    }

    let (last, history) = bars.split_last()?;

    let volumes: Vec<f64> = history[history.len() - config.volume_lookback..]
        .iter()
        .filter_map(|b| b.volume)
        .filter(|v| *v > 0.0)
        .collect();
    if volumes.len() < 5.max(config.volume_lookback / 2) {
        return None;
    }
    let volume_base = median(volumes);
    let volume = last.volume.unwrap_or(0.0);
    let volume_ratio = ratio(volume, volume_base);

    let ranges: Vec<f64> = history[history.len() - config.range_lookback..]
        .iter()
        .map(range_pct)
        .collect();
    if ranges.len() < 5.max(config.range_lookback / 2) {
        return None;
    }
    let range_base = median(ranges);
    let range_now = range_pct(last);
    let range_ratio = ratio(range_now, range_base);

    let triggered = volume_ratio >= config.volume_multiple
        && range_ratio >= config.range_multiple
        && range_now >= config.min_range_pct;

    triggered.then(|| SpikeReport {
        timeframe: last.timeframe,
        timestamp: last.timestamp,
        close: last.close,
        volume,
        volume_base,
        volume_ratio,
        range_pct: range_now,
        range_base,
        range_ratio,
    })
}
