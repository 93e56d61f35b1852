//! Lower-timeframe resampling
//!
//! Bars from 1m/5m/15m feeds are rolled up into the 30m/60m/180m bars the
//! composer ranks. A lower bar closes a target bucket when its close time
//! lands on the target boundary; the bucket is only built when every lower
//! bar in it is present.

use tracing::{debug, warn};

use crate::error::Result;
use crate::store::BarStore;
use crate::types::{PriceBar, Timeframe};

/// Fold consecutive bars into one bar of `timeframe` opening at `timestamp`
fn aggregate(bars: &[PriceBar], timeframe: Timeframe, timestamp: i64) -> Option<PriceBar> {
    let first = bars.first()?;
    let last = bars.last()?;
    let high = bars.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
    let low = bars.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
    let volume = bars
        .iter()
        .filter_map(|b| b.volume)
        .fold(None, |acc: Option<f64>, v| Some(acc.unwrap_or(0.0) + v));

    Some(PriceBar::new_unchecked(
        timeframe, timestamp, first.open, high, low, last.close, volume,
    ))
}

/// Target bar completed by the lower bar opening at `last_ts`, if any.
///
/// `None` when the target is not a whole multiple of the source, when
/// `last_ts` does not close a target bucket, or when bars are missing.
pub fn resample_bucket(
    lower_bars: &[PriceBar],
    source: Timeframe,
    target: Timeframe,
    last_ts: i64,
) -> Option<PriceBar> {
    let src = source.seconds();
    let tgt = target.seconds();
    if tgt <= src || tgt % src != 0 {
        return None;
    }
    if (last_ts + src).rem_euclid(tgt) != 0 {
        return None;
    }

    let start_ts = last_ts + src - tgt;
    let bucket: Vec<PriceBar> = lower_bars
        .iter()
        .filter(|b| b.timeframe == source && b.timestamp >= start_ts && b.timestamp <= last_ts)
        .cloned()
        .collect();

    let expected = (tgt / src) as usize;
    if bucket.len() < expected {
        return None;
    }
    aggregate(&bucket, target, start_ts)
}

/// Store `bar` and every intraday bar it completes. Returns the produced bars.
pub fn ingest_bar(store: &dyn BarStore, bar: &PriceBar) -> Result<Vec<PriceBar>> {
    store.upsert(bar)?;

    let source = bar.timeframe;
    if !Timeframe::RESAMPLE_SOURCES.contains(&source) {
        return Ok(Vec::new());
    }

    let mut produced = Vec::new();
    for target in Timeframe::INTRADAY {
        let src = source.seconds();
        let tgt = target.seconds();
        if tgt % src != 0 || (bar.timestamp + src).rem_euclid(tgt) != 0 {
            continue;
        }

        let start_ts = bar.timestamp + src - tgt;
        let lower = store.fetch_range(source, start_ts, bar.timestamp)?;
        match resample_bucket(&lower, source, target, bar.timestamp) {
            Some(resampled) => {
                store.upsert(&resampled)?;
                debug!(
                    "Resampled {} @ {} from {} ({} bars)",
                    target,
                    resampled.timestamp,
                    source,
                    lower.len()
                );
                produced.push(resampled);
            }
            None => warn!(
                "Not enough {} bars to resample {}: {}/{}",
                source,
                target,
                lower.len(),
                tgt / src
            ),
        }
    }
    Ok(produced)
}

/// In-progress `target` bar built from 1-minute bars.
///
/// `None` when the current bucket is already closed (`last_closed_ts` at or
/// after its start) or there are no 1-minute bars in it.
pub fn partial_bar(
    one_minute_bars: &[PriceBar],
    target: Timeframe,
    last_closed_ts: Option<i64>,
) -> Option<PriceBar> {
    if !target.is_intraday_candidate() {
        return None;
    }
    let latest_ts = one_minute_bars.last()?.timestamp;
    let bucket_start = latest_ts - latest_ts.rem_euclid(target.seconds());
    if last_closed_ts.is_some_and(|ts| bucket_start <= ts) {
        return None;
    }

    let bucket: Vec<PriceBar> = one_minute_bars
        .iter()
        .filter(|b| b.timestamp >= bucket_start && b.timestamp <= latest_ts)
        .cloned()
        .collect();
    aggregate(&bucket, target, bucket_start)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryBarStore;

    fn bar(tf: Timeframe, ts: i64, base: f64) -> PriceBar {
        PriceBar::new_unchecked(tf, ts, base, base + 2.0, base - 1.0, base + 1.0, Some(10.0))
    }

    fn fifteen_minute_bars(count: i64) -> Vec<PriceBar> {
        (0..count)
            .map(|i| bar(Timeframe::M15, i * 900, 100.0 + i as f64))
            .collect()
    }

    #[test]
    fn test_resample_bucket() {
        let bars = fifteen_minute_bars(2);
        let out = resample_bucket(&bars, Timeframe::M15, Timeframe::M30, 900).unwrap();
        assert_eq!(out.timeframe, Timeframe::M30);
        assert_eq!(out.timestamp, 0);
        assert_eq!(out.open, 100.0);
        assert_eq!(out.high, 103.0);
        assert_eq!(out.low, 99.0);
        assert_eq!(out.close, 102.0);
        assert_eq!(out.volume, Some(20.0));
    }

    #[test]
    fn test_resample_bucket_rejects_misaligned_or_short() {
        let bars = fifteen_minute_bars(2);
        assert!(resample_bucket(&bars, Timeframe::M15, Timeframe::M30, 0).is_none());
        assert!(resample_bucket(&bars[1..], Timeframe::M15, Timeframe::M30, 900).is_none());
        assert!(resample_bucket(&bars, Timeframe::M30, Timeframe::M15, 900).is_none());
    }

    #[test]
    fn test_ingest_produces_every_completed_target() {
        let store = MemoryBarStore::new();
        let mut produced = Vec::new();
        for b in fifteen_minute_bars(12) {
            produced.extend(ingest_bar(&store, &b).unwrap());
        }
        // 12 x 15m = 3h: six 30m, three 60m, one 180m
        assert_eq!(store.len(Timeframe::M15), 12);
        assert_eq!(store.len(Timeframe::M30), 6);
        assert_eq!(store.len(Timeframe::H1), 3);
        assert_eq!(store.len(Timeframe::H3), 1);
        assert_eq!(produced.len(), 10);

        let h3 = store.fetch_latest(Timeframe::H3).unwrap().unwrap();
        assert_eq!(h3.timestamp, 0);
        assert_eq!(h3.open, 100.0);
        assert_eq!(h3.close, 112.0);
        assert_eq!(h3.volume, Some(120.0));
    }

    #[test]
    fn test_ingest_intraday_bar_does_not_resample() {
        let store = MemoryBarStore::new();
        let produced = ingest_bar(&store, &bar(Timeframe::M30, 1800, 50.0)).unwrap();
        assert!(produced.is_empty());
        assert_eq!(store.len(Timeframe::M30), 1);
    }

    #[test]
    fn test_partial_bar() {
        let minutes: Vec<PriceBar> = (0..35)
            .map(|i| bar(Timeframe::M1, i * 60, 10.0 + i as f64))
            .collect();
        let partial = partial_bar(&minutes, Timeframe::M30, Some(0)).unwrap();
        assert_eq!(partial.timestamp, 1800);
        assert_eq!(partial.open, 40.0);
        assert_eq!(partial.close, 45.0);
        assert_eq!(partial.volume, Some(50.0));

        assert!(partial_bar(&minutes, Timeframe::M30, Some(1800)).is_none());
        assert!(partial_bar(&minutes, Timeframe::D1, None).is_none());
        assert!(partial_bar(&[], Timeframe::H1, None).is_none());
    }
}
