//! CSV import and export of price bars
//!
//! Input is header-driven: columns `time,open,high,low,close[,volume]` in any
//! order and any case. `time` may be epoch seconds, epoch milliseconds, an
//! RFC3339 string or `%Y-%m-%d %H:%M:%S` (assumed UTC).

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use std::path::Path;
use tracing::{info, warn};

use crate::error::{RecoError, Result};
use crate::types::{PriceBar, Timeframe};

/// Epoch values above this are taken as milliseconds
const EPOCH_MS_THRESHOLD: f64 = 1e10;

const TIME_COLUMNS: &[&str] = &["time", "timestamp", "datetime", "date"];

struct Columns {
    time: usize,
    open: usize,
    high: usize,
    low: usize,
    close: usize,
    volume: Option<usize>,
}

impl Columns {
    fn from_headers(headers: &csv::StringRecord) -> Result<Self> {
        let names: Vec<String> = headers.iter().map(|h| h.trim().to_lowercase()).collect();
        let find = |name: &str| names.iter().position(|h| h == name);
        let require = |name: &'static str| {
            find(name).ok_or_else(|| RecoError::invalid("csv", format!("missing column '{}'", name)))
        };

        let time = TIME_COLUMNS
            .iter()
            .find_map(|name| find(*name))
            .ok_or_else(|| RecoError::invalid("csv", "missing column 'time'"))?;

        Ok(Self {
            time,
            open: require("open")?,
            high: require("high")?,
            low: require("low")?,
            close: require("close")?,
            volume: find("volume"),
        })
    }
}

/// Parse a bar time into epoch seconds
pub fn parse_time(raw: &str) -> Option<i64> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(value) = s.parse::<f64>() {
        if !value.is_finite() {
            return None;
        }
        let secs = if value.abs() > EPOCH_MS_THRESHOLD {
            value / 1000.0
        } else {
            value
        };
        return Some(secs.floor() as i64);
    }

    if let Ok(dt) = s.parse::<DateTime<Utc>>() {
        return Some(dt.timestamp());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp());
    }

    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|ndt| ndt.and_utc().timestamp())
}

fn parse_price(record: &csv::StringRecord, idx: usize) -> Option<f64> {
    record.get(idx)?.trim().parse::<f64>().ok()
}

/// Load bars for one timeframe from a CSV file.
///
/// Rows with an unparseable time or invalid prices are skipped with a warning.
/// The output is sorted and unique by timestamp (last row wins).
pub fn load_csv(path: impl AsRef<Path>, timeframe: Timeframe) -> Result<Vec<PriceBar>> {
    let path = path.as_ref();
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
    let columns = Columns::from_headers(reader.headers()?)?;

    let mut bars = Vec::new();
    let mut skipped_time = 0usize;
    let mut skipped_invalid = 0usize;

    for result in reader.records() {
        let record = result?;

        let Some(timestamp) = record.get(columns.time).and_then(parse_time) else {
            skipped_time += 1;
            continue;
        };

        let prices = (
            parse_price(&record, columns.open),
            parse_price(&record, columns.high),
            parse_price(&record, columns.low),
            parse_price(&record, columns.close),
        );
        let (Some(open), Some(high), Some(low), Some(close)) = prices else {
            skipped_invalid += 1;
            continue;
        };
        let volume = columns.volume.and_then(|idx| parse_price(&record, idx));

        match PriceBar::new(timeframe, timestamp, open, high, low, close, volume) {
            Ok(bar) => bars.push(bar),
            Err(e) => {
                warn!("Skipping bar at {}: {}", timestamp, e);
                skipped_invalid += 1;
            }
        }
    }

    if skipped_time > 0 {
        warn!("Skipped {} rows with unparseable time in {}", skipped_time, path.display());
    }
    if skipped_invalid > 0 {
        warn!("Skipped {} rows with invalid prices in {}", skipped_invalid, path.display());
    }

    // stable sort keeps file order among equal timestamps, so the last row wins
    bars.sort_by_key(|b| b.timestamp);
    let mut deduped: Vec<PriceBar> = Vec::with_capacity(bars.len());
    for bar in bars {
        match deduped.last_mut() {
            Some(last) if last.timestamp == bar.timestamp => *last = bar,
            _ => deduped.push(bar),
        }
    }

    info!("Loaded {} {} bars from {}", deduped.len(), timeframe, path.display());
    Ok(deduped)
}

/// Write bars as `time,open,high,low,close,volume` with RFC3339 UTC times
pub fn write_csv(path: impl AsRef<Path>, bars: &[PriceBar]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path.as_ref())?;
    writer.write_record(["time", "open", "high", "low", "close", "volume"])?;

    for bar in bars {
        let time = bar
            .datetime()
            .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Secs, true))
            .unwrap_or_else(|| bar.timestamp.to_string());
        writer.write_record([
            time,
            bar.open.to_string(),
            bar.high.to_string(),
            bar.low.to_string(),
            bar.close.to_string(),
            bar.volume.map(|v| v.to_string()).unwrap_or_default(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}
