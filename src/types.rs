//! Core data types used across the recommendation engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::error::RecoError;

/// Validation errors for bar data
#[derive(Debug, Error, PartialEq)]
pub enum BarValidationError {
    #[error("high ({high}) must be >= low ({low})")]
    HighLessThanLow { high: f64, low: f64 },

    #[error("volume ({0}) must be >= 0")]
    NegativeVolume(f64),

    #[error("open ({open}) must be between low ({low}) and high ({high})")]
    OpenOutOfRange { open: f64, low: f64, high: f64 },

    #[error("close ({close}) must be between low ({low}) and high ({high})")]
    CloseOutOfRange { close: f64, low: f64, high: f64 },

    #[error("prices must be positive and finite: open={open}, high={high}, low={low}, close={close}")]
    NonPositivePrice {
        open: f64,
        high: f64,
        low: f64,
        close: f64,
    },
}

// =============================================================================
// Timeframe
// =============================================================================

/// Bar timeframe. Intraday candidates are 30m/60m/180m, the regime is read from 1D.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1m")]
    M1,
    #[serde(rename = "5m")]
    M5,
    #[serde(rename = "15m")]
    M15,
    #[serde(rename = "30m")]
    M30,
    #[serde(rename = "60m")]
    H1,
    #[serde(rename = "180m")]
    H3,
    #[serde(rename = "1D")]
    D1,
}

impl Timeframe {
    /// Timeframes ranked by the recommendation composer
    pub const INTRADAY: [Timeframe; 3] = [Timeframe::M30, Timeframe::H1, Timeframe::H3];

    /// Lower timeframes that can be resampled into the intraday ones
    pub const RESAMPLE_SOURCES: [Timeframe; 3] = [Timeframe::M1, Timeframe::M5, Timeframe::M15];

    pub const ALL: [Timeframe; 7] = [
        Timeframe::M1,
        Timeframe::M5,
        Timeframe::M15,
        Timeframe::M30,
        Timeframe::H1,
        Timeframe::H3,
        Timeframe::D1,
    ];

    /// Bar length in seconds
    pub fn seconds(self) -> i64 {
        match self {
            Timeframe::M1 => 60,
            Timeframe::M5 => 5 * 60,
            Timeframe::M15 => 15 * 60,
            Timeframe::M30 => 30 * 60,
            Timeframe::H1 => 60 * 60,
            Timeframe::H3 => 180 * 60,
            Timeframe::D1 => 24 * 60 * 60,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Timeframe::M1 => "1m",
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
            Timeframe::M30 => "30m",
            Timeframe::H1 => "60m",
            Timeframe::H3 => "180m",
            Timeframe::D1 => "1D",
        }
    }

    pub fn is_intraday_candidate(self) -> bool {
        Self::INTRADAY.contains(&self)
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = RecoError;

    /// Accepts canonical names plus the aliases charting platforms send
    /// ("30", "1H", "3H", "D", ...). Lower timeframes are case-sensitive
    /// because "1M" would otherwise be ambiguous with a monthly bar.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed {
            "1m" | "1" => return Ok(Timeframe::M1),
            "5m" | "5" => return Ok(Timeframe::M5),
            "15m" | "15" => return Ok(Timeframe::M15),
            _ => {}
        }
        match trimmed.to_uppercase().as_str() {
            "30" | "30M" | "0.5H" => Ok(Timeframe::M30),
            "60" | "60M" | "1H" => Ok(Timeframe::H1),
            "180" | "180M" | "3H" => Ok(Timeframe::H3),
            "1D" | "D" | "1DAY" | "DAY" => Ok(Timeframe::D1),
            _ => Err(RecoError::invalid("timeframe", format!("unsupported timeframe '{}'", s))),
        }
    }
}

// =============================================================================
// Side / EntryMode
// =============================================================================

/// Trade direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::Long, Side::Short];

    pub fn as_str(self) -> &'static str {
        match self {
            Side::Long => "long",
            Side::Short => "short",
        }
    }

    /// +1 for long, -1 for short. Prices offset "in the trade's favor" move by `sign`.
    pub fn sign(self) -> f64 {
        match self {
            Side::Long => 1.0,
            Side::Short => -1.0,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Side {
    type Err = RecoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "long" => Ok(Side::Long),
            "short" => Ok(Side::Short),
            _ => Err(RecoError::invalid("side", format!("side must be long or short, got '{}'", s))),
        }
    }
}

/// How the simulated order is priced on the execution bar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryMode {
    /// Fill unconditionally at the next bar's open
    Market,
    /// Rest a limit at next open -/+ k x ATR, fill only if the bar trades through it
    LimitOffset,
}

impl EntryMode {
    pub fn as_str(self) -> &'static str {
        match self {
            EntryMode::Market => "market",
            EntryMode::LimitOffset => "limit_offset",
        }
    }
}

impl fmt::Display for EntryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryMode {
    type Err = RecoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "market" => Ok(EntryMode::Market),
            "limit_offset" | "limit_atr" | "limit" => Ok(EntryMode::LimitOffset),
            _ => Err(RecoError::invalid(
                "entry_mode",
                format!("entry_mode must be market or limit_offset, got '{}'", s),
            )),
        }
    }
}

// =============================================================================
// PriceBar
// =============================================================================

/// One OHLCV observation. `timestamp` is the bar-open time in epoch seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub timeframe: Timeframe,
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
}

impl PriceBar {
    /// Create a new bar with validation
    pub fn new(
        timeframe: Timeframe,
        timestamp: i64,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: Option<f64>,
    ) -> Result<Self, BarValidationError> {
        let bar = Self::new_unchecked(timeframe, timestamp, open, high, low, close, volume);
        bar.validate()?;
        Ok(bar)
    }

    /// Create a bar without validation (for trusted sources or synthetic data)
    pub fn new_unchecked(
        timeframe: Timeframe,
        timestamp: i64,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: Option<f64>,
    ) -> Self {
        Self {
            timeframe,
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    pub fn validate(&self) -> Result<(), BarValidationError> {
        let prices = [self.open, self.high, self.low, self.close];
        if prices.iter().any(|p| !p.is_finite() || *p <= 0.0) {
            return Err(BarValidationError::NonPositivePrice {
                open: self.open,
                high: self.high,
                low: self.low,
                close: self.close,
            });
        }

        if self.high < self.low {
            return Err(BarValidationError::HighLessThanLow {
                high: self.high,
                low: self.low,
            });
        }

        if let Some(volume) = self.volume {
            if volume < 0.0 {
                return Err(BarValidationError::NegativeVolume(volume));
            }
        }

        if self.open < self.low || self.open > self.high {
            return Err(BarValidationError::OpenOutOfRange {
                open: self.open,
                low: self.low,
                high: self.high,
            });
        }

        if self.close < self.low || self.close > self.high {
            return Err(BarValidationError::CloseOutOfRange {
                close: self.close,
                low: self.low,
                high: self.high,
            });
        }

        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Bar-open time as a UTC datetime
    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::<Utc>::from_timestamp(self.timestamp, 0)
    }

    /// Timestamp at which the following bar opens
    pub fn next_open_ts(&self) -> i64 {
        self.timestamp + self.timeframe.seconds()
    }
}

/// A break in bar continuity: `bars[index]` does not open one timeframe after `bars[index - 1]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BarGap {
    pub index: usize,
    pub expected_ts: i64,
    pub actual_ts: i64,
}

/// Find places where consecutive bars are not exactly one timeframe apart.
///
/// The simulator's next-bar execution assumes contiguous bars; it does not
/// patch gaps, so callers use this to flag affected windows.
pub fn find_gaps(bars: &[PriceBar]) -> Vec<BarGap> {
    bars.windows(2)
        .enumerate()
        .filter_map(|(i, w)| {
            let expected_ts = w[0].next_open_ts();
            (w[1].timestamp != expected_ts).then_some(BarGap {
                index: i + 1,
                expected_ts,
                actual_ts: w[1].timestamp,
            })
        })
        .collect()
}

/// Check the store invariant: strictly increasing timestamps
pub fn is_strictly_ascending(bars: &[PriceBar]) -> bool {
    bars.windows(2).all(|w| w[0].timestamp < w[1].timestamp)
}
