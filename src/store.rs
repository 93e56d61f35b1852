//! Bar store adapters
//!
//! The engine reads bars through [`BarStore`]. Two adapters ship with the
//! crate: an in-memory store for tests and embedding, and a SQLite-backed
//! candle table for the CLI.

use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock};
use tracing::{debug, info};

use crate::error::Result;
use crate::types::{PriceBar, Timeframe};

/// Ordered bar source. Every fetch returns bars ascending by timestamp,
/// unique per timestamp.
pub trait BarStore: Send + Sync {
    /// Up to `limit` most recent bars
    fn fetch_recent(&self, timeframe: Timeframe, limit: usize) -> Result<Vec<PriceBar>>;

    fn fetch_latest(&self, timeframe: Timeframe) -> Result<Option<PriceBar>>;

    /// Bars with `start <= timestamp <= end`
    fn fetch_range(&self, timeframe: Timeframe, start: i64, end: i64) -> Result<Vec<PriceBar>>;

    /// Insert, or replace the bar with the same timeframe and timestamp
    fn upsert(&self, bar: &PriceBar) -> Result<()>;

    fn upsert_many(&self, bars: &[PriceBar]) -> Result<usize> {
        for bar in bars {
            self.upsert(bar)?;
        }
        Ok(bars.len())
    }

    fn timeframes_available(&self) -> Result<Vec<Timeframe>>;
}

// =============================================================================
// In-memory store
// =============================================================================

#[derive(Debug, Default)]
pub struct MemoryBarStore {
    bars: RwLock<HashMap<Timeframe, Vec<PriceBar>>>,
}

impl MemoryBarStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from bars of any timeframes, in any order
    pub fn with_bars(bars: impl IntoIterator<Item = PriceBar>) -> Self {
        let store = Self::new();
        {
            let mut map = store.bars.write().unwrap_or_else(PoisonError::into_inner);
            for bar in bars {
                insert_sorted(map.entry(bar.timeframe).or_default(), bar);
            }
        }
        store
    }

    pub fn len(&self, timeframe: Timeframe) -> usize {
        self.bars
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&timeframe)
            .map_or(0, Vec::len)
    }
}

fn insert_sorted(series: &mut Vec<PriceBar>, bar: PriceBar) {
    match series.binary_search_by_key(&bar.timestamp, |b| b.timestamp) {
        Ok(pos) => series[pos] = bar,
        Err(pos) => series.insert(pos, bar),
    }
}

impl BarStore for MemoryBarStore {
    fn fetch_recent(&self, timeframe: Timeframe, limit: usize) -> Result<Vec<PriceBar>> {
        let map = self.bars.read().unwrap_or_else(PoisonError::into_inner);
        Ok(map
            .get(&timeframe)
            .map(|series| series[series.len().saturating_sub(limit)..].to_vec())
            .unwrap_or_default())
    }

    fn fetch_latest(&self, timeframe: Timeframe) -> Result<Option<PriceBar>> {
        let map = self.bars.read().unwrap_or_else(PoisonError::into_inner);
        Ok(map.get(&timeframe).and_then(|series| series.last().cloned()))
    }

    fn fetch_range(&self, timeframe: Timeframe, start: i64, end: i64) -> Result<Vec<PriceBar>> {
        let map = self.bars.read().unwrap_or_else(PoisonError::into_inner);
        Ok(map
            .get(&timeframe)
            .map(|series| {
                series
                    .iter()
                    .filter(|b| b.timestamp >= start && b.timestamp <= end)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn upsert(&self, bar: &PriceBar) -> Result<()> {
        let mut map = self.bars.write().unwrap_or_else(PoisonError::into_inner);
        insert_sorted(map.entry(bar.timeframe).or_default(), bar.clone());
        Ok(())
    }

    fn timeframes_available(&self) -> Result<Vec<Timeframe>> {
        let map = self.bars.read().unwrap_or_else(PoisonError::into_inner);
        let mut tfs: Vec<Timeframe> = map
            .iter()
            .filter(|(_, series)| !series.is_empty())
            .map(|(tf, _)| *tf)
            .collect();
        tfs.sort();
        Ok(tfs)
    }
}

// =============================================================================
// SQLite store
// =============================================================================

pub struct SqliteBarStore {
    conn: Mutex<Connection>,
}

impl SqliteBarStore {
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(db_path)?;
        // WAL lets readers run while an import is writing
        conn.pragma_update(None, "journal_mode", "WAL")?;

        let store = Self::from_connection(conn)?;
        info!("Bar store opened at {}", db_path.display());
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.create_tables()?;
        Ok(store)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn create_tables(&self) -> Result<()> {
        let conn = self.conn();
        conn.execute(
            "CREATE TABLE IF NOT EXISTS candles (
                timeframe TEXT NOT NULL,
                ts INTEGER NOT NULL,
                open REAL NOT NULL,
                high REAL NOT NULL,
                low REAL NOT NULL,
                close REAL NOT NULL,
                volume REAL,
                PRIMARY KEY (timeframe, ts)
            )",
            [],
        )?;
        Ok(())
    }

    fn upsert_with(conn: &Connection, bar: &PriceBar) -> rusqlite::Result<usize> {
        conn.execute(
            "INSERT INTO candles (timeframe, ts, open, high, low, close, volume)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(timeframe, ts) DO UPDATE SET
                open = excluded.open,
                high = excluded.high,
                low = excluded.low,
                close = excluded.close,
                volume = excluded.volume",
            params![
                bar.timeframe.as_str(),
                bar.timestamp,
                bar.open,
                bar.high,
                bar.low,
                bar.close,
                bar.volume,
            ],
        )
    }

    fn row_to_bar(timeframe: Timeframe, row: &rusqlite::Row<'_>) -> rusqlite::Result<PriceBar> {
        Ok(PriceBar::new_unchecked(
            timeframe,
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
            row.get(5)?,
        ))
    }
}

impl BarStore for SqliteBarStore {
    fn fetch_recent(&self, timeframe: Timeframe, limit: usize) -> Result<Vec<PriceBar>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT ts, open, high, low, close, volume FROM candles
             WHERE timeframe = ?1 ORDER BY ts DESC LIMIT ?2",
        )?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut bars = stmt
            .query_map(params![timeframe.as_str(), limit], |row| {
                Self::row_to_bar(timeframe, row)
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        bars.reverse();
        Ok(bars)
    }

    fn fetch_latest(&self, timeframe: Timeframe) -> Result<Option<PriceBar>> {
        let conn = self.conn();
        let bar = conn
            .query_row(
                "SELECT ts, open, high, low, close, volume FROM candles
                 WHERE timeframe = ?1 ORDER BY ts DESC LIMIT 1",
                params![timeframe.as_str()],
                |row| Self::row_to_bar(timeframe, row),
            )
            .optional()?;
        Ok(bar)
    }

    fn fetch_range(&self, timeframe: Timeframe, start: i64, end: i64) -> Result<Vec<PriceBar>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT ts, open, high, low, close, volume FROM candles
             WHERE timeframe = ?1 AND ts >= ?2 AND ts <= ?3 ORDER BY ts ASC",
        )?;
        let bars = stmt
            .query_map(params![timeframe.as_str(), start, end], |row| {
                Self::row_to_bar(timeframe, row)
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(bars)
    }

    fn upsert(&self, bar: &PriceBar) -> Result<()> {
        let conn = self.conn();
        Self::upsert_with(&conn, bar)?;
        Ok(())
    }

    fn upsert_many(&self, bars: &[PriceBar]) -> Result<usize> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        for bar in bars {
            Self::upsert_with(&tx, bar)?;
        }
        tx.commit()?;
        debug!("Upserted {} bars", bars.len());
        Ok(bars.len())
    }

    fn timeframes_available(&self) -> Result<Vec<Timeframe>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT DISTINCT timeframe FROM candles")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        let mut tfs: Vec<Timeframe> = names.iter().filter_map(|s| s.parse().ok()).collect();
        tfs.sort();
        Ok(tfs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(tf: Timeframe, ts: i64, close: f64) -> PriceBar {
        PriceBar::new_unchecked(tf, ts, close, close + 1.0, close - 1.0, close, Some(5.0))
    }

    fn exercise(store: &dyn BarStore) {
        for ts in [3, 1, 2] {
            store.upsert(&bar(Timeframe::M30, ts * 1800, 100.0 + ts as f64)).unwrap();
        }
        store.upsert(&bar(Timeframe::M30, 2 * 1800, 250.0)).unwrap();
        store.upsert(&bar(Timeframe::D1, 0, 10.0)).unwrap();

        let recent = store.fetch_recent(Timeframe::M30, 2).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].timestamp, 3600);
        assert_eq!(recent[0].close, 250.0);
        assert_eq!(recent[1].timestamp, 5400);

        assert_eq!(store.fetch_recent(Timeframe::M30, 10).unwrap().len(), 3);
        assert_eq!(store.fetch_latest(Timeframe::M30).unwrap().unwrap().timestamp, 5400);
        assert!(store.fetch_latest(Timeframe::H3).unwrap().is_none());
        assert_eq!(store.fetch_range(Timeframe::M30, 1800, 3600).unwrap().len(), 2);
        assert_eq!(
            store.timeframes_available().unwrap(),
            vec![Timeframe::M30, Timeframe::D1]
        );
    }

    #[test]
    fn test_memory_store() {
        exercise(&MemoryBarStore::new());
    }

    #[test]
    fn test_sqlite_store() {
        exercise(&SqliteBarStore::in_memory().unwrap());
    }

    #[test]
    fn test_sqlite_upsert_many_keeps_volume() {
        let store = SqliteBarStore::in_memory().unwrap();
        let mut bars: Vec<PriceBar> = (0..5).map(|i| bar(Timeframe::H1, i * 3600, 50.0)).collect();
        bars[4].volume = None;
        assert_eq!(store.upsert_many(&bars).unwrap(), 5);

        let fetched = store.fetch_recent(Timeframe::H1, 5).unwrap();
        assert_eq!(fetched, bars);
    }
}
