//! Integration tests for the recommendation engine
//!
//! These tests drive the simulator, optimizer and composer together over
//! synthetic bar series.

use approx::{assert_abs_diff_eq, assert_relative_eq};
use std::sync::Arc;

use reversion_reco::backtest::{percentile_95, simulate, ExitReason, SimulationParams};
use reversion_reco::config::{Config, RecommendConfig};
use reversion_reco::indicators;
use reversion_reco::optimizer::{GridParams, Optimizer, OptimizerSettings};
use reversion_reco::recommend::{
    rank_candidates, regime_from_daily, CandidateStatus, ParamsSource, RegimeBias, TimeframeCandidate,
};
use reversion_reco::scoring::score;
use reversion_reco::store::{BarStore, MemoryBarStore, SqliteBarStore};
use reversion_reco::{backtest::BacktestMetrics, EntryMode, PriceBar, RecoError, Recommender, Side, Timeframe};

// =============================================================================
// Test Utilities
// =============================================================================

/// Uptrend with a 20-bar sine wave on top: regular pullbacks above the long average
fn oscillating_bars(timeframe: Timeframe, count: usize) -> Vec<PriceBar> {
    let step = timeframe.seconds();
    let mut prev_close = 100.0;
    (0..count)
        .map(|i| {
            let x = i as f64;
            let close = 100.0 + 0.05 * x + 2.0 * (2.0 * std::f64::consts::PI * x / 20.0).sin();
            let open = prev_close;
            prev_close = close;
            PriceBar::new_unchecked(
                timeframe,
                i as i64 * step,
                open,
                open.max(close) + 0.3,
                open.min(close) - 0.3,
                close,
                Some(1000.0 + x),
            )
        })
        .collect()
}

fn ohlc(timeframe: Timeframe, i: usize, open: f64, high: f64, low: f64, close: f64) -> PriceBar {
    PriceBar::new_unchecked(timeframe, i as i64 * timeframe.seconds(), open, high, low, close, None)
}

/// Hourly uptrend ending in two down closes: the only long signal is bar 250,
/// with ATR(14) about 1.01 there. The long average needs 200 bars of warmup,
/// so the setup sits after it.
fn long_setup_bars() -> Vec<PriceBar> {
    let tf = Timeframe::H1;
    let mut bars: Vec<PriceBar> = (0..249)
        .map(|i| {
            let c = 100.0 + 0.1 * i as f64;
            ohlc(tf, i, c - 0.05, c + 0.5, c - 0.5, c)
        })
        .collect();

    // two down closes: RSI(2) = 0 below the fast average, above the long one
    bars.push(ohlc(tf, 249, 124.8, 124.9, 123.9, 124.0));
    bars.push(ohlc(tf, 250, 124.0, 124.1, 122.9, 123.0));
    bars
}

/// Steady 0.1 rise from `start_close` at bar `from` up to bar 299
fn push_rising(bars: &mut Vec<PriceBar>, from: usize, start_close: f64) {
    for i in from..300 {
        let c = start_close + 0.1 * (i - from) as f64;
        bars.push(ohlc(Timeframe::H1, i, c - 0.05, c + 0.5, c - 0.5, c));
    }
}

/// Market fill at bar 251 and a stop hit at bar 255
fn single_stop_cycle_bars() -> Vec<PriceBar> {
    let tf = Timeframe::H1;
    let mut bars = long_setup_bars();
    // drift lower without touching the stop or arming the exit
    bars.push(ohlc(tf, 251, 123.0, 123.2, 122.6, 122.9));
    bars.push(ohlc(tf, 252, 122.9, 123.0, 122.5, 122.8));
    bars.push(ohlc(tf, 253, 122.8, 122.9, 122.4, 122.7));
    bars.push(ohlc(tf, 254, 122.7, 122.8, 122.3, 122.6));
    bars.push(ohlc(tf, 255, 122.5, 122.6, 118.0, 119.0));
    // below the long average from here on: no further signals
    bars.push(ohlc(tf, 256, 119.0, 119.0, 110.0, 110.0));
    for i in 257..300 {
        bars.push(ohlc(tf, i, 110.0, 110.5, 109.5, 110.0));
    }
    bars
}

/// Market fill at bar 251, close back above the fast average at 252,
/// exit at the open of 253
fn signal_exit_bars() -> Vec<PriceBar> {
    let tf = Timeframe::H1;
    let mut bars = long_setup_bars();
    bars.push(ohlc(tf, 251, 123.0, 123.2, 122.6, 122.9));
    bars.push(ohlc(tf, 252, 122.9, 124.6, 122.8, 124.5));
    bars.push(ohlc(tf, 253, 125.0, 125.2, 124.8, 125.0));
    push_rising(&mut bars, 254, 125.1);
    bars
}

/// 260 bars: the position opened at bar 251 drifts lower above its stop
/// until the data ends
fn open_at_end_bars() -> Vec<PriceBar> {
    let tf = Timeframe::H1;
    let mut bars = long_setup_bars();
    for i in 251..260 {
        let c = 123.0 - 0.1 * (i - 250) as f64;
        bars.push(ohlc(tf, i, c + 0.1, c + 0.2, c - 0.3, c));
    }
    bars
}

/// Bar 251 rebounds without trading down to a half-ATR limit below its open
fn rebound_bars() -> Vec<PriceBar> {
    let mut bars = long_setup_bars();
    bars.push(ohlc(Timeframe::H1, 251, 123.0, 123.5, 122.8, 123.4));
    push_rising(&mut bars, 252, 123.5);
    bars
}

/// Price reflection around 125: a long setup becomes the matching short one
fn mirrored(bars: &[PriceBar]) -> Vec<PriceBar> {
    bars.iter()
        .map(|b| {
            PriceBar::new_unchecked(
                b.timeframe,
                b.timestamp,
                250.0 - b.open,
                250.0 - b.low,
                250.0 - b.high,
                250.0 - b.close,
                b.volume,
            )
        })
        .collect()
}

fn atr_at(bars: &[PriceBar], i: usize) -> f64 {
    let high: Vec<f64> = bars.iter().map(|b| b.high).collect();
    let low: Vec<f64> = bars.iter().map(|b| b.low).collect();
    let close: Vec<f64> = bars.iter().map(|b| b.close).collect();
    indicators::atr14(&high, &low, &close)[i].unwrap()
}

/// 260 daily bars whose last 200 closes average exactly 100 and end at 103
fn regime_daily_bars() -> Vec<PriceBar> {
    (0..260)
        .map(|i| {
            let c = if i < 60 {
                100.0
            } else if i % 2 == 0 {
                97.0
            } else {
                103.0
            };
            ohlc(Timeframe::D1, i, c, c + 1.0, c - 1.0, c)
        })
        .collect()
}

fn populated_store() -> Arc<MemoryBarStore> {
    let mut bars = oscillating_bars(Timeframe::D1, 260);
    for tf in Timeframe::INTRADAY {
        bars.extend(oscillating_bars(tf, 300));
    }
    Arc::new(MemoryBarStore::with_bars(bars))
}

fn candidate(timeframe: Timeframe, composite: f64, trigger_now: bool) -> TimeframeCandidate {
    TimeframeCandidate {
        timeframe,
        asof_timestamp: 0,
        close: 100.0,
        sma_fast: 101.0,
        sma_trend: 95.0,
        rsi2: 10.0,
        atr: 1.0,
        atr_pct: 1.0,
        trend_ok: true,
        trigger_now,
        vol_ok: true,
        entry_ease_score: 70.0,
        backtest_norm: 0.5,
        composite_score: composite,
        confidence: 60.0,
        status: CandidateStatus::Wait,
        time_remaining_secs: 0,
        chosen_params: None,
    }
}

// =============================================================================
// Simulator
// =============================================================================

#[test]
fn test_single_signal_fill_stop_cycle() {
    let bars = single_stop_cycle_bars();
    let fee_bps = 10.0;
    let params = SimulationParams::market(Side::Long, 1.5, fee_bps);
    let result = simulate(&bars, &params).unwrap();

    assert!(!result.insufficient_data);
    assert_eq!(result.signals, 1);
    assert_eq!(result.fills, 1);
    assert_eq!(result.metrics.trade_count, 1);

    let trade = &result.trades[0];
    assert_eq!(trade.signal_index, 250);
    assert_eq!(trade.entry_index, 251);
    assert_eq!(trade.exit_index, 255);
    assert_eq!(trade.exit_reason, ExitReason::Stop);

    let atr = atr_at(&bars, 250);

    let fee = fee_bps / 10_000.0;
    let entry = 123.0 * (1.0 + fee);
    let stop = entry - 1.5 * atr;
    let expected = stop * (1.0 - fee) / entry - 1.0;

    assert_abs_diff_eq!(trade.entry_price, entry, epsilon = 1e-9);
    assert_abs_diff_eq!(trade.stop_price, stop, epsilon = 1e-9);
    assert_abs_diff_eq!(result.metrics.total_return, expected, epsilon = 1e-6);
    assert!(result.metrics.total_return < 0.0);
    assert_eq!(result.metrics.profit_factor, Some(0.0));
    // bar 255 is marked at its close before the stop books the exit
    assert_abs_diff_eq!(result.metrics.max_drawdown, 1.0 - 119.0 / entry, epsilon = 1e-12);
}

#[test]
fn test_armed_exit_fills_at_next_open() {
    let bars = signal_exit_bars();
    let fee = 10.0 / 10_000.0;
    let result = simulate(&bars, &SimulationParams::market(Side::Long, 1.5, 10.0)).unwrap();

    assert_eq!(result.metrics.trade_count, 1);
    let trade = &result.trades[0];
    assert_eq!(trade.entry_index, 251);
    assert_eq!(trade.exit_index, 253);
    assert_eq!(trade.exit_reason, ExitReason::Signal);

    let entry = 123.0 * (1.0 + fee);
    assert_abs_diff_eq!(trade.exit_price, 125.0 * (1.0 - fee), epsilon = 1e-9);
    assert_abs_diff_eq!(trade.return_fraction, 125.0 * (1.0 - fee) / entry - 1.0, epsilon = 1e-12);
    // excursion window stops before the exit bar
    assert_abs_diff_eq!(trade.mae_fraction, (entry - 122.6) / entry, epsilon = 1e-12);
    // deepest mark: the fill bar closing at 122.9
    assert_abs_diff_eq!(result.metrics.max_drawdown, 1.0 - 122.9 / entry, epsilon = 1e-12);
    assert_eq!(result.metrics.profit_factor, None);
}

#[test]
fn test_open_position_closed_at_last_bar() {
    let bars = open_at_end_bars();
    assert_eq!(bars.len(), 260);
    let fee = 10.0 / 10_000.0;
    let result = simulate(&bars, &SimulationParams::market(Side::Long, 1.5, 10.0)).unwrap();

    assert_eq!(result.metrics.trade_count, 1);
    let trade = &result.trades[0];
    assert_eq!(trade.exit_reason, ExitReason::EndOfData);
    assert_eq!(trade.exit_index, 259);

    let entry = bars[251].open * (1.0 + fee);
    let exit = bars[259].close * (1.0 - fee);
    assert_abs_diff_eq!(trade.exit_price, exit, epsilon = 1e-9);
    assert_abs_diff_eq!(trade.mae_fraction, (entry - bars[259].low) / entry, epsilon = 1e-12);
    // the forced close is below every mark, so it sets the drawdown
    assert_abs_diff_eq!(result.metrics.max_drawdown, 1.0 - exit / entry, epsilon = 1e-12);
    assert_abs_diff_eq!(result.metrics.total_return, exit / entry - 1.0, epsilon = 1e-12);
}

#[test]
fn test_untouched_limit_is_signal_without_fill() {
    let bars = rebound_bars();
    let limit = SimulationParams::limit_offset(Side::Long, 0.5, 1.5, 0.0);
    let result = simulate(&bars, &limit).unwrap();

    assert_eq!(result.signals, 1);
    assert_eq!(result.fills, 0);
    assert_eq!(result.metrics.fill_rate, Some(0.0));
    assert_eq!(result.metrics.trade_count, 0);
    assert!(result.trades.is_empty());

    // same signal fills at the open with a market order
    let market = simulate(&bars, &SimulationParams::market(Side::Long, 1.5, 0.0)).unwrap();
    assert_eq!(market.signals, 1);
    assert_eq!(market.fills, 1);
    assert_eq!(market.metrics.fill_rate, Some(1.0));
    assert_eq!(market.trades[0].entry_price, 123.0);
}

#[test]
fn test_short_stop_cycle() {
    let bars = mirrored(&single_stop_cycle_bars());
    let fee = 10.0 / 10_000.0;
    let result = simulate(&bars, &SimulationParams::market(Side::Short, 1.5, 10.0)).unwrap();

    assert_eq!(result.signals, 1);
    assert_eq!(result.metrics.trade_count, 1);
    let trade = &result.trades[0];
    assert_eq!(trade.side, Side::Short);
    assert_eq!(trade.signal_index, 250);
    assert_eq!(trade.entry_index, 251);
    assert_eq!(trade.exit_index, 255);
    assert_eq!(trade.exit_reason, ExitReason::Stop);

    let entry = 127.0 * (1.0 - fee);
    let stop = entry + 1.5 * atr_at(&bars, 250);
    let exit = stop * (1.0 + fee);
    assert_abs_diff_eq!(trade.entry_price, entry, epsilon = 1e-9);
    assert_abs_diff_eq!(trade.stop_price, stop, epsilon = 1e-9);
    assert_abs_diff_eq!(trade.exit_price, exit, epsilon = 1e-9);
    assert_abs_diff_eq!(result.metrics.total_return, entry / exit - 1.0, epsilon = 1e-9);
    assert!(result.metrics.total_return < 0.0);
    // short excursion is measured against the highest high, stop bar included
    assert_abs_diff_eq!(trade.mae_fraction, (132.0 - entry) / entry, epsilon = 1e-9);
}

#[test]
fn test_simulation_is_deterministic() {
    let bars = oscillating_bars(Timeframe::H1, 600);
    let params = SimulationParams::limit_offset(Side::Long, 0.25, 1.5, 5.0);

    let first = simulate(&bars, &params).unwrap();
    let second = simulate(&bars, &params).unwrap();
    assert_eq!(first, second);
    assert!(first.metrics.trade_count > 0);
}

#[test]
fn test_no_lookahead_on_prefix() {
    let bars = oscillating_bars(Timeframe::H1, 600);
    for params in [
        SimulationParams::market(Side::Long, 1.5, 0.0),
        SimulationParams::limit_offset(Side::Long, 0.5, 1.0, 0.0),
        SimulationParams::limit_offset(Side::Short, 0.25, 2.0, 0.0),
    ] {
        let full = simulate(&bars, &params).unwrap();
        let prefix = simulate(&bars[..400], &params).unwrap();

        let closed: Vec<_> = prefix
            .trades
            .iter()
            .filter(|t| t.exit_reason != ExitReason::EndOfData)
            .cloned()
            .collect();
        assert!(closed.len() <= full.trades.len());
        assert_eq!(closed[..], full.trades[..closed.len()]);
    }
}

#[test]
fn test_mae_percentile() {
    assert_eq!(percentile_95(&[0.05, 0.01, 0.04, 0.02, 0.03]), Some(0.04));
    assert_eq!(percentile_95(&[]), None);
}

#[test]
fn test_scorer_halves_thin_samples() {
    let metrics = |trade_count| BacktestMetrics {
        trade_count,
        win_rate: 0.6,
        total_return: 0.2,
        max_drawdown: 0.1,
        profit_factor: Some(1.5),
        avg_return: Some(0.01),
        fill_rate: Some(0.9),
        mae_p95: Some(0.02),
    };
    assert_relative_eq!(score(&metrics(19)), 0.5 * score(&metrics(20)), epsilon = 1e-12);
}

// =============================================================================
// Regime and ranking
// =============================================================================

#[test]
fn test_regime_three_percent_above_average() {
    let bars = regime_daily_bars();
    let regime = regime_from_daily(&bars, 210);

    assert_eq!(regime.bias, RegimeBias::TrendUp);
    assert_relative_eq!(regime.sma_trend.unwrap(), 100.0, epsilon = 1e-9);
    assert_relative_eq!(regime.confidence, 0.15, epsilon = 1e-9);

    let store: Arc<dyn BarStore> = Arc::new(MemoryBarStore::with_bars(bars));
    let optimizer = Arc::new(Optimizer::new(store, GridParams::default(), OptimizerSettings::default()));
    let recommender = Recommender::new(optimizer, RecommendConfig::default());
    assert_eq!(recommender.regime().unwrap(), regime);
}

#[test]
fn test_ranking_tie_prefers_triggered() {
    let mut candidates = vec![
        candidate(Timeframe::M30, 80.0, false),
        candidate(Timeframe::H1, 80.0, true),
    ];
    rank_candidates(&mut candidates);
    assert_eq!(candidates[0].timeframe, Timeframe::H1);
    assert!(candidates[0].trigger_now);
}

// =============================================================================
// Optimizer cache
// =============================================================================

#[test]
fn test_optimizer_cache_follows_newest_bar() {
    let bars = oscillating_bars(Timeframe::H1, 300);
    let last = bars[bars.len() - 1].clone();
    let store = Arc::new(MemoryBarStore::with_bars(bars));
    let grid = GridParams::new(vec![0.0, 0.5], vec![1.0, 2.0]).unwrap();
    let optimizer = Optimizer::new(store.clone(), grid, OptimizerSettings::default());

    let first = optimizer.optimize(Timeframe::H1, Side::Long).unwrap().unwrap();
    assert_eq!(first.asof_timestamp, last.timestamp);
    assert_eq!(first.candidates_evaluated, 5);
    assert_eq!(optimizer.evaluations(), 1);

    let again = optimizer.optimize(Timeframe::H1, Side::Long).unwrap().unwrap();
    assert!(Arc::ptr_eq(&first, &again));
    assert_eq!(optimizer.evaluations(), 1);

    // other side is its own key
    optimizer.optimize(Timeframe::H1, Side::Short).unwrap().unwrap();
    assert_eq!(optimizer.evaluations(), 2);

    let next_ts = last.next_open_ts();
    store
        .upsert(&PriceBar::new_unchecked(
            Timeframe::H1,
            next_ts,
            last.close,
            last.close + 0.5,
            last.close - 0.5,
            last.close,
            Some(1000.0),
        ))
        .unwrap();

    let refreshed = optimizer.optimize(Timeframe::H1, Side::Long).unwrap().unwrap();
    assert!(!Arc::ptr_eq(&first, &refreshed));
    assert_eq!(refreshed.asof_timestamp, next_ts);
    assert_eq!(optimizer.evaluations(), 3);
}

#[test]
fn test_optimizer_empty_timeframe_is_none() {
    let store: Arc<dyn BarStore> = Arc::new(MemoryBarStore::new());
    let optimizer = Optimizer::new(store, GridParams::default(), OptimizerSettings::default());
    assert!(optimizer.optimize(Timeframe::M30, Side::Long).unwrap().is_none());
    assert_eq!(optimizer.evaluations(), 0);
}

// =============================================================================
// End to end
// =============================================================================

#[test]
fn test_recommend_end_to_end() {
    let store = populated_store();
    let config = Config::default();
    let optimizer = Arc::new(Optimizer::from_config(store, &config).unwrap());
    let recommender = Recommender::new(Arc::clone(&optimizer), config.recommend.clone());

    let now = 300 * Timeframe::H3.seconds();
    let response = recommender.recommend_at(Side::Long, None, None, now).unwrap();

    assert!(response.ok);
    assert!(response.error.is_none());
    assert_eq!(response.candidates.len(), 3);
    assert_eq!(response.selected.as_ref(), response.candidates.first());
    for pair in response.candidates.windows(2) {
        assert!(pair[0].composite_score >= pair[1].composite_score);
    }
    for c in &response.candidates {
        assert!(c.chosen_params.is_some());
        assert!((0.0..=100.0).contains(&c.confidence));
    }

    let plan = response.plan.as_ref().unwrap();
    assert_eq!(plan.side, Side::Long);
    assert_relative_eq!(plan.risk_pct, config.recommend.risk_pct_default);
    assert!(plan.stop_price < plan.entry_price);
    assert!(plan.max_leverage <= config.recommend.max_leverage);

    // every (timeframe, long) pair is now cached
    let evaluations = optimizer.evaluations();
    recommender.recommend_at(Side::Long, Some(1.0), None, now).unwrap();
    assert_eq!(optimizer.evaluations(), evaluations);

    let json = serde_json::to_string(&response).unwrap();
    assert!(json.contains("\"ok\":true"));
}

#[test]
fn test_recommend_focus_timeframe() {
    let store = populated_store();
    let config = Config::default();
    let optimizer = Arc::new(Optimizer::from_config(store, &config).unwrap());
    let recommender = Recommender::new(optimizer, config.recommend.clone());

    let response = recommender
        .recommend_at(Side::Short, None, Some(Timeframe::H3), 0)
        .unwrap();
    assert!(response.ok);
    assert_eq!(response.candidates.len(), 1);
    assert_eq!(response.selected.unwrap().timeframe, Timeframe::H3);

    let err = recommender
        .recommend_at(Side::Short, None, Some(Timeframe::D1), 0)
        .unwrap_err();
    assert!(matches!(err, RecoError::InvalidParameter { .. }));
}

#[test]
fn test_rank_without_plan() {
    let config = Config::default();
    let optimizer = Arc::new(Optimizer::from_config(populated_store(), &config).unwrap());
    let recommender = Recommender::new(optimizer, config.recommend.clone());
    let ranked = recommender.rank(Side::Short, None, 0).unwrap();
    assert_eq!(ranked.candidates.len(), 3);
    assert!(ranked.regime.bias != RegimeBias::Unknown);

    let empty: Arc<dyn BarStore> = Arc::new(MemoryBarStore::new());
    let optimizer = Arc::new(Optimizer::from_config(empty, &config).unwrap());
    let recommender = Recommender::new(optimizer, config.recommend.clone());
    assert!(matches!(
        recommender.rank(Side::Long, None, 0),
        Err(RecoError::NoCandidates)
    ));
}

#[test]
fn test_recommend_short_history_uses_fallback_plan() {
    let mut bars = oscillating_bars(Timeframe::D1, 260);
    bars.extend(oscillating_bars(Timeframe::H1, 230));
    let store: Arc<dyn BarStore> = Arc::new(MemoryBarStore::with_bars(bars));
    let config = Config::default();
    let optimizer = Arc::new(Optimizer::from_config(store, &config).unwrap());
    let recommender = Recommender::new(Arc::clone(&optimizer), config.recommend.clone());

    let response = recommender
        .recommend_at(Side::Long, None, Some(Timeframe::H1), 0)
        .unwrap();
    assert!(response.ok);

    let selected = response.selected.as_ref().unwrap();
    assert!(selected.chosen_params.as_ref().unwrap().insufficient_data);
    assert_eq!(selected.backtest_norm, 0.5);

    let plan = response.plan.as_ref().unwrap();
    assert_eq!(plan.params_source, ParamsSource::Fallback);
    assert_eq!(plan.entry_mode, EntryMode::LimitOffset);
    assert_relative_eq!(plan.entry_offset_mult, config.recommend.fallback_entry_k(Timeframe::H1));
    assert_relative_eq!(plan.stop_mult, config.recommend.fallback_stop_mult);
    assert!(response.notes.iter().any(|n| n.contains("60m backtest skipped")));
}

#[test]
fn test_recommend_without_data_is_not_ok() {
    let store: Arc<dyn BarStore> = Arc::new(MemoryBarStore::new());
    let config = Config::default();
    let optimizer = Arc::new(Optimizer::from_config(store, &config).unwrap());
    let recommender = Recommender::new(optimizer, config.recommend.clone());

    let response = recommender.recommend("long", None, None).unwrap();
    assert!(!response.ok);
    assert!(response.error.is_some());
    assert!(response.selected.is_none());
    assert!(response.plan.is_none());
    assert_eq!(response.regime.bias, RegimeBias::Unknown);
    assert!(response.notes.iter().any(|n| n.contains("skipped")));

    let auto = recommender.recommend_auto(None, None, 0).unwrap();
    assert!(!auto.ok);

    assert!(matches!(
        recommender.recommend("sideways", None, None),
        Err(RecoError::InvalidParameter { .. })
    ));
    assert!(matches!(
        recommender.recommend("long", Some(0.0), None),
        Err(RecoError::InvalidParameter { .. })
    ));
}

// =============================================================================
// SQLite store
// =============================================================================

#[test]
fn test_sqlite_store_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("db").join("candles.db");
    let bars = oscillating_bars(Timeframe::M30, 50);

    {
        let store = SqliteBarStore::open(&path).unwrap();
        assert_eq!(store.upsert_many(&bars).unwrap(), 50);
    }

    let store = SqliteBarStore::open(&path).unwrap();
    let recent = store.fetch_recent(Timeframe::M30, 10).unwrap();
    assert_eq!(recent.len(), 10);
    assert_eq!(recent[..], bars[40..]);
    assert_eq!(store.fetch_latest(Timeframe::M30).unwrap(), bars.last().cloned());
    assert_eq!(store.timeframes_available().unwrap(), vec![Timeframe::M30]);
    assert!(store.fetch_recent(Timeframe::H1, 10).unwrap().is_empty());
}
