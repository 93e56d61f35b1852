//! Trade simulator
//!
//! Single forward pass over a bar slice. A decision at bar `i` reads only the
//! indicators closed at `i`; orders are priced and filled on bar `i + 1`.
//! Stops are checked first on every bar a position is open, including the
//! fill bar, with worst-case intrabar pricing.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{RecoError, Result};
use crate::signal::{exit_armed, RuleSeries};
use crate::types::{EntryMode, PriceBar, Side};

/// Bars required before a simulation produces anything but zero metrics
pub const MIN_SIMULATION_BARS: usize = 260;

/// Fixed configuration of one simulation run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulationParams {
    pub side: Side,
    pub entry_mode: EntryMode,
    /// Limit offset in ATR multiples; ignored for market entries
    pub entry_k: f64,
    pub stop_mult: f64,
    pub fee_bps: f64,
}

impl SimulationParams {
    pub fn market(side: Side, stop_mult: f64, fee_bps: f64) -> Self {
        Self {
            side,
            entry_mode: EntryMode::Market,
            entry_k: 0.0,
            stop_mult,
            fee_bps,
        }
    }

    pub fn limit_offset(side: Side, entry_k: f64, stop_mult: f64, fee_bps: f64) -> Self {
        Self {
            side,
            entry_mode: EntryMode::LimitOffset,
            entry_k,
            stop_mult,
            fee_bps,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.entry_k.is_finite() || self.entry_k < 0.0 {
            return Err(RecoError::invalid("entry_k", format!("must be >= 0, got {}", self.entry_k)));
        }
        if !self.stop_mult.is_finite() || self.stop_mult <= 0.0 {
            return Err(RecoError::invalid("stop_mult", format!("must be > 0, got {}", self.stop_mult)));
        }
        if !self.fee_bps.is_finite() || self.fee_bps < 0.0 {
            return Err(RecoError::invalid("fee_bps", format!("must be >= 0, got {}", self.fee_bps)));
        }
        Ok(())
    }

    fn fee_fraction(&self) -> f64 {
        self.fee_bps / 10_000.0
    }

    /// Fee charged against the trader on both legs
    fn entry_fill(&self, raw: f64) -> f64 {
        match self.side {
            Side::Long => raw * (1.0 + self.fee_fraction()),
            Side::Short => raw * (1.0 - self.fee_fraction()),
        }
    }

    fn exit_fill(&self, raw: f64) -> f64 {
        match self.side {
            Side::Long => raw * (1.0 - self.fee_fraction()),
            Side::Short => raw * (1.0 + self.fee_fraction()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    Stop,
    Signal,
    EndOfData,
}

/// One closed trade
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatedTrade {
    pub side: Side,
    pub signal_index: usize,
    pub entry_index: usize,
    /// Fee-adjusted
    pub entry_price: f64,
    pub stop_price: f64,
    pub exit_index: usize,
    /// Fee-adjusted
    pub exit_price: f64,
    pub return_fraction: f64,
    pub mae_fraction: f64,
    pub exit_reason: ExitReason,
}

/// Aggregate over one run. Optional fields are `None` when the sample cannot define them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BacktestMetrics {
    pub trade_count: usize,
    pub win_rate: f64,
    pub total_return: f64,
    pub max_drawdown: f64,
    pub profit_factor: Option<f64>,
    pub avg_return: Option<f64>,
    pub fill_rate: Option<f64>,
    pub mae_p95: Option<f64>,
}

impl BacktestMetrics {
    /// Aggregate a trade log. `max_drawdown` comes from the bar-by-bar equity walk.
    pub fn from_trades(trades: &[SimulatedTrade], signals: usize, fills: usize, max_drawdown: f64) -> Self {
        let trade_count = trades.len();
        let fill_rate = (signals > 0).then(|| fills as f64 / signals as f64);
        if trade_count == 0 {
            return BacktestMetrics {
                max_drawdown,
                fill_rate,
                ..Default::default()
            };
        }

        let mut equity = 1.0;
        let mut wins = 0usize;
        let mut gross_win = 0.0;
        let mut gross_loss = 0.0;
        for trade in trades {
            equity *= 1.0 + trade.return_fraction;
            if trade.return_fraction > 0.0 {
                wins += 1;
                gross_win += trade.return_fraction;
            } else {
                gross_loss += trade.return_fraction.abs();
            }
        }

        let maes: Vec<f64> = trades.iter().map(|t| t.mae_fraction).collect();
        let sum_return: f64 = trades.iter().map(|t| t.return_fraction).sum();

        BacktestMetrics {
            trade_count,
            win_rate: wins as f64 / trade_count as f64,
            total_return: equity - 1.0,
            max_drawdown,
            profit_factor: (gross_loss > 0.0).then(|| gross_win / gross_loss),
            avg_return: Some(sum_return / trade_count as f64),
            fill_rate,
            mae_p95: percentile_95(&maes),
        }
    }
}

/// Nearest-rank 95th percentile at sorted index `floor(0.95 * (n - 1))`
pub fn percentile_95(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let idx = (0.95 * (sorted.len() - 1) as f64).floor() as usize;
    sorted.get(idx).copied()
}

/// Outcome of one simulation run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    pub metrics: BacktestMetrics,
    pub trades: Vec<SimulatedTrade>,
    pub signals: usize,
    pub fills: usize,
    /// Fewer than [`MIN_SIMULATION_BARS`] bars were supplied
    pub insufficient_data: bool,
}

struct OpenPosition {
    signal_index: usize,
    entry_index: usize,
    entry_price: f64,
    stop_price: f64,
    exit_pending: bool,
}

impl OpenPosition {
    /// Equity multiplier if the position were closed at `price`
    fn mark(&self, side: Side, price: f64) -> f64 {
        match side {
            Side::Long => price / self.entry_price,
            Side::Short => self.entry_price / price,
        }
    }

    fn stop_touched(&self, side: Side, bar: &PriceBar) -> bool {
        match side {
            Side::Long => bar.low <= self.stop_price,
            Side::Short => bar.high >= self.stop_price,
        }
    }

    fn close(
        self,
        params: &SimulationParams,
        window: &[PriceBar],
        exit_index: usize,
        exit_price: f64,
        exit_reason: ExitReason,
    ) -> SimulatedTrade {
        let side = params.side;
        let return_fraction = match side {
            Side::Long => exit_price / self.entry_price - 1.0,
            Side::Short => self.entry_price / exit_price - 1.0,
        };
        SimulatedTrade {
            side,
            signal_index: self.signal_index,
            entry_index: self.entry_index,
            entry_price: self.entry_price,
            stop_price: self.stop_price,
            exit_index,
            exit_price,
            return_fraction,
            mae_fraction: adverse_excursion(side, self.entry_price, window),
            exit_reason,
        }
    }
}

/// Worst move against the position over `window`, as a fraction of entry
fn adverse_excursion(side: Side, entry_price: f64, window: &[PriceBar]) -> f64 {
    if window.is_empty() || entry_price <= 0.0 {
        return 0.0;
    }
    let excursion = match side {
        Side::Long => {
            let worst = window.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
            (entry_price - worst) / entry_price
        }
        Side::Short => {
            let worst = window.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
            (worst - entry_price) / entry_price
        }
    };
    excursion.max(0.0)
}

struct EquityTracker {
    equity: f64,
    peak: f64,
    max_drawdown: f64,
}

impl EquityTracker {
    fn new() -> Self {
        Self {
            equity: 1.0,
            peak: 1.0,
            max_drawdown: 0.0,
        }
    }

    fn observe(&mut self, value: f64) {
        if value > self.peak {
            self.peak = value;
        }
        if self.peak > 0.0 {
            let dd = (self.peak - value) / self.peak;
            if dd > self.max_drawdown {
                self.max_drawdown = dd;
            }
        }
    }

    fn book(&mut self, trade: &SimulatedTrade) {
        self.equity *= 1.0 + trade.return_fraction;
    }
}

/// Replay `bars` under `params`.
///
/// Fewer than [`MIN_SIMULATION_BARS`] bars is not an error: the result carries
/// zero metrics and `insufficient_data = true`.
pub fn simulate(bars: &[PriceBar], params: &SimulationParams) -> Result<BacktestResult> {
    params.validate()?;

    let n = bars.len();
    if n < MIN_SIMULATION_BARS {
        return Ok(BacktestResult {
            insufficient_data: true,
            ..Default::default()
        });
    }

    let side = params.side;
    let sign = side.sign();
    let series = RuleSeries::compute(bars);

    let mut trades = Vec::new();
    let mut signals = 0usize;
    let mut fills = 0usize;
    let mut tracker = EquityTracker::new();
    let mut position: Option<OpenPosition> = None;

    let mut i = 0;
    while i + 2 < n {
        let bar = &bars[i];

        let marked = match &position {
            Some(pos) => tracker.equity * pos.mark(side, bar.close),
            None => tracker.equity,
        };
        tracker.observe(marked);

        if let Some(mut pos) = position.take() {
            if pos.stop_touched(side, bar) {
                let exit_price = params.exit_fill(pos.stop_price);
                let window = &bars[pos.entry_index..=i];
                let trade = pos.close(params, window, i, exit_price, ExitReason::Stop);
                tracker.book(&trade);
                trades.push(trade);
            } else if pos.exit_pending {
                let exit_price = params.exit_fill(bar.open);
                let window = &bars[pos.entry_index..i];
                let trade = pos.close(params, window, i, exit_price, ExitReason::Signal);
                tracker.book(&trade);
                trades.push(trade);
            } else {
                if let Some(sma_fast) = series.sma_fast[i] {
                    pos.exit_pending = exit_armed(side, bar.close, sma_fast);
                }
                position = Some(pos);
            }
            i += 1;
            continue;
        }

        let Some((inputs, atr)) = series.at(bars, i) else {
            i += 1;
            continue;
        };
        if !inputs.entry_signal(side) {
            i += 1;
            continue;
        }
        signals += 1;

        let next = &bars[i + 1];
        let raw_entry = match params.entry_mode {
            EntryMode::Market => Some(next.open),
            EntryMode::LimitOffset => {
                let limit = next.open - sign * params.entry_k * atr;
                let touched = match side {
                    Side::Long => next.low <= limit,
                    Side::Short => next.high >= limit,
                };
                touched.then_some(limit)
            }
        };

        let Some(raw_entry) = raw_entry else {
            i += 1;
            continue;
        };

        fills += 1;
        let entry_price = params.entry_fill(raw_entry);
        position = Some(OpenPosition {
            signal_index: i,
            entry_index: i + 1,
            entry_price,
            stop_price: entry_price - sign * params.stop_mult * atr,
            exit_pending: false,
        });
        // process the fill bar next, stop first
        i += 1;
    }

    if let Some(pos) = position.take() {
        let last = n - 1;
        let exit_price = params.exit_fill(bars[last].close);
        let window = &bars[pos.entry_index..];
        let trade = pos.close(params, window, last, exit_price, ExitReason::EndOfData);
        tracker.book(&trade);
        trades.push(trade);
    }
    tracker.observe(tracker.equity);

    let metrics = BacktestMetrics::from_trades(&trades, signals, fills, tracker.max_drawdown);
    debug!(
        side = %side,
        mode = %params.entry_mode,
        entry_k = params.entry_k,
        stop_mult = params.stop_mult,
        signals,
        fills,
        trades = metrics.trade_count,
        total_return = metrics.total_return,
        "simulation complete"
    );

    Ok(BacktestResult {
        metrics,
        trades,
        signals,
        fills,
        insufficient_data: false,
    })
}
