//! Technical indicators
//!
//! Every series function returns a vector aligned with its input, holding
//! `None` for indices that fall inside the warm-up window. The simple moving
//! average is powered by the `ta` crate; the RSI and ATR variants here use
//! plain rolling means (no Wilder smoothing), which `ta` does not offer.
//!
//! Warm-up lengths:
//! - SMA(N): first value at index N-1
//! - RSI(2): first value at index 2
//! - ATR(14): first value at index 14 (15 bars)

use ta::indicators::SimpleMovingAverage;
use ta::Next;

/// Period of the average true range used for offsets and stops
pub const ATR_PERIOD: usize = 14;

/// Period of the short RSI used by the entry rule
pub const RSI_PERIOD: usize = 2;

// =============================================================================
// Moving Averages
// =============================================================================

/// Calculate Simple Moving Average
pub fn sma(values: &[f64], period: usize) -> Vec<Option<f64>> {
    if period == 0 {
        return vec![None; values.len()];
    }

    let mut indicator = match SimpleMovingAverage::new(period) {
        Ok(i) => i,
        Err(_) => return vec![None; values.len()],
    };

    values
        .iter()
        .enumerate()
        .map(|(i, &value)| {
            let sma_val = indicator.next(value);
            (i + 1 >= period).then_some(sma_val)
        })
        .collect()
}

/// Mean of the last `period` values, `None` if there are fewer
pub fn sma_last(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period {
        return None;
    }
    let window = &values[values.len() - period..];
    Some(window.iter().sum::<f64>() / period as f64)
}

// =============================================================================
// Momentum
// =============================================================================

/// RSI built from simple means of the last `period` gains and losses.
///
/// Both means zero gives exactly 50; zero mean loss with a positive gain gives
/// exactly 100.
pub fn rsi_sma(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let n = closes.len();
    let mut result = vec![None; n];
    if period == 0 || n < period + 1 {
        return result;
    }

    for (i, slot) in result.iter_mut().enumerate().skip(period) {
        let mut gain = 0.0;
        let mut loss = 0.0;
        for j in (i + 1 - period)..=i {
            let delta = closes[j] - closes[j - 1];
            gain += delta.max(0.0);
            loss += (-delta).max(0.0);
        }
        *slot = Some(rsi_from_means(gain / period as f64, loss / period as f64));
    }

    result
}

fn rsi_from_means(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_gain == 0.0 && avg_loss == 0.0 {
        return 50.0;
    }
    if avg_loss == 0.0 {
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    100.0 - 100.0 / (1.0 + rs)
}

/// Two-period simple RSI series
pub fn rsi2(closes: &[f64]) -> Vec<Option<f64>> {
    rsi_sma(closes, RSI_PERIOD)
}

/// Latest two-period simple RSI
pub fn rsi2_last(closes: &[f64]) -> Option<f64> {
    if closes.len() < RSI_PERIOD + 1 {
        return None;
    }
    rsi2(&closes[closes.len() - (RSI_PERIOD + 1)..])
        .last()
        .copied()
        .flatten()
}

// =============================================================================
// Volatility Indicators
// =============================================================================

/// Calculate True Range
pub fn true_range(high: &[f64], low: &[f64], close: &[f64]) -> Vec<f64> {
    let mut tr = Vec::with_capacity(high.len());

    for i in 0..high.len() {
        let tr_value = if i == 0 {
            high[i] - low[i]
        } else {
            let hl = high[i] - low[i];
            let hc = (high[i] - close[i - 1]).abs();
            let lc = (low[i] - close[i - 1]).abs();
            hl.max(hc).max(lc)
        };
        tr.push(tr_value);
    }

    tr
}

/// Average True Range as a rolling arithmetic mean of the previous-close true range.
///
/// The first bar has no previous close, so the first value needs `period + 1`
/// bars and averages true ranges 1..=period.
pub fn atr_sma(high: &[f64], low: &[f64], close: &[f64], period: usize) -> Vec<Option<f64>> {
    let n = close.len();
    let mut result = vec![None; n];
    if period == 0 || n < period + 1 || high.len() != n || low.len() != n {
        return result;
    }

    let tr = true_range(high, low, close);
    let mut sum: f64 = tr[1..=period].iter().sum();
    result[period] = Some(sum / period as f64);

    for i in (period + 1)..n {
        sum += tr[i] - tr[i - period];
        result[i] = Some(sum / period as f64);
    }

    result
}

/// Fourteen-period ATR series
pub fn atr14(high: &[f64], low: &[f64], close: &[f64]) -> Vec<Option<f64>> {
    atr_sma(high, low, close, ATR_PERIOD)
}

/// Latest fourteen-period ATR
pub fn atr14_last(high: &[f64], low: &[f64], close: &[f64]) -> Option<f64> {
    let n = close.len();
    if n < ATR_PERIOD + 1 || high.len() != n || low.len() != n {
        return None;
    }
    let start = n - (ATR_PERIOD + 1);
    atr14(&high[start..], &low[start..], &close[start..])
        .last()
        .copied()
        .flatten()
}

// =============================================================================
// Tests
// =============================================================================
