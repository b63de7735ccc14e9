//! Multi-peak divergence counters built on RSI troughs and MACD peaks.

use crate::domain::bar::Bar;
use crate::domain::indicator::closes_ascending;
use crate::domain::indicator::macd::MacdPoint;
use crate::domain::indicator::rsi::calculate_rsi;
use crate::domain::indicator::zigzag::{Trend, calculate_zigzag};

#[derive(Debug, Clone, PartialEq)]
pub struct RsiDivergenceParams {
    pub period: usize,
    pub deviation: f64,
    pub depth: usize,
    pub peaks: usize,
    pub min_diff: f64,
    pub max_rsi: f64,
    pub shift: usize,
}

/// 1 when the last `peaks` RSI troughs (found by a ZigZag over RSI) form a
/// bullish divergence ending on the bar before `shift`, else 0.
pub fn rsi_divergence(bars: &[Bar], params: &RsiDivergenceParams) -> u32 {
    let rates = bars.get(params.shift..).unwrap_or_default();
    let mut rsi = calculate_rsi(&closes_ascending(rates), params.period);
    rsi.reverse();
    let closes: Vec<f64> = rates.iter().map(|b| b.close).collect();
    rsi_divergence_from_series(&rsi, &closes, params)
}

/// Both series newest first and aligned at index 0.
pub fn rsi_divergence_from_series(rsi: &[f64], closes: &[f64], params: &RsiDivergenceParams) -> u32 {
    let points: Vec<(f64, f64)> = rsi.iter().rev().map(|&v| (v, v)).collect();
    let legs = calculate_zigzag(&points, params.deviation, params.depth, false);

    if legs.len() / 2 < params.peaks {
        return 0;
    }
    match legs.first() {
        Some(leg) if leg.trend == Trend::Down && leg.low_index == 1 => {}
        _ => return 0,
    }

    for i in 0..params.peaks.saturating_sub(1) {
        let low = legs[i * 2].low_index;
        let prev_low = legs[(i + 1) * 2].low_index;
        let (Some(&rsi_low), Some(&rsi_prev)) = (rsi.get(low), rsi.get(prev_low)) else {
            return 0;
        };
        let (Some(&close_low), Some(&close_prev)) = (closes.get(low), closes.get(prev_low)) else {
            return 0;
        };
        if rsi_low - rsi_prev <= params.min_diff {
            return 0;
        }
        if rsi_low > params.max_rsi || rsi_prev > params.max_rsi {
            return 0;
        }
        if close_low >= close_prev {
            return 0;
        }
    }
    1
}

#[derive(Debug, Clone, PartialEq)]
pub struct MacdPeakParams {
    pub red_depth: usize,
    pub depth: usize,
    pub enable_divergence: bool,
    pub diff_candle0: f64,
    pub shift: usize,
    /// Minimum rise between consecutive price peaks, in percent. The last
    /// entry repeats for every further peak.
    pub diff_percents: Vec<f64>,
}

pub const NO_DIFF_PERCENT: f64 = -99999.0;

/// Number of consecutive MACD peaks above zero, walking back from `shift`.
///
/// `bars` and `values` are newest first and aligned at index 0. The caller
/// guarantees `shift + 1 < values.len()` and `values.len() <= bars.len()`.
pub fn count_macd_peaks(bars: &[Bar], values: &[MacdPoint], params: &MacdPeakParams) -> usize {
    if values.len() < 2 || params.shift >= values.len() - 1 || values.len() > bars.len() {
        return 0;
    }

    let end = values.len() - 1;
    let shift = params.shift;
    let mut diff_percents = params.diff_percents.clone();
    if diff_percents.is_empty() {
        diff_percents.push(NO_DIFF_PERCENT);
    }

    let breaks_top = |i: usize| {
        let top = bars[i].body_top();
        i != shift && (top - bars[shift].high) / top > params.diff_candle0 / 100.0
    };

    let mut i = shift;
    let mut n = 0usize;
    let mut max_macd = i;
    let mut max_price = i;

    while i < end {
        let v = values[i];
        if v.macd <= 0.0 || v.signal <= 0.0 || v.histogram >= 0.0 {
            break;
        }
        if v.macd > values[max_macd].macd {
            max_macd = i;
        }
        if bars[i].high > bars[max_price].high {
            max_price = i;
        }
        if breaks_top(i) {
            return 0;
        }
        i += 1;
    }

    let mut cnt = 0usize;
    let mut crossed_zero = false;
    while i < end {
        let v = values[i];
        if v.macd <= 0.0 || v.signal <= 0.0 {
            crossed_zero = true;
            break;
        }
        if v.histogram < 0.0 {
            break;
        }
        if v.macd > values[max_macd].macd {
            max_macd = i;
        }
        if bars[i].high > bars[max_price].high {
            max_price = i;
        }
        if breaks_top(i) {
            return 0;
        }
        cnt += 1;
        i += 1;
    }
    if crossed_zero {
        while i < end {
            if values[i].histogram < 0.0 {
                break;
            }
            cnt += 1;
            if values[i].macd > values[max_macd].macd {
                max_macd = i;
            }
            if bars[i].high > bars[max_price].high {
                max_price = i;
            }
            if breaks_top(i) {
                return 0;
            }
            i += 1;
        }
    }

    if cnt >= params.depth {
        n += 1;
    }
    if crossed_zero {
        return n;
    }

    let mut prev_max_macd = i;
    let mut prev_max_price = i;
    while i < end {
        let mut cnt_red = 0usize;
        while i < end {
            let v = values[i];
            if v.macd <= 0.0 || v.signal <= 0.0 {
                return n;
            }
            if v.histogram >= 0.0 {
                break;
            }
            if v.macd > values[prev_max_macd].macd {
                prev_max_macd = i;
            }
            if bars[i].high > bars[prev_max_price].high {
                prev_max_price = i;
            }
            cnt_red += 1;
            i += 1;
        }

        let mut cnt = 0usize;
        let mut crossed_zero = false;
        while i < end {
            let v = values[i];
            if v.macd <= 0.0 || v.signal <= 0.0 {
                crossed_zero = true;
                break;
            }
            if v.histogram < 0.0 {
                break;
            }
            if v.macd > values[prev_max_macd].macd {
                prev_max_macd = i;
            }
            if bars[i].high > bars[prev_max_price].high {
                prev_max_price = i;
            }
            cnt += 1;
            i += 1;
        }
        if crossed_zero {
            while i < end {
                if values[i].histogram < 0.0 {
                    break;
                }
                if values[i].macd > values[prev_max_macd].macd {
                    prev_max_macd = i;
                }
                if bars[i].high > bars[prev_max_price].high {
                    prev_max_price = i;
                }
                cnt += 1;
                i += 1;
            }
        }

        if params.enable_divergence && values[prev_max_macd].macd <= values[max_macd].macd {
            return n;
        }
        let rise = bars[max_price].high - bars[prev_max_price].high;
        if rise <= bars[prev_max_price].high * diff_percents[0] / 100.0 {
            return n;
        }
        if diff_percents.len() > 1 {
            diff_percents.remove(0);
        }

        max_macd = prev_max_macd;
        max_price = prev_max_price;
        prev_max_macd = i;
        prev_max_price = i;

        if cnt >= params.depth && cnt_red >= params.red_depth {
            n += 1;
        }
        if crossed_zero {
            return n;
        }
        i += 1;
    }
    n
}
