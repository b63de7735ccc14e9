//! MACD (Moving Average Convergence Divergence) indicator.
//!
//! MACD Line = EMA(fast) - EMA(slow)
//! Signal Line = EMA(signal) of MACD Line
//! Histogram = MACD Line - Signal Line
//!
//! The output has one point per slow-EMA value (`len - slow + 1`). Signal and
//! histogram read 0 until the signal EMA has `signal` MACD values to seed from.

use crate::domain::indicator::ema::calculate_ema;

pub const DEFAULT_FAST: usize = 12;
pub const DEFAULT_SLOW: usize = 26;
pub const DEFAULT_SIGNAL: usize = 9;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacdPoint {
    pub macd: f64,
    pub signal: f64,
    pub histogram: f64,
}

pub fn calculate_macd(
    values: &[f64],
    fast: usize,
    slow: usize,
    signal_period: usize,
) -> Vec<MacdPoint> {
    if fast == 0 || slow == 0 || signal_period == 0 {
        return Vec::new();
    }

    let ema_fast = calculate_ema(values, fast);
    let ema_slow = calculate_ema(values, slow);
    let len = ema_fast.len().min(ema_slow.len());
    let fast_offset = ema_fast.len() - len;
    let slow_offset = ema_slow.len() - len;

    let macd_line: Vec<f64> = (0..len)
        .map(|i| ema_fast[fast_offset + i] - ema_slow[slow_offset + i])
        .collect();

    let signal_line = calculate_ema(&macd_line, signal_period);
    let signal_offset = len - signal_line.len();

    macd_line
        .iter()
        .enumerate()
        .map(|(i, &macd)| {
            if i < signal_offset {
                MacdPoint {
                    macd,
                    signal: 0.0,
                    histogram: 0.0,
                }
            } else {
                let signal = signal_line[i - signal_offset];
                MacdPoint {
                    macd,
                    signal,
                    histogram: macd - signal,
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn macd_length_follows_slow_period() {
        let closes: Vec<f64> = (0..50).map(|i| 100.0 + i as f64).collect();
        let out = calculate_macd(&closes, DEFAULT_FAST, DEFAULT_SLOW, DEFAULT_SIGNAL);
        assert_eq!(out.len(), 25);
    }

    #[test]
    fn macd_signal_zero_during_warmup() {
        let closes: Vec<f64> = (0..50).map(|i| 100.0 + (i as f64).sqrt()).collect();
        let out = calculate_macd(&closes, 12, 26, 9);
        for p in &out[..8] {
            assert_relative_eq!(p.signal, 0.0);
            assert_relative_eq!(p.histogram, 0.0);
        }
        assert!(out[8].signal != 0.0);
    }

    #[test]
    fn macd_constant_prices_zero() {
        let out = calculate_macd(&[100.0; 60], 12, 26, 9);
        for p in out {
            assert_relative_eq!(p.macd, 0.0, epsilon = 1e-9);
            assert_relative_eq!(p.histogram, 0.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn macd_uptrend_positive() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + i as f64 * 2.0).collect();
        let out = calculate_macd(&closes, 12, 26, 9);
        assert!(out.last().unwrap().macd > 0.0);
    }

    #[test]
    fn macd_zero_periods() {
        assert!(calculate_macd(&[1.0; 40], 0, 26, 9).is_empty());
        assert!(calculate_macd(&[1.0; 40], 12, 26, 0).is_empty());
    }

    #[test]
    fn macd_histogram_is_difference() {
        let closes: Vec<f64> = (0..80).map(|i| 100.0 + (i as f64 * 0.2).sin() * 10.0).collect();
        for p in calculate_macd(&closes, 12, 26, 9).iter().skip(8) {
            assert_relative_eq!(p.histogram, p.macd - p.signal);
        }
    }
}
