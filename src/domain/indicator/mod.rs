//! Technical indicator implementations.
//!
//! Calculations run over chronologically ascending closes and return only
//! warmed-up values. [`compute`] wraps them for the engine convention: it
//! takes a newest-first bar window and returns a newest-first series, so
//! `series.values[shift]` lines up with `bars[shift]`.
//!
//! - `IndicatorValue`: Enum for different indicator output shapes
//! - `IndicatorType`: Enum for indicator identity + parameters (serves as HashMap key)
//! - `IndicatorSeries`: A newest-first series of indicator values

pub mod bollinger;
pub mod candlestick;
pub mod divergence;
pub mod ema;
pub mod macd;
pub mod rsi;
pub mod sma;
pub mod stddev;
pub mod zigzag;

pub use bollinger::calculate_bollinger;
pub use ema::calculate_ema;
pub use macd::{MacdPoint, calculate_macd};
pub use rsi::calculate_rsi;
pub use sma::calculate_sma;

use crate::domain::bar::{Bar, round2};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IndicatorValue {
    Simple(f64),
    Macd {
        line: f64,
        signal: f64,
        histogram: f64,
    },
    Bollinger {
        upper: f64,
        middle: f64,
        lower: f64,
    },
}

impl IndicatorValue {
    /// The single-value view: the value itself, the MACD line, or the
    /// Bollinger middle band.
    pub fn primary(&self) -> f64 {
        match self {
            IndicatorValue::Simple(v) => *v,
            IndicatorValue::Macd { line, .. } => *line,
            IndicatorValue::Bollinger { middle, .. } => *middle,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndicatorType {
    Sma(usize),
    Ema(usize),
    Rsi(usize),
    Macd {
        fast: usize,
        slow: usize,
        signal: usize,
    },
    /// SMA(slow) taken over the MACD line.
    MacdMa {
        fast: usize,
        slow: usize,
        signal: usize,
    },
    Bollinger {
        period: usize,
        multiplier_bits: u64,
    },
    /// SMA(ma_period) taken over RSI(rsi_period), rounded to two decimals.
    MaRsi {
        rsi_period: usize,
        ma_period: usize,
    },
}

impl IndicatorType {
    pub fn bollinger(period: usize, multiplier: f64) -> Self {
        IndicatorType::Bollinger {
            period,
            multiplier_bits: multiplier.to_bits(),
        }
    }
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Sma(period) => write!(f, "MA({})", period),
            IndicatorType::Ema(period) => write!(f, "EMA({})", period),
            IndicatorType::Rsi(period) => write!(f, "RSI({})", period),
            IndicatorType::Macd { fast, slow, signal } => {
                write!(f, "MACD({},{},{})", fast, slow, signal)
            }
            IndicatorType::MacdMa { fast, slow, signal } => {
                write!(f, "MA_MACD({},{},{})", fast, slow, signal)
            }
            IndicatorType::Bollinger {
                period,
                multiplier_bits,
            } => write!(f, "BB({},{})", period, f64::from_bits(*multiplier_bits)),
            IndicatorType::MaRsi {
                rsi_period,
                ma_period,
            } => write!(f, "MARSI({},{})", rsi_period, ma_period),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSeries {
    pub indicator_type: IndicatorType,
    /// Newest first.
    pub values: Vec<IndicatorValue>,
}

impl IndicatorSeries {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, shift: usize) -> Option<&IndicatorValue> {
        self.values.get(shift)
    }
}

/// Closing prices of a newest-first window, oldest first.
pub fn closes_ascending(bars: &[Bar]) -> Vec<f64> {
    bars.iter().rev().map(|b| b.close).collect()
}

fn newest_first(indicator_type: IndicatorType, mut ascending: Vec<IndicatorValue>) -> IndicatorSeries {
    ascending.reverse();
    IndicatorSeries {
        indicator_type,
        values: ascending,
    }
}

fn simple(values: Vec<f64>) -> Vec<IndicatorValue> {
    values.into_iter().map(IndicatorValue::Simple).collect()
}

/// Compute `indicator_type` over a newest-first bar window.
pub fn compute(bars: &[Bar], indicator_type: IndicatorType) -> IndicatorSeries {
    let closes = closes_ascending(bars);
    let values = match indicator_type {
        IndicatorType::Sma(period) => simple(calculate_sma(&closes, period)),
        IndicatorType::Ema(period) => simple(calculate_ema(&closes, period)),
        IndicatorType::Rsi(period) => simple(calculate_rsi(&closes, period)),
        IndicatorType::Macd { fast, slow, signal } => calculate_macd(&closes, fast, slow, signal)
            .into_iter()
            .map(|p| IndicatorValue::Macd {
                line: p.macd,
                signal: p.signal,
                histogram: p.histogram,
            })
            .collect(),
        IndicatorType::MacdMa { fast, slow, signal } => {
            let line: Vec<f64> = calculate_macd(&closes, fast, slow, signal)
                .into_iter()
                .map(|p| p.macd)
                .collect();
            simple(calculate_sma(&line, slow))
        }
        IndicatorType::Bollinger {
            period,
            multiplier_bits,
        } => calculate_bollinger(&closes, period, f64::from_bits(multiplier_bits))
            .into_iter()
            .map(|b| IndicatorValue::Bollinger {
                upper: b.upper,
                middle: b.middle,
                lower: b.lower,
            })
            .collect(),
        IndicatorType::MaRsi {
            rsi_period,
            ma_period,
        } => {
            let rsi = calculate_rsi(&closes, rsi_period);
            simple(calculate_sma(&rsi, ma_period).into_iter().map(round2).collect())
        }
    };
    newest_first(indicator_type, values)
}
