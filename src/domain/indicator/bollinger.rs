//! Bollinger Bands indicator.
//!
//! Bollinger Bands consist of:
//! - Middle: Simple Moving Average (SMA) over n periods
//! - Upper: Middle + (multiplier × StdDev)
//! - Lower: Middle - (multiplier × StdDev)
//!
//! Where StdDev is population standard deviation (divides by N, not N-1).

use crate::domain::indicator::sma::calculate_sma;
use crate::domain::indicator::stddev::calculate_stddev;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BollingerPoint {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

pub fn calculate_bollinger(values: &[f64], period: usize, multiplier: f64) -> Vec<BollingerPoint> {
    let middle = calculate_sma(values, period);
    let stddev = calculate_stddev(values, period);

    middle
        .into_iter()
        .zip(stddev)
        .map(|(middle, sd)| BollingerPoint {
            upper: middle + multiplier * sd,
            middle,
            lower: middle - multiplier * sd,
        })
        .collect()
}
