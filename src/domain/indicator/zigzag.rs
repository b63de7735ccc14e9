//! ZigZag pivot detector.
//!
//! Walks the series oldest to newest and emits a leg each time price
//! reverses by at least `deviation` (absolute, or percent when
//! `by_percent`) with at least `depth` bars between the two pivots. While a
//! leg is open, a new extreme in its direction moves the leg's pivot instead
//! of starting a new leg.
//!
//! Legs come back newest first, and their indexes use the newest-first
//! convention of the input window (0 = most recent point).

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZigZagLeg {
    pub trend: Trend,
    pub high_index: usize,
    pub low_index: usize,
}

/// `points` are `(high, low)` pairs, oldest first.
pub fn calculate_zigzag(
    points: &[(f64, f64)],
    deviation: f64,
    depth: usize,
    by_percent: bool,
) -> Vec<ZigZagLeg> {
    let n = points.len();
    if n == 0 {
        return Vec::new();
    }

    let mut trend: Option<Trend> = None;
    let mut legs: Vec<ZigZagLeg> = Vec::new();

    let mut high_idx = 0usize;
    let mut low_idx = 0usize;
    let mut last_high = points[0].0;
    let mut last_low = points[0].1;

    for (j, &(high, low)) in points.iter().enumerate().skip(1) {
        match trend {
            None => {
                if high > last_high {
                    last_high = high;
                    high_idx = j;
                }
                if low < last_low {
                    last_low = low;
                    low_idx = j;
                }

                let mut diff = last_high - last_low;
                if by_percent && high_idx > low_idx {
                    diff = diff / last_high * 100.0;
                }
                if by_percent && high_idx < low_idx {
                    diff = diff / last_low * 100.0;
                }

                if diff.abs() >= deviation && high_idx.abs_diff(low_idx) >= depth {
                    let leg_trend = if high_idx > low_idx { Trend::Down } else { Trend::Up };
                    trend = Some(leg_trend);
                    legs.push(ZigZagLeg {
                        trend: leg_trend,
                        high_index: high_idx,
                        low_index: low_idx,
                    });
                }
            }
            Some(Trend::Up) if high > last_high => {
                last_high = high;
                high_idx = j;
                if let Some(leg) = legs.last_mut() {
                    leg.high_index = high_idx;
                }
            }
            Some(Trend::Down) if low < last_low => {
                last_low = low;
                low_idx = j;
                if let Some(leg) = legs.last_mut() {
                    leg.low_index = low_idx;
                }
            }
            Some(Trend::Up) => {
                let mut diff = last_high - low;
                if by_percent {
                    diff = diff / last_high * 100.0;
                }
                if diff.abs() >= deviation && high_idx.abs_diff(j) >= depth {
                    trend = Some(Trend::Down);
                    last_low = low;
                    low_idx = j;
                    legs.push(ZigZagLeg {
                        trend: Trend::Down,
                        high_index: high_idx,
                        low_index: low_idx,
                    });
                }
            }
            Some(Trend::Down) => {
                let mut diff = high - last_low;
                if by_percent {
                    diff = diff / last_low * 100.0;
                }
                if diff.abs() >= deviation && low_idx.abs_diff(j) >= depth {
                    trend = Some(Trend::Up);
                    last_high = high;
                    high_idx = j;
                    legs.push(ZigZagLeg {
                        trend: Trend::Up,
                        high_index: high_idx,
                        low_index: low_idx,
                    });
                }
            }
        }
    }

    legs.reverse();
    for leg in &mut legs {
        leg.high_index = n - 1 - leg.high_index;
        leg.low_index = n - 1 - leg.low_index;
    }
    legs
}
