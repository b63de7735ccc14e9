//! Candlestick pattern detectors.
//!
//! Every detector takes an oldest-first slice and inspects only the last
//! bars it needs (one, two, three or five). A slice that is too short never
//! matches. Price equality uses [`approximate_equal`]: a difference within
//! 0.1% of the first value, both sides rounded to four significant digits.

use crate::domain::bar::Bar;

pub type Pattern = fn(&[Bar]) -> bool;

pub const BULLISH_PATTERNS: &[(&str, Pattern)] = &[
    ("BullishEngulfingPattern", bullish_engulfing),
    ("DownsideTasukiGap", downside_tasuki_gap),
    ("BullishHarami", bullish_harami),
    ("BullishHaramiCross", bullish_harami_cross),
    ("MorningDojiStar", morning_doji_star),
    ("MorningStar", morning_star),
    ("BullishMarubozu", bullish_marubozu),
    ("PiercingLine", piercing_line),
    ("ThreeWhiteSoldiers", three_white_soldiers),
    ("BullishHammerStick", bullish_hammer),
    ("BullishInvertedHammerStick", bullish_inverted_hammer),
    ("HammerPattern", hammer_pattern),
    ("HammerPatternUnconfirmed", hammer_pattern_unconfirmed),
    ("TweezerBottom", tweezer_bottom),
];

pub const BEARISH_PATTERNS: &[(&str, Pattern)] = &[
    ("BearishEngulfingPattern", bearish_engulfing),
    ("BearishHarami", bearish_harami),
    ("BearishHaramiCross", bearish_harami_cross),
    ("EveningDojiStar", evening_doji_star),
    ("EveningStar", evening_star),
    ("BearishMarubozu", bearish_marubozu),
    ("ThreeBlackCrows", three_black_crows),
    ("BearishHammerStick", bearish_hammer),
    ("BearishInvertedHammerStick", bearish_inverted_hammer),
    ("HangingMan", hanging_man),
    ("HangingManUnconfirmed", hanging_man_unconfirmed),
    ("ShootingStar", shooting_star),
    ("ShootingStarUnconfirmed", shooting_star_unconfirmed),
    ("TweezerTop", tweezer_top),
];

fn to_precision4(x: f64) -> f64 {
    if x == 0.0 || !x.is_finite() {
        return x;
    }
    let magnitude = x.abs().log10().floor() as i32;
    let factor = 10f64.powi(3 - magnitude);
    (x * factor).round() / factor
}

pub fn approximate_equal(a: f64, b: f64) -> bool {
    let left = to_precision4((a - b).abs());
    let right = to_precision4(a * 0.001);
    left <= right
}

fn last<const N: usize>(bars: &[Bar]) -> Option<&[Bar; N]> {
    if bars.len() < N {
        return None;
    }
    bars[bars.len() - N..].try_into().ok()
}

pub fn is_doji(bar: &Bar) -> bool {
    let open_equals_close = approximate_equal(bar.open, bar.close);
    let high_equals_open = open_equals_close && approximate_equal(bar.open, bar.high);
    let low_equals_close = open_equals_close && approximate_equal(bar.close, bar.low);
    open_equals_close && high_equals_open == low_equals_close
}

pub fn doji(bars: &[Bar]) -> bool {
    last::<1>(bars).is_some_and(|[b]| is_doji(b))
}

pub fn bullish_engulfing(bars: &[Bar]) -> bool {
    last::<2>(bars).is_some_and(|[first, second]| {
        first.close < first.open
            && first.open > second.open
            && first.close > second.open
            && first.open < second.close
    })
}

pub fn bearish_engulfing(bars: &[Bar]) -> bool {
    last::<2>(bars).is_some_and(|[first, second]| {
        first.close > first.open
            && first.open < second.open
            && first.close < second.open
            && first.open > second.close
    })
}

pub fn bullish_hammer(bars: &[Bar]) -> bool {
    last::<1>(bars).is_some_and(|[b]| {
        b.close > b.open
            && approximate_equal(b.close, b.high)
            && (b.close - b.open) <= 2.0 * (b.open - b.low)
    })
}

pub fn bearish_hammer(bars: &[Bar]) -> bool {
    last::<1>(bars).is_some_and(|[b]| {
        b.open > b.close
            && approximate_equal(b.open, b.high)
            && (b.open - b.close) <= 2.0 * (b.close - b.low)
    })
}

pub fn bullish_inverted_hammer(bars: &[Bar]) -> bool {
    last::<1>(bars).is_some_and(|[b]| {
        b.close > b.open
            && approximate_equal(b.open, b.low)
            && (b.close - b.open) <= 2.0 * (b.high - b.close)
    })
}

pub fn bearish_inverted_hammer(bars: &[Bar]) -> bool {
    last::<1>(bars).is_some_and(|[b]| {
        b.open > b.close
            && approximate_equal(b.close, b.low)
            && (b.open - b.close) <= 2.0 * (b.high - b.open)
    })
}

pub fn bullish_marubozu(bars: &[Bar]) -> bool {
    last::<1>(bars).is_some_and(|[b]| {
        approximate_equal(b.close, b.high)
            && approximate_equal(b.low, b.open)
            && b.open < b.close
            && b.open < b.high
    })
}

pub fn bearish_marubozu(bars: &[Bar]) -> bool {
    last::<1>(bars).is_some_and(|[b]| {
        approximate_equal(b.open, b.high)
            && approximate_equal(b.low, b.close)
            && b.open > b.close
            && b.open > b.low
    })
}

pub fn bullish_harami(bars: &[Bar]) -> bool {
    last::<2>(bars).is_some_and(|[first, second]| {
        first.open > second.open
            && first.close < second.open
            && first.close < second.close
            && first.open > second.low
            && first.high > second.high
    })
}

pub fn bearish_harami(bars: &[Bar]) -> bool {
    last::<2>(bars).is_some_and(|[first, second]| {
        first.open < second.open
            && first.close > second.open
            && first.close > second.close
            && first.open < second.low
            && first.high > second.high
    })
}

pub fn bullish_harami_cross(bars: &[Bar]) -> bool {
    bullish_harami(bars) && last::<1>(bars).is_some_and(|[b]| approximate_equal(b.open, b.close))
}

pub fn bearish_harami_cross(bars: &[Bar]) -> bool {
    bearish_harami(bars) && last::<1>(bars).is_some_and(|[b]| approximate_equal(b.open, b.close))
}

pub fn piercing_line(bars: &[Bar]) -> bool {
    last::<2>(bars).is_some_and(|[first, second]| {
        let midpoint = (first.open + first.close) / 2.0;
        second.low < first.low
            && first.close < first.open
            && second.close > second.open
            && first.low > second.open
            && second.close > midpoint
    })
}

pub fn morning_star(bars: &[Bar]) -> bool {
    last::<3>(bars).is_some_and(|[first, second, third]| {
        let midpoint = (first.open + first.close) / 2.0;
        first.close < first.open
            && first.low > second.low
            && first.low > second.high
            && third.open < third.close
            && second.high < first.low
            && third.open > second.high
            && second.close < third.open
            && third.close > midpoint
    })
}

pub fn morning_doji_star(bars: &[Bar]) -> bool {
    morning_star(bars) && bars.len() >= 3 && is_doji(&bars[bars.len() - 2])
}

pub fn evening_star(bars: &[Bar]) -> bool {
    last::<3>(bars).is_some_and(|[first, second, third]| {
        let midpoint = (first.open + first.close) / 2.0;
        first.close > first.open
            && first.high < second.low
            && first.high < second.high
            && third.open > third.close
            && second.low > first.high
            && third.open < second.low
            && second.close > third.open
            && third.close < midpoint
    })
}

pub fn evening_doji_star(bars: &[Bar]) -> bool {
    evening_star(bars) && bars.len() >= 3 && is_doji(&bars[bars.len() - 2])
}

pub fn three_white_soldiers(bars: &[Bar]) -> bool {
    last::<3>(bars).is_some_and(|[first, second, third]| {
        second.high > first.high
            && third.high > second.high
            && first.is_bullish()
            && second.is_bullish()
            && third.is_bullish()
            && first.close > second.open
            && second.open < first.high
            && second.high > third.open
            && third.open < second.close
    })
}

pub fn three_black_crows(bars: &[Bar]) -> bool {
    last::<3>(bars).is_some_and(|[first, second, third]| {
        first.low > second.low
            && second.low > third.low
            && first.is_bearish()
            && second.is_bearish()
            && third.is_bearish()
            && first.open > second.open
            && second.open > first.close
            && second.open > third.open
            && third.open > second.close
    })
}

pub fn downside_tasuki_gap(bars: &[Bar]) -> bool {
    last::<3>(bars).is_some_and(|[first, second, third]| {
        first.is_bearish()
            && second.is_bearish()
            && third.is_bullish()
            && second.high < first.low
            && second.open > third.open
            && second.close < third.open
            && third.close > second.open
            && third.close < first.close
    })
}

fn is_downtrend(bars: &[Bar]) -> bool {
    bars.len() >= 2 && bars.windows(2).all(|w| w[1].close < w[0].close)
}

fn is_uptrend(bars: &[Bar]) -> bool {
    bars.len() >= 2 && bars.windows(2).all(|w| w[1].close > w[0].close)
}

fn hammer_like(bar: &Bar) -> bool {
    let body = (bar.close - bar.open).abs();
    bar.lower_shadow() >= 2.0 * body && bar.upper_shadow() <= body.max(bar.amplitude() * 0.1)
        && bar.amplitude() > 0.0
}

fn inverted_hammer_like(bar: &Bar) -> bool {
    let body = (bar.close - bar.open).abs();
    bar.upper_shadow() >= 2.0 * body && bar.lower_shadow() <= body.max(bar.amplitude() * 0.1)
        && bar.amplitude() > 0.0
}

pub fn hammer_pattern(bars: &[Bar]) -> bool {
    last::<5>(bars).is_some_and(|w| {
        is_downtrend(&w[..3]) && hammer_like(&w[3]) && w[4].close > w[3].close
    })
}

pub fn hammer_pattern_unconfirmed(bars: &[Bar]) -> bool {
    last::<5>(bars).is_some_and(|w| is_downtrend(&w[..4]) && hammer_like(&w[4]))
}

pub fn hanging_man(bars: &[Bar]) -> bool {
    last::<5>(bars).is_some_and(|w| {
        is_uptrend(&w[..3]) && hammer_like(&w[3]) && w[4].close < w[3].close
    })
}

pub fn hanging_man_unconfirmed(bars: &[Bar]) -> bool {
    last::<5>(bars).is_some_and(|w| is_uptrend(&w[..4]) && hammer_like(&w[4]))
}

pub fn shooting_star(bars: &[Bar]) -> bool {
    last::<5>(bars).is_some_and(|w| {
        is_uptrend(&w[..3]) && inverted_hammer_like(&w[3]) && w[4].close < w[3].close
    })
}

pub fn shooting_star_unconfirmed(bars: &[Bar]) -> bool {
    last::<5>(bars).is_some_and(|w| is_uptrend(&w[..4]) && inverted_hammer_like(&w[4]))
}

pub fn tweezer_top(bars: &[Bar]) -> bool {
    last::<5>(bars)
        .is_some_and(|w| is_uptrend(&w[..3]) && approximate_equal(w[3].high, w[4].high))
}

pub fn tweezer_bottom(bars: &[Bar]) -> bool {
    last::<5>(bars)
        .is_some_and(|w| is_downtrend(&w[..3]) && approximate_equal(w[3].low, w[4].low))
}

pub fn is_bullish(window: &[Bar]) -> bool {
    BULLISH_PATTERNS.iter().any(|(_, p)| p(window))
}

pub fn is_bearish(window: &[Bar]) -> bool {
    BEARISH_PATTERNS.iter().any(|(_, p)| p(window))
}

/// Names of every bullish then bearish pattern present in `window`.
pub fn list_patterns(window: &[Bar]) -> Vec<&'static str> {
    BULLISH_PATTERNS
        .iter()
        .chain(BEARISH_PATTERNS)
        .filter(|(_, p)| p(window))
        .map(|(name, _)| *name)
        .collect()
}
