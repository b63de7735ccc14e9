//! Expression evaluation.
//!
//! Evaluates an [`Expr`] against an [`EvalContext`]: one bar window (newest
//! first) for a broker/symbol/timeframe, plus a cache of indicator series
//! computed over that window.
//!
//! # Evaluation Semantics
//!
//! - Values are `Number`, `Bool` or `Str`. Arithmetic coerces `Bool` to 1/0.
//! - Comparisons of two strings ignore ASCII case. `=` on numbers is an
//!   epsilon comparison.
//! - `shift` arguments default to 0 and index into the newest-first window.
//!   A shift past the available history is [`ExprError::Range`], except for
//!   the candlestick detectors which yield 0.
//! - Errors never escape [`calculate`]: it logs them and returns `None`.

use crate::domain::bar::{Bar, Timeframe, percent_of, round2};
use crate::domain::error::ExprError;
use crate::domain::expr::{BinaryOp, CompareOp, Expr, Function, UnaryOp};
use crate::domain::expr_parser;
use crate::domain::indicator::candlestick;
use crate::domain::indicator::divergence::{
    MacdPeakParams, RsiDivergenceParams, count_macd_peaks, rsi_divergence,
};
use crate::domain::indicator::{IndicatorSeries, IndicatorType, IndicatorValue, MacdPoint, compute};
use crate::domain::sub_expr;
use chrono::{DateTime, Timelike};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

const EPSILON: f64 = 1e-9;
const DAY_MS: i64 = 24 * 60 * 60 * 1000;
const RSI_SLOPE_WIDTH: f64 = 3.0;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Bool(bool),
    Str(String),
}

impl Value {
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Number(v) => *v != 0.0 && !v.is_nan(),
            Value::Bool(b) => *b,
            Value::Str(s) => !s.is_empty(),
        }
    }

    pub fn as_number(&self) -> Result<f64, ExprError> {
        match self {
            Value::Number(v) => Ok(*v),
            Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
            Value::Str(s) => Err(ExprError::Type {
                reason: format!("expected a number, found string '{}'", s),
            }),
        }
    }
}

/// Substitution form: numbers in shortest round-trip form, booleans as 1/0,
/// strings raw.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(v) => write!(f, "{}", v),
            Value::Bool(b) => f.write_str(if *b { "1" } else { "0" }),
            Value::Str(s) => f.write_str(s),
        }
    }
}

/// Everything an expression can observe for one closed-bar event.
pub struct EvalContext<'a> {
    pub broker: &'a str,
    pub symbol: &'a str,
    pub timeframe: Timeframe,
    /// Newest first.
    pub bars: &'a [Bar],
    cache: RefCell<HashMap<IndicatorType, Rc<IndicatorSeries>>>,
    calls: Cell<usize>,
}

impl<'a> EvalContext<'a> {
    pub fn new(broker: &'a str, symbol: &'a str, timeframe: Timeframe, bars: &'a [Bar]) -> Self {
        Self {
            broker,
            symbol,
            timeframe,
            bars,
            cache: RefCell::new(HashMap::new()),
            calls: Cell::new(0),
        }
    }

    /// Number of function calls evaluated through this context.
    pub fn call_count(&self) -> usize {
        self.calls.get()
    }

    /// Number of distinct indicator series computed so far.
    pub fn cached_series(&self) -> usize {
        self.cache.borrow().len()
    }

    pub fn series(&self, indicator_type: IndicatorType) -> Rc<IndicatorSeries> {
        if let Some(series) = self.cache.borrow().get(&indicator_type) {
            return Rc::clone(series);
        }
        let series = Rc::new(compute(self.bars, indicator_type));
        self.cache
            .borrow_mut()
            .insert(indicator_type, Rc::clone(&series));
        series
    }

    fn bar(&self, function: Function, shift: usize) -> Result<&'a Bar, ExprError> {
        self.bars
            .get(shift)
            .ok_or_else(|| ExprError::range(function.name(), shift, self.bars.len()))
    }
}

/// Parse and evaluate `source` as-is, without `{...}` substitution.
pub fn evaluate_source(source: &str, ctx: &EvalContext<'_>) -> Result<Value, ExprError> {
    let expr = expr_parser::parse(source)?;
    evaluate(&expr, ctx)
}

/// Resolve `{...}` groups in `condition`, then parse and evaluate it.
pub fn evaluate_condition(condition: &str, ctx: &EvalContext<'_>) -> Result<Value, ExprError> {
    let resolved = sub_expr::resolve(condition, ctx)?;
    evaluate_source(&resolved, ctx)
}

/// Evaluate `condition`, logging and swallowing any failure.
pub fn calculate(condition: &str, ctx: &EvalContext<'_>) -> Option<Value> {
    match evaluate_condition(condition, ctx) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(
                broker = ctx.broker,
                symbol = ctx.symbol,
                timeframe = %ctx.timeframe,
                expression = condition,
                error = %e,
                "expression failed"
            );
            None
        }
    }
}

pub fn evaluate(expr: &Expr, ctx: &EvalContext<'_>) -> Result<Value, ExprError> {
    match expr {
        Expr::Number(v) => Ok(Value::Number(*v)),
        Expr::Str(s) => Ok(Value::Str(s.clone())),
        Expr::Unary { op, operand } => {
            let v = evaluate(operand, ctx)?.as_number()?;
            Ok(Value::Number(match op {
                UnaryOp::Neg => -v,
                UnaryOp::Pos => v,
                UnaryOp::Abs => v.abs(),
            }))
        }
        Expr::Binary { op, left, right } => {
            let l = evaluate(left, ctx)?.as_number()?;
            let r = evaluate(right, ctx)?.as_number()?;
            Ok(Value::Number(match op {
                BinaryOp::Add => l + r,
                BinaryOp::Sub => l - r,
                BinaryOp::Mul => l * r,
                BinaryOp::Div => l / r,
            }))
        }
        Expr::Comparison { op, left, right } => {
            let l = evaluate(left, ctx)?;
            let r = evaluate(right, ctx)?;
            compare(*op, &l, &r).map(Value::Bool)
        }
        Expr::Call { function, args } => {
            ctx.calls.set(ctx.calls.get() + 1);
            call(*function, args, ctx)
        }
    }
}

fn compare(op: CompareOp, left: &Value, right: &Value) -> Result<bool, ExprError> {
    if let (Value::Str(l), Value::Str(r)) = (left, right) {
        let (l, r) = (l.to_ascii_lowercase(), r.to_ascii_lowercase());
        return Ok(match op {
            CompareOp::Gt => l > r,
            CompareOp::Ge => l >= r,
            CompareOp::Lt => l < r,
            CompareOp::Le => l <= r,
            CompareOp::Eq => l == r,
        });
    }
    if matches!(left, Value::Str(_)) || matches!(right, Value::Str(_)) {
        if op == CompareOp::Eq {
            return Ok(false);
        }
        return Err(ExprError::Type {
            reason: "cannot order a string against a number".to_string(),
        });
    }

    let l = left.as_number()?;
    let r = right.as_number()?;
    Ok(match op {
        CompareOp::Gt => l > r,
        CompareOp::Ge => l >= r,
        CompareOp::Lt => l < r,
        CompareOp::Le => l <= r,
        CompareOp::Eq => (l - r).abs() < EPSILON,
    })
}

struct Args<'e, 'c, 'a> {
    function: Function,
    args: &'e [Expr],
    ctx: &'c EvalContext<'a>,
}

impl Args<'_, '_, '_> {
    fn number(&self, index: usize, default: f64) -> Result<f64, ExprError> {
        match self.args.get(index) {
            Some(arg) => evaluate(arg, self.ctx)?.as_number(),
            None => Ok(default),
        }
    }

    /// Non-negative integer argument, truncated toward zero.
    fn index(&self, index: usize, default: usize) -> Result<usize, ExprError> {
        if index >= self.args.len() {
            return Ok(default);
        }
        let v = self.number(index, 0.0)?;
        if !v.is_finite() || v < 0.0 {
            return Err(ExprError::invalid(
                self.function.name(),
                format!("argument {} must be a non-negative integer, got {}", index + 1, v),
            ));
        }
        Ok(v as usize)
    }

    /// Shift argument that must name a bar inside a history of `len`.
    fn shift_within(&self, index: usize, len: usize) -> Result<usize, ExprError> {
        let shift = self.index(index, 0)?;
        if shift >= len {
            return Err(ExprError::range(self.function.name(), shift, len));
        }
        Ok(shift)
    }

    fn period(&self, index: usize) -> Result<usize, ExprError> {
        let period = self.index(index, 0)?;
        if period == 0 {
            return Err(ExprError::invalid(self.function.name(), "period must be at least 1"));
        }
        Ok(period)
    }

    fn macd_periods(&self) -> Result<(usize, usize, usize), ExprError> {
        let fast = self.period(0)?;
        let slow = self.period(1)?;
        let signal = self.period(2)?;
        if fast >= slow {
            return Err(ExprError::invalid(
                self.function.name(),
                format!("fast period {} must be below slow period {}", fast, slow),
            ));
        }
        Ok((fast, slow, signal))
    }
}

fn series_value(
    function: Function,
    series: &IndicatorSeries,
    shift: usize,
) -> Result<IndicatorValue, ExprError> {
    series
        .get(shift)
        .copied()
        .ok_or_else(|| ExprError::range(function.name(), shift, series.len()))
}

fn degrees(tan: f64) -> f64 {
    tan.atan().to_degrees().round()
}

fn flag(hit: bool) -> Value {
    Value::Number(if hit { 1.0 } else { 0.0 })
}

/// `count` bars starting at `shift`, oldest first.
fn window(bars: &[Bar], shift: usize, count: usize) -> Vec<Bar> {
    bars[shift..shift + count].iter().rev().cloned().collect()
}

fn call(function: Function, args: &[Expr], ctx: &EvalContext<'_>) -> Result<Value, ExprError> {
    let a = Args {
        function,
        args,
        ctx,
    };
    let bars = ctx.bars;
    let len = bars.len();

    let value = match function {
        Function::Broker => Value::Str(ctx.broker.to_string()),
        Function::Symbol => Value::Str(ctx.symbol.to_string()),
        Function::Timeframe => Value::Str(ctx.timeframe.as_str().to_string()),
        Function::Hour | Function::Minute => {
            let bar = ctx.bar(function, 0)?;
            let time = DateTime::from_timestamp_millis(bar.start_time).ok_or_else(|| {
                ExprError::invalid(function.name(), format!("bad timestamp {}", bar.start_time))
            })?;
            let part = if function == Function::Hour {
                time.hour()
            } else {
                time.minute()
            };
            Value::Number(f64::from(part))
        }
        Function::Open => Value::Number(ctx.bar(function, a.index(0, 0)?)?.open),
        Function::High => Value::Number(ctx.bar(function, a.index(0, 0)?)?.high),
        Function::Low => Value::Number(ctx.bar(function, a.index(0, 0)?)?.low),
        Function::Close => Value::Number(ctx.bar(function, a.index(0, 0)?)?.close),
        Function::Volume => Value::Number(ctx.bar(function, a.index(0, 0)?)?.volume),
        Function::Volume24hInUsd => {
            let total = match bars.first() {
                Some(latest) => bars
                    .iter()
                    .take_while(|b| latest.start_time - b.start_time < DAY_MS)
                    .map(|b| b.volume * b.close)
                    .sum(),
                None => 0.0,
            };
            Value::Number(total)
        }
        Function::Change => Value::Number(ctx.bar(function, a.index(0, 0)?)?.change()),
        Function::ChangePercent => {
            let bar = ctx.bar(function, a.index(0, 0)?)?;
            Value::Number(percent_of(bar.change(), bar.open))
        }
        Function::Ampl => Value::Number(ctx.bar(function, a.index(0, 0)?)?.amplitude()),
        Function::AmplPercent => {
            let bar = ctx.bar(function, a.index(0, 0)?)?;
            Value::Number(percent_of(bar.amplitude(), bar.open))
        }
        Function::UpperShadow => Value::Number(ctx.bar(function, a.index(0, 0)?)?.upper_shadow()),
        Function::UpperShadowPercent => {
            let bar = ctx.bar(function, a.index(0, 0)?)?;
            Value::Number(percent_of(bar.upper_shadow(), bar.open))
        }
        Function::LowerShadow => Value::Number(ctx.bar(function, a.index(0, 0)?)?.lower_shadow()),
        Function::LowerShadowPercent => {
            let bar = ctx.bar(function, a.index(0, 0)?)?;
            Value::Number(percent_of(bar.lower_shadow(), bar.open))
        }
        Function::Rsi => {
            let series = ctx.series(IndicatorType::Rsi(a.period(0)?));
            Value::Number(series_value(function, &series, a.index(1, 0)?)?.primary())
        }
        Function::RsiSlope => {
            let series = ctx.series(IndicatorType::Rsi(a.period(0)?));
            let shift = a.index(1, 0)?;
            if shift >= series.len().saturating_sub(1) {
                return Err(ExprError::range(function.name(), shift, series.len()));
            }
            let diff = series.values[shift].primary() - series.values[shift + 1].primary();
            Value::Number(degrees(diff / RSI_SLOPE_WIDTH))
        }
        Function::Ma => {
            let series = ctx.series(IndicatorType::Sma(a.period(0)?));
            Value::Number(series_value(function, &series, a.index(1, 0)?)?.primary())
        }
        Function::Ema => {
            let series = ctx.series(IndicatorType::Ema(a.period(0)?));
            Value::Number(series_value(function, &series, a.index(1, 0)?)?.primary())
        }
        Function::MacdValue | Function::MacdSignal | Function::MacdHistogram => {
            let (fast, slow, signal) = a.macd_periods()?;
            let series = ctx.series(IndicatorType::Macd { fast, slow, signal });
            match series_value(function, &series, a.index(3, 0)?)? {
                IndicatorValue::Macd {
                    line,
                    signal,
                    histogram,
                } => Value::Number(match function {
                    Function::MacdValue => line,
                    Function::MacdSignal => signal,
                    _ => histogram,
                }),
                other => Value::Number(other.primary()),
            }
        }
        Function::MacdSlope => {
            let (fast, slow, signal) = a.macd_periods()?;
            let shift = a.index(3, 0)?;
            let macd = ctx.series(IndicatorType::Macd { fast, slow, signal });
            let ma = ctx.series(IndicatorType::MacdMa { fast, slow, signal });
            let paired = ma.len().min(macd.len());
            if shift >= paired.saturating_sub(1) {
                return Err(ExprError::range(function.name(), shift, paired));
            }
            let diff_macd = macd.values[shift].primary() - macd.values[shift + 1].primary();
            let diff_ma = (ma.values[shift].primary() - ma.values[shift + 1].primary()).abs();
            Value::Number(degrees(diff_macd / diff_ma))
        }
        Function::BbUpper | Function::BbMiddle | Function::BbLower => {
            let period = a.period(0)?;
            let multiplier = a.number(1, 0.0)?;
            let series = ctx.series(IndicatorType::bollinger(period, multiplier));
            match series_value(function, &series, a.index(2, 0)?)? {
                IndicatorValue::Bollinger {
                    upper,
                    middle,
                    lower,
                } => Value::Number(match function {
                    Function::BbUpper => upper,
                    Function::BbMiddle => middle,
                    _ => lower,
                }),
                other => Value::Number(other.primary()),
            }
        }
        Function::RsiPhanKi => {
            let params = RsiDivergenceParams {
                period: a.period(0)?,
                deviation: a.number(1, 0.0)?,
                depth: a.index(2, 0)?,
                peaks: a.index(3, 0)?,
                min_diff: a.number(4, 0.0)?,
                max_rsi: a.number(5, 0.0)?,
                shift: a.index(6, 0)?,
            };
            Value::Number(f64::from(rsi_divergence(bars, &params)))
        }
        Function::MacdNDinh => {
            let (fast, slow, signal) = a.macd_periods()?;
            let shift = a.index(7, 0)?;
            let series = ctx.series(IndicatorType::Macd { fast, slow, signal });
            if shift >= series.len().saturating_sub(1) {
                return Err(ExprError::range(function.name(), shift, series.len()));
            }
            let diff_percents = (8..args.len())
                .map(|i| a.number(i, 0.0))
                .collect::<Result<Vec<f64>, ExprError>>()?;
            let params = MacdPeakParams {
                red_depth: a.index(3, 0)?,
                depth: a.index(4, 0)?,
                enable_divergence: a.number(5, 0.0)? != 0.0,
                diff_candle0: a.number(6, 0.0)?,
                shift,
                diff_percents,
            };
            let points: Vec<MacdPoint> = series
                .values
                .iter()
                .map(|v| match *v {
                    IndicatorValue::Macd {
                        line,
                        signal,
                        histogram,
                    } => MacdPoint {
                        macd: line,
                        signal,
                        histogram,
                    },
                    other => MacdPoint {
                        macd: other.primary(),
                        signal: 0.0,
                        histogram: 0.0,
                    },
                })
                .collect();
            Value::Number(count_macd_peaks(bars, &points, &params) as f64)
        }
        Function::BullishEngulfing | Function::BearishEngulfing => {
            let shift = a.shift_within(0, len)?;
            if shift >= len.saturating_sub(2) {
                return Ok(flag(false));
            }
            let pair = window(bars, shift, 2);
            flag(if function == Function::BullishEngulfing {
                candlestick::bullish_engulfing(&pair)
            } else {
                candlestick::bearish_engulfing(&pair)
            })
        }
        Function::BullishHammer | Function::BearishHammer => {
            let shift = a.shift_within(0, len)?;
            if shift >= len.saturating_sub(1) {
                return Ok(flag(false));
            }
            let single = window(bars, shift, 1);
            flag(if function == Function::BullishHammer {
                candlestick::bullish_hammer(&single)
            } else {
                candlestick::bearish_hammer(&single)
            })
        }
        Function::Bullish | Function::Bearish | Function::BullBearList => {
            let shift = a.shift_within(0, len)?;
            if len - shift < 5 {
                return Ok(flag(false));
            }
            let five = window(bars, shift, 5);
            match function {
                Function::Bullish => flag(candlestick::is_bullish(&five)),
                Function::Bearish => flag(candlestick::is_bearish(&five)),
                _ => Value::Str(candlestick::list_patterns(&five).join(",")),
            }
        }
        Function::Doji => {
            flag(candlestick::is_doji(ctx.bar(function, a.index(0, 0)?)?))
        }
        Function::Marsi => {
            let rsi_period = a.period(0)?;
            let ma_period = a.period(1)?;
            let series = ctx.series(IndicatorType::MaRsi {
                rsi_period,
                ma_period,
            });
            Value::Number(round2(
                series_value(function, &series, a.index(2, 0)?)?.primary(),
            ))
        }
    };
    Ok(value)
}
