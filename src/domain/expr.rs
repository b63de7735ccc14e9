//! Expression AST data structures.
//!
//! - `Expr`: the typed AST produced by the parser
//! - `Function`: the closed set of built-in functions, resolved at parse time
//! - `ParamRule`: per-function argument count and minimum-value bounds

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Pos,
    Abs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Gt,
    Ge,
    Lt,
    Le,
    Eq,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Str(String),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Comparison {
        op: CompareOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Call {
        function: Function,
        args: Vec<Expr>,
    },
}

impl Expr {
    pub fn call(function: Function, args: Vec<Expr>) -> Self {
        Expr::Call { function, args }
    }

    pub fn unary(op: UnaryOp, operand: Expr) -> Self {
        Expr::Unary {
            op,
            operand: Box::new(operand),
        }
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Self {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn compare(op: CompareOp, left: Expr, right: Expr) -> Self {
        Expr::Comparison {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn abs(self) -> Self {
        Expr::unary(UnaryOp::Abs, self)
    }

    /// `base * (100 + abs(self)) / 100`, or `100 - ...` when `up` is false.
    pub fn percent_away_from(self, base: Expr, up: bool) -> Self {
        let op = if up { BinaryOp::Add } else { BinaryOp::Sub };
        Expr::binary(
            BinaryOp::Div,
            Expr::binary(
                BinaryOp::Mul,
                base,
                Expr::binary(op, Expr::Number(100.0), self.abs()),
            ),
            Expr::Number(100.0),
        )
    }

    /// Every function call in the tree, outermost first.
    pub fn calls(&self) -> Vec<(Function, &[Expr])> {
        let mut out = Vec::new();
        self.collect_calls(&mut out);
        out
    }

    fn collect_calls<'a>(&'a self, out: &mut Vec<(Function, &'a [Expr])>) {
        match self {
            Expr::Number(_) | Expr::Str(_) => {}
            Expr::Unary { operand, .. } => operand.collect_calls(out),
            Expr::Binary { left, right, .. } | Expr::Comparison { left, right, .. } => {
                left.collect_calls(out);
                right.collect_calls(out);
            }
            Expr::Call { function, args } => {
                out.push((*function, args.as_slice()));
                for arg in args {
                    arg.collect_calls(out);
                }
            }
        }
    }

    /// Literal numeric value, looking through unary signs.
    pub fn as_literal(&self) -> Option<f64> {
        match self {
            Expr::Number(v) => Some(*v),
            Expr::Unary { op, operand } => {
                let v = operand.as_literal()?;
                Some(match op {
                    UnaryOp::Neg => -v,
                    UnaryOp::Pos => v,
                    UnaryOp::Abs => v.abs(),
                })
            }
            _ => None,
        }
    }
}

/// Comparisons bind loosest, so one nested as an operand needs parentheses.
fn write_operand(f: &mut fmt::Formatter<'_>, operand: &Expr) -> fmt::Result {
    match operand {
        Expr::Comparison { .. } => write!(f, "({})", operand),
        _ => write!(f, "{}", operand),
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Number(v) => write!(f, "{}", v),
            Expr::Str(s) => write!(f, "'{}'", s),
            Expr::Unary { op, operand } => match op {
                UnaryOp::Neg => write!(f, "-({})", operand),
                UnaryOp::Pos => write!(f, "+({})", operand),
                UnaryOp::Abs => write!(f, "abs({})", operand),
            },
            Expr::Binary { op, left, right } => {
                let sym = match op {
                    BinaryOp::Add => "+",
                    BinaryOp::Sub => "-",
                    BinaryOp::Mul => "*",
                    BinaryOp::Div => "/",
                };
                write!(f, "(")?;
                write_operand(f, left)?;
                write!(f, " {} ", sym)?;
                write_operand(f, right)?;
                write!(f, ")")
            }
            Expr::Comparison { op, left, right } => {
                let sym = match op {
                    CompareOp::Gt => ">",
                    CompareOp::Ge => ">=",
                    CompareOp::Lt => "<",
                    CompareOp::Le => "<=",
                    CompareOp::Eq => "=",
                };
                write_operand(f, left)?;
                write!(f, " {} ", sym)?;
                write_operand(f, right)
            }
            Expr::Call { function, args } => {
                write!(f, "{}(", function.name())?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Function {
    Broker,
    Symbol,
    Timeframe,
    Hour,
    Minute,
    Open,
    High,
    Low,
    Close,
    Volume,
    Volume24hInUsd,
    Change,
    ChangePercent,
    Ampl,
    AmplPercent,
    UpperShadow,
    UpperShadowPercent,
    LowerShadow,
    LowerShadowPercent,
    Rsi,
    RsiSlope,
    Ma,
    Ema,
    MacdValue,
    MacdSignal,
    MacdHistogram,
    MacdSlope,
    BbUpper,
    BbMiddle,
    BbLower,
    RsiPhanKi,
    MacdNDinh,
    BullishEngulfing,
    BearishEngulfing,
    BullishHammer,
    BearishHammer,
    Bullish,
    Bearish,
    Doji,
    Marsi,
    BullBearList,
}

/// Argument bounds for a function: count range plus the minimum accepted
/// value for each leading positional argument.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamRule {
    pub min_args: usize,
    pub max_args: usize,
    pub minimums: &'static [f64],
}

const fn rule(min_args: usize, max_args: usize, minimums: &'static [f64]) -> ParamRule {
    ParamRule {
        min_args,
        max_args,
        minimums,
    }
}

impl Function {
    pub const ALL: [Function; 41] = [
        Function::Broker,
        Function::Symbol,
        Function::Timeframe,
        Function::Hour,
        Function::Minute,
        Function::Open,
        Function::High,
        Function::Low,
        Function::Close,
        Function::Volume,
        Function::Volume24hInUsd,
        Function::Change,
        Function::ChangePercent,
        Function::Ampl,
        Function::AmplPercent,
        Function::UpperShadow,
        Function::UpperShadowPercent,
        Function::LowerShadow,
        Function::LowerShadowPercent,
        Function::Rsi,
        Function::RsiSlope,
        Function::Ma,
        Function::Ema,
        Function::MacdValue,
        Function::MacdSignal,
        Function::MacdHistogram,
        Function::MacdSlope,
        Function::BbUpper,
        Function::BbMiddle,
        Function::BbLower,
        Function::RsiPhanKi,
        Function::MacdNDinh,
        Function::BullishEngulfing,
        Function::BearishEngulfing,
        Function::BullishHammer,
        Function::BearishHammer,
        Function::Bullish,
        Function::Bearish,
        Function::Doji,
        Function::Marsi,
        Function::BullBearList,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Function::Broker => "broker",
            Function::Symbol => "symbol",
            Function::Timeframe => "timeframe",
            Function::Hour => "hour",
            Function::Minute => "minute",
            Function::Open => "open",
            Function::High => "high",
            Function::Low => "low",
            Function::Close => "close",
            Function::Volume => "volume",
            Function::Volume24hInUsd => "volume24h_in_usd",
            Function::Change => "change",
            Function::ChangePercent => "change%",
            Function::Ampl => "ampl",
            Function::AmplPercent => "ampl%",
            Function::UpperShadow => "upper_shadow",
            Function::UpperShadowPercent => "upper_shadow%",
            Function::LowerShadow => "lower_shadow",
            Function::LowerShadowPercent => "lower_shadow%",
            Function::Rsi => "rsi",
            Function::RsiSlope => "rsi_slope",
            Function::Ma => "ma",
            Function::Ema => "ema",
            Function::MacdValue => "macd_value",
            Function::MacdSignal => "macd_signal",
            Function::MacdHistogram => "macd_histogram",
            Function::MacdSlope => "macd_slope",
            Function::BbUpper => "bb_upper",
            Function::BbMiddle => "bb_middle",
            Function::BbLower => "bb_lower",
            Function::RsiPhanKi => "rsi_phan_ki",
            Function::MacdNDinh => "macd_n_dinh",
            Function::BullishEngulfing => "bullish_engulfing",
            Function::BearishEngulfing => "bearish_engulfing",
            Function::BullishHammer => "bullish_hammer",
            Function::BearishHammer => "bearish_hammer",
            Function::Bullish => "bullish",
            Function::Bearish => "bearish",
            Function::Doji => "doji",
            Function::Marsi => "marsi",
            Function::BullBearList => "bull_bear_list",
        }
    }

    /// Case-insensitive lookup by name.
    pub fn from_name(name: &str) -> Option<Function> {
        let lowered = name.to_ascii_lowercase();
        Function::ALL.into_iter().find(|f| f.name() == lowered)
    }

    pub fn param_rule(self) -> ParamRule {
        match self {
            Function::Broker
            | Function::Symbol
            | Function::Timeframe
            | Function::Hour
            | Function::Minute
            | Function::Volume24hInUsd => rule(0, 0, &[]),
            Function::Open
            | Function::High
            | Function::Low
            | Function::Close
            | Function::Volume
            | Function::Change
            | Function::ChangePercent
            | Function::Ampl
            | Function::AmplPercent
            | Function::UpperShadow
            | Function::UpperShadowPercent
            | Function::LowerShadow
            | Function::LowerShadowPercent
            | Function::BullishEngulfing
            | Function::BearishEngulfing
            | Function::BullishHammer
            | Function::BearishHammer
            | Function::Bullish
            | Function::Bearish
            | Function::Doji
            | Function::BullBearList => rule(0, 1, &[]),
            Function::Rsi | Function::Ma | Function::Ema => rule(1, 2, &[1.0]),
            Function::RsiSlope => rule(1, 2, &[]),
            Function::MacdValue | Function::MacdHistogram => rule(3, 4, &[1.0, 2.0, 1.0]),
            Function::MacdSignal | Function::MacdSlope => rule(3, 4, &[1.0, 2.0, 3.0]),
            Function::BbUpper | Function::BbMiddle | Function::BbLower => rule(2, 3, &[1.0, 0.0]),
            Function::RsiPhanKi => rule(6, 7, &[1.0, 1.0, 1.0, 0.0, 1.0, 2.0]),
            Function::MacdNDinh => rule(8, 100, &[1.0, 2.0, 3.0, 0.0, 0.0]),
            Function::Marsi => rule(2, 3, &[]),
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn function_names_round_trip() {
        for function in Function::ALL {
            assert_eq!(Function::from_name(function.name()), Some(function));
        }
    }

    #[test]
    fn function_lookup_ignores_case() {
        assert_eq!(Function::from_name("RSI"), Some(Function::Rsi));
        assert_eq!(Function::from_name("Change%"), Some(Function::ChangePercent));
        assert_eq!(Function::from_name("stochastic"), None);
    }

    #[test]
    fn param_rules_match_table() {
        assert_eq!(Function::Close.param_rule().max_args, 1);
        assert_eq!(Function::MacdSignal.param_rule().minimums, &[1.0, 2.0, 3.0]);
        assert_eq!(Function::MacdNDinh.param_rule().max_args, 100);
        assert_eq!(Function::Hour.param_rule().max_args, 0);
    }

    #[test]
    fn calls_collects_nested() {
        let expr = Expr::compare(
            CompareOp::Gt,
            Expr::call(Function::Rsi, vec![Expr::Number(14.0)]),
            Expr::call(Function::Ma, vec![Expr::call(Function::Close, vec![])]),
        );
        let names: Vec<Function> = expr.calls().into_iter().map(|(f, _)| f).collect();
        assert_eq!(names, vec![Function::Rsi, Function::Ma, Function::Close]);
    }

    #[test]
    fn percent_wrapper_display() {
        let wrapped =
            Expr::Number(2.0).percent_away_from(Expr::call(Function::Close, vec![]), true);
        assert_eq!(wrapped.to_string(), "((close() * (100 + abs(2))) / 100)");
    }

    #[test]
    fn nested_comparisons_are_parenthesised() {
        let close = || Expr::call(Function::Close, vec![]);
        let expr = Expr::compare(
            CompareOp::Eq,
            Expr::compare(CompareOp::Gt, close(), Expr::Number(1.0)),
            Expr::compare(CompareOp::Lt, close(), Expr::Number(2.0)),
        );
        assert_eq!(expr.to_string(), "(close() > 1) = (close() < 2)");

        let sum = Expr::binary(
            BinaryOp::Add,
            Expr::compare(CompareOp::Gt, close(), Expr::Number(0.0)),
            Expr::Number(1.0),
        );
        assert_eq!(sum.to_string(), "((close() > 0) + 1)");
    }

    #[test]
    fn literal_through_sign() {
        let neg = Expr::unary(UnaryOp::Neg, Expr::Number(3.0));
        assert_eq!(neg.as_literal(), Some(-3.0));
        assert_eq!(Expr::call(Function::Close, vec![]).as_literal(), None);
    }
}
