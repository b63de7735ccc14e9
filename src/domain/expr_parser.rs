//! Expression parser.
//!
//! Recursive descent over the condition/formula grammar. Precedence from
//! lowest to highest: comparison, `+`/`-`, `*`/`/`, unary `+`/`-`/`abs`.
//! Binary operators are left-associative. Function names are resolved to
//! [`Function`] here, so an unknown name fails at parse time.

use crate::domain::error::ParseError;
use crate::domain::expr::{BinaryOp, CompareOp, Expr, Function, UnaryOp};

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn remaining(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn expect_char(&mut self, expected: char) -> Result<(), ParseError> {
        self.skip_whitespace();
        match self.peek() {
            Some(ch) if ch == expected => {
                self.advance();
                Ok(())
            }
            Some(ch) => Err(ParseError::new(
                format!("expected '{}', found '{}'", expected, ch),
                self.pos,
            )),
            None => Err(ParseError::new(
                format!("expected '{}', found end of input", expected),
                self.pos,
            )),
        }
    }

    fn consume_exact(&mut self, s: &str) -> bool {
        if self.remaining().starts_with(s) {
            self.pos += s.len();
            true
        } else {
            false
        }
    }

    fn peek_word(&self) -> &'a str {
        let remaining = self.remaining();
        let end = remaining
            .char_indices()
            .find(|(_, c)| !(c.is_alphanumeric() || *c == '_'))
            .map(|(i, _)| i)
            .unwrap_or(remaining.len());
        &remaining[..end]
    }

    fn describe_next(&self) -> String {
        let word = self.peek_word();
        if !word.is_empty() {
            word.to_string()
        } else {
            self.peek()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "end of input".to_string())
        }
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_additive()?;
        loop {
            self.skip_whitespace();
            let op = if self.consume_exact(">=") {
                CompareOp::Ge
            } else if self.consume_exact("<=") {
                CompareOp::Le
            } else if self.consume_exact("==") || self.consume_exact("=") {
                CompareOp::Eq
            } else if self.consume_exact(">") {
                CompareOp::Gt
            } else if self.consume_exact("<") {
                CompareOp::Lt
            } else {
                return Ok(left);
            };
            let right = self.parse_additive()?;
            left = Expr::compare(op, left, right);
        }
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_term()?;
        loop {
            self.skip_whitespace();
            let op = match self.peek() {
                Some('+') => BinaryOp::Add,
                Some('-') => BinaryOp::Sub,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_term()?;
            left = Expr::binary(op, left, right);
        }
    }

    fn parse_term(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary()?;
        loop {
            self.skip_whitespace();
            let op = match self.peek() {
                Some('*') => BinaryOp::Mul,
                Some('/') => BinaryOp::Div,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_unary()?;
            left = Expr::binary(op, left, right);
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        self.skip_whitespace();
        match self.peek() {
            Some('-') => {
                self.advance();
                Ok(Expr::unary(UnaryOp::Neg, self.parse_unary()?))
            }
            Some('+') => {
                self.advance();
                Ok(Expr::unary(UnaryOp::Pos, self.parse_unary()?))
            }
            _ if self.peek_word().eq_ignore_ascii_case("abs") => {
                self.pos += 3;
                self.expect_char('(')?;
                let inner = self.parse_comparison()?;
                self.expect_char(')')?;
                Ok(Expr::unary(UnaryOp::Abs, inner))
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        self.skip_whitespace();
        match self.peek() {
            Some(ch) if ch.is_ascii_digit() || ch == '.' => self.parse_number(),
            Some(quote @ ('\'' | '"')) => self.parse_string(quote),
            Some('(') => {
                self.advance();
                let inner = self.parse_comparison()?;
                self.expect_char(')')?;
                Ok(inner)
            }
            Some(ch) if ch.is_alphabetic() || ch == '_' => self.parse_call(),
            _ => Err(ParseError::new(
                format!("expected expression, found '{}'", self.describe_next()),
                self.pos,
            )),
        }
    }

    fn parse_number(&mut self) -> Result<Expr, ParseError> {
        let start = self.pos;
        let mut digits = 0;
        let mut has_dot = false;

        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                digits += 1;
                self.advance();
            } else if ch == '.' && !has_dot {
                has_dot = true;
                self.advance();
            } else {
                break;
            }
        }

        if digits == 0 {
            return Err(ParseError::new("expected number", start));
        }

        if matches!(self.peek(), Some('e' | 'E')) {
            let mark = self.pos;
            self.advance();
            if matches!(self.peek(), Some('+' | '-')) {
                self.advance();
            }
            let exp_start = self.pos;
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
            }
            if self.pos == exp_start {
                self.pos = mark;
            }
        }

        let num_str = &self.input[start..self.pos];
        num_str
            .parse::<f64>()
            .map(Expr::Number)
            .map_err(|_| ParseError::new(format!("invalid number: {}", num_str), start))
    }

    fn parse_string(&mut self, quote: char) -> Result<Expr, ParseError> {
        let start = self.pos;
        self.advance();
        let body_start = self.pos;
        while let Some(ch) = self.peek() {
            if ch == quote {
                let body = self.input[body_start..self.pos].to_string();
                self.advance();
                return Ok(Expr::Str(body));
            }
            self.advance();
        }
        Err(ParseError::new("unterminated string literal", start))
    }

    fn parse_call(&mut self) -> Result<Expr, ParseError> {
        let start = self.pos;
        let word = self.peek_word();
        self.pos += word.len();
        let mut name = word.to_string();
        if self.peek() == Some('%') {
            self.advance();
            name.push('%');
        }

        let function = Function::from_name(&name)
            .ok_or_else(|| ParseError::new(format!("unknown function '{}'", name), start))?;

        self.expect_char('(')?;
        let mut args = Vec::new();
        self.skip_whitespace();
        if self.peek() == Some(')') {
            self.advance();
            return Ok(Expr::call(function, args));
        }

        args.push(self.parse_comparison()?);
        loop {
            self.skip_whitespace();
            if self.peek() == Some(')') {
                self.advance();
                break;
            }
            self.expect_char(',')?;
            args.push(self.parse_comparison()?);
        }

        Ok(Expr::call(function, args))
    }

    fn parse(&mut self) -> Result<Expr, ParseError> {
        let expr = self.parse_comparison()?;
        self.skip_whitespace();
        if self.pos < self.input.len() {
            return Err(ParseError::new(
                format!("unexpected input after expression: '{}'", self.remaining()),
                self.pos,
            ));
        }
        Ok(expr)
    }
}

pub fn parse(input: &str) -> Result<Expr, ParseError> {
    let mut parser = Parser::new(input);
    parser.parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(function: Function, args: Vec<Expr>) -> Expr {
        Expr::call(function, args)
    }

    #[test]
    fn parse_simple_comparison() {
        let expr = parse("close() > close(1)").unwrap();
        assert_eq!(
            expr,
            Expr::compare(
                CompareOp::Gt,
                call(Function::Close, vec![]),
                call(Function::Close, vec![Expr::Number(1.0)]),
            )
        );
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        let expr = parse("1 + 2 * 3").unwrap();
        assert_eq!(
            expr,
            Expr::binary(
                BinaryOp::Add,
                Expr::Number(1.0),
                Expr::binary(BinaryOp::Mul, Expr::Number(2.0), Expr::Number(3.0)),
            )
        );
    }

    #[test]
    fn subtraction_is_left_associative() {
        let expr = parse("10 - 4 - 3").unwrap();
        assert_eq!(expr.to_string(), "((10 - 4) - 3)");
    }

    #[test]
    fn unary_minus_and_abs() {
        let expr = parse("-abs(change(1))").unwrap();
        assert_eq!(
            expr,
            Expr::unary(
                UnaryOp::Neg,
                Expr::unary(UnaryOp::Abs, call(Function::Change, vec![Expr::Number(1.0)])),
            )
        );
    }

    #[test]
    fn identifiers_are_case_insensitive() {
        let expr = parse("RSI(14) >= Ma(20, 0)").unwrap();
        assert!(matches!(expr, Expr::Comparison { op: CompareOp::Ge, .. }));
    }

    #[test]
    fn percent_suffixed_functions() {
        let expr = parse("change%(0) > 1.5").unwrap();
        let calls = expr.calls();
        assert_eq!(calls[0].0, Function::ChangePercent);
    }

    #[test]
    fn both_equality_spellings() {
        assert_eq!(parse("1 = 1").unwrap(), parse("1 == 1").unwrap());
    }

    #[test]
    fn exponent_numbers() {
        assert_eq!(parse("1.5e-3").unwrap(), Expr::Number(0.0015));
        assert_eq!(parse("2E2").unwrap(), Expr::Number(200.0));
    }

    #[test]
    fn quoted_strings() {
        assert_eq!(
            parse("broker() = 'binance'").unwrap(),
            Expr::compare(
                CompareOp::Eq,
                call(Function::Broker, vec![]),
                Expr::Str("binance".into()),
            )
        );
        assert_eq!(parse("\"1h\"").unwrap(), Expr::Str("1h".into()));
    }

    #[test]
    fn parenthesized_groups() {
        let expr = parse("(1 + 2) * 3").unwrap();
        assert_eq!(expr.to_string(), "((1 + 2) * 3)");
    }

    #[test]
    fn error_unknown_function() {
        let err = parse("stochastic(14)").unwrap_err();
        assert!(err.message.contains("unknown function 'stochastic'"));
        assert_eq!(err.position, 0);
    }

    #[test]
    fn error_missing_paren() {
        let err = parse("rsi(14, 0").unwrap_err();
        assert!(err.message.contains("expected ')'"));
    }

    #[test]
    fn error_trailing_input() {
        let err = parse("close() > 1 garbage").unwrap_err();
        assert!(err.message.contains("unexpected input"));
        assert_eq!(err.position, 12);
    }

    #[test]
    fn error_unterminated_string() {
        let err = parse("symbol() = 'BTC").unwrap_err();
        assert!(err.message.contains("unterminated"));
    }

    #[test]
    fn error_empty_input() {
        let err = parse("").unwrap_err();
        assert!(err.message.contains("expected expression"));
        assert_eq!(err.position, 0);
    }

    #[test]
    fn error_dangling_operator() {
        let err = parse("close() >").unwrap_err();
        assert!(err.message.contains("end of input"));
    }

    #[test]
    fn display_round_trips_through_parser() {
        let text = "rsi(14, 0) > (ma(20) * 2)";
        let expr = parse(text).unwrap();
        assert_eq!(parse(&expr.to_string()).unwrap(), expr);
    }

    #[test]
    fn nested_comparison_round_trips() {
        for text in ["(close() > 1) = (close(1) > 1)", "((close() > 0) + 1) >= 1", "close() > close(1) = 1"] {
            let expr = parse(text).unwrap();
            assert_eq!(parse(&expr.to_string()).unwrap(), expr, "{text}");
        }
    }
}
