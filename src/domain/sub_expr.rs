//! `{...}` sub-expression substitution.
//!
//! Groups are resolved innermost first. Each distinct group text is
//! evaluated once per template; repeats reuse the rendered result.

use crate::domain::error::{ExprError, ParseError};
use crate::domain::expr_eval::{EvalContext, evaluate_source};
use std::collections::HashMap;

/// Walk `text`, replacing every `{group}` with `render(group)`. Inner groups
/// are replaced before their enclosing group is rendered.
pub fn substitute<F>(text: &str, mut render: F) -> Result<String, ExprError>
where
    F: FnMut(&str) -> Result<String, ExprError>,
{
    let mut stack: Vec<(String, usize)> = Vec::new();
    let mut current = String::new();

    for (pos, ch) in text.char_indices() {
        match ch {
            '{' => stack.push((std::mem::take(&mut current), pos)),
            '}' => {
                let Some((prefix, _)) = stack.pop() else {
                    return Err(ParseError::new("unmatched '}'", pos).into());
                };
                let group = current.trim();
                if group.is_empty() {
                    return Err(ParseError::new("empty sub-expression", pos).into());
                }
                let rendered = render(group)?;
                current = prefix + &rendered;
            }
            _ => current.push(ch),
        }
    }

    if let Some((_, pos)) = stack.last() {
        return Err(ParseError::new("unmatched '{'", *pos).into());
    }
    Ok(current)
}

/// Evaluate every group of `text` against `ctx` and splice the results in.
pub fn resolve(text: &str, ctx: &EvalContext<'_>) -> Result<String, ExprError> {
    let mut memo: HashMap<String, String> = HashMap::new();
    substitute(text, |group| {
        if let Some(rendered) = memo.get(group) {
            return Ok(rendered.clone());
        }
        let rendered = evaluate_source(group, ctx)?.to_string();
        memo.insert(group.to_string(), rendered.clone());
        Ok(rendered)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::bar::Timeframe;
    use crate::domain::expr_eval::{Value, evaluate_condition};
    use crate::domain::indicator::test_support::make_bars;

    #[test]
    fn plain_text_passes_through() {
        let bars = make_bars(&[1.0]);
        let ctx = EvalContext::new("binance", "BTCUSDT", Timeframe::M1, &bars);
        assert_eq!(resolve("close() > 0", &ctx).unwrap(), "close() > 0");
    }

    #[test]
    fn groups_render_values() {
        let bars = make_bars(&[100.0, 105.5]);
        let ctx = EvalContext::new("binance", "BTCUSDT", Timeframe::M1, &bars);
        assert_eq!(
            resolve("{symbol()} closed at {close()} up {close() > close(1)}", &ctx).unwrap(),
            "BTCUSDT closed at 105.5 up 1"
        );
    }

    #[test]
    fn identical_groups_evaluate_once() {
        let closes: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        let bars = make_bars(&closes);
        let ctx = EvalContext::new("binance", "BTCUSDT", Timeframe::M1, &bars);
        let value = evaluate_condition("{rsi(14,0)} > {rsi(14,0)}", &ctx).unwrap();
        assert_eq!(value, Value::Bool(false));
        assert_eq!(ctx.call_count(), 1);
    }

    #[test]
    fn nested_groups_resolve_innermost_first() {
        let bars = make_bars(&[1.0, 2.0, 3.0]);
        let ctx = EvalContext::new("binance", "BTCUSDT", Timeframe::M1, &bars);
        // inner {1 + 1} becomes 2, then close(2) is the oldest bar
        assert_eq!(resolve("{close({1 + 1})}", &ctx).unwrap(), "1");
    }

    #[test]
    fn unbalanced_braces_are_syntax_errors() {
        let bars = make_bars(&[1.0]);
        let ctx = EvalContext::new("binance", "BTCUSDT", Timeframe::M1, &bars);
        for text in ["{close()", "close()}", "{ }", "{{close()}"] {
            assert!(
                matches!(resolve(text, &ctx), Err(ExprError::Syntax(_))),
                "{} should be rejected",
                text
            );
        }
    }

    #[test]
    fn failing_group_fails_whole_template() {
        let bars = make_bars(&[1.0]);
        let ctx = EvalContext::new("binance", "BTCUSDT", Timeframe::M1, &bars);
        assert!(matches!(
            resolve("price {close(3)}", &ctx),
            Err(ExprError::Range { .. })
        ));
    }

    #[test]
    fn substitute_with_custom_renderer() {
        let out = substitute("a {x} b {y}", |g| Ok(g.to_uppercase())).unwrap();
        assert_eq!(out, "a X b Y");
    }
}
