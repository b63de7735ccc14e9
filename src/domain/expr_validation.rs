//! Static expression checks that need no bar data.
//!
//! An expression is valid when it parses and every function call respects
//! its [`ParamRule`](crate::domain::expr::ParamRule): argument count within
//! bounds, and each literal argument at or above its position's minimum.

use crate::domain::error::ExprError;
use crate::domain::expr::Expr;
use crate::domain::expr_parser;
use crate::domain::sub_expr::substitute;

pub fn check_params(expr: &Expr) -> Result<(), ExprError> {
    for (function, args) in expr.calls() {
        let rule = function.param_rule();
        if args.len() < rule.min_args || args.len() > rule.max_args {
            let expected = if rule.min_args == rule.max_args {
                format!("{}", rule.min_args)
            } else {
                format!("{} to {}", rule.min_args, rule.max_args)
            };
            return Err(ExprError::invalid(
                function.name(),
                format!("expected {} arguments, got {}", expected, args.len()),
            ));
        }
        for (i, (arg, min)) in args.iter().zip(rule.minimums).enumerate() {
            match arg.as_literal() {
                Some(v) if v < *min => {
                    return Err(ExprError::invalid(
                        function.name(),
                        format!("argument {} must be at least {}, got {}", i + 1, min, v),
                    ));
                }
                _ => {}
            }
        }
    }
    Ok(())
}

fn check_source(source: &str) -> Result<(), ExprError> {
    let expr = expr_parser::parse(source)?;
    check_params(&expr)
}

/// Every `{...}` group must be a valid expression. Text outside the groups
/// is left unchecked.
pub fn validate_template(text: &str) -> Result<String, ExprError> {
    substitute(text, |group| {
        check_source(group)?;
        Ok("1".to_string())
    })
}

/// Groups and the outer text must all be valid expressions.
pub fn validate_expression(text: &str) -> Result<(), ExprError> {
    let outer = validate_template(text)?;
    check_source(&outer)
}
