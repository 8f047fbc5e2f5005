//! Boolean expression evaluation for case matching.
//!
//! Expressions follow `request.<scope>.<key> <op> <literal>` with `AND`/`OR`
//! chaining and a `type()` predicate. Comparisons coerce numeric-looking
//! strings to numbers, so `request.path.id > 100` works on a path binding.

use super::context::ExecContext;
use anyhow::{anyhow, bail, Context, Result};
use serde_json::Value;

const OPERATORS: [&str; 6] = ["==", "!=", "<=", ">=", "<", ">"];

/// Evaluate a condition expression against the request context.
///
/// `OR` commits on the first true branch; within a branch, `AND` commits on
/// the first false atom. A reference to a missing key is a hard error.
pub fn evaluate(expr: &str, ctx: &ExecContext) -> Result<bool> {
    let expr = expr.trim();
    if expr.is_empty() {
        bail!("empty condition");
    }

    // Normalize symbolic and lowercase logical operators.
    let expr = expr
        .replace("&&", " AND ")
        .replace("||", " OR ")
        .replace(" and ", " AND ")
        .replace(" or ", " OR ");

    for or_part in expr.split(" OR ") {
        let mut all = true;
        for and_part in or_part.split(" AND ") {
            let ok = eval_single(and_part.trim(), ctx)
                .with_context(|| format!("failed evaluating '{}'", and_part.trim()))?;
            if !ok {
                all = false;
                break;
            }
        }
        if all {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Evaluate one comparison or `type()` check.
fn eval_single(cond: &str, ctx: &ExecContext) -> Result<bool> {
    let op = OPERATORS
        .iter()
        .find(|op| cond.contains(**op))
        .copied()
        .ok_or_else(|| anyhow!("invalid operator in '{cond}'"))?;

    let (left, right) = cond
        .split_once(op)
        .ok_or_else(|| anyhow!("invalid condition format: '{cond}'"))?;
    let left = left.trim();
    let right = right.trim();

    // type(ref) == 'name' predicate
    if let Some(inner) = left.strip_prefix("type(").and_then(|s| s.strip_suffix(')')) {
        let value = resolve(inner.trim(), ctx)?;
        let expected = right.trim_matches(|c| c == '\'' || c == '"' || c == ' ');
        return type_check(&value, expected, op);
    }

    let left_value = resolve(left, ctx).context("left value error")?;
    let right_value = parse_literal(right).context("right value error")?;
    compare(&left_value, &right_value, op)
}

fn type_check(value: &Value, expected: &str, op: &str) -> Result<bool> {
    let actual = match value {
        Value::String(s) => {
            if s.parse::<f64>().is_ok() {
                "number"
            } else {
                "string"
            }
        }
        Value::Number(_) => "number",
        Value::Bool(_) => "boolean",
        Value::Object(_) => "dict",
        other => bail!("unsupported type detected: {other}"),
    };

    match op {
        "==" => Ok(actual == expected),
        "!=" => Ok(actual != expected),
        _ => bail!("invalid operator for type() comparison: '{op}'. Only '==' or '!=' allowed"),
    }
}

fn parse_literal(raw: &str) -> Result<Value> {
    let raw = raw.trim();

    if raw.len() >= 2 && raw.starts_with('\'') && raw.ends_with('\'') {
        return Ok(Value::String(raw[1..raw.len() - 1].to_string()));
    }
    if raw == "true" {
        return Ok(Value::Bool(true));
    }
    if raw == "false" {
        return Ok(Value::Bool(false));
    }
    if let Ok(n) = raw.parse::<f64>() {
        return Ok(serde_json::Number::from_f64(n)
            .map(Value::Number)
            .unwrap_or(Value::Null));
    }

    bail!("invalid literal value: '{raw}'")
}

/// Extract a `request.<scope>.<key>` reference from the context.
fn resolve(path: &str, ctx: &ExecContext) -> Result<Value> {
    let Some(rest) = path.strip_prefix("request.") else {
        bail!("invalid reference (must start with 'request.'): '{path}'");
    };

    let (scope, key) = rest
        .split_once('.')
        .ok_or_else(|| anyhow!("invalid request reference: '{path}'"))?;
    // Nested keys are not addressable; only the first segment is used.
    let key = key.split('.').next().unwrap_or(key);

    match scope {
        "body" | "query" | "headers" | "path" => ctx
            .lookup(scope, key)
            .ok_or_else(|| anyhow!("{scope} key '{key}' not found")),
        other => bail!("unknown request scope: '{other}'"),
    }
}

fn as_float(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse::<f64>().ok(),
        _ => None,
    }
}

/// Compare two values with automatic numeric coercion.
fn compare(a: &Value, b: &Value, op: &str) -> Result<bool> {
    match a {
        Value::Number(_) => {
            let af = as_float(a).ok_or_else(|| anyhow!("invalid numeric value"))?;
            let bf =
                as_float(b).ok_or_else(|| anyhow!("type mismatch: left numeric, right {b}"))?;
            compare_floats(af, bf, op)
        }

        Value::String(s) => {
            if let (Some(af), Some(bf)) = (as_float(a), as_float(b)) {
                return compare_floats(af, bf, op);
            }
            let Value::String(bs) = b else {
                bail!("type mismatch: left string, right {b}");
            };
            match op {
                "==" => Ok(s == bs),
                "!=" => Ok(s != bs),
                _ => bail!("unsupported operator for string: {op}"),
            }
        }

        Value::Bool(ab) => {
            let Value::Bool(bb) = b else {
                bail!("type mismatch: left bool, right {b}");
            };
            match op {
                "==" => Ok(ab == bb),
                "!=" => Ok(ab != bb),
                _ => bail!("unsupported operator for bool: {op}"),
            }
        }

        _ => bail!("unsupported comparison types"),
    }
}

fn compare_floats(a: f64, b: f64, op: &str) -> Result<bool> {
    match op {
        ">" => Ok(a > b),
        ">=" => Ok(a >= b),
        "<" => Ok(a < b),
        "<=" => Ok(a <= b),
        "==" => Ok(a == b),
        "!=" => Ok(a != b),
        _ => bail!("unsupported numeric operator '{op}'"),
    }
}
