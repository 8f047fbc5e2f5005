//! Query-driven filtering, sorting and pagination for file-backed mocks.
//!
//! Processing order over the materialised rows:
//!   1. exact filters   (?field=value)
//!   2. substring       (?field_like=value)
//!   3. sort            (?_sort=field&_order=asc|desc)
//!   4. pagination      (?_page=n&_limit=m)

use super::context::Record;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;

#[derive(Debug, thiserror::Error, PartialEq)]
#[error("{0}")]
pub struct FilterError(pub String);

/// Apply the full filter pipeline. `auth_query_key` names the credential
/// parameter when auth reads from the query string, so it never acts as a
/// field filter.
pub fn apply(
    mut rows: Vec<Record>,
    params: &HashMap<String, String>,
    auth_query_key: Option<&str>,
) -> Result<Vec<Record>, FilterError> {
    rows = apply_exact_filters(rows, params, auth_query_key);
    rows = apply_like_filters(rows, params);
    apply_sorting(&mut rows, params);
    apply_pagination(rows, params)
}

fn is_reserved(key: &str, auth_query_key: Option<&str>) -> bool {
    key.starts_with('_')
        || key.ends_with("_like")
        || auth_query_key.is_some_and(|auth| key.eq_ignore_ascii_case(auth))
}

fn apply_exact_filters(
    rows: Vec<Record>,
    params: &HashMap<String, String>,
    auth_query_key: Option<&str>,
) -> Vec<Record> {
    let mut filtered = rows;
    for (key, val) in params {
        if is_reserved(key, auth_query_key) {
            continue;
        }
        let target = urlencoding::decode(val)
            .map(|v| v.to_string())
            .unwrap_or_else(|_| val.clone());
        filtered.retain(|row| row.get(key).is_some_and(|v| match_exact(v, &target)));
    }
    filtered
}

/// Strict equality against the query literal: numbers compare through their
/// decimal projection, booleans as "true"/"false".
fn match_exact(value: &Value, target: &str) -> bool {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                target == i.to_string()
            } else if let Some(u) = n.as_u64() {
                target == u.to_string()
            } else {
                n.as_f64().is_some_and(|f| target == format!("{f:.0}"))
            }
        }
        Value::String(s) => s == target,
        Value::Bool(b) => (target == "true" && *b) || (target == "false" && !*b),
        _ => false,
    }
}

fn apply_like_filters(rows: Vec<Record>, params: &HashMap<String, String>) -> Vec<Record> {
    let mut filtered = rows;
    for (key, val) in params {
        let Some(field) = key.strip_suffix("_like") else {
            continue;
        };
        let needle = urlencoding::decode(val)
            .map(|v| v.to_string())
            .unwrap_or_else(|_| val.clone())
            .to_lowercase();

        filtered.retain(|row| {
            row.get(field)
                .is_some_and(|v| stringify(v).to_lowercase().contains(&needle))
        });
    }
    filtered
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn apply_sorting(rows: &mut [Record], params: &HashMap<String, String>) {
    let Some(field) = params.get("_sort") else {
        return;
    };
    let descending = params
        .get("_order")
        .is_some_and(|o| o.eq_ignore_ascii_case("desc"));

    rows.sort_by(|a, b| {
        let ord = match (a.get(field), b.get(field)) {
            (None, None) => Ordering::Equal,
            // Rows missing the sort field sink to the end.
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(va), Some(vb)) => compare_values(va, vb),
        };
        if descending {
            ord.reverse()
        } else {
            ord
        }
    });
}

/// Type-directed comparison by the observed value type of the left side.
fn compare_values(a: &Value, b: &Value) -> Ordering {
    match a {
        Value::Number(na) => {
            let fa = na.as_f64().unwrap_or_default();
            let fb = b.as_f64().unwrap_or_default();
            fa.partial_cmp(&fb).unwrap_or(Ordering::Equal)
        }
        Value::String(sa) => sa.as_str().cmp(stringify(b).as_str()),
        Value::Bool(ba) => {
            let bb = b.as_bool().unwrap_or_default();
            ba.cmp(&bb)
        }
        _ => Ordering::Equal,
    }
}

fn apply_pagination(
    rows: Vec<Record>,
    params: &HashMap<String, String>,
) -> Result<Vec<Record>, FilterError> {
    let mut limit: i64 = 0;
    let mut page: i64 = 1;

    if let Some(raw) = params.get("_limit") {
        limit = raw
            .parse()
            .ok()
            .filter(|v| *v >= 0)
            .ok_or_else(|| FilterError("_limit must be a positive number".to_string()))?;
    }
    if let Some(raw) = params.get("_page") {
        page = raw
            .parse()
            .ok()
            .filter(|v| *v >= 1)
            .ok_or_else(|| FilterError("_page must be a positive number".to_string()))?;
    }

    if limit <= 0 {
        return Ok(rows);
    }

    let start = ((page - 1) * limit) as usize;
    if start >= rows.len() {
        return Ok(Vec::new());
    }
    let end = (start + limit as usize).min(rows.len());
    Ok(rows[start..end].to_vec())
}
