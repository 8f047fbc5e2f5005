//! Per-request evaluation context.

use serde_json::Value;
use std::collections::HashMap;

/// A free-form JSON object, the unit stored in collections and parsed from
/// request bodies.
pub type Record = serde_json::Map<String, Value>;

/// Results of the stateful step, exposed to templates via `{{state.*}}`.
#[derive(Debug, Clone, Default)]
pub struct StateOutcome {
    pub list: Option<Vec<Record>>,
    pub item: Option<Record>,
    pub created: Option<Record>,
    pub updated: Option<Record>,
}

/// Per-request bag of parsed inputs, populated in order by the pipeline.
///
/// Query and header keys are lowercased; path bindings keep their declared
/// casing. `state` is set only by the stateful step.
#[derive(Debug, Clone, Default)]
pub struct ExecContext {
    pub body: Record,
    pub query: HashMap<String, String>,
    pub headers: HashMap<String, String>,
    pub path: HashMap<String, String>,
    pub state: Option<StateOutcome>,
}

impl ExecContext {
    /// Case-insensitive lookup of `key` within one of the request scopes.
    pub fn lookup(&self, scope: &str, key: &str) -> Option<Value> {
        match scope {
            "body" => self
                .body
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(key))
                .map(|(_, v)| v.clone()),
            "query" => lookup_string_map(&self.query, key),
            "headers" => lookup_string_map(&self.headers, key),
            "path" => lookup_string_map(&self.path, key),
            _ => None,
        }
    }
}

fn lookup_string_map(map: &HashMap<String, String>, key: &str) -> Option<Value> {
    map.iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .map(|(_, v)| Value::String(v.clone()))
}

/// Parse a raw query string into a map, URL-decoding values.
///
/// Keys keep their original casing; callers lowercase where required.
pub fn parse_query_string(query: Option<&str>) -> HashMap<String, String> {
    let mut params = HashMap::new();
    if let Some(q) = query {
        for pair in q.split('&') {
            if let Some((key, value)) = pair.split_once('=') {
                let decoded = urlencoding::decode(value)
                    .map(|v| v.to_string())
                    .unwrap_or_default();
                params.insert(key.to_string(), decoded);
            } else if !pair.is_empty() {
                params.insert(pair.to_string(), String::new());
            }
        }
    }
    params
}
