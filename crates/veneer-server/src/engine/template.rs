//! Response body templating.
//!
//! Walks mock/case bodies recursively and substitutes `{{ ... }}` tokens with
//! request data, state results, or generated values. A string that consists of
//! a single `{{state.*}}` token is replaced by the raw object, which lets a
//! one-line body return an entire collection.

use super::context::ExecContext;
use rand::seq::SliceRandom;
use rand::Rng;
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

fn token_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{\s*([a-zA-Z0-9_.\-]+)([^}]*)\}\}").unwrap())
}

const FIRST_NAMES: [&str; 12] = [
    "Alice", "Bruno", "Carla", "Deniz", "Elif", "Felix", "Greta", "Hugo", "Iris", "Jonas", "Kara",
    "Liam",
];
const LAST_NAMES: [&str; 10] = [
    "Adler", "Baker", "Costa", "Demir", "Ek", "Fischer", "Garcia", "Hansen", "Ito", "Jansen",
];
const EMAIL_DOMAINS: [&str; 4] = ["example.com", "example.org", "mail.test", "inbox.test"];

/// Recursively expand every template token in `template`.
pub fn expand(template: &Value, ctx: &ExecContext) -> Value {
    match template {
        Value::String(s) => expand_string(s, ctx),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), expand(v, ctx)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(|v| expand(v, ctx)).collect()),
        other => other.clone(),
    }
}

fn expand_string(s: &str, ctx: &ExecContext) -> Value {
    let re = token_regex();
    let trimmed = s.trim();

    // Whole-string state shortcuts substitute the raw value, not a string.
    if let Some(caps) = re.captures(trimmed) {
        if caps.get(0).map(|m| m.as_str()) == Some(trimmed) {
            if let Some(state) = &ctx.state {
                match &caps[1] {
                    "state.list" => {
                        return state
                            .list
                            .as_ref()
                            .map(|l| Value::Array(l.iter().cloned().map(Value::Object).collect()))
                            .unwrap_or(Value::Null);
                    }
                    "state.item" => return record_or_null(&state.item),
                    "state.created" => return record_or_null(&state.created),
                    "state.updated" => return record_or_null(&state.updated),
                    _ => {}
                }
            }
        }
    }

    let result = re.replace_all(s, |caps: &regex::Captures| {
        let key = &caps[1];
        let args = caps.get(2).map(|m| m.as_str().trim()).unwrap_or("");

        if key.starts_with("request.") {
            return match resolve_request_ref(key, ctx) {
                Some(value) => value_to_string(&value),
                // Unresolved refs stay literal.
                None => caps[0].to_string(),
            };
        }

        match key {
            "uuid" => uuid::Uuid::new_v4().to_string(),
            "name" => generate_name(),
            "email" => generate_email(),
            "bool" => rand::thread_rng().gen_bool(0.5).to_string(),
            "date" | "dateNow" => today().format("%Y-%m-%d").to_string(),
            "dateFuture" => {
                let days = parse_arg(args, "days").unwrap_or(1).max(0);
                let offset = rand::thread_rng().gen_range(0..=days as u64);
                today()
                    .checked_add_days(chrono::Days::new(offset))
                    .unwrap_or_else(today)
                    .format("%Y-%m-%d")
                    .to_string()
            }
            "number" => {
                let min = parse_arg(args, "min").unwrap_or(1);
                let max = parse_arg(args, "max").unwrap_or(1000);
                if min <= max {
                    rand::thread_rng().gen_range(min..=max).to_string()
                } else {
                    min.to_string()
                }
            }
            _ => caps[0].to_string(),
        }
    });

    Value::String(result.into_owned())
}

fn record_or_null(record: &Option<super::context::Record>) -> Value {
    record
        .as_ref()
        .map(|r| Value::Object(r.clone()))
        .unwrap_or(Value::Null)
}

fn resolve_request_ref(key: &str, ctx: &ExecContext) -> Option<Value> {
    let rest = key.strip_prefix("request.")?;
    let (scope, field) = rest.split_once('.')?;
    let field = field.split('.').next().unwrap_or(field);
    ctx.lookup(scope, field)
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Parse a `name=value` pair out of a space-separated argument list.
fn parse_arg(args: &str, name: &str) -> Option<i64> {
    args.split_whitespace()
        .find_map(|arg| arg.strip_prefix(&format!("{name}=")))
        .and_then(|v| v.parse().ok())
}

fn today() -> chrono::NaiveDate {
    chrono::Utc::now().date_naive()
}

fn generate_name() -> String {
    let mut rng = rand::thread_rng();
    let first = FIRST_NAMES.choose(&mut rng).unwrap_or(&"Alex");
    let last = LAST_NAMES.choose(&mut rng).unwrap_or(&"Smith");
    format!("{first} {last}")
}

fn generate_email() -> String {
    let mut rng = rand::thread_rng();
    let first = FIRST_NAMES.choose(&mut rng).unwrap_or(&"alex");
    let last = LAST_NAMES.choose(&mut rng).unwrap_or(&"smith");
    let domain = EMAIL_DOMAINS.choose(&mut rng).unwrap_or(&"example.com");
    format!(
        "{}.{}@{}",
        first.to_lowercase(),
        last.to_lowercase(),
        domain
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::context::StateOutcome;
    use serde_json::json;

    fn template_context() -> ExecContext {
        let mut ctx = ExecContext::default();
        ctx.body = json!({"username": "johndoe", "role": "admin"})
            .as_object()
            .unwrap()
            .clone();
        ctx.query.insert("lang".to_string(), "en".to_string());
        ctx.headers
            .insert("x-api-key".to_string(), "secret-123".to_string());
        ctx.state = Some(StateOutcome {
            list: Some(vec![
                json!({"id": 1, "status": "pending"}).as_object().unwrap().clone(),
                json!({"id": 2, "status": "shipped"}).as_object().unwrap().clone(),
            ]),
            item: Some(json!({"id": 99, "status": "delivered"}).as_object().unwrap().clone()),
            created: Some(json!({"success": true}).as_object().unwrap().clone()),
            updated: Some(json!({"modified": true}).as_object().unwrap().clone()),
        });
        ctx
    }

    #[test]
    fn test_generators() {
        let ctx = ExecContext::default();

        let uuid = expand(&json!("{{uuid}}"), &ctx);
        assert_eq!(uuid.as_str().unwrap().len(), 36);

        let email = expand(&json!("{{email}}"), &ctx);
        assert!(email.as_str().unwrap().contains('@'));

        let number = expand(&json!("{{number min=100 max=200}}"), &ctx);
        let n: i64 = number.as_str().unwrap().parse().unwrap();
        assert!((100..=200).contains(&n));

        let date = expand(&json!("{{dateFuture days=5}}"), &ctx);
        let parsed = chrono::NaiveDate::parse_from_str(date.as_str().unwrap(), "%Y-%m-%d").unwrap();
        assert!(parsed >= today());

        let b = expand(&json!("{{bool}}"), &ctx);
        assert!(matches!(b.as_str().unwrap(), "true" | "false"));
    }

    #[test]
    fn test_request_injection() {
        let ctx = template_context();
        let cases = [
            ("Hello {{request.body.username}}", "Hello johndoe"),
            ("Language: {{request.query.lang}}", "Language: en"),
            ("Key: {{request.headers.x-api-key}}", "Key: secret-123"),
            (
                "User: {{request.body.username}} - Role: {{request.body.role}}",
                "User: johndoe - Role: admin",
            ),
            // Unresolved refs stay literal.
            (
                "Missing: {{request.body.notfound}}",
                "Missing: {{request.body.notfound}}",
            ),
        ];
        for (template, want) in cases {
            assert_eq!(expand(&json!(template), &ctx), json!(want));
        }
    }

    #[test]
    fn test_state_shortcuts_return_raw_values() {
        let ctx = template_context();

        let list = expand(&json!("{{state.list}}"), &ctx);
        assert!(list.is_array());
        assert_eq!(list.as_array().unwrap().len(), 2);

        let item = expand(&json!("{{state.item}}"), &ctx);
        assert_eq!(item["id"], 99);

        let created = expand(&json!("{{state.created}}"), &ctx);
        assert_eq!(created["success"], true);

        // A shortcut embedded in a longer string is not a whole-string token
        // and stays literal.
        let embedded = expand(&json!("items: {{state.list}}"), &ctx);
        assert_eq!(embedded, json!("items: {{state.list}}"));
    }

    #[test]
    fn test_state_shortcut_without_state() {
        let ctx = ExecContext::default();
        let out = expand(&json!("{{state.list}}"), &ctx);
        assert_eq!(out, json!("{{state.list}}"));
    }

    #[test]
    fn test_recursive_expansion() {
        let ctx = template_context();
        let input = json!({
            "meta": {"user": "{{request.body.username}}", "timestamp": "{{date}}"},
            "data": [
                {"id": "{{uuid}}", "type": "generated"},
                {"static": "value"}
            ]
        });

        let out = expand(&input, &ctx);
        assert_eq!(out["meta"]["user"], "johndoe");
        assert_eq!(out["data"][0]["id"].as_str().unwrap().len(), 36);
        assert_eq!(out["data"][1]["static"], "value");
    }

    #[test]
    fn test_neutrality_without_tokens() {
        let ctx = template_context();
        let input = json!({"static": "value", "n": 42, "nested": [1, 2, 3], "none": null});
        assert_eq!(expand(&input, &ctx), input);
    }
}
