//! Config format conversion between JSON and YAML.

use crate::config::Config;
use anyhow::{bail, Context, Result};
use serde_json::Value;
use std::path::Path;
use tracing::info;

const JSON_SCHEMA_URL: &str = "https://opensource.trymagic.xyz/schemas/mockserver.schema.json";

/// Convert `input` to `output`; both formats are discriminated by extension.
/// Empty fields are pruned from the output document.
pub fn run(input: &Path, output: &Path) -> Result<()> {
    let contents = std::fs::read_to_string(input)
        .with_context(|| format!("failed to read input file '{}'", input.display()))?;

    let mut config = Config::parse(&contents, input)?;
    config.schema = Some(JSON_SCHEMA_URL.to_string());

    let tree = serde_json::to_value(&config).context("failed to serialize config")?;
    let tree = prune_empty(tree).unwrap_or(Value::Null);

    let ext = output
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    let rendered = match ext.as_str() {
        "json" => serde_json::to_string_pretty(&tree).context("failed to render JSON")?,
        "yaml" | "yml" => serde_yaml::to_string(&tree).context("failed to render YAML")?,
        other => bail!("unsupported output file format '{other}', use .yaml/.yml or .json"),
    };

    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
        }
    }

    std::fs::write(output, rendered)
        .with_context(|| format!("failed to write output file '{}'", output.display()))?;

    info!(
        "converted '{}' to '{}'",
        input.display(),
        output.display()
    );
    Ok(())
}

/// Drop empty strings, empty containers and nulls, recursively. Returns
/// `None` when the whole subtree is empty.
fn prune_empty(value: Value) -> Option<Value> {
    match value {
        Value::Object(map) => {
            let clean: serde_json::Map<String, Value> = map
                .into_iter()
                .filter_map(|(k, v)| prune_empty(v).map(|v| (k, v)))
                .collect();
            if clean.is_empty() {
                None
            } else {
                Some(Value::Object(clean))
            }
        }
        Value::Array(items) => {
            let clean: Vec<Value> = items.into_iter().filter_map(prune_empty).collect();
            if clean.is_empty() {
                None
            } else {
                Some(Value::Array(clean))
            }
        }
        Value::String(s) if s.is_empty() => None,
        Value::Null => None,
        other => Some(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
server:
  port: 8080
  api_prefix: /v1
routes:
  - name: hello
    method: GET
    path: /hello
    mock:
      body:
        message: world
"#;

    #[test]
    fn test_yaml_json_yaml_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let yaml_in = dir.path().join("in.yaml");
        let json_mid = dir.path().join("mid.json");
        let yaml_out = dir.path().join("out.yaml");

        std::fs::write(&yaml_in, YAML).unwrap();
        run(&yaml_in, &json_mid).unwrap();
        run(&json_mid, &yaml_out).unwrap();

        let first: Config = serde_yaml::from_str(YAML).unwrap();
        let last: Config =
            serde_yaml::from_str(&std::fs::read_to_string(&yaml_out).unwrap()).unwrap();

        assert_eq!(first.server.port, last.server.port);
        assert_eq!(first.server.api_prefix, last.server.api_prefix);
        assert_eq!(first.routes.len(), last.routes.len());
        assert_eq!(first.routes[0].path, last.routes[0].path);
        assert_eq!(
            first.routes[0].mock.as_ref().unwrap().body,
            last.routes[0].mock.as_ref().unwrap().body
        );
    }

    #[test]
    fn test_unsupported_output_extension() {
        let dir = tempfile::tempdir().unwrap();
        let yaml_in = dir.path().join("in.yaml");
        std::fs::write(&yaml_in, YAML).unwrap();
        assert!(run(&yaml_in, &dir.path().join("out.toml")).is_err());
    }

    #[test]
    fn test_prune_empty() {
        let value = serde_json::json!({
            "keep": 1,
            "empty_string": "",
            "empty_map": {},
            "empty_list": [],
            "null": null,
            "nested": {"inner": ""}
        });
        let pruned = prune_empty(value).unwrap();
        assert_eq!(pruned, serde_json::json!({"keep": 1}));
    }

    #[test]
    fn test_schema_url_injected() {
        let dir = tempfile::tempdir().unwrap();
        let yaml_in = dir.path().join("in.yaml");
        let json_out = dir.path().join("out.json");
        std::fs::write(&yaml_in, YAML).unwrap();
        run(&yaml_in, &json_out).unwrap();

        let out: Config =
            serde_json::from_str(&std::fs::read_to_string(&json_out).unwrap()).unwrap();
        assert_eq!(out.schema.as_deref(), Some(JSON_SCHEMA_URL));
    }
}
