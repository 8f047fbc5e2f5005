//! Configuration model and loader.
//!
//! A single JSON or YAML document is the sole source of truth for the server;
//! reloading produces a fresh, fully validated materialisation.

mod route;
mod server;
mod validate;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

pub use route::{
    BodySchema, CaseSpec, FetchSpec, MockSpec, ParamDef, ResponseSpec, RouteConfig, StatefulAction,
    StatefulSpec,
};
pub use server::{
    AuthConfig, ConsoleAuthConfig, ConsoleConfig, CorsConfig, DebugConfig, GroupConfig,
    ServerConfig,
};
pub use validate::resolve_mock_file;

const MASKED_VALUE: &str = "********";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "$schema", default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    pub server: ServerConfig,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<GroupConfig>,
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
}

impl Config {
    /// Read a config file, apply defaults and validate all invariants.
    ///
    /// The format is discriminated by the file extension (.json/.yaml/.yml).
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file '{}'", path.display()))?;

        let mut config = Self::parse(&contents, path)?;

        config.server.apply_defaults();
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        validate::validate_config(&config, base_dir)
            .with_context(|| format!("config validation failed for '{}'", path.display()))?;

        info!("config loaded successfully from {}", path.display());
        Ok(config)
    }

    /// Parse a document according to the extension of `path`, without
    /// applying defaults or validating.
    pub fn parse(contents: &str, path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "json" => serde_json::from_str(contents)
                .with_context(|| format!("failed to parse JSON in '{}'", path.display())),
            "yaml" | "yml" => serde_yaml::from_str(contents)
                .with_context(|| format!("failed to parse YAML in '{}'", path.display())),
            other => {
                bail!("unsupported config file extension '{other}', must be .json, .yaml or .yml")
            }
        }
    }

    /// Deep copy with credentials replaced by a mask, safe for logging.
    pub fn masked(&self) -> Self {
        let mut copy = self.clone();

        if let Some(auth) = &mut copy.server.auth {
            if auth.enabled {
                auth.keys = vec![MASKED_VALUE.to_string()];
            }
        }
        if let Some(console) = &mut copy.server.console {
            if let Some(auth) = &mut console.auth {
                auth.password = MASKED_VALUE.to_string();
            }
        }
        for route in &mut copy.routes {
            if let Some(auth) = &mut route.auth {
                if auth.enabled {
                    auth.keys = vec![MASKED_VALUE.to_string()];
                }
            }
        }

        copy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(dir: &tempfile::TempDir, name: &str, contents: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_load_yaml_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            "veneer.yaml",
            r#"
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
"#,
        );

        let cfg = Config::load(&path).unwrap();
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.server.api_prefix, "/v1");
        assert_eq!(cfg.routes.len(), 1);
        assert_eq!(cfg.routes[0].method, "GET");
        assert!(cfg.routes[0].mock.is_some());
    }

    #[test]
    fn test_load_json_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            "veneer.json",
            r#"{
  "server": {"port": 9090},
  "routes": [
    {"name": "ping", "method": "GET", "path": "/ping", "mock": {"body": "pong"}}
  ]
}"#,
        );

        let cfg = Config::load(&path).unwrap();
        assert_eq!(cfg.server.port, 9090);
        assert_eq!(cfg.routes[0].path, "/ping");
    }

    #[test]
    fn test_unknown_extension_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "veneer.toml", "server = {}");
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn test_invalid_method_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            "bad.yaml",
            r#"
server: {}
routes:
  - name: bad
    method: TRACE
    path: /x
    mock: {body: 1}
"#,
        );
        let err = Config::load(&path).unwrap_err();
        assert!(format!("{err:#}").contains("invalid method"));
    }

    #[test]
    fn test_invalid_path_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            "bad.yaml",
            r#"
server: {}
routes:
  - name: bad
    method: GET
    path: "/x?y=1"
    mock: {body: 1}
"#,
        );
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn test_stateful_write_requires_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            "bad.yaml",
            r#"
server: {}
routes:
  - name: create-user
    method: POST
    path: /users
    stateful:
      collection: users
      action: create
    mock:
      body: "{{state.created}}"
"#,
        );
        let err = Config::load(&path).unwrap_err();
        assert!(format!("{err:#}").contains("body_schema"));
    }

    #[test]
    fn test_stateful_requires_response_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            "bad.yaml",
            r#"
server: {}
routes:
  - name: list-users
    method: GET
    path: /users
    stateful:
      collection: users
      action: list
"#,
        );
        let err = Config::load(&path).unwrap_err();
        assert!(format!("{err:#}").contains("must define a 'mock' response or 'cases'"));
    }

    #[test]
    fn test_duplicate_route_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            "dup.yaml",
            r#"
server: {}
routes:
  - name: a
    method: GET
    path: /same
    mock: {body: 1}
  - name: b
    method: GET
    path: /same
    mock: {body: 2}
"#,
        );
        let err = Config::load(&path).unwrap_err();
        assert!(format!("{err:#}").contains("duplicate endpoint"));
    }

    #[test]
    fn test_case_status_out_of_range_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            "bad.yaml",
            r#"
server: {}
routes:
  - name: cases
    method: POST
    path: /price
    cases:
      - when: "request.body.type == 'vip'"
        then:
          status: 700
          body: {price: 50}
    mock: {body: {price: 100}}
"#,
        );
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn test_delay_over_cap_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            "bad.yaml",
            r#"
server: {}
routes:
  - name: slow
    method: GET
    path: /slow
    delay_ms: 20000
    mock: {body: 1}
"#,
        );
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn test_mock_file_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            "bad.yaml",
            r#"
server: {}
routes:
  - name: f
    method: GET
    path: /items
    mock:
      file: missing.json
"#,
        );
        let err = Config::load(&path).unwrap_err();
        assert!(format!("{err:#}").contains("not found"));
    }

    #[test]
    fn test_global_auth_location_checked_at_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            "auth.yaml",
            r#"
server:
  auth:
    enabled: true
    type: apikey
    in: cookie
    name: session
    keys: ["k"]
routes: []
"#,
        );
        let err = Config::load(&path).unwrap_err();
        assert!(format!("{err:#}").contains("auth.in"));
    }

    #[test]
    fn test_global_auth_scheme_not_checked_at_load() {
        // An unsupported scheme string loads fine; the gate rejects it per
        // request with UNSUPPORTED_AUTH_TYPE.
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            "auth.yaml",
            r#"
server:
  auth:
    enabled: true
    type: basic
    in: header
    name: Authorization
    keys: ["k"]
routes: []
"#,
        );
        let cfg = Config::load(&path).unwrap();
        assert_eq!(cfg.server.auth.unwrap().auth_type, "basic");
    }

    #[test]
    fn test_masked_hides_secrets() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            "auth.yaml",
            r#"
server:
  auth:
    enabled: true
    type: apikey
    in: header
    name: X-Secret
    keys: ["super-secret-key"]
routes: []
"#,
        );
        let cfg = Config::load(&path).unwrap();
        let masked = cfg.masked();
        assert_eq!(masked.server.auth.unwrap().keys, vec!["********"]);
        // Original untouched.
        assert_eq!(cfg.server.auth.unwrap().keys, vec!["super-secret-key"]);
    }
}
