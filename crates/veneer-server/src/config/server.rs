//! Global server configuration: network settings, default response fields,
//! CORS policy, authentication, and the reserved console/debug/docs paths.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

/// Authentication settings. Route-level config overrides the global one.
///
/// `auth_type` and `location` are free-form here; values outside the
/// supported sets are reported at request time with a 500, not at load.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Credential scheme: "apikey" or "bearer".
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub auth_type: String,
    /// Where the credential is carried: "header" or "query".
    #[serde(rename = "in", default, skip_serializing_if = "String::is_empty")]
    pub location: String,
    /// Parameter name carrying the credential (e.g. "Authorization", "X-API-Key").
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    /// Valid API keys or bearer tokens.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keys: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CorsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allow_origins: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allow_methods: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allow_headers: Vec<String>,
    #[serde(default)]
    pub allow_credentials: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DebugConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub path: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConsoleAuthConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConsoleConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<ConsoleAuthConfig>,
}

/// Documentation label grouping several routes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub console: Option<ConsoleConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug: Option<DebugConfig>,
    /// Global prefix for all configured routes (e.g. "/v1").
    #[serde(default)]
    pub api_prefix: String,
    /// Headers applied to every response unless overridden.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub default_headers: HashMap<String, String>,
    /// Global artificial response delay in milliseconds.
    #[serde(default)]
    pub default_delay_ms: u64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub swagger_ui_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cors: Option<CorsConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthConfig>,
}

impl ServerConfig {
    /// Fill unset fields with their documented defaults.
    pub fn apply_defaults(&mut self) {
        if self.port == 0 {
            self.port = 5000;
            warn!("config: server.port not set, using default 5000");
        }

        if self.default_headers.is_empty() {
            self.default_headers
                .insert("Content-Type".to_string(), "application/json".to_string());
        }

        if self.swagger_ui_path.is_empty() {
            self.swagger_ui_path = "/docs".to_string();
        }

        let debug = self.debug.get_or_insert_with(DebugConfig::default);
        if debug.path.is_empty() {
            debug.path = "/__debug".to_string();
        }

        let console = self.console.get_or_insert_with(|| ConsoleConfig {
            enabled: true,
            ..ConsoleConfig::default()
        });
        if console.path.is_empty() {
            console.path = "/console".to_string();
        }
        if console.auth.is_none() {
            console.auth = Some(ConsoleAuthConfig {
                enabled: true,
                username: "admin".to_string(),
                password: "123".to_string(),
            });
            warn!("config: console auth default credentials are in use");
        }

        let cors = self.cors.get_or_insert_with(CorsConfig::default);
        if cors.enabled {
            if cors.allow_origins.is_empty() {
                cors.allow_origins = vec!["*".to_string()];
            }
            if cors.allow_methods.is_empty() {
                cors.allow_methods = ["GET", "POST", "PUT", "DELETE", "PATCH", "OPTIONS"]
                    .iter()
                    .map(|m| m.to_string())
                    .collect();
            }
            if cors.allow_headers.is_empty() {
                cors.allow_headers = ["Origin", "Content-Type", "Accept", "Authorization"]
                    .iter()
                    .map(|h| h.to_string())
                    .collect();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_applied() {
        let mut cfg = ServerConfig::default();
        cfg.apply_defaults();
        assert_eq!(cfg.port, 5000);
        assert_eq!(
            cfg.default_headers.get("Content-Type").map(String::as_str),
            Some("application/json")
        );
        assert_eq!(cfg.swagger_ui_path, "/docs");
        assert_eq!(cfg.debug.as_ref().unwrap().path, "/__debug");
        assert_eq!(cfg.console.as_ref().unwrap().path, "/console");
    }

    #[test]
    fn test_cors_defaults_only_when_enabled() {
        let mut cfg = ServerConfig::default();
        cfg.cors = Some(CorsConfig {
            enabled: true,
            ..CorsConfig::default()
        });
        cfg.apply_defaults();
        let cors = cfg.cors.unwrap();
        assert_eq!(cors.allow_origins, vec!["*"]);
        assert_eq!(cors.allow_methods.len(), 6);

        let mut cfg = ServerConfig::default();
        cfg.apply_defaults();
        assert!(cfg.cors.unwrap().allow_origins.is_empty());
    }

    #[test]
    fn test_auth_config_accepts_any_scheme_string() {
        // Unsupported schemes still parse; they are rejected per request.
        let auth: AuthConfig =
            serde_json::from_str(r#"{"enabled": true, "type": "basic", "in": "cookie"}"#).unwrap();
        assert_eq!(auth.auth_type, "basic");
        assert_eq!(auth.location, "cookie");
    }
}
