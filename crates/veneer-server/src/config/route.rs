//! Route entry types: response strategies, parameter definitions, and the
//! request-body schema model.

use super::server::AuthConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Declared path/query/header parameter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParamDef {
    /// Data type: "string", "integer" or "boolean".
    #[serde(rename = "type", default)]
    pub param_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default)]
    pub required: bool,
    #[serde(rename = "enum", default, skip_serializing_if = "Vec::is_empty")]
    pub allowed: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<Value>,
}

/// Recursive JSON-Schema (Draft 7 subset) for request bodies.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BodySchema {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub properties: HashMap<String, BodySchema>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<BodySchema>>,
    #[serde(rename = "enum", default, skip_serializing_if = "Vec::is_empty")]
    pub allowed: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    #[serde(rename = "minLength", default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(rename = "maxLength", default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub pattern: String,
    /// `None` permits undeclared keys; `Some(false)` rejects them.
    #[serde(
        rename = "additionalProperties",
        alias = "additional_properties",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub additional_properties: Option<bool>,
}

/// Static or templated mock response source.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MockSpec {
    /// Inline response body; expanded by the template engine per request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    /// JSON file path resolved against the config document's directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub delay_ms: u64,
}

/// Upstream proxy response source.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FetchSpec {
    pub url: String,
    /// HTTP method for the upstream call; defaults to the inbound method.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub query_params: HashMap<String, String>,
    /// Accepted for compatibility; upstream status is always relayed.
    #[serde(default)]
    pub pass_status: bool,
    #[serde(default)]
    pub delay_ms: u64,
    #[serde(default)]
    pub timeout_ms: u64,
}

/// CRUD action against a named collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatefulAction {
    Create,
    Get,
    Update,
    Delete,
    List,
}

impl StatefulAction {
    pub fn is_write(self) -> bool {
        matches!(self, StatefulAction::Create | StatefulAction::Update)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatefulSpec {
    pub collection: String,
    pub action: StatefulAction,
    /// Field used as record identity; defaults to "id".
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id_field: String,
}

impl StatefulSpec {
    pub fn id_field(&self) -> &str {
        if self.id_field.is_empty() {
            "id"
        } else {
            &self.id_field
        }
    }
}

/// Response override used by cases and the default fallback.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub delay_ms: u64,
}

/// Conditional rule: first matching `when` wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseSpec {
    pub when: String,
    pub then: ResponseSpec,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouteConfig {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Tag used for grouping in documentation.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub tag: String,
    pub method: String,
    /// Endpoint path; parameters use `{name}` syntax.
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub delay_ms: u64,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub path_params: HashMap<String, ParamDef>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub query: HashMap<String, ParamDef>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub request_headers: HashMap<String, ParamDef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_schema: Option<BodySchema>,
    /// Example body for documentation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_example: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mock: Option<MockSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetch: Option<FetchSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cases: Vec<CaseSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stateful: Option<StatefulSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<ResponseSpec>,
    /// Route-specific authentication override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthConfig>,
}
