//! Cross-field configuration validation.
//!
//! Any failure here aborts the load of the entire document; a hot reload
//! keeps the previous router generation.

use super::route::{CaseSpec, FetchSpec, MockSpec, ResponseSpec, RouteConfig, StatefulSpec};
use super::server::AuthConfig;
use super::Config;
use anyhow::{bail, Context, Result};
use regex::Regex;
use std::collections::HashSet;
use std::path::Path;
use std::sync::OnceLock;
use tracing::warn;

const MAX_CASES_PER_ROUTE: usize = 20;
const MAX_CONDITION_LEN: usize = 256;
const MAX_DELAY_MS: u64 = 10_000;

const ALLOWED_METHODS: [&str; 6] = ["GET", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"];

fn path_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^/[a-zA-Z0-9/\-_{}]*$").unwrap())
}

fn scope_ref_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(request\.)?(body|query|headers|path)\.[a-zA-Z0-9_]+|method\b").unwrap()
    })
}

/// Validate the whole document against the structural invariants.
pub fn validate_config(cfg: &Config, base_dir: &Path) -> Result<()> {
    if let Some(auth) = &cfg.server.auth {
        if auth.enabled {
            validate_auth(auth)?;
        }
    }

    if let Some(debug) = &cfg.server.debug {
        if !path_regex().is_match(&debug.path) {
            bail!("invalid debug path '{}': must start with '/'", debug.path);
        }
    }

    let mut seen = HashSet::new();
    for (i, route) in cfg.routes.iter().enumerate() {
        validate_route(route, base_dir)
            .with_context(|| format!("route[{i}] '{}' validation failed", route.name))?;

        let key = (route.method.to_uppercase(), route.path.clone());
        if !seen.insert(key) {
            bail!(
                "route[{i}] '{}': duplicate endpoint {} {}",
                route.name,
                route.method.to_uppercase(),
                route.path
            );
        }
    }

    Ok(())
}

fn validate_auth(auth: &AuthConfig) -> Result<()> {
    if auth.auth_type.is_empty() {
        bail!("auth.type is required when auth.enabled = true");
    }
    if auth.location != "header" && auth.location != "query" {
        bail!("auth.in must be either 'header' or 'query'");
    }
    Ok(())
}

fn validate_route(route: &RouteConfig, base_dir: &Path) -> Result<()> {
    let method = route.method.to_uppercase();
    if !ALLOWED_METHODS.contains(&method.as_str()) {
        bail!("invalid method '{}'", route.method);
    }

    if !path_regex().is_match(&route.path) {
        bail!(
            "invalid path '{}': must start with '/' and contain only letters, numbers, '-', '_', '{{', '}}'",
            route.path
        );
    }

    check_delay(route.delay_ms, "delay_ms")?;

    if let Some(stateful) = &route.stateful {
        validate_stateful(stateful, route)?;
    }

    if !route.cases.is_empty() {
        validate_cases(&route.cases, &route.path)?;
    }

    if let Some(fetch) = &route.fetch {
        validate_fetch(fetch, &route.path)?;
    }

    if let Some(mock) = &route.mock {
        validate_mock(mock, &route.path, base_dir)?;
    }

    if let Some(default) = &route.default {
        validate_response_spec(default, &route.path, "default")?;
    }

    if !route.cases.is_empty() && route.mock.is_some() {
        warn!(
            "route '{}': cases defined, mock will be used only if no case matches",
            route.path
        );
    }
    if !route.cases.is_empty() && route.fetch.is_some() {
        warn!(
            "route '{}': cases defined, fetch will be used only if no case matches",
            route.path
        );
    }

    Ok(())
}

fn validate_stateful(stateful: &StatefulSpec, route: &RouteConfig) -> Result<()> {
    if stateful.collection.is_empty() {
        bail!(
            "stateful route '{}' missing required field: 'collection'",
            route.path
        );
    }

    if stateful.action.is_write() && route.body_schema.is_none() {
        bail!(
            "stateful route '{}' requires 'body_schema' for data integrity",
            route.path
        );
    }

    if route.cases.is_empty() && route.mock.is_none() {
        bail!(
            "stateful route '{}' must define a 'mock' response or 'cases' to return the state",
            route.path
        );
    }

    if route.fetch.is_some() {
        warn!(
            "route '{}': both stateful and fetch defined, stateful logic will run before proxying",
            route.path
        );
    }

    Ok(())
}

fn validate_fetch(fetch: &FetchSpec, route_path: &str) -> Result<()> {
    if fetch.url.is_empty() {
        bail!("[route {route_path}] fetch.url is required");
    }

    match reqwest::Url::parse(&fetch.url) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
        _ => bail!("[route {route_path}] fetch.url is invalid: '{}'", fetch.url),
    }

    check_delay(fetch.delay_ms, "fetch.delay_ms")?;
    Ok(())
}

fn validate_mock(mock: &MockSpec, route_path: &str, base_dir: &Path) -> Result<()> {
    match (&mock.body, &mock.file) {
        (None, None) => bail!("[route {route_path}] mock must define either 'body' or 'file'"),
        (Some(_), Some(_)) => {
            bail!("[route {route_path}] mock must define exactly one of 'body' or 'file'")
        }
        _ => {}
    }

    if let Some(file) = &mock.file {
        if !file.ends_with(".json") {
            bail!("[route {route_path}] mock.file must be a .json file, got '{file}'");
        }
        let resolved = resolve_mock_file(base_dir, file);
        if !resolved.exists() {
            bail!("[route {route_path}] mock.file not found: '{file}'");
        }
    }

    if let Some(status) = mock.status {
        if !(100..=599).contains(&status) {
            bail!("[route {route_path}] mock.status must be between 100 and 599, got {status}");
        }
    }

    check_delay(mock.delay_ms, "mock.delay_ms")?;
    Ok(())
}

fn validate_cases(cases: &[CaseSpec], route_path: &str) -> Result<()> {
    if cases.len() > MAX_CASES_PER_ROUTE {
        bail!(
            "[route {route_path}] too many cases ({}), max allowed is {MAX_CASES_PER_ROUTE}",
            cases.len()
        );
    }

    for (i, case) in cases.iter().enumerate() {
        if case.when.trim().is_empty() {
            bail!("[route {route_path}][case {i}] when condition cannot be empty");
        }

        validate_condition_expr(&case.when)
            .with_context(|| format!("[route {route_path}][case {i}] invalid condition"))?;

        if case.then.status.is_none() {
            bail!("[route {route_path}][case {i}] then.status is required");
        }
        validate_response_spec(&case.then, route_path, &format!("case {i}"))?;
    }

    Ok(())
}

fn validate_condition_expr(expr: &str) -> Result<()> {
    let expr = expr.trim();

    if expr.len() > MAX_CONDITION_LEN {
        bail!("condition too long (max {MAX_CONDITION_LEN} chars)");
    }

    if expr.contains(['`', ';', '$']) {
        bail!("condition contains forbidden characters");
    }

    if !scope_ref_regex().is_match(expr) {
        bail!("condition must reference one of: body, query, headers, path, method");
    }

    Ok(())
}

fn validate_response_spec(spec: &ResponseSpec, route_path: &str, what: &str) -> Result<()> {
    if let Some(status) = spec.status {
        if !(100..=599).contains(&status) {
            bail!("[route {route_path}][{what}] invalid status code {status}");
        }
    }
    check_delay(spec.delay_ms, "delay_ms")?;
    Ok(())
}

fn check_delay(delay: u64, field: &str) -> Result<()> {
    if delay > MAX_DELAY_MS {
        bail!("{field} cannot exceed {MAX_DELAY_MS} ms, got {delay}");
    }
    Ok(())
}

/// Resolve a mock file reference against the config document's directory.
pub fn resolve_mock_file(base_dir: &Path, file: &str) -> std::path::PathBuf {
    let path = Path::new(file);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}
