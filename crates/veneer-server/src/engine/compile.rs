//! Route compilation: static validation and pre-resolution of resources.
//!
//! A compiled route carries everything the pipeline needs at request time —
//! effective status/header/delay precedence already resolved, mock file bytes
//! parsed and cached, the fetch URL parsed — so dispatch never touches the
//! filesystem or re-validates configuration.

use crate::config::{
    resolve_mock_file, AuthConfig, BodySchema, CaseSpec, FetchSpec, MockSpec, ParamDef,
    ResponseSpec, RouteConfig, ServerConfig, StatefulSpec,
};
use anyhow::{bail, Context, Result};
use hyper::Method;
use parking_lot::Mutex;
use regex::Regex;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

/// Pre-resolved mock response source.
#[derive(Debug, Clone)]
pub struct CompiledMock {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub delay_ms: u64,
    pub body: MockBody,
}

#[derive(Debug, Clone)]
pub enum MockBody {
    Inline(Value),
    /// Parsed once at compile time and shared through the process-wide cache.
    File(Arc<Value>),
}

/// Pre-resolved proxy response source.
#[derive(Debug, Clone)]
pub struct CompiledFetch {
    pub url: reqwest::Url,
    /// Decoded path of `url`, with `{name}` tokens intact for substitution.
    pub path_template: String,
    pub method: Option<Method>,
    pub headers: HashMap<String, String>,
    pub query_params: HashMap<String, String>,
    /// Inbound query names the route declares; only these are forwarded.
    pub declared_query: HashSet<String>,
    pub delay_ms: u64,
    pub timeout_ms: u64,
}

/// A route entry bound to its resources, ready for registration.
#[derive(Debug, Clone)]
pub struct CompiledRoute {
    pub name: String,
    pub method: Method,
    pub path: String,
    pub auth: Option<AuthConfig>,
    pub path_params: HashMap<String, ParamDef>,
    pub query: HashMap<String, ParamDef>,
    pub request_headers: HashMap<String, ParamDef>,
    pub body_schema: Option<BodySchema>,
    pub cases: Vec<CaseSpec>,
    pub stateful: Option<StatefulSpec>,
    pub default: Option<ResponseSpec>,
    pub route_status: Option<u16>,
    pub route_headers: HashMap<String, String>,
    pub mock: Option<CompiledMock>,
    pub fetch: Option<CompiledFetch>,
}

const DEFAULT_FETCH_TIMEOUT_MS: u64 = 10_000;

/// Regex substituting `{name}` tokens, shared by proxy URL rewriting.
pub fn path_token_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{([a-zA-Z0-9_]+)\}").unwrap())
}

/// Compile one route entry against the server configuration.
pub fn compile(route: &RouteConfig, server: &ServerConfig, base_dir: &Path) -> Result<CompiledRoute> {
    let method: Method = route
        .method
        .to_uppercase()
        .parse()
        .with_context(|| format!("invalid method '{}'", route.method))?;

    let mock = route
        .mock
        .as_ref()
        .map(|m| compile_mock(m, route, server, base_dir))
        .transpose()?;

    let fetch = route
        .fetch
        .as_ref()
        .map(|f| compile_fetch(f, route, server))
        .transpose()?;

    Ok(CompiledRoute {
        name: route.name.clone(),
        method,
        path: route.path.clone(),
        auth: route.auth.clone(),
        path_params: route.path_params.clone(),
        query: route.query.clone(),
        request_headers: route.request_headers.clone(),
        body_schema: route.body_schema.clone(),
        cases: route.cases.clone(),
        stateful: route.stateful.clone(),
        default: route.default.clone(),
        route_status: route.status,
        route_headers: route.headers.clone(),
        mock,
        fetch,
    })
}

fn compile_mock(
    mock: &MockSpec,
    route: &RouteConfig,
    server: &ServerConfig,
    base_dir: &Path,
) -> Result<CompiledMock> {
    let status = mock.status.or(route.status).unwrap_or(200);
    let headers = merge_headers(&server.default_headers, &route.headers, &mock.headers);
    let delay_ms = compute_delay(route.delay_ms, mock.delay_ms, server.default_delay_ms);

    let body = if let Some(inline) = &mock.body {
        MockBody::Inline(inline.clone())
    } else if let Some(file) = &mock.file {
        let path = resolve_mock_file(base_dir, file);
        let data = cached_mock_file(&path)
            .with_context(|| format!("failed to read mock file '{file}'"))?;
        MockBody::File(data)
    } else {
        bail!("mock must define either 'body' or 'file'");
    };

    Ok(CompiledMock {
        status,
        headers,
        delay_ms,
        body,
    })
}

fn compile_fetch(fetch: &FetchSpec, route: &RouteConfig, server: &ServerConfig) -> Result<CompiledFetch> {
    let url = reqwest::Url::parse(&fetch.url)
        .with_context(|| format!("failed to parse fetch URL '{}'", fetch.url))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        bail!("fetch.url must be an absolute http/https URL, got '{}'", fetch.url);
    }

    let method = fetch
        .method
        .as_ref()
        .map(|m| {
            m.to_uppercase()
                .parse::<Method>()
                .with_context(|| format!("invalid fetch method '{m}'"))
        })
        .transpose()?;

    let timeout_ms = if fetch.timeout_ms > 0 {
        fetch.timeout_ms
    } else {
        DEFAULT_FETCH_TIMEOUT_MS
    };

    // Url::parse percent-encodes braces; keep a decoded copy of the path so
    // `{name}` tokens remain substitutable at request time.
    let path_template = urlencoding::decode(url.path())
        .map(|p| p.into_owned())
        .unwrap_or_else(|_| url.path().to_string());

    Ok(CompiledFetch {
        url,
        path_template,
        method,
        headers: fetch.headers.clone(),
        query_params: fetch.query_params.clone(),
        declared_query: route.query.keys().cloned().collect(),
        delay_ms: compute_delay(route.delay_ms, fetch.delay_ms, server.default_delay_ms),
        timeout_ms,
    })
}

/// Delay precedence: route > response source > server default.
pub fn compute_delay(route_ms: u64, source_ms: u64, default_ms: u64) -> u64 {
    if route_ms != 0 {
        route_ms
    } else if source_ms != 0 {
        source_ms
    } else {
        default_ms
    }
}

/// Merge header maps; later sets override earlier ones.
pub fn merge_headers(
    defaults: &HashMap<String, String>,
    route: &HashMap<String, String>,
    specific: &HashMap<String, String>,
) -> HashMap<String, String> {
    let mut headers = defaults.clone();
    headers.extend(route.iter().map(|(k, v)| (k.clone(), v.clone())));
    headers.extend(specific.iter().map(|(k, v)| (k.clone(), v.clone())));
    headers
}

/// Process-wide mock file cache keyed by absolute path. Entries are parsed
/// once and immutable afterwards; concurrent readers share the `Arc`.
fn cached_mock_file(path: &Path) -> Result<Arc<Value>> {
    static CACHE: OnceLock<Mutex<HashMap<PathBuf, Arc<Value>>>> = OnceLock::new();
    let cache = CACHE.get_or_init(|| Mutex::new(HashMap::new()));

    let key = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());

    if let Some(hit) = cache.lock().get(&key) {
        return Ok(hit.clone());
    }

    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read '{}'", path.display()))?;
    let parsed: Value = serde_json::from_str(&raw)
        .with_context(|| format!("invalid JSON in '{}'", path.display()))?;
    let parsed = Arc::new(parsed);

    cache.lock().entry(key).or_insert_with(|| parsed.clone());
    Ok(parsed)
}
