//! Proxy (fetch) base handler: forward the request to a configured upstream
//! and relay the response.
//!
//! A single deadline covers both the artificial pre-response delay and the
//! upstream round-trip.

use super::compile::{path_token_regex, CompiledFetch};
use super::context::ExecContext;
use crate::response::ApiError;
use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{HeaderName, HeaderValue};
use hyper::{HeaderMap, Method, Response, StatusCode};
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;
use std::time::{Duration, Instant};
use tracing::{info, warn};

fn http_client() -> &'static reqwest::Client {
    static CLIENT: OnceLock<reqwest::Client> = OnceLock::new();
    CLIENT.get_or_init(|| {
        reqwest::Client::builder()
            .build()
            .unwrap_or_else(|_| reqwest::Client::new())
    })
}

/// Headers never copied from the upstream response.
const HOP_BY_HOP: [&str; 4] = ["transfer-encoding", "connection", "keep-alive", "content-length"];

/// Forward the request upstream and relay the result.
pub async fn run(
    fetch: &CompiledFetch,
    inbound_method: &Method,
    inbound_headers: &HeaderMap,
    ctx: &ExecContext,
    raw_query: &HashMap<String, String>,
    body: &Bytes,
) -> Result<Response<Full<Bytes>>, ApiError> {
    let start = Instant::now();
    let timeout = Duration::from_millis(fetch.timeout_ms);

    let url = build_target_url(fetch, &ctx.path, raw_query);
    let method = fetch.method.clone().unwrap_or_else(|| inbound_method.clone());

    let mut request = http_client().request(method.clone(), url.clone());
    request = request.headers(build_headers(&fetch.headers, inbound_headers));

    if method == Method::POST || method == Method::PUT || method == Method::PATCH {
        request = request.body(body.clone());
    }

    let request = request.build().map_err(|e| {
        ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "FETCH_BUILD_REQUEST_ERROR",
            e.to_string(),
        )
    })?;

    info!("proxying request: {method} {url}");

    // One deadline spans the artificial delay and the upstream I/O.
    let outcome = tokio::time::timeout(timeout, async {
        super::apply_delay(fetch.delay_ms).await;
        http_client().execute(request).await
    })
    .await;

    let upstream = match outcome {
        Err(_) => {
            return Err(ApiError::new(
                StatusCode::GATEWAY_TIMEOUT,
                "FETCH_TIMEOUT_ERROR",
                format!("Request exceeded timeout of {} ms", fetch.timeout_ms),
            ))
        }
        Ok(Err(e)) if e.is_timeout() => {
            return Err(ApiError::new(
                StatusCode::GATEWAY_TIMEOUT,
                "FETCH_TIMEOUT_ERROR",
                format!("Request exceeded timeout of {} ms", fetch.timeout_ms),
            ))
        }
        Ok(Err(e)) => {
            warn!("upstream request failed: {e}");
            return Err(ApiError::new(
                StatusCode::BAD_GATEWAY,
                "FETCH_UPSTREAM_ERROR",
                e.to_string(),
            ));
        }
        Ok(Ok(resp)) => resp,
    };

    let status = upstream.status();
    info!(
        upstream_url = %url,
        upstream_status = status.as_u16(),
        upstream_duration_ms = start.elapsed().as_millis() as u64,
        "upstream response"
    );

    if status == StatusCode::NOT_MODIFIED {
        return Ok(crate::response::build_response_with_headers(
            StatusCode::NOT_MODIFIED,
            [("Content-Type", "application/json")],
            "{}",
        ));
    }

    let response_headers = upstream.headers().clone();
    let bytes = upstream.bytes().await.map_err(|e| {
        ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "FETCH_BODY_READ_ERROR",
            e.to_string(),
        )
    })?;

    if status.is_client_error() {
        return Err(ApiError::new(
            status,
            "FETCH_UPSTREAM_CLIENT_ERROR",
            "An unknown error occurred while sending the request to the specified URL.",
        ));
    }

    let mut builder = Response::builder().status(status);
    for (key, value) in &response_headers {
        if !HOP_BY_HOP.contains(&key.as_str()) {
            builder = builder.header(key, value);
        }
    }

    builder.body(Full::new(bytes)).map_err(|e| {
        ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "FETCH_UPSTREAM_ERROR",
            e.to_string(),
        )
    })
}

/// Substitute `{name}` path tokens with inbound path bindings, then compose
/// query parameters: configured pairs first, declared inbound pairs override.
pub fn build_target_url(
    fetch: &CompiledFetch,
    path_params: &HashMap<String, String>,
    raw_query: &HashMap<String, String>,
) -> reqwest::Url {
    let mut url = fetch.url.clone();

    let path = path_token_regex()
        .replace_all(&fetch.path_template, |caps: &regex::Captures| {
            path_params
                .get(&caps[1])
                .cloned()
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned();
    url.set_path(&path);

    let mut query: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let mut upsert = |key: &str, value: &str| {
        if let Some(existing) = query.iter_mut().find(|(k, _)| k == key) {
            existing.1 = value.to_string();
        } else {
            query.push((key.to_string(), value.to_string()));
        }
    };

    for (k, v) in &fetch.query_params {
        upsert(k, v);
    }
    for (k, v) in raw_query {
        if fetch.declared_query.contains(k) {
            upsert(k, v);
        }
    }

    if query.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(query.iter());
    }

    url
}

/// Configured fetch headers win; inbound headers fill the gaps. Host and
/// content-length are always re-derived for the upstream call.
fn build_headers(configured: &HashMap<String, String>, inbound: &HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::new();
    let mut taken: HashSet<String> = HashSet::new();

    for (key, value) in configured {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(key.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            taken.insert(name.as_str().to_string());
            headers.insert(name, value);
        }
    }

    for (key, value) in inbound {
        let name = key.as_str();
        if name == "host" || name == "content-length" || taken.contains(name) {
            continue;
        }
        headers.insert(key.clone(), value.clone());
    }

    headers
}
