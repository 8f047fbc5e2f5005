//! CORS policy application and preflight handling.

use crate::config::CorsConfig;
use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{HeaderName, HeaderValue};
use hyper::{Response, StatusCode};

/// Attach the configured Access-Control headers to an outgoing response.
pub fn apply(cors: &CorsConfig, response: &mut Response<Full<Bytes>>) {
    if !cors.enabled {
        return;
    }

    let headers = response.headers_mut();
    set(headers, "Access-Control-Allow-Origin", &cors.allow_origins.join(","));
    set(headers, "Access-Control-Allow-Methods", &cors.allow_methods.join(","));
    set(headers, "Access-Control-Allow-Headers", &cors.allow_headers.join(","));
    if cors.allow_credentials {
        set(headers, "Access-Control-Allow-Credentials", "true");
    }
}

/// Answer an OPTIONS preflight that matched no configured route.
pub fn preflight(cors: &CorsConfig) -> Response<Full<Bytes>> {
    let mut response = Response::builder()
        .status(StatusCode::NO_CONTENT)
        .body(Full::new(Bytes::new()))
        .unwrap_or_else(|_| Response::new(Full::new(Bytes::new())));
    apply(cors, &mut response);
    response
}

fn set(headers: &mut hyper::HeaderMap, name: &'static str, value: &str) {
    if value.is_empty() {
        return;
    }
    if let (Ok(name), Ok(value)) = (
        HeaderName::from_bytes(name.as_bytes()),
        HeaderValue::from_str(value),
    ) {
        headers.insert(name, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> CorsConfig {
        CorsConfig {
            enabled: true,
            allow_origins: vec!["*".to_string()],
            allow_methods: vec!["GET".to_string(), "POST".to_string()],
            allow_headers: vec!["Content-Type".to_string()],
            allow_credentials: true,
        }
    }

    #[test]
    fn test_apply_sets_policy_headers() {
        let mut resp = Response::new(Full::new(Bytes::new()));
        apply(&policy(), &mut resp);
        assert_eq!(resp.headers()["Access-Control-Allow-Origin"], "*");
        assert_eq!(resp.headers()["Access-Control-Allow-Methods"], "GET,POST");
        assert_eq!(resp.headers()["Access-Control-Allow-Credentials"], "true");
    }

    #[test]
    fn test_disabled_policy_is_noop() {
        let mut resp = Response::new(Full::new(Bytes::new()));
        apply(&CorsConfig::default(), &mut resp);
        assert!(resp.headers().get("Access-Control-Allow-Origin").is_none());
    }

    #[test]
    fn test_preflight_response() {
        let resp = preflight(&policy());
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        assert_eq!(resp.headers()["Access-Control-Allow-Origin"], "*");
    }
}
