//! Standard error envelope and response builders.
//!
//! Every failure produced by the request pipeline is serialized as the same
//! JSON envelope so clients can branch on `errorCode` without sniffing bodies.

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Serialize;

/// Error envelope returned for every failed request.
#[derive(Debug, Clone, Serialize)]
pub struct ApiError {
    pub success: bool,
    pub status: u16,
    pub error: String,
    #[serde(rename = "errorCode")]
    pub error_code: String,
    pub message: String,
    pub timestamp: i64,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &str, message: impl Into<String>) -> Self {
        Self {
            success: false,
            status: status.as_u16(),
            error: status.canonical_reason().unwrap_or("Unknown").to_string(),
            error_code: code.to_string(),
            message: message.into(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    pub fn into_response(self) -> Response<Full<Bytes>> {
        let status = self.status_code();
        json_response(status, &self)
    }
}

/// Serialize `body` as JSON with the proper content type.
pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    let json = serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string());
    build_response_with_headers(status, [("Content-Type", "application/json")], json)
}

/// Build an HTTP response with the given status and body.
///
/// Handles the unlikely case where `Response::builder()` fails by returning a
/// minimal 500 response instead of panicking.
pub fn build_response(status: StatusCode, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .body(Full::new(body.into()))
        .unwrap_or_else(|_| Response::new(Full::new(Bytes::from("Internal Server Error"))))
}

/// Build an HTTP response with headers.
pub fn build_response_with_headers(
    status: StatusCode,
    headers: impl IntoIterator<Item = (impl AsRef<str>, impl AsRef<str>)>,
    body: impl Into<Bytes>,
) -> Response<Full<Bytes>> {
    let mut builder = Response::builder().status(status);
    for (key, value) in headers {
        builder = builder.header(key.as_ref(), value.as_ref());
    }
    builder
        .body(Full::new(body.into()))
        .unwrap_or_else(|_| Response::new(Full::new(Bytes::from("Internal Server Error"))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_envelope_fields() {
        let err = ApiError::new(StatusCode::BAD_REQUEST, "INVALID_BODY", "boom");
        assert!(!err.success);
        assert_eq!(err.status, 400);
        assert_eq!(err.error, "Bad Request");
        assert_eq!(err.error_code, "INVALID_BODY");
        assert!(err.timestamp > 0);

        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["errorCode"], "INVALID_BODY");
        assert_eq!(json["success"], false);
    }

    #[test]
    fn test_api_error_into_response() {
        let resp = ApiError::new(StatusCode::NOT_FOUND, "ROUTE_NOT_FOUND", "nope").into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            resp.headers().get("Content-Type").unwrap(),
            "application/json"
        );
    }

    #[test]
    fn test_build_response_with_headers() {
        let resp = build_response_with_headers(
            StatusCode::OK,
            [("X-Test", "1"), ("Content-Type", "application/json")],
            "{}",
        );
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers().get("X-Test").unwrap(), "1");
    }
}
