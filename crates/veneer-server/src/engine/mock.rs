//! Mock base handler: inline templated bodies and file-backed datasets.

use super::compile::{CompiledMock, MockBody};
use super::context::{ExecContext, Record};
use super::{apply_delay, filter, template};
use crate::response::{build_response_with_headers, ApiError};
use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde_json::Value;
use std::collections::HashMap;

/// Produce the mock response for a request.
///
/// Inline bodies go through the template engine. File-backed data is
/// templated, then filtered/sorted/paginated by query parameters when it is a
/// sequence of objects; a single object is wrapped into a one-element
/// sequence for uniform filtering, anything else is returned as-is.
pub async fn run(
    mock: &CompiledMock,
    ctx: &ExecContext,
    raw_query: &HashMap<String, String>,
    auth_query_key: Option<&str>,
) -> Result<Response<Full<Bytes>>, ApiError> {
    apply_delay(mock.delay_ms).await;

    let body = match &mock.body {
        MockBody::Inline(inline) => template::expand(inline, ctx),
        MockBody::File(data) => {
            let expanded = template::expand(data, ctx);
            filter_payload(expanded, raw_query, auth_query_key)?
        }
    };

    respond(mock.status, &mock.headers, &body)
}

fn filter_payload(
    payload: Value,
    raw_query: &HashMap<String, String>,
    auth_query_key: Option<&str>,
) -> Result<Value, ApiError> {
    let rows: Vec<Record> = match payload {
        Value::Array(items) => {
            // Arrays of non-objects are served untouched.
            if !items.iter().all(Value::is_object) {
                return Ok(Value::Array(items));
            }
            items
                .into_iter()
                .filter_map(|item| match item {
                    Value::Object(obj) => Some(obj),
                    _ => None,
                })
                .collect()
        }
        Value::Object(obj) => vec![obj],
        other => return Ok(other),
    };

    let filtered = filter::apply(rows, raw_query, auth_query_key)
        .map_err(|e| ApiError::new(StatusCode::BAD_REQUEST, "MOCK_PARSE_ERROR", e.0))?;

    Ok(Value::Array(filtered.into_iter().map(Value::Object).collect()))
}

fn respond(
    status: u16,
    headers: &HashMap<String, String>,
    body: &Value,
) -> Result<Response<Full<Bytes>>, ApiError> {
    let bytes = serde_json::to_vec(body).map_err(|e| {
        ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "TEMPLATE_ERROR",
            e.to_string(),
        )
    })?;

    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::OK);
    Ok(build_response_with_headers(status, headers, bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn mock(body: MockBody) -> CompiledMock {
        CompiledMock {
            status: 200,
            headers: HashMap::from([(
                "Content-Type".to_string(),
                "application/json".to_string(),
            )]),
            delay_ms: 0,
            body,
        }
    }

    async fn body_of(resp: Response<Full<Bytes>>) -> Value {
        use http_body_util::BodyExt;
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_inline_body_templated() {
        let mut ctx = ExecContext::default();
        ctx.query.insert("lang".to_string(), "en".to_string());

        let m = mock(MockBody::Inline(json!({"lang": "{{request.query.lang}}"})));
        let resp = run(&m, &ctx, &HashMap::new(), None).await.unwrap();
        assert_eq!(resp.status(), 200);
        assert_eq!(body_of(resp).await, json!({"lang": "en"}));
    }

    #[tokio::test]
    async fn test_file_array_filtered() {
        let data = json!([
            {"id": 1, "name": "a"},
            {"id": 2, "name": "b"},
            {"id": 3, "name": "a"}
        ]);
        let m = mock(MockBody::File(std::sync::Arc::new(data)));

        let query = HashMap::from([("name".to_string(), "a".to_string())]);
        let resp = run(&m, &ExecContext::default(), &query, None).await.unwrap();
        let body = body_of(resp).await;
        assert_eq!(body.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_single_object_wrapped_for_filtering() {
        let m = mock(MockBody::File(std::sync::Arc::new(json!({"id": 1}))));
        let resp = run(&m, &ExecContext::default(), &HashMap::new(), None)
            .await
            .unwrap();
        assert_eq!(body_of(resp).await, json!([{"id": 1}]));
    }

    #[tokio::test]
    async fn test_scalar_payload_served_as_is() {
        let m = mock(MockBody::File(std::sync::Arc::new(json!("plain"))));
        let resp = run(&m, &ExecContext::default(), &HashMap::new(), None)
            .await
            .unwrap();
        assert_eq!(body_of(resp).await, json!("plain"));
    }

    #[tokio::test]
    async fn test_array_of_scalars_served_as_is() {
        let m = mock(MockBody::File(std::sync::Arc::new(json!([1, 2, 3]))));
        let query = HashMap::from([("_limit".to_string(), "1".to_string())]);
        let resp = run(&m, &ExecContext::default(), &query, None).await.unwrap();
        assert_eq!(body_of(resp).await, json!([1, 2, 3]));
    }

    #[tokio::test]
    async fn test_invalid_pagination_is_mock_parse_error() {
        let m = mock(MockBody::File(std::sync::Arc::new(json!([{"id": 1}]))));
        let query = HashMap::from([("_limit".to_string(), "nope".to_string())]);
        let err = run(&m, &ExecContext::default(), &query, None)
            .await
            .unwrap_err();
        assert_eq!(err.status, 400);
        assert_eq!(err.error_code, "MOCK_PARSE_ERROR");
    }
}
