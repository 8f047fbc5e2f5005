//! The per-request evaluation pipeline.
//!
//! Deterministic step chain, each able to short-circuit with an error
//! envelope: context assembly → authentication → parameter validation →
//! body-schema validation → stateful step → case matching → base handler
//! (mock or fetch) → default fallback.

use super::compile::{merge_headers, CompiledRoute};
use super::context::{parse_query_string, ExecContext};
use super::state::{StateError, StateStore};
use super::{apply_delay, auth, condition, fetch, mock, params, schema, template};
use crate::config::{ResponseSpec, ServerConfig};
use crate::response::{build_response_with_headers, ApiError};
use bytes::Bytes;
use http_body_util::Full;
use hyper::{HeaderMap, Method, Response, StatusCode, Uri};
use std::collections::HashMap;

/// Run a compiled route against a concrete request.
#[allow(clippy::too_many_arguments)]
pub async fn execute(
    route: &CompiledRoute,
    server: &ServerConfig,
    state: &StateStore,
    method: &Method,
    uri: &Uri,
    headers: &HeaderMap,
    path_params: HashMap<String, String>,
    body: Bytes,
) -> Response<Full<Bytes>> {
    match run(route, server, state, method, uri, headers, path_params, body).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

#[allow(clippy::too_many_arguments)]
async fn run(
    route: &CompiledRoute,
    server: &ServerConfig,
    state: &StateStore,
    method: &Method,
    uri: &Uri,
    headers: &HeaderMap,
    path_params: HashMap<String, String>,
    body: Bytes,
) -> Result<Response<Full<Bytes>>, ApiError> {
    // 1. Context assembly. Queries are kept twice: raw-cased for mock data
    //    filtering, lowercased inside the context for conditions/templates.
    let raw_query = parse_query_string(uri.query());
    let mut ctx = build_context(method, &raw_query, headers, path_params, &body)?;

    // 2. Authentication gate.
    auth::authenticate(server.auth.as_ref(), route.auth.as_ref(), &ctx)?;

    // 3. Declared parameter validation.
    params::validate_params(route, &ctx)?;

    // 4. Request-body schema validation.
    if let Some(body_schema) = &route.body_schema {
        if accepts_body(method) {
            let data = serde_json::Value::Object(ctx.body.clone());
            schema::validate(body_schema, &data, "request.body").map_err(|e| {
                ApiError::new(StatusCode::BAD_REQUEST, "SCHEMA_VALIDATION_FAILED", e.0)
            })?;
        }
    }

    // 5. Stateful step.
    if let Some(stateful) = &route.stateful {
        state.apply(stateful, &mut ctx).map_err(|e| {
            let (status, code) = match e {
                StateError::NotFound => (StatusCode::NOT_FOUND, "STATE_NOT_FOUND"),
                StateError::Conflict => (StatusCode::CONFLICT, "STATE_CONFLICT"),
                StateError::BadInput => (StatusCode::BAD_REQUEST, "STATE_BAD_INPUT"),
            };
            ApiError::new(
                status,
                code,
                format!("{e} (collection '{}')", stateful.collection),
            )
        })?;
    }

    // 6. Case matching: first match wins and ends the pipeline.
    for case in &route.cases {
        let matched = condition::evaluate(&case.when, &ctx).map_err(|e| {
            ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "CASE_EVAL_ERROR",
                format!("{e:#}"),
            )
        })?;
        if matched {
            return override_response(&case.then, route, server, &ctx).await;
        }
    }

    // 7. Base handler.
    if let Some(compiled_mock) = &route.mock {
        let auth_key = auth::auth_query_key(server.auth.as_ref(), route.auth.as_ref());
        return mock::run(compiled_mock, &ctx, &raw_query, auth_key).await;
    }
    if let Some(compiled_fetch) = &route.fetch {
        return fetch::run(compiled_fetch, method, headers, &ctx, &raw_query, &body).await;
    }

    // 8. Default fallback. Fetch routes already returned from step 7, so
    //    this only fires for routes with no base handler.
    if let Some(default) = &route.default {
        return override_response(default, route, server, &ctx).await;
    }

    Err(ApiError::new(
        StatusCode::NOT_FOUND,
        "HANDLER_NOT_MATCHED",
        "No handler matched",
    ))
}

fn accepts_body(method: &Method) -> bool {
    *method == Method::POST || *method == Method::PUT || *method == Method::PATCH
}

fn build_context(
    method: &Method,
    raw_query: &HashMap<String, String>,
    headers: &HeaderMap,
    path_params: HashMap<String, String>,
    body: &Bytes,
) -> Result<ExecContext, ApiError> {
    let mut ctx = ExecContext {
        path: path_params,
        ..ExecContext::default()
    };

    for (key, value) in raw_query {
        ctx.query.insert(key.to_lowercase(), value.clone());
    }

    for (key, value) in headers {
        if let Ok(value) = value.to_str() {
            ctx.headers
                .insert(key.as_str().to_lowercase(), value.to_string());
        }
    }

    if accepts_body(method) && !body.is_empty() {
        let parsed: serde_json::Value = serde_json::from_slice(body).map_err(|e| {
            ApiError::new(StatusCode::BAD_REQUEST, "INVALID_BODY", e.to_string())
        })?;
        let serde_json::Value::Object(map) = parsed else {
            return Err(ApiError::new(
                StatusCode::BAD_REQUEST,
                "INVALID_BODY",
                "request body must be a JSON object",
            ));
        };
        ctx.body = map;
    }

    Ok(ctx)
}

/// Emit a case or default response override: delay, merged headers, declared
/// status, templated body. An omitted body yields an empty response.
async fn override_response(
    spec: &ResponseSpec,
    route: &CompiledRoute,
    server: &ServerConfig,
    ctx: &ExecContext,
) -> Result<Response<Full<Bytes>>, ApiError> {
    apply_delay(spec.delay_ms).await;

    let headers = merge_headers(&server.default_headers, &route.route_headers, &spec.headers);
    let status = spec.status.or(route.route_status).unwrap_or(200);
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::OK);

    let bytes = match &spec.body {
        None => Bytes::new(),
        Some(body) => {
            let expanded = template::expand(body, ctx);
            serde_json::to_vec(&expanded)
                .map(Bytes::from)
                .map_err(|e| {
                    ApiError::new(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "TEMPLATE_ERROR",
                        e.to_string(),
                    )
                })?
        }
    };

    Ok(build_response_with_headers(status, &headers, bytes))
}
