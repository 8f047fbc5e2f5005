//! Declared-parameter validation for path, query and header inputs.

use super::compile::CompiledRoute;
use super::context::ExecContext;
use crate::config::ParamDef;
use crate::response::ApiError;
use hyper::StatusCode;

#[derive(Clone, Copy)]
enum ParamKind {
    Path,
    Query,
    Header,
}

impl ParamKind {
    fn label(self) -> &'static str {
        match self {
            ParamKind::Path => "path param",
            ParamKind::Query => "query param",
            ParamKind::Header => "header",
        }
    }

    fn code_suffix(self) -> &'static str {
        match self {
            ParamKind::Path => "PATH_PARAM",
            ParamKind::Query => "QUERY_PARAM",
            ParamKind::Header => "HEADER",
        }
    }
}

/// Check every declared parameter: presence when required, type, and enum
/// membership.
pub fn validate_params(route: &CompiledRoute, ctx: &ExecContext) -> Result<(), ApiError> {
    for (key, def) in &route.path_params {
        let raw = ctx.path.get(key).map(String::as_str);
        check(raw, key, def, ParamKind::Path)?;
    }

    for (key, def) in &route.query {
        let raw = ctx.query.get(&key.to_lowercase()).map(String::as_str);
        check(raw, key, def, ParamKind::Query)?;
    }

    for (key, def) in &route.request_headers {
        let raw = ctx.headers.get(&key.to_lowercase()).map(String::as_str);
        check(raw, key, def, ParamKind::Header)?;
    }

    Ok(())
}

fn check(raw: Option<&str>, key: &str, def: &ParamDef, kind: ParamKind) -> Result<(), ApiError> {
    let raw = raw.unwrap_or("");

    if def.required && raw.is_empty() {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            &format!("MISSING_{}", kind.code_suffix()),
            format!("Missing required {}: {key}", kind.label()),
        ));
    }

    if !raw.is_empty() {
        if let Err(reason) = check_type(raw, &def.param_type) {
            return Err(ApiError::new(
                StatusCode::BAD_REQUEST,
                &format!("INVALID_{}", kind.code_suffix()),
                format!("Invalid {} {key}: {reason}", kind.label()),
            ));
        }

        if !def.allowed.is_empty() && !def.allowed.iter().any(|v| v == raw) {
            return Err(ApiError::new(
                StatusCode::BAD_REQUEST,
                "INVALID_ENUM_VALUE",
                format!(
                    "{} {key}: must be one of {:?}, got '{raw}'",
                    kind.label(),
                    def.allowed
                ),
            ));
        }
    }

    Ok(())
}

fn check_type(raw: &str, declared: &str) -> Result<(), String> {
    match declared.to_lowercase().as_str() {
        "" | "string" => Ok(()),
        "integer" | "int" => raw
            .parse::<i64>()
            .map(|_| ())
            .map_err(|_| format!("expected integer, got '{raw}'")),
        "boolean" | "bool" => match raw {
            "true" | "false" => Ok(()),
            _ => Err(format!("expected boolean, got '{raw}'")),
        },
        other => Err(format!("unsupported param type: {other}")),
    }
}
