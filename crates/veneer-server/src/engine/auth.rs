//! Authentication gate: API key or bearer token, from header or query.

use super::context::ExecContext;
use crate::config::AuthConfig;
use crate::response::ApiError;
use hyper::StatusCode;

/// Validate the request credential. Route-level config overrides global; a
/// disabled or absent config passes.
///
/// Scheme and location values are not constrained at load time; anything
/// outside the supported sets is reported here with a 500.
pub fn authenticate(
    global: Option<&AuthConfig>,
    route: Option<&AuthConfig>,
    ctx: &ExecContext,
) -> Result<(), ApiError> {
    let Some(auth) = route.or(global) else {
        return Ok(());
    };
    if !auth.enabled {
        return Ok(());
    }

    if auth.auth_type.is_empty() || auth.location.is_empty() || auth.name.is_empty() {
        return Err(ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "AUTH_MISCONFIGURED",
            "Authentication misconfigured",
        ));
    }

    // Context keys are lowercased during assembly.
    let lookup = auth.name.to_lowercase();
    let credential = match auth.location.to_lowercase().as_str() {
        "header" => ctx.headers.get(&lookup),
        "query" => ctx.query.get(&lookup),
        _ => {
            return Err(ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "UNSUPPORTED_AUTH_LOCATION",
                "Unsupported auth location",
            ))
        }
    };

    let credential = match credential {
        Some(c) if !c.is_empty() => c.as_str(),
        _ => {
            return Err(ApiError::new(
                StatusCode::UNAUTHORIZED,
                "MISSING_CREDENTIAL",
                "Missing authentication credential",
            ))
        }
    };

    match auth.auth_type.to_lowercase().as_str() {
        "apikey" => {
            if !auth.keys.iter().any(|k| k == credential) {
                return Err(ApiError::new(
                    StatusCode::UNAUTHORIZED,
                    "INVALID_API_KEY",
                    "Invalid API key",
                ));
            }
        }
        "bearer" => {
            let token = strip_bearer(credential);
            if !auth.keys.iter().any(|k| k == token) {
                return Err(ApiError::new(
                    StatusCode::UNAUTHORIZED,
                    "INVALID_BEARER_TOKEN",
                    "Invalid bearer token",
                ));
            }
        }
        _ => {
            return Err(ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "UNSUPPORTED_AUTH_TYPE",
                "Unsupported authentication type",
            ))
        }
    }

    Ok(())
}

/// Strip a case-insensitive "Bearer" prefix and surrounding whitespace.
fn strip_bearer(credential: &str) -> &str {
    let trimmed = credential.trim();
    match trimmed.get(..6) {
        Some(prefix) if prefix.eq_ignore_ascii_case("bearer") => trimmed[6..].trim(),
        _ => trimmed,
    }
}

/// The query-parameter name carrying the credential, when auth reads from the
/// query string. Used to exclude it from mock data filtering.
pub fn auth_query_key<'a>(
    global: Option<&'a AuthConfig>,
    route: Option<&'a AuthConfig>,
) -> Option<&'a str> {
    let auth = route.or(global)?;
    if auth.enabled && auth.location.eq_ignore_ascii_case("query") {
        Some(auth.name.as_str())
    } else {
        None
    }
}
