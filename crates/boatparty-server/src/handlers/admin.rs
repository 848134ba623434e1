use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde_json::{json, Value};
use subtle::ConstantTimeEq;

use crate::config::Config;
use crate::error::ApiError;
use crate::state::SharedState;

pub fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get("Authorization")?.to_str().ok()?.trim();
    let (scheme, rest) = raw.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }

    let token = rest.trim();
    if token.is_empty() {
        return None;
    }
    Some(token.to_string())
}

/// Shared authorization check for the admin surface. The token is verified
/// server-side with a constant-time compare; it is a capability, not an
/// identity.
pub fn ensure_admin_authorized(headers: &HeaderMap, config: &Config) -> Result<(), ApiError> {
    let Some(token) = extract_bearer_token(headers) else {
        return Err(ApiError::Unauthorized);
    };

    let matches: bool = token
        .as_bytes()
        .ct_eq(config.admin_token.as_bytes())
        .into();
    if !matches {
        return Err(ApiError::Unauthorized);
    }
    Ok(())
}

/// GET /api/admin/db/ping
pub async fn handle_db_ping(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    ensure_admin_authorized(&headers, &state.config)?;

    state.db.ping().await?;

    Ok(Json(json!({
        "success": true,
        "db": { "ok": true },
    })))
}

#[cfg(test)]
mod tests {
    use super::extract_bearer_token;
    use axum::http::HeaderMap;

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("Authorization", value.parse().unwrap());
        headers
    }

    #[test]
    fn accepts_bearer_scheme_case_insensitively() {
        assert_eq!(
            extract_bearer_token(&headers_with("Bearer abc123")),
            Some("abc123".to_string())
        );
        assert_eq!(
            extract_bearer_token(&headers_with("bearer abc123")),
            Some("abc123".to_string())
        );
    }

    #[test]
    fn rejects_other_schemes_and_empty_tokens() {
        assert_eq!(extract_bearer_token(&headers_with("Basic abc123")), None);
        assert_eq!(extract_bearer_token(&headers_with("Bearer ")), None);
        assert_eq!(extract_bearer_token(&HeaderMap::new()), None);
    }
}
