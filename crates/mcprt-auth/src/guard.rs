//! Guard middleware for MCP HTTP transport requests (spec.md §4.H
//! "Guard middleware"): extract `Authorization: Bearer <token>`, resolve
//! it against the token store, enforce the scope the requested method
//! needs. On failure, `401` with `WWW-Authenticate: Bearer
//! error="invalid_token"`.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::extract::{Request, State};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::Utc;

/// Streamable-HTTP POST bodies are single JSON-RPC messages (spec.md
/// §4.E), so buffering one is bounded and cheap — this mirrors the same
/// body-size ceiling the transport's `RequestBodyLimitLayer` enforces.
const MAX_BUFFERED_BODY: usize = 8 * 1024 * 1024;

use crate::config::OAuthConfig;
use crate::metadata::www_authenticate;
use crate::store::TokenStore;
use crate::types::TokenRecord;

#[derive(Clone)]
pub struct GuardState {
    pub tokens: Arc<dyn TokenStore>,
    pub config: Arc<OAuthConfig>,
    pub resource_metadata_uri: String,
}

/// Maps a JSON-RPC method name to the scope required to call it. Methods
/// with no entry require no scope (e.g. `ping`, `initialize`).
pub fn required_scope(method: &str) -> Option<&'static str> {
    if method.starts_with("tools/") {
        Some("mcp:tools")
    } else if method.starts_with("resources/") {
        Some("mcp:resources")
    } else if method.starts_with("prompts/") {
        Some("mcp:prompts")
    } else {
        None
    }
}

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

fn unauthorized(state: &GuardState, error: &str, description: &str) -> Response {
    let header = www_authenticate(&state.resource_metadata_uri, error, description);
    let mut response = StatusCode::UNAUTHORIZED.into_response();
    if let Ok(value) = header.parse() {
        response.headers_mut().insert(axum::http::header::WWW_AUTHENTICATE, value);
    }
    response
}

/// Resolves the bearer token on a request, attaching the validated
/// [`TokenRecord`] as a request extension for downstream handlers, then
/// enforces the scope the JSON-RPC `method` in the body requires
/// (spec.md §4.H "enforce scopes per method"). `GET` (the SSE upstream
/// channel) carries no single method to check and is allowed through on
/// a valid token alone — scope gating applies to the `POST` message
/// endpoint, where every request names exactly one method.
pub async fn require_bearer_token(
    State(state): State<GuardState>,
    request: Request,
    next: Next,
) -> Response {
    let (parts, body) = request.into_parts();

    let Some(token) = extract_bearer(&parts.headers) else {
        return unauthorized(&state, "invalid_token", "missing bearer token");
    };

    let Some(record) = state.tokens.get_access_token(token).await else {
        return unauthorized(&state, "invalid_token", "token not recognized");
    };

    if record.is_expired(Utc::now()) {
        return unauthorized(&state, "invalid_token", "token has expired");
    }

    if parts.method != Method::POST {
        let mut request = Request::from_parts(parts, body);
        request.extensions_mut().insert(record);
        return next.run(request).await;
    }

    let bytes = match to_bytes(body, MAX_BUFFERED_BODY).await {
        Ok(bytes) => bytes,
        Err(err) => {
            return (StatusCode::BAD_REQUEST, err.to_string()).into_response();
        }
    };

    if let Some(method) = serde_json::from_slice::<serde_json::Value>(&bytes)
        .ok()
        .and_then(|v| v.get("method").and_then(|m| m.as_str().map(str::to_string)))
    {
        if let Err(resp) = check_scope(&record, &method) {
            return resp;
        }
    }

    let mut request = Request::from_parts(parts, Body::from(bytes));
    request.extensions_mut().insert(record);
    next.run(request).await
}

/// Checks a resolved token against the scope a given method requires.
/// Returns `Ok(())` if no scope is required or the token carries it.
pub fn check_scope(token: &TokenRecord, method: &str) -> Result<(), Response> {
    match required_scope(method) {
        Some(scope) if !token.has_scope(scope) => Err((
            StatusCode::FORBIDDEN,
            format!("token lacks required scope \"{scope}\""),
        )
            .into_response()),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_scope_maps_method_prefixes() {
        assert_eq!(required_scope("tools/call"), Some("mcp:tools"));
        assert_eq!(required_scope("resources/read"), Some("mcp:resources"));
        assert_eq!(required_scope("prompts/get"), Some("mcp:prompts"));
        assert_eq!(required_scope("ping"), None);
        assert_eq!(required_scope("initialize"), None);
    }

    #[test]
    fn check_scope_rejects_token_missing_required_scope() {
        let token = TokenRecord {
            token: "t".to_string(),
            client_id: "c".to_string(),
            user_id: "u".to_string(),
            scopes: vec!["mcp:resources".to_string()],
            expires_at: Utc::now() + chrono::Duration::hours(1),
            paired_token: None,
        };
        assert!(check_scope(&token, "tools/call").is_err());
        assert!(check_scope(&token, "resources/read").is_ok());
        assert!(check_scope(&token, "ping").is_ok());
    }

    #[test]
    fn extract_bearer_requires_exact_prefix() {
        let mut headers = HeaderMap::new();
        headers.insert(axum::http::header::AUTHORIZATION, "Bearer abc123".parse().unwrap());
        assert_eq!(extract_bearer(&headers), Some("abc123"));

        let mut wrong = HeaderMap::new();
        wrong.insert(axum::http::header::AUTHORIZATION, "Basic abc123".parse().unwrap());
        assert_eq!(extract_bearer(&wrong), None);
    }

    use crate::store::InMemoryTokenStore;
    use axum::body::Body;
    use axum::http::Request as HttpRequest;
    use axum::routing::post;
    use axum::Router;
    use tower::ServiceExt;

    fn test_router(tokens: Arc<InMemoryTokenStore>) -> Router {
        let state = GuardState {
            tokens,
            config: Arc::new(OAuthConfig::default()),
            resource_metadata_uri: "https://example/.well-known/oauth-protected-resource".to_string(),
        };
        async fn echo_ok() -> &'static str {
            "ok"
        }
        Router::new()
            .route("/mcp", post(echo_ok))
            .layer(axum::middleware::from_fn_with_state(state, require_bearer_token))
    }

    async fn issue_token(tokens: &InMemoryTokenStore, scopes: &[&str]) -> String {
        tokens
            .put_access_token(TokenRecord {
                token: "tok-1".to_string(),
                client_id: "client".to_string(),
                user_id: "user".to_string(),
                scopes: scopes.iter().map(|s| s.to_string()).collect(),
                expires_at: Utc::now() + chrono::Duration::hours(1),
                paired_token: None,
            })
            .await;
        "tok-1".to_string()
    }

    #[tokio::test]
    async fn rejects_request_without_a_bearer_token() {
        let router = test_router(Arc::new(InMemoryTokenStore::new()));
        let response = router
            .oneshot(
                HttpRequest::post("/mcp")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"jsonrpc":"2.0","method":"tools/call","id":1}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn allows_request_whose_token_carries_the_required_scope() {
        let tokens = Arc::new(InMemoryTokenStore::new());
        let token = issue_token(&tokens, &["mcp:tools"]).await;
        let router = test_router(tokens);
        let response = router
            .oneshot(
                HttpRequest::post("/mcp")
                    .header("authorization", format!("Bearer {token}"))
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"jsonrpc":"2.0","method":"tools/call","id":1}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn rejects_request_whose_token_lacks_the_required_scope() {
        let tokens = Arc::new(InMemoryTokenStore::new());
        let token = issue_token(&tokens, &["mcp:resources"]).await;
        let router = test_router(tokens);
        let response = router
            .oneshot(
                HttpRequest::post("/mcp")
                    .header("authorization", format!("Bearer {token}"))
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"jsonrpc":"2.0","method":"tools/call","id":1}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn allows_ping_through_without_any_scope() {
        let tokens = Arc::new(InMemoryTokenStore::new());
        let token = issue_token(&tokens, &[]).await;
        let router = test_router(tokens);
        let response = router
            .oneshot(
                HttpRequest::post("/mcp")
                    .header("authorization", format!("Bearer {token}"))
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"jsonrpc":"2.0","method":"ping","id":1}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
