//! OAuth errors are structured JSON bodies per RFC 6749 §5.2, never
//! JSON-RPC envelopes (spec.md §7 "Propagation"): `{error,
//! error_description?, error_uri?}` with HTTP 400 for client errors and
//! 500 for server errors. Revocation is the one endpoint that always
//! answers 200 regardless of outcome.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum OAuthError {
    #[error("invalid_request: {0}")]
    InvalidRequest(String),
    #[error("invalid_client: {0}")]
    InvalidClient(String),
    #[error("invalid_grant: {0}")]
    InvalidGrant(String),
    #[error("unauthorized_client: {0}")]
    UnauthorizedClient(String),
    #[error("unsupported_grant_type: {0}")]
    UnsupportedGrantType(String),
    #[error("invalid_scope: {0}")]
    InvalidScope(String),
    #[error("access_denied: {0}")]
    AccessDenied(String),
    #[error("server_error: {0}")]
    ServerError(String),
}

impl OAuthError {
    pub fn code(&self) -> &'static str {
        match self {
            OAuthError::InvalidRequest(_) => "invalid_request",
            OAuthError::InvalidClient(_) => "invalid_client",
            OAuthError::InvalidGrant(_) => "invalid_grant",
            OAuthError::UnauthorizedClient(_) => "unauthorized_client",
            OAuthError::UnsupportedGrantType(_) => "unsupported_grant_type",
            OAuthError::InvalidScope(_) => "invalid_scope",
            OAuthError::AccessDenied(_) => "access_denied",
            OAuthError::ServerError(_) => "server_error",
        }
    }

    fn description(&self) -> String {
        match self {
            OAuthError::InvalidRequest(d)
            | OAuthError::InvalidClient(d)
            | OAuthError::InvalidGrant(d)
            | OAuthError::UnauthorizedClient(d)
            | OAuthError::UnsupportedGrantType(d)
            | OAuthError::InvalidScope(d)
            | OAuthError::AccessDenied(d)
            | OAuthError::ServerError(d) => d.clone(),
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            OAuthError::ServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

#[derive(Serialize)]
struct OAuthErrorBody {
    error: &'static str,
    error_description: String,
}

impl IntoResponse for OAuthError {
    fn into_response(self) -> Response {
        let body = OAuthErrorBody {
            error: self.code(),
            error_description: self.description(),
        };
        (self.status(), Json(body)).into_response()
    }
}

/// Appends `error=<code>&error_description=<...>&state=<...>` to a
/// redirect-URI error response (RFC 6749 §4.1.2.1): authorize-endpoint
/// failures after the client/redirect-URI have been validated redirect
/// back rather than rendering a JSON body.
pub fn redirect_error_url(redirect_uri: &str, err: &OAuthError, state: Option<&str>) -> String {
    let mut url = url::Url::parse(redirect_uri)
        .unwrap_or_else(|_| url::Url::parse("about:blank").expect("static URL always parses"));
    url.query_pairs_mut()
        .append_pair("error", err.code())
        .append_pair("error_description", &err.description());
    if let Some(state) = state {
        url.query_pairs_mut().append_pair("state", state);
    }
    url.to_string()
}
