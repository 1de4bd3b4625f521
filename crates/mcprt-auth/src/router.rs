//! Axum router mounting the OAuth endpoints (spec.md §4.H "Endpoints"):
//! the two well-known metadata documents, `/oauth/authorize`,
//! `/oauth/token`, `/oauth/revoke`, `/oauth/register`. HTTP framing
//! (query/form parsing, Basic-auth header, redirects) lives here;
//! [`crate::server::AuthorizationServer`] holds the actual logic.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use serde::Deserialize;

use crate::error::OAuthError;
use crate::metadata::{AuthorizationServerMetadata, ProtectedResourceMetadata};
use crate::server::{AuthorizationServer, AuthorizeRequest, RegistrationRequest, TokenRequest};

pub fn build_router(server: AuthorizationServer) -> Router {
    let prefix = server.config.path_prefix.clone();
    Router::new()
        .route(
            "/.well-known/oauth-authorization-server",
            get(authorization_server_metadata),
        )
        .route(
            "/.well-known/oauth-protected-resource",
            get(protected_resource_metadata),
        )
        .route(&format!("{prefix}/oauth/authorize"), get(authorize))
        .route(&format!("{prefix}/oauth/token"), post(token))
        .route(&format!("{prefix}/oauth/revoke"), post(revoke))
        .route(&format!("{prefix}/oauth/register"), post(register))
        .with_state(Arc::new(server))
}

async fn authorization_server_metadata(State(server): State<Arc<AuthorizationServer>>) -> Response {
    Json(AuthorizationServerMetadata::from_config(&server.config)).into_response()
}

async fn protected_resource_metadata(State(server): State<Arc<AuthorizationServer>>) -> Response {
    Json(ProtectedResourceMetadata::from_config(&server.config)).into_response()
}

#[derive(Deserialize)]
struct AuthorizeQuery {
    response_type: String,
    client_id: String,
    redirect_uri: String,
    scope: Option<String>,
    state: Option<String>,
    code_challenge: String,
    #[serde(default = "default_challenge_method")]
    code_challenge_method: String,
    /// Normally resolved from an authenticated session; accepted as a
    /// query parameter here since session/login UI is outside this
    /// core's scope (spec.md §1 "Explicitly out of scope").
    #[serde(default = "default_user_id")]
    user_id: String,
}

fn default_challenge_method() -> String {
    "S256".to_string()
}

fn default_user_id() -> String {
    "anonymous".to_string()
}

async fn authorize(
    State(server): State<Arc<AuthorizationServer>>,
    Query(query): Query<AuthorizeQuery>,
) -> Response {
    match server
        .authorize(AuthorizeRequest {
            response_type: query.response_type,
            client_id: query.client_id,
            redirect_uri: query.redirect_uri,
            scope: query.scope,
            state: query.state,
            code_challenge: query.code_challenge,
            code_challenge_method: query.code_challenge_method,
            user_id: query.user_id,
        })
        .await
    {
        Ok(redirect_url) => Redirect::to(&redirect_url).into_response(),
        // Unknown client / mismatched redirect_uri: no trustworthy
        // redirect target exists yet, so this renders as a JSON error
        // rather than an open redirect (spec.md §4.H authorize errors).
        Err(err) => err.into_response(),
    }
}

/// RFC 6749 §2.3.1: client credentials may arrive via HTTP Basic auth
/// instead of the body. Body-supplied `client_id` wins if both are
/// present (callers should only ever send one).
fn basic_auth_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let header = headers.get(axum::http::header::AUTHORIZATION)?.to_str().ok()?;
    let encoded = header.strip_prefix("Basic ")?;
    let decoded = BASE64_STANDARD.decode(encoded).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (id, secret) = decoded.split_once(':')?;
    Some((id.to_string(), secret.to_string()))
}

async fn token(
    State(server): State<Arc<AuthorizationServer>>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    let basic = basic_auth_credentials(&headers);
    let client_id = form
        .get("client_id")
        .cloned()
        .or_else(|| basic.as_ref().map(|(id, _)| id.clone()));
    let client_secret = form
        .get("client_secret")
        .cloned()
        .or_else(|| basic.as_ref().map(|(_, secret)| secret.clone()));

    let Some(client_id) = client_id else {
        return OAuthError::InvalidClient("client_id is required".to_string()).into_response();
    };

    let request = match form.get("grant_type").map(String::as_str) {
        Some("authorization_code") => {
            let (Some(code), Some(redirect_uri), Some(code_verifier)) = (
                form.get("code").cloned(),
                form.get("redirect_uri").cloned(),
                form.get("code_verifier").cloned(),
            ) else {
                return OAuthError::InvalidRequest(
                    "code, redirect_uri, and code_verifier are required".to_string(),
                )
                .into_response();
            };
            TokenRequest::AuthorizationCode { code, redirect_uri, client_id, client_secret, code_verifier }
        }
        Some("refresh_token") => {
            let Some(refresh_token) = form.get("refresh_token").cloned() else {
                return OAuthError::InvalidRequest("refresh_token is required".to_string()).into_response();
            };
            TokenRequest::RefreshToken {
                refresh_token,
                client_id,
                client_secret,
                scope: form.get("scope").cloned(),
            }
        }
        other => TokenRequest::Unsupported(other.unwrap_or("").to_string()),
    };

    match server.token(request).await {
        Ok(response) => Json(response).into_response(),
        Err(err) => err.into_response(),
    }
}

#[derive(Deserialize)]
struct RevokeForm {
    token: String,
}

/// `POST /oauth/revoke` always answers `200`, even for an unknown token
/// (spec.md §4.H, §6 "revocation always returns 200").
async fn revoke(State(server): State<Arc<AuthorizationServer>>, Form(form): Form<RevokeForm>) -> Response {
    server.revoke(&form.token).await;
    StatusCode::OK.into_response()
}

async fn register(
    State(server): State<Arc<AuthorizationServer>>,
    Json(body): Json<RegistrationRequestBody>,
) -> Response {
    match server
        .register_client(RegistrationRequest {
            redirect_uris: body.redirect_uris,
            token_endpoint_auth_method: body.token_endpoint_auth_method,
            grant_types: body.grant_types,
            response_types: body.response_types,
            scope: body.scope,
            client_name: body.client_name,
            client_uri: body.client_uri,
            logo_uri: body.logo_uri,
        })
        .await
    {
        Ok(client) => (StatusCode::CREATED, Json(client)).into_response(),
        Err(err) => err.into_response(),
    }
}

#[derive(Deserialize)]
struct RegistrationRequestBody {
    redirect_uris: Vec<String>,
    token_endpoint_auth_method: Option<String>,
    grant_types: Option<Vec<String>>,
    response_types: Option<Vec<String>>,
    scope: Option<String>,
    client_name: Option<String>,
    client_uri: Option<String>,
    logo_uri: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_auth_credentials_decodes_id_and_secret() {
        let mut headers = HeaderMap::new();
        let encoded = BASE64_STANDARD.encode(b"abc:secret");
        headers.insert(
            axum::http::header::AUTHORIZATION,
            format!("Basic {encoded}").parse().unwrap(),
        );
        let (id, secret) = basic_auth_credentials(&headers).unwrap();
        assert_eq!(id, "abc");
        assert_eq!(secret, "secret");
    }

    #[test]
    fn basic_auth_credentials_is_none_without_the_header() {
        assert!(basic_auth_credentials(&HeaderMap::new()).is_none());
    }
}
