//! The authorization-server half of the subsystem: the actual grant/token
//! issuance logic behind `/oauth/authorize`, `/oauth/token`,
//! `/oauth/revoke`, `/oauth/register` (spec.md §4.H). Kept separate from
//! [`crate::router`] so the HTTP-framing concerns (query/body parsing,
//! Basic-auth header) stay out of the logic a unit test wants to drive
//! directly.

use std::sync::Arc;

use chrono::Utc;
use rand::distr::Alphanumeric;
use rand::Rng;
use uuid::Uuid;

use crate::config::OAuthConfig;
use crate::error::OAuthError;
use crate::pkce;
use crate::store::{ClientStore, TokenStore};
use crate::types::{
    AuthorizationGrant, ClientRecord, CodeChallengeMethod, TokenEndpointAuthMethod, TokenRecord,
    TokenResponse,
};
use crate::url_safety;

pub struct AuthorizeRequest {
    pub response_type: String,
    pub client_id: String,
    pub redirect_uri: String,
    pub scope: Option<String>,
    pub state: Option<String>,
    pub code_challenge: String,
    pub code_challenge_method: String,
    pub user_id: String,
}

pub struct RegistrationRequest {
    pub redirect_uris: Vec<String>,
    pub token_endpoint_auth_method: Option<String>,
    pub grant_types: Option<Vec<String>>,
    pub response_types: Option<Vec<String>>,
    pub scope: Option<String>,
    pub client_name: Option<String>,
    pub client_uri: Option<String>,
    pub logo_uri: Option<String>,
}

pub enum TokenRequest {
    AuthorizationCode {
        code: String,
        redirect_uri: String,
        client_id: String,
        client_secret: Option<String>,
        code_verifier: String,
    },
    RefreshToken {
        refresh_token: String,
        client_id: String,
        client_secret: Option<String>,
        scope: Option<String>,
    },
    Unsupported(String),
}

#[derive(Clone)]
pub struct AuthorizationServer {
    pub clients: Arc<dyn ClientStore>,
    pub tokens: Arc<dyn TokenStore>,
    pub config: Arc<OAuthConfig>,
}

fn random_opaque_token(prefix: &str) -> String {
    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(40)
        .map(char::from)
        .collect();
    format!("{prefix}_{suffix}")
}

impl AuthorizationServer {
    pub fn new(clients: Arc<dyn ClientStore>, tokens: Arc<dyn TokenStore>, config: OAuthConfig) -> Self {
        Self { clients, tokens, config: Arc::new(config) }
    }

    /// `POST /oauth/register` (RFC 7591). Validates metadata, rejects
    /// unsafe URL schemes across every URL field (spec.md §3 invariant
    /// "URL safety"), and mints an opaque `client_id`/`client_secret`.
    pub async fn register_client(
        &self,
        req: RegistrationRequest,
    ) -> Result<ClientRecord, OAuthError> {
        if req.redirect_uris.is_empty() {
            return Err(OAuthError::InvalidRequest(
                "redirect_uris is required".to_string(),
            ));
        }

        url_safety::check_all(req.redirect_uris.iter().map(String::as_str))
            .map_err(|e| OAuthError::InvalidRequest(e.to_string()))?;
        for uri in [&req.client_uri, &req.logo_uri] {
            if let Some(uri) = uri {
                url_safety::check_url(uri).map_err(|e| OAuthError::InvalidRequest(e.to_string()))?;
            }
        }

        let auth_method = match req.token_endpoint_auth_method.as_deref() {
            Some("none") => TokenEndpointAuthMethod::None,
            Some("client_secret_post") => TokenEndpointAuthMethod::ClientSecretPost,
            None | Some("client_secret_basic") => TokenEndpointAuthMethod::ClientSecretBasic,
            Some(other) => {
                return Err(OAuthError::InvalidRequest(format!(
                    "unsupported token_endpoint_auth_method: {other}"
                )))
            }
        };

        let client_id = Uuid::new_v4().to_string();
        let client_secret = match auth_method {
            TokenEndpointAuthMethod::None => None,
            _ => Some(random_opaque_token("secret")),
        };

        let record = ClientRecord {
            client_id,
            client_secret,
            client_id_issued_at: Utc::now(),
            client_secret_expires_at: None,
            redirect_uris: req.redirect_uris,
            grant_types: req
                .grant_types
                .unwrap_or_else(|| vec!["authorization_code".to_string(), "refresh_token".to_string()]),
            response_types: req.response_types.unwrap_or_else(|| vec!["code".to_string()]),
            scope: req.scope,
            token_endpoint_auth_method: auth_method,
            client_name: req.client_name,
            client_uri: req.client_uri,
            logo_uri: req.logo_uri,
        };

        self.clients.put(record.clone()).await;
        Ok(record)
    }

    /// `GET /oauth/authorize`. Returns the redirect URL to send the user
    /// agent to — either `redirect_uri?code=...&state=...` on success or
    /// `redirect_uri?error=...&state=...` on a failure that still has a
    /// trustworthy redirect target. Failures discovered before the
    /// redirect URI is validated (unknown client, mismatched redirect)
    /// are returned as `Err` instead, since redirecting there would be
    /// an open-redirect vector.
    pub async fn authorize(&self, req: AuthorizeRequest) -> Result<String, OAuthError> {
        if req.response_type != "code" {
            return Err(OAuthError::UnsupportedGrantType(format!(
                "response_type must be \"code\", got \"{}\"",
                req.response_type
            )));
        }

        let client = self
            .clients
            .get(&req.client_id)
            .await
            .ok_or_else(|| OAuthError::InvalidClient("unknown client_id".to_string()))?;

        url_safety::check_url(&req.redirect_uri)
            .map_err(|e| OAuthError::InvalidRequest(e.to_string()))?;
        if !client.allows_redirect(&req.redirect_uri) {
            return Err(OAuthError::InvalidRequest(
                "redirect_uri does not match a registered URI".to_string(),
            ));
        }

        if req.code_challenge_method != "S256" {
            let err = OAuthError::InvalidRequest(
                "code_challenge_method must be S256".to_string(),
            );
            return Ok(crate::error::redirect_error_url(
                &req.redirect_uri,
                &err,
                req.state.as_deref(),
            ));
        }

        let scopes = req
            .scope
            .as_deref()
            .map(|s| self.config.filter_scopes(s))
            .unwrap_or_default();

        let code = random_opaque_token("code");
        let grant = AuthorizationGrant {
            code: code.clone(),
            client_id: client.client_id.clone(),
            redirect_uri: req.redirect_uri.clone(),
            scopes,
            code_challenge: req.code_challenge,
            code_challenge_method: CodeChallengeMethod::S256,
            user_id: req.user_id,
            expires_at: Utc::now()
                + chrono::Duration::from_std(self.config.clamped_code_ttl()).expect("ttl fits in chrono::Duration"),
        };
        self.tokens.put_grant(grant).await;

        let mut url = url::Url::parse(&req.redirect_uri)
            .map_err(|_| OAuthError::InvalidRequest("redirect_uri is not a valid URL".to_string()))?;
        url.query_pairs_mut().append_pair("code", &code);
        if let Some(state) = &req.state {
            url.query_pairs_mut().append_pair("state", state);
        }
        Ok(url.to_string())
    }

    /// `POST /oauth/token`, dispatched by grant type (spec.md §4.H).
    pub async fn token(&self, req: TokenRequest) -> Result<TokenResponse, OAuthError> {
        match req {
            TokenRequest::AuthorizationCode {
                code,
                redirect_uri,
                client_id,
                client_secret,
                code_verifier,
            } => {
                self.exchange_authorization_code(code, redirect_uri, client_id, client_secret, code_verifier)
                    .await
            }
            TokenRequest::RefreshToken {
                refresh_token,
                client_id,
                client_secret,
                scope,
            } => {
                self.exchange_refresh_token(refresh_token, client_id, client_secret, scope)
                    .await
            }
            TokenRequest::Unsupported(grant_type) => Err(OAuthError::UnsupportedGrantType(grant_type)),
        }
    }

    async fn authenticate_client(
        &self,
        client_id: &str,
        client_secret: Option<&str>,
    ) -> Result<ClientRecord, OAuthError> {
        let client = self
            .clients
            .get(client_id)
            .await
            .ok_or_else(|| OAuthError::InvalidClient("unknown client_id".to_string()))?;

        match (&client.client_secret, client_secret) {
            (None, _) => Ok(client),
            (Some(expected), Some(got)) if expected == got => Ok(client),
            _ => Err(OAuthError::InvalidClient("client authentication failed".to_string())),
        }
    }

    async fn exchange_authorization_code(
        &self,
        code: String,
        redirect_uri: String,
        client_id: String,
        client_secret: Option<String>,
        code_verifier: String,
    ) -> Result<TokenResponse, OAuthError> {
        let client = self.authenticate_client(&client_id, client_secret.as_deref()).await?;

        // Single-use: fetch-and-delete atomically, spec.md §8 property 7.
        let grant = self
            .tokens
            .take_grant(&code)
            .await
            .ok_or_else(|| OAuthError::InvalidGrant("authorization code not found or already used".to_string()))?;

        if grant.client_id != client.client_id {
            return Err(OAuthError::InvalidGrant("code was not issued to this client".to_string()));
        }
        if grant.redirect_uri != redirect_uri {
            return Err(OAuthError::InvalidGrant("redirect_uri does not match the authorization request".to_string()));
        }
        if grant.is_expired(Utc::now()) {
            return Err(OAuthError::InvalidGrant("authorization code has expired".to_string()));
        }
        if !pkce::verify(&code_verifier, &grant.code_challenge) {
            return Err(OAuthError::InvalidGrant("PKCE verification failed".to_string()));
        }

        Ok(self.issue_tokens(client.client_id, grant.user_id, grant.scopes).await)
    }

    async fn exchange_refresh_token(
        &self,
        refresh_token: String,
        client_id: String,
        client_secret: Option<String>,
        scope: Option<String>,
    ) -> Result<TokenResponse, OAuthError> {
        let client = self.authenticate_client(&client_id, client_secret.as_deref()).await?;

        let stored = self
            .tokens
            .get_refresh_token(&refresh_token)
            .await
            .ok_or_else(|| OAuthError::InvalidGrant("unknown refresh token".to_string()))?;

        if stored.client_id != client.client_id {
            return Err(OAuthError::InvalidGrant("refresh token was not issued to this client".to_string()));
        }
        if stored.is_expired(Utc::now()) {
            self.tokens.delete_refresh_token(&refresh_token).await;
            return Err(OAuthError::InvalidGrant("refresh token has expired".to_string()));
        }

        // A refresh may only narrow scope, never widen it (RFC 6749 §6).
        let scopes = match scope {
            Some(requested) => {
                let requested = self.config.filter_scopes(&requested);
                if requested.iter().any(|s| !stored.scopes.contains(s)) {
                    return Err(OAuthError::InvalidScope(
                        "requested scope exceeds the original grant".to_string(),
                    ));
                }
                requested
            }
            None => stored.scopes.clone(),
        };

        if self.config.rotate_refresh_tokens {
            self.tokens.delete_refresh_token(&refresh_token).await;
        }

        let access = self.issue_access_token(client.client_id.clone(), stored.user_id.clone(), scopes.clone());
        let refresh = if self.config.rotate_refresh_tokens {
            let new_refresh = self
                .issue_refresh_token(client.client_id, stored.user_id, scopes, access.token.clone())
                .await;
            Some(new_refresh)
        } else {
            None
        };
        self.tokens.put_access_token(access.clone()).await;

        Ok(TokenResponse::bearer(
            access.token,
            self.config.access_token_ttl.as_secs() as i64,
            refresh,
        ))
    }

    async fn issue_tokens(&self, client_id: String, user_id: String, scopes: Vec<String>) -> TokenResponse {
        let access = self.issue_access_token(client_id.clone(), user_id.clone(), scopes.clone());
        let refresh_token = self
            .issue_refresh_token(client_id, user_id, scopes, access.token.clone())
            .await;
        self.tokens.put_access_token(access.clone()).await;

        TokenResponse::bearer(
            access.token,
            self.config.access_token_ttl.as_secs() as i64,
            Some(refresh_token),
        )
    }

    fn issue_access_token(&self, client_id: String, user_id: String, scopes: Vec<String>) -> TokenRecord {
        TokenRecord {
            token: random_opaque_token("at"),
            client_id,
            user_id,
            scopes,
            expires_at: Utc::now()
                + chrono::Duration::from_std(self.config.access_token_ttl).expect("ttl fits in chrono::Duration"),
            paired_token: None,
        }
    }

    async fn issue_refresh_token(
        &self,
        client_id: String,
        user_id: String,
        scopes: Vec<String>,
        paired_access_token: String,
    ) -> String {
        let token = random_opaque_token("rt");
        let record = TokenRecord {
            token: token.clone(),
            client_id,
            user_id,
            scopes,
            expires_at: Utc::now()
                + chrono::Duration::from_std(self.config.refresh_token_ttl).expect("ttl fits in chrono::Duration"),
            paired_token: Some(paired_access_token),
        };
        self.tokens.put_refresh_token(record).await;
        token
    }

    /// `POST /oauth/revoke` (RFC 7009). Always reports success to the
    /// caller regardless of whether the token existed (spec.md §4.H),
    /// to avoid leaking which tokens are valid.
    pub async fn revoke(&self, token: &str) {
        if let Some(record) = self.tokens.get_access_token(token).await {
            self.tokens.delete_access_token(token).await;
            if let Some(paired) = record.paired_token {
                self.tokens.delete_refresh_token(&paired).await;
            }
            return;
        }
        self.tokens.delete_refresh_token(token).await;
    }

    /// `POST /oauth/introspect` (RFC 7662), used internally by the guard
    /// middleware and exposed as an endpoint so other resource servers
    /// sharing this token store can validate tokens too.
    pub async fn introspect(&self, token: &str) -> TokenIntrospection {
        match self.tokens.get_access_token(token).await {
            Some(record) if !record.is_expired(Utc::now()) => TokenIntrospection {
                active: true,
                scope: Some(record.scopes.join(" ")),
                client_id: Some(record.client_id),
                username: Some(record.user_id),
                exp: Some(record.expires_at.timestamp()),
            },
            _ => TokenIntrospection::inactive(),
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct TokenIntrospection {
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
}

impl TokenIntrospection {
    fn inactive() -> Self {
        Self { active: false, scope: None, client_id: None, username: None, exp: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pkce::challenge_from_verifier;
    use crate::store::{InMemoryClientStore, InMemoryTokenStore};

    fn server() -> AuthorizationServer {
        AuthorizationServer::new(
            Arc::new(InMemoryClientStore::new()),
            Arc::new(InMemoryTokenStore::new()),
            OAuthConfig { enabled: true, ..Default::default() },
        )
    }

    async fn register(server: &AuthorizationServer) -> ClientRecord {
        server
            .register_client(RegistrationRequest {
                redirect_uris: vec!["https://app.example/cb".to_string()],
                token_endpoint_auth_method: None,
                grant_types: None,
                response_types: None,
                scope: Some("mcp:tools".to_string()),
                client_name: Some("Test App".to_string()),
                client_uri: None,
                logo_uri: None,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn full_authorization_code_happy_path() {
        let server = server();
        let client = register(&server).await;

        let verifier = "a-random-verifier-of-sufficient-entropy-1234567890";
        let challenge = challenge_from_verifier(verifier);

        let redirect = server
            .authorize(AuthorizeRequest {
                response_type: "code".to_string(),
                client_id: client.client_id.clone(),
                redirect_uri: "https://app.example/cb".to_string(),
                scope: Some("mcp:tools".to_string()),
                state: Some("xyz".to_string()),
                code_challenge: challenge,
                code_challenge_method: "S256".to_string(),
                user_id: "user-1".to_string(),
            })
            .await
            .unwrap();

        assert!(redirect.contains("state=xyz"));
        let url = url::Url::parse(&redirect).unwrap();
        let code = url
            .query_pairs()
            .find(|(k, _)| k == "code")
            .map(|(_, v)| v.to_string())
            .unwrap();

        let response = server
            .token(TokenRequest::AuthorizationCode {
                code: code.clone(),
                redirect_uri: "https://app.example/cb".to_string(),
                client_id: client.client_id.clone(),
                client_secret: client.client_secret.clone(),
                code_verifier: verifier.to_string(),
            })
            .await
            .unwrap();

        assert_eq!(response.token_type, "Bearer");
        assert!(response.refresh_token.is_some());

        // Replaying the same code fails (spec.md §8 property 7).
        let replay = server
            .token(TokenRequest::AuthorizationCode {
                code,
                redirect_uri: "https://app.example/cb".to_string(),
                client_id: client.client_id.clone(),
                client_secret: client.client_secret,
                code_verifier: verifier.to_string(),
            })
            .await;
        assert!(matches!(replay, Err(OAuthError::InvalidGrant(_))));
    }

    #[tokio::test]
    async fn wrong_pkce_verifier_is_rejected() {
        let server = server();
        let client = register(&server).await;
        let challenge = challenge_from_verifier("correct-verifier");

        let redirect = server
            .authorize(AuthorizeRequest {
                response_type: "code".to_string(),
                client_id: client.client_id.clone(),
                redirect_uri: "https://app.example/cb".to_string(),
                scope: None,
                state: None,
                code_challenge: challenge,
                code_challenge_method: "S256".to_string(),
                user_id: "user-1".to_string(),
            })
            .await
            .unwrap();
        let url = url::Url::parse(&redirect).unwrap();
        let code = url.query_pairs().find(|(k, _)| k == "code").unwrap().1.to_string();

        let result = server
            .token(TokenRequest::AuthorizationCode {
                code,
                redirect_uri: "https://app.example/cb".to_string(),
                client_id: client.client_id.clone(),
                client_secret: client.client_secret,
                code_verifier: "wrong-verifier".to_string(),
            })
            .await;
        assert!(matches!(result, Err(OAuthError::InvalidGrant(_))));
    }

    #[tokio::test]
    async fn mismatched_redirect_uri_at_authorize_is_rejected() {
        let server = server();
        let client = register(&server).await;
        let result = server
            .authorize(AuthorizeRequest {
                response_type: "code".to_string(),
                client_id: client.client_id,
                redirect_uri: "https://evil.example/cb".to_string(),
                scope: None,
                state: None,
                code_challenge: "x".to_string(),
                code_challenge_method: "S256".to_string(),
                user_id: "user-1".to_string(),
            })
            .await;
        assert!(matches!(result, Err(OAuthError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn revoke_is_idempotent_and_reports_no_error_for_unknown_tokens() {
        let server = server();
        server.revoke("never-issued").await;
    }

    #[tokio::test]
    async fn registration_rejects_unsafe_redirect_scheme() {
        let server = server();
        let result = server
            .register_client(RegistrationRequest {
                redirect_uris: vec!["javascript:alert(1)".to_string()],
                token_endpoint_auth_method: None,
                grant_types: None,
                response_types: None,
                scope: None,
                client_name: None,
                client_uri: None,
                logo_uri: None,
            })
            .await;
        assert!(matches!(result, Err(OAuthError::InvalidRequest(_))));
    }
}
