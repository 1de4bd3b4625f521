//! OAuth record types (spec.md §3 "OAuth state"): client registrations,
//! authorization grants, and the two token kinds. These are the rows the
//! abstract persisted layout in spec.md §6 describes; [`crate::store`]
//! is the interface that reads and writes them.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A dynamically (or statically) registered OAuth client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientRecord {
    pub client_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    pub client_id_issued_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret_expires_at: Option<DateTime<Utc>>,
    pub redirect_uris: Vec<String>,
    pub grant_types: Vec<String>,
    pub response_types: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    pub token_endpoint_auth_method: TokenEndpointAuthMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo_uri: Option<String>,
}

impl ClientRecord {
    pub fn is_confidential(&self) -> bool {
        self.client_secret.is_some()
    }

    /// `true` if the client is allowed to redirect to `uri` (exact match,
    /// per RFC 6749 §3.1.2.3 — no partial/prefix matching).
    pub fn allows_redirect(&self, uri: &str) -> bool {
        self.redirect_uris.iter().any(|r| r == uri)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenEndpointAuthMethod {
    ClientSecretBasic,
    ClientSecretPost,
    None,
}

/// Code-challenge method for PKCE (RFC 7636). `S256` is the only one this
/// subsystem accepts (spec.md §3 "PKCE `code_verifier`").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CodeChallengeMethod {
    S256,
}

/// A single-use authorization grant issued by `GET /oauth/authorize` and
/// consumed by `POST /oauth/token`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationGrant {
    pub code: String,
    pub client_id: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub code_challenge: String,
    pub code_challenge_method: CodeChallengeMethod,
    pub user_id: String,
    pub expires_at: DateTime<Utc>,
}

impl AuthorizationGrant {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// An opaque bearer token, either an access token or a refresh token —
/// both rows share this shape, only lifetime and the table they live in
/// differ (spec.md §6 `oauth_access_tokens`/`oauth_refresh_tokens`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenRecord {
    pub token: String,
    pub client_id: String,
    pub user_id: String,
    pub scopes: Vec<String>,
    pub expires_at: DateTime<Utc>,
    /// Present only on access tokens: the refresh token it was issued
    /// alongside, so revoking one can cascade to the other.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paired_token: Option<String>,
}

impl TokenRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope)
    }
}

/// Issued token pair returned from a successful `/oauth/token` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl TokenResponse {
    pub fn bearer(access_token: String, expires_in: i64, refresh_token: Option<String>) -> Self {
        Self {
            access_token,
            token_type: "Bearer",
            expires_in,
            refresh_token,
            scope: None,
        }
    }
}

/// Free-form extra registration metadata preserved but not interpreted by
/// the core (display fields, contacts, etc.) — RFC 7591 allows servers to
/// echo whatever the client sent.
pub type ExtraMetadata = HashMap<String, serde_json::Value>;
