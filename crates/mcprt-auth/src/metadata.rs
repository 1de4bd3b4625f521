//! Authorization-server and protected-resource metadata documents
//! (spec.md §4.H, §6 "Well-known metadata paths"), grounded in the
//! teacher's `ProtectedResourceMetadataBuilder`
//! (`turbomcp-auth::server`) and RFC 8414 / RFC 9728.

use serde::{Deserialize, Serialize};

use crate::config::OAuthConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationServerMetadata {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub revocation_endpoint: String,
    pub registration_endpoint: String,
    pub scopes_supported: Vec<String>,
    pub response_types_supported: Vec<String>,
    pub grant_types_supported: Vec<String>,
    pub code_challenge_methods_supported: Vec<String>,
    pub token_endpoint_auth_methods_supported: Vec<String>,
}

impl AuthorizationServerMetadata {
    pub fn from_config(config: &OAuthConfig) -> Self {
        let base = format!("{}{}", config.issuer, config.path_prefix);
        Self {
            issuer: config.issuer.clone(),
            authorization_endpoint: format!("{base}/oauth/authorize"),
            token_endpoint: format!("{base}/oauth/token"),
            revocation_endpoint: format!("{base}/oauth/revoke"),
            registration_endpoint: format!("{base}/oauth/register"),
            scopes_supported: config.supported_scopes.clone(),
            response_types_supported: vec!["code".to_string()],
            grant_types_supported: vec![
                "authorization_code".to_string(),
                "refresh_token".to_string(),
            ],
            code_challenge_methods_supported: vec!["S256".to_string()],
            token_endpoint_auth_methods_supported: vec![
                "client_secret_basic".to_string(),
                "client_secret_post".to_string(),
                "none".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtectedResourceMetadata {
    pub resource: String,
    pub authorization_servers: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scopes_supported: Option<Vec<String>>,
    pub bearer_methods_supported: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_documentation: Option<String>,
}

impl ProtectedResourceMetadata {
    pub fn from_config(config: &OAuthConfig) -> Self {
        Self {
            resource: config.resource.clone(),
            authorization_servers: vec![config.issuer.clone()],
            scopes_supported: Some(config.supported_scopes.clone()),
            bearer_methods_supported: vec!["header".to_string()],
            resource_documentation: None,
        }
    }
}

/// `WWW-Authenticate: Bearer ...` builder for 401s on guarded MCP
/// endpoints (spec.md §4.H "Guard middleware"), grounded in the
/// teacher's `WwwAuthenticateBuilder`.
pub fn www_authenticate(resource_metadata_uri: &str, error: &str, description: &str) -> String {
    format!(
        "Bearer resource_metadata=\"{resource_metadata_uri}\", error=\"{error}\", error_description=\"{description}\""
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authorization_server_metadata_derives_endpoints_from_issuer() {
        let config = OAuthConfig::default();
        let meta = AuthorizationServerMetadata::from_config(&config);
        assert_eq!(meta.issuer, config.issuer);
        assert!(meta.token_endpoint.ends_with("/oauth/token"));
        assert_eq!(meta.code_challenge_methods_supported, vec!["S256"]);
    }

    #[test]
    fn protected_resource_metadata_lists_the_authorization_server() {
        let config = OAuthConfig::default();
        let meta = ProtectedResourceMetadata::from_config(&config);
        assert_eq!(meta.authorization_servers, vec![config.issuer.clone()]);
    }

    #[test]
    fn www_authenticate_header_contains_bearer_and_metadata_uri() {
        let header = www_authenticate("https://x/.well-known/oauth-protected-resource", "invalid_token", "expired");
        assert!(header.starts_with("Bearer "));
        assert!(header.contains("resource_metadata="));
    }
}
