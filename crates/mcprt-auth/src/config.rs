//! OAuth configuration (spec.md §6 "CLI / configuration", OAuth block):
//! whether the subsystem is mounted at all, supported scopes, token
//! lifetimes, storage driver, and whether PKCE is mandatory.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub enabled: bool,
    /// Path prefix every OAuth endpoint is mounted under, e.g. `""` for
    /// root-level `/oauth/...` and `/.well-known/...`.
    pub path_prefix: String,
    pub issuer: String,
    pub resource: String,
    pub supported_scopes: Vec<String>,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    pub authorization_code_ttl: Duration,
    /// Spec invariant: codes live at most 10 minutes (spec.md §3
    /// "Authorization grant"). Enforced as a hard cap regardless of this
    /// value in [`Self::clamp`].
    pub pkce_required: bool,
    pub store: StoreDriver,
    pub rotate_refresh_tokens: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreDriver {
    Memory,
    Database,
}

const MAX_AUTHORIZATION_CODE_TTL: Duration = Duration::from_secs(10 * 60);

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path_prefix: String::new(),
            issuer: "http://localhost:8080".to_string(),
            resource: "http://localhost:8080/mcp".to_string(),
            supported_scopes: vec!["mcp:tools".to_string(), "mcp:resources".to_string()],
            access_token_ttl: Duration::from_secs(3600),
            refresh_token_ttl: Duration::from_secs(30 * 24 * 3600),
            authorization_code_ttl: Duration::from_secs(5 * 60),
            pkce_required: true,
            store: StoreDriver::Memory,
            rotate_refresh_tokens: false,
        }
    }
}

impl OAuthConfig {
    /// Authoritative authorization-code lifetime, clamped to the spec's
    /// 10-minute ceiling no matter what configuration asked for.
    pub fn clamped_code_ttl(&self) -> Duration {
        self.authorization_code_ttl.min(MAX_AUTHORIZATION_CODE_TTL)
    }

    pub fn scope_supported(&self, scope: &str) -> bool {
        self.supported_scopes.iter().any(|s| s == scope)
    }

    /// Filters a client-requested scope list down to the ones this server
    /// actually supports (spec.md §4.H "`/oauth/authorize`... Filters
    /// requested scopes against supported set").
    pub fn filter_scopes(&self, requested: &str) -> Vec<String> {
        requested
            .split_whitespace()
            .filter(|s| self.scope_supported(s))
            .map(str::to_string)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_overlong_code_ttl_to_ten_minutes() {
        let mut cfg = OAuthConfig {
            authorization_code_ttl: Duration::from_secs(3600),
            ..Default::default()
        };
        assert_eq!(cfg.clamped_code_ttl(), MAX_AUTHORIZATION_CODE_TTL);
        cfg.authorization_code_ttl = Duration::from_secs(60);
        assert_eq!(cfg.clamped_code_ttl(), Duration::from_secs(60));
    }

    #[test]
    fn filters_unsupported_scopes() {
        let cfg = OAuthConfig::default();
        let filtered = cfg.filter_scopes("mcp:tools bogus:scope mcp:resources");
        assert_eq!(filtered, vec!["mcp:tools", "mcp:resources"]);
    }
}
