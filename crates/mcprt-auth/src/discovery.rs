//! Client-side metadata discovery (SPEC_FULL.md §4.H supplement):
//! fetching and caching `/.well-known/oauth-authorization-server` and
//! `/.well-known/oauth-protected-resource` so an MCP client can locate
//! the endpoints it needs to call, grounded in the teacher's
//! `turbomcp-auth::discovery` fetcher — generalized away from its
//! OIDC/CIMD-specific behavior, which is out of scope here.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use thiserror::Error;

use crate::metadata::{AuthorizationServerMetadata, ProtectedResourceMetadata};

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("failed to fetch metadata from {0}: {1}")]
    Fetch(String, String),
    #[error("metadata at {0} was not valid JSON: {1}")]
    Parse(String, String),
}

struct CacheEntry<T> {
    value: T,
    fetched_at: Instant,
}

/// Fetches and caches authorization-server and protected-resource
/// metadata documents for a set of issuers. One instance is typically
/// shared by a client across all the servers it connects to.
pub struct MetadataDiscovery {
    http: reqwest::Client,
    ttl: Duration,
    auth_server_cache: DashMap<String, CacheEntry<Arc<AuthorizationServerMetadata>>>,
    protected_resource_cache: DashMap<String, CacheEntry<Arc<ProtectedResourceMetadata>>>,
}

impl Default for MetadataDiscovery {
    fn default() -> Self {
        Self::new(Duration::from_secs(300))
    }
}

impl MetadataDiscovery {
    pub fn new(ttl: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            ttl,
            auth_server_cache: DashMap::new(),
            protected_resource_cache: DashMap::new(),
        }
    }

    pub async fn authorization_server_metadata(
        &self,
        issuer: &str,
    ) -> Result<Arc<AuthorizationServerMetadata>, DiscoveryError> {
        if let Some(entry) = self.auth_server_cache.get(issuer) {
            if entry.fetched_at.elapsed() < self.ttl {
                return Ok(entry.value.clone());
            }
        }

        let url = format!("{}/.well-known/oauth-authorization-server", issuer.trim_end_matches('/'));
        let metadata = self.fetch::<AuthorizationServerMetadata>(&url).await?;
        let metadata = Arc::new(metadata);
        self.auth_server_cache.insert(
            issuer.to_string(),
            CacheEntry { value: metadata.clone(), fetched_at: Instant::now() },
        );
        Ok(metadata)
    }

    pub async fn protected_resource_metadata(
        &self,
        resource: &str,
    ) -> Result<Arc<ProtectedResourceMetadata>, DiscoveryError> {
        if let Some(entry) = self.protected_resource_cache.get(resource) {
            if entry.fetched_at.elapsed() < self.ttl {
                return Ok(entry.value.clone());
            }
        }

        let url = format!("{}/.well-known/oauth-protected-resource", resource.trim_end_matches('/'));
        let metadata = self.fetch::<ProtectedResourceMetadata>(&url).await?;
        let metadata = Arc::new(metadata);
        self.protected_resource_cache.insert(
            resource.to_string(),
            CacheEntry { value: metadata.clone(), fetched_at: Instant::now() },
        );
        Ok(metadata)
    }

    async fn fetch<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, DiscoveryError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| DiscoveryError::Fetch(url.to_string(), e.to_string()))?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| DiscoveryError::Fetch(url.to_string(), e.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|e| DiscoveryError::Parse(url.to_string(), e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OAuthConfig;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn fetches_and_caches_authorization_server_metadata() {
        let mock_server = MockServer::start().await;
        let config = OAuthConfig { issuer: mock_server.uri(), ..Default::default() };
        let body = AuthorizationServerMetadata::from_config(&config);

        Mock::given(method("GET"))
            .and(path("/.well-known/oauth-authorization-server"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&body))
            .expect(1)
            .mount(&mock_server)
            .await;

        let discovery = MetadataDiscovery::new(Duration::from_secs(60));
        let first = discovery.authorization_server_metadata(&mock_server.uri()).await.unwrap();
        let second = discovery.authorization_server_metadata(&mock_server.uri()).await.unwrap();
        assert_eq!(first.issuer, second.issuer);
        // `.expect(1)` on the mock asserts the second call was served from cache.
    }
}
