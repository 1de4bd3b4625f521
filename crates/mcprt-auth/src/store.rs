//! Storage abstraction for OAuth records (spec.md §4.H "Storage"): a
//! `ClientStore` + `TokenStore` pair of narrow `get`/`put`/`delete`
//! interfaces, so a `cache`/in-memory backend and a `database` backend
//! are interchangeable behind the same trait — concrete persistence is
//! explicitly out of scope (spec.md §1), only this interface is
//! required.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;

use crate::types::{AuthorizationGrant, ClientRecord, TokenRecord};

#[async_trait]
pub trait ClientStore: Send + Sync {
    async fn get(&self, client_id: &str) -> Option<ClientRecord>;
    async fn put(&self, client: ClientRecord);
    async fn delete(&self, client_id: &str);
}

#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn get_grant(&self, code: &str) -> Option<AuthorizationGrant>;
    async fn put_grant(&self, grant: AuthorizationGrant);
    /// Atomically fetch-and-delete a grant. Authorization codes are
    /// single-use (spec.md §3 invariant, §8 property 7): the code must
    /// be gone before tokens are issued, and a concurrent replay of the
    /// same code must see nothing — this is the compare-and-delete the
    /// open question in spec.md §9 asks implementers to make precise.
    async fn take_grant(&self, code: &str) -> Option<AuthorizationGrant>;

    async fn get_access_token(&self, token: &str) -> Option<TokenRecord>;
    async fn put_access_token(&self, token: TokenRecord);
    async fn delete_access_token(&self, token: &str);

    async fn get_refresh_token(&self, token: &str) -> Option<TokenRecord>;
    async fn put_refresh_token(&self, token: TokenRecord);
    async fn delete_refresh_token(&self, token: &str);
}

/// Default in-process backend (`StoreDriver::Memory`): a `DashMap` per
/// table, matching the teacher's choice of `dashmap` for concurrent
/// session/record tables (spec.md §5 "Shared resources").
#[derive(Default)]
pub struct InMemoryClientStore {
    clients: DashMap<String, ClientRecord>,
}

impl InMemoryClientStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ClientStore for InMemoryClientStore {
    async fn get(&self, client_id: &str) -> Option<ClientRecord> {
        self.clients.get(client_id).map(|e| e.clone())
    }

    async fn put(&self, client: ClientRecord) {
        self.clients.insert(client.client_id.clone(), client);
    }

    async fn delete(&self, client_id: &str) {
        self.clients.remove(client_id);
    }
}

#[derive(Default)]
pub struct InMemoryTokenStore {
    grants: DashMap<String, AuthorizationGrant>,
    access_tokens: DashMap<String, TokenRecord>,
    refresh_tokens: DashMap<String, TokenRecord>,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every expired row. Intended to run on a timer alongside the
    /// HTTP transport's idle-session sweep; not required for correctness
    /// (expiry is always checked on read) but keeps the tables bounded.
    pub fn sweep_expired(&self) {
        let now = Utc::now();
        self.grants.retain(|_, g| !g.is_expired(now));
        self.access_tokens.retain(|_, t| !t.is_expired(now));
        self.refresh_tokens.retain(|_, t| !t.is_expired(now));
    }
}

#[async_trait]
impl TokenStore for InMemoryTokenStore {
    async fn get_grant(&self, code: &str) -> Option<AuthorizationGrant> {
        self.grants.get(code).map(|e| e.clone())
    }

    async fn put_grant(&self, grant: AuthorizationGrant) {
        self.grants.insert(grant.code.clone(), grant);
    }

    async fn take_grant(&self, code: &str) -> Option<AuthorizationGrant> {
        self.grants.remove(code).map(|(_, g)| g)
    }

    async fn get_access_token(&self, token: &str) -> Option<TokenRecord> {
        self.access_tokens.get(token).map(|e| e.clone())
    }

    async fn put_access_token(&self, token: TokenRecord) {
        self.access_tokens.insert(token.token.clone(), token);
    }

    async fn delete_access_token(&self, token: &str) {
        self.access_tokens.remove(token);
    }

    async fn get_refresh_token(&self, token: &str) -> Option<TokenRecord> {
        self.refresh_tokens.get(token).map(|e| e.clone())
    }

    async fn put_refresh_token(&self, token: TokenRecord) {
        self.refresh_tokens.insert(token.token.clone(), token);
    }

    async fn delete_refresh_token(&self, token: &str) {
        self.refresh_tokens.remove(token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CodeChallengeMethod;
    use chrono::Duration;

    fn sample_grant(code: &str) -> AuthorizationGrant {
        AuthorizationGrant {
            code: code.to_string(),
            client_id: "client-1".to_string(),
            redirect_uri: "https://app.example/cb".to_string(),
            scopes: vec!["mcp:tools".to_string()],
            code_challenge: "challenge".to_string(),
            code_challenge_method: CodeChallengeMethod::S256,
            user_id: "user-1".to_string(),
            expires_at: Utc::now() + Duration::minutes(5),
        }
    }

    #[tokio::test]
    async fn take_grant_is_single_use() {
        let store = InMemoryTokenStore::new();
        store.put_grant(sample_grant("code-1")).await;
        assert!(store.take_grant("code-1").await.is_some());
        assert!(store.take_grant("code-1").await.is_none());
    }

    #[tokio::test]
    async fn concurrent_take_grant_only_one_winner() {
        use std::sync::Arc;
        let store = Arc::new(InMemoryTokenStore::new());
        store.put_grant(sample_grant("code-race")).await;

        let a = {
            let store = store.clone();
            tokio::spawn(async move { store.take_grant("code-race").await })
        };
        let b = {
            let store = store.clone();
            tokio::spawn(async move { store.take_grant("code-race").await })
        };
        let (a, b) = (a.await.unwrap(), b.await.unwrap());
        assert!(a.is_some() ^ b.is_some());
    }

    #[tokio::test]
    async fn sweep_expired_drops_only_expired_rows() {
        let store = InMemoryTokenStore::new();
        let mut expired = sample_grant("expired");
        expired.expires_at = Utc::now() - Duration::minutes(1);
        store.put_grant(expired).await;
        store.put_grant(sample_grant("fresh")).await;

        store.sweep_expired();

        assert!(store.get_grant("expired").await.is_none());
        assert!(store.get_grant("fresh").await.is_some());
    }
}
