//! OAuth 2.1 authorization subsystem (spec.md §4.H): authorization-code +
//! PKCE, refresh, dynamic client registration, revocation, and the two
//! well-known metadata documents a protected MCP server or its clients
//! need. Mounted as its own axum [`Router`](axum::Router) alongside the
//! streamable-HTTP transport's router in `mcprt-cli`.

pub mod config;
pub mod discovery;
pub mod error;
pub mod guard;
pub mod metadata;
pub mod pkce;
pub mod router;
pub mod server;
pub mod store;
pub mod types;
pub mod url_safety;

pub use config::OAuthConfig;
pub use error::OAuthError;
pub use guard::{require_bearer_token, GuardState};
pub use metadata::{AuthorizationServerMetadata, ProtectedResourceMetadata};
pub use router::build_router;
pub use server::AuthorizationServer;
pub use store::{ClientStore, InMemoryClientStore, InMemoryTokenStore, TokenStore};
pub use types::{AuthorizationGrant, ClientRecord, TokenRecord, TokenResponse};
