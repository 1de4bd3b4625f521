//! Reference host for the MCP core runtime (spec.md §6 "CLI /
//! configuration"): parses flags and an optional TOML file into a
//! [`config::Config`], builds an (initially tool-less) server session,
//! and serves it over stdio or streamable-HTTP until a shutdown signal
//! arrives, draining in-flight requests first.
//!
//! This binary hosts the protocol core only — per spec.md §1 the
//! concrete tools/resources/prompts a deployment exposes are external
//! collaborators, registered by whatever embeds `mcprt` as a library.
//! What's here is useful on its own as a reference/smoke-test host (a
//! bare `initialize` + `ping` + OAuth-protected endpoint round-trip) and
//! as a template for a real deployment's `main.rs`.

pub mod cli;
pub mod config;
pub mod error;
mod shutdown;

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use mcprt_auth::{AuthorizationServer, InMemoryClientStore, InMemoryTokenStore};
use mcprt_server::ServerSessionBuilder;
use mcprt_transport::StdioServerTransport;

pub use cli::Cli;
pub use config::Config;
pub use error::CliError;

/// Entry point called from `main`. Returns `Ok(())` on a clean,
/// signal-initiated shutdown; any `Err` maps to exit code 1 or 2 via
/// [`CliError::exit_code`].
pub async fn run() -> Result<(), CliError> {
    let cli = Cli::parse();
    init_tracing(cli.tracing_filter());

    let config = Config::load(&cli)?;
    let server = ServerSessionBuilder::new(config.server.name.clone(), config.server.version.clone());
    let server = match &config.server.instructions {
        Some(instructions) => server.with_instructions(instructions.clone()),
        None => server,
    };
    let handle = server.with_logging().build();

    match config.transport {
        config::TransportKind::Stdio => serve_stdio(handle).await,
        config::TransportKind::Http => serve_http(handle, &config).await,
    }
}

fn init_tracing(filter: &str) {
    // Stdio reserves stdout for the wire protocol (spec.md §4.D): every
    // log line, regardless of transport, goes to stderr so a stdio
    // deployment never corrupts its own line-delimited JSON.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .try_init();
}

async fn serve_stdio(handle: mcprt_server::ServerHandle) -> Result<(), CliError> {
    let transport = Arc::new(StdioServerTransport::new());
    let session = handle.serve(transport).await?;
    tracing::info!(server = %session.server_info().name, "serving MCP over stdio");
    shutdown::wait_for_shutdown_signal().await;
    session.close().await?;
    Ok(())
}

async fn serve_http(handle: mcprt_server::ServerHandle, config: &Config) -> Result<(), CliError> {
    let http_config = Arc::new(config.http.to_http_config());
    let sessions = Arc::new(mcprt_http::SessionTable::new());
    let factory = handle.session_factory();

    let state = mcprt_http::HttpAppState {
        config: http_config.clone(),
        sessions,
        factory,
    };
    let mut router = mcprt_http::build_router(state);

    if config.oauth.enabled {
        let oauth_config = config.oauth.to_oauth_config();
        let clients = Arc::new(InMemoryClientStore::new());
        let tokens = Arc::new(InMemoryTokenStore::new());
        let auth_server = AuthorizationServer::new(clients, tokens, oauth_config);

        // Guard the transport routes with bearer-token validation before
        // merging in the (unguarded) OAuth endpoints themselves (spec.md
        // §4.H "Guard middleware for MCP HTTP transport requests").
        let resource_metadata_uri = format!(
            "{}{}/.well-known/oauth-protected-resource",
            auth_server.config.issuer, auth_server.config.path_prefix
        );
        let guard_state = mcprt_auth::GuardState {
            tokens: auth_server.tokens.clone(),
            config: auth_server.config.clone(),
            resource_metadata_uri,
        };
        router = router.layer(axum::middleware::from_fn_with_state(
            guard_state,
            mcprt_auth::require_bearer_token,
        ));
        router = router.merge(mcprt_auth::build_router(auth_server));
        tracing::info!("OAuth 2.1 authorization subsystem mounted, transport routes guarded");
    }

    let bind_addr = http_config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| CliError::Transport(format!("failed to bind {bind_addr}: {e}")))?;
    tracing::info!(addr = %bind_addr, "serving MCP over streamable-HTTP");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown::wait_for_shutdown_signal())
        .await
        .map_err(|e| CliError::Transport(e.to_string()))?;
    Ok(())
}
