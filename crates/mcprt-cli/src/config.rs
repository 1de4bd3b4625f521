//! Runtime configuration (spec.md §6 "CLI / configuration"): server
//! identity, advertised capabilities, transport selection, HTTP bind
//! settings, and OAuth — one nested struct per concern, mirroring the
//! teacher's `config.rs` + per-concern submodule layout. Loaded from
//! defaults, overridden by an optional TOML file, then by CLI flags and
//! `MCPRT_*` environment variables (highest precedence), the same
//! layering the teacher's `config` crate usage establishes.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cli::Cli;
use crate::error::CliError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Stdio,
    Http,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerIdentityConfig {
    pub name: String,
    pub version: String,
    pub instructions: Option<String>,
}

impl Default for ServerIdentityConfig {
    fn default() -> Self {
        Self {
            name: "mcprt".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            instructions: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpSectionConfig {
    pub host: String,
    pub port: u16,
    pub endpoint_path: String,
    pub session_idle_timeout_secs: u64,
    pub sse_keepalive_secs: u64,
    pub allowed_hosts: Vec<String>,
    pub max_body_size: usize,
    pub sync_response_timeout_secs: u64,
}

impl Default for HttpSectionConfig {
    fn default() -> Self {
        let defaults = mcprt_http::HttpConfig::default();
        Self {
            host: defaults.host,
            port: defaults.port,
            endpoint_path: defaults.endpoint_path,
            session_idle_timeout_secs: defaults.session_idle_timeout.as_secs(),
            sse_keepalive_secs: defaults.sse_keepalive.as_secs(),
            allowed_hosts: defaults.allowed_hosts,
            max_body_size: defaults.max_body_size,
            sync_response_timeout_secs: defaults.sync_response_timeout.as_secs(),
        }
    }
}

impl HttpSectionConfig {
    pub fn to_http_config(&self) -> mcprt_http::HttpConfig {
        mcprt_http::HttpConfig {
            host: self.host.clone(),
            port: self.port,
            endpoint_path: self.endpoint_path.clone(),
            session_idle_timeout: Duration::from_secs(self.session_idle_timeout_secs),
            sse_keepalive: Duration::from_secs(self.sse_keepalive_secs),
            allowed_hosts: self.allowed_hosts.clone(),
            max_body_size: self.max_body_size,
            sync_response_timeout: Duration::from_secs(self.sync_response_timeout_secs),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthSectionConfig {
    pub enabled: bool,
    pub path_prefix: String,
    pub issuer: String,
    pub resource: String,
    pub supported_scopes: Vec<String>,
    pub access_token_ttl_secs: u64,
    pub refresh_token_ttl_secs: u64,
    pub authorization_code_ttl_secs: u64,
    pub pkce_required: bool,
    pub rotate_refresh_tokens: bool,
}

impl Default for OAuthSectionConfig {
    fn default() -> Self {
        let defaults = mcprt_auth::OAuthConfig::default();
        Self {
            enabled: defaults.enabled,
            path_prefix: defaults.path_prefix,
            issuer: defaults.issuer,
            resource: defaults.resource,
            supported_scopes: defaults.supported_scopes,
            access_token_ttl_secs: defaults.access_token_ttl.as_secs(),
            refresh_token_ttl_secs: defaults.refresh_token_ttl.as_secs(),
            authorization_code_ttl_secs: defaults.authorization_code_ttl.as_secs(),
            pkce_required: defaults.pkce_required,
            rotate_refresh_tokens: defaults.rotate_refresh_tokens,
        }
    }
}

impl OAuthSectionConfig {
    pub fn to_oauth_config(&self) -> mcprt_auth::OAuthConfig {
        mcprt_auth::OAuthConfig {
            enabled: self.enabled,
            path_prefix: self.path_prefix.clone(),
            issuer: self.issuer.clone(),
            resource: self.resource.clone(),
            supported_scopes: self.supported_scopes.clone(),
            access_token_ttl: Duration::from_secs(self.access_token_ttl_secs),
            refresh_token_ttl: Duration::from_secs(self.refresh_token_ttl_secs),
            authorization_code_ttl: Duration::from_secs(self.authorization_code_ttl_secs),
            pkce_required: self.pkce_required,
            store: mcprt_auth::config::StoreDriver::Memory,
            rotate_refresh_tokens: self.rotate_refresh_tokens,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerIdentityConfig,
    pub transport: TransportKind,
    pub http: HttpSectionConfig,
    pub oauth: OAuthSectionConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerIdentityConfig::default(),
            transport: TransportKind::Stdio,
            http: HttpSectionConfig::default(),
            oauth: OAuthSectionConfig::default(),
        }
    }
}

impl Config {
    /// Loads defaults, layers an optional TOML file over them (when
    /// `--config`/`MCPRT_CONFIG_FILE` names one), then layers the parsed
    /// CLI flags over that — flags win. Uses the teacher's `config` crate
    /// for the TOML + environment layering instead of a hand-rolled
    /// merge.
    pub fn load(cli: &Cli) -> Result<Self, CliError> {
        let mut builder = config::Config::builder()
            .add_source(config::Config::try_from(&Config::default())?);

        if let Some(path) = &cli.config {
            if !Path::new(path).exists() {
                return Err(CliError::Invalid(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            builder = builder.add_source(config::File::from(path.clone()));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("MCPRT")
                .separator("__")
                .try_parsing(true),
        );

        let mut parsed: Config = builder.build()?.try_deserialize()?;
        cli.apply_overrides(&mut parsed);
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;

    #[test]
    fn defaults_match_the_component_crates() {
        let config = Config::default();
        assert_eq!(config.transport, TransportKind::Stdio);
        assert_eq!(config.http.port, mcprt_http::HttpConfig::default().port);
        assert!(!config.oauth.enabled);
    }

    #[test]
    fn loads_toml_file_and_lets_flags_override_it() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            transport = "http"

            [server]
            name = "from-file"
            version = "9.9.9"

            [http]
            host = "127.0.0.1"
            port = 7000

            [oauth]
            enabled = false
            "#
        )
        .unwrap();

        let cli = Cli::parse_from([
            "mcprt",
            "--config",
            file.path().to_str().unwrap(),
            "--port",
            "7001",
        ]);
        let config = Config::load(&cli).unwrap();
        assert_eq!(config.server.name, "from-file");
        assert_eq!(config.transport, TransportKind::Http);
        // the file said 7000, but the CLI flag wins
        assert_eq!(config.http.port, 7001);
    }

    #[test]
    fn missing_config_file_is_a_startup_error() {
        let cli = Cli::parse_from(["mcprt", "--config", "/nonexistent/mcprt.toml"]);
        let err = Config::load(&cli).unwrap_err();
        assert_eq!(err.exit_code(), 1);
    }
}
