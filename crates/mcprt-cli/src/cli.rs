//! Command-line flags (spec.md §6 "CLI / configuration"): transport
//! selection, an optional TOML config file, HTTP bind overrides, the
//! OAuth toggle, and a verbosity flag that raises the tracing filter —
//! grounded in the teacher's `turbomcp-cli::cli` flag set, trimmed to
//! what a server host (rather than a client tool) needs.

use std::path::PathBuf;

use clap::Parser;

use crate::config::{Config, TransportKind};

#[derive(Parser, Debug)]
#[command(
    name = "mcprt",
    version,
    about = "Reference host for the MCP core runtime: serves over stdio or streamable-HTTP"
)]
pub struct Cli {
    /// Transport to serve on. Overrides the config file's `transport` key.
    #[arg(long, value_enum, env = "MCPRT_TRANSPORT")]
    pub transport: Option<TransportKind>,

    /// Path to a TOML configuration file.
    #[arg(long, env = "MCPRT_CONFIG_FILE")]
    pub config: Option<PathBuf>,

    /// HTTP bind host (only used when `--transport http`).
    #[arg(long, env = "MCPRT_HOST")]
    pub host: Option<String>,

    /// HTTP bind port (only used when `--transport http`).
    #[arg(long, env = "MCPRT_PORT")]
    pub port: Option<u16>,

    /// Mount the OAuth 2.1 authorization subsystem alongside the HTTP
    /// transport.
    #[arg(long, env = "MCPRT_OAUTH")]
    pub oauth: bool,

    /// Raise the tracing filter: `-v` = debug, `-vv` = trace. Default is
    /// info.
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Applies flag-level overrides on top of whatever the config file
    /// and environment already produced. Flags always win (spec.md §6:
    /// CLI flags take precedence in the layered configuration model).
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(transport) = self.transport {
            config.transport = transport;
        }
        if let Some(host) = &self.host {
            config.http.host = host.clone();
        }
        if let Some(port) = self.port {
            config.http.port = port;
        }
        if self.oauth {
            config.oauth.enabled = true;
        }
    }

    pub fn tracing_filter(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_transport_and_bind_flags() {
        let cli = Cli::parse_from([
            "mcprt",
            "--transport",
            "http",
            "--host",
            "0.0.0.0",
            "--port",
            "9000",
            "--oauth",
        ]);
        assert_eq!(cli.transport, Some(TransportKind::Http));
        assert_eq!(cli.host.as_deref(), Some("0.0.0.0"));
        assert_eq!(cli.port, Some(9000));
        assert!(cli.oauth);
    }

    #[test]
    fn flags_override_config_defaults() {
        let cli = Cli::parse_from(["mcprt", "--transport", "http", "--port", "9001"]);
        let mut config = Config::default();
        cli.apply_overrides(&mut config);
        assert_eq!(config.transport, TransportKind::Http);
        assert_eq!(config.http.port, 9001);
    }

    #[test]
    fn verbosity_raises_tracing_filter() {
        assert_eq!(Cli::parse_from(["mcprt"]).tracing_filter(), "info");
        assert_eq!(Cli::parse_from(["mcprt", "-v"]).tracing_filter(), "debug");
        assert_eq!(Cli::parse_from(["mcprt", "-vv"]).tracing_filter(), "trace");
    }
}
