//! Top-level CLI error, carrying the exit code spec.md §6 assigns to each
//! failure class: `1` for a startup configuration problem, `2` for a
//! transport that failed to come up or died while serving.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("transport error: {0}")]
    Transport(String),
}

impl CliError {
    /// Exit code per spec.md §6 "CLI / configuration": 0 is reserved for
    /// the normal-shutdown path in `main`, which never constructs an
    /// error, so only 1 and 2 appear here.
    pub fn exit_code(&self) -> u8 {
        match self {
            CliError::Config(_) | CliError::Invalid(_) => 1,
            CliError::Transport(_) => 2,
        }
    }
}

impl From<mcprt_engine::EngineError> for CliError {
    fn from(err: mcprt_engine::EngineError) -> Self {
        CliError::Transport(err.to_string())
    }
}

impl From<mcprt_server::ServerError> for CliError {
    fn from(err: mcprt_server::ServerError) -> Self {
        CliError::Transport(err.to_string())
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_errors_exit_one() {
        assert_eq!(CliError::Invalid("bad".to_string()).exit_code(), 1);
    }

    #[test]
    fn transport_errors_exit_two() {
        assert_eq!(CliError::Transport("bind failed".to_string()).exit_code(), 2);
    }
}
