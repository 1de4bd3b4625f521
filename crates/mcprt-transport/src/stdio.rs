//! Stdio transport (spec.md §4.D).
//!
//! Each JSON-RPC message is one line terminated by `\n`; embedded
//! newlines are forbidden. The server variant wraps this process's own
//! stdin/stdout. The client variant spawns the provider as a child
//! process and talks to its stdin/stdout, inheriting stderr so the
//! child's own logging doesn't get mixed into ours or the wire.
//!
//! Interior mutability follows the same split the rest of the workspace
//! uses: `std::sync::Mutex` for state that's read-modify-written briefly
//! and never across an `.await`, `tokio::sync::Mutex` for the I/O handles
//! themselves.

use std::process::Stdio as StdStdio;
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::io::{BufReader, Stdout};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{mpsc, Mutex as TokioMutex};
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec};
use tracing::{debug, trace, warn};

use crate::core::{Transport, TransportError, TransportEvent, TransportResult};

/// How long to wait for a spawned child to exit on close before killing it.
const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

fn validate_outbound_line(text: &str) -> TransportResult<()> {
    if text.contains('\n') || text.contains('\r') {
        return Err(TransportError::Protocol(
            "message contains an embedded newline, forbidden by the stdio transport".to_string(),
        ));
    }
    Ok(())
}

fn parse_inbound_line(line: &str) -> Option<Result<serde_json::Value, TransportError>> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    Some(
        serde_json::from_str(line)
            .map_err(|e| TransportError::Protocol(format!("malformed JSON line: {e}"))),
    )
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
enum State {
    Idle,
    Started,
    Closed,
}

/// Wraps this process's own stdin/stdout — the shape an MCP *server*
/// speaking stdio uses.
pub struct StdioServerTransport {
    state: StdMutex<State>,
    writer: TokioMutex<Option<FramedWrite<Stdout, LinesCodec>>>,
}

impl StdioServerTransport {
    pub fn new() -> Self {
        Self {
            state: StdMutex::new(State::Idle),
            writer: TokioMutex::new(None),
        }
    }
}

impl Default for StdioServerTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Transport for StdioServerTransport {
    async fn start(&self) -> TransportResult<mpsc::UnboundedReceiver<TransportEvent>> {
        {
            let mut state = self.state.lock().expect("stdio state mutex poisoned");
            if *state == State::Started {
                return Err(TransportError::ConnectionFailed(
                    "already started".to_string(),
                ));
            }
            *state = State::Started;
        }

        *self.writer.lock().await = Some(FramedWrite::new(tokio::io::stdout(), LinesCodec::new()));

        let (tx, rx) = mpsc::unbounded_channel();
        let mut reader = FramedRead::new(BufReader::new(tokio::io::stdin()), LinesCodec::new());
        tokio::spawn(async move {
            while let Some(line) = reader.next().await {
                match line {
                    Ok(line) => match parse_inbound_line(&line) {
                        Some(Ok(value)) => {
                            if tx.send(TransportEvent::Message(value)).is_err() {
                                break;
                            }
                        }
                        Some(Err(err)) => {
                            if tx.send(TransportEvent::Error(err)).is_err() {
                                break;
                            }
                        }
                        None => {}
                    },
                    Err(err) => {
                        let _ = tx.send(TransportEvent::Error(TransportError::Io(err.to_string())));
                        break;
                    }
                }
            }
            let _ = tx.send(TransportEvent::Closed);
            debug!("stdio server reader task exited");
        });

        Ok(rx)
    }

    async fn send(&self, message: &serde_json::Value) -> TransportResult<()> {
        let text = serde_json::to_string(message)
            .map_err(|e| TransportError::SendFailed(e.to_string()))?;
        validate_outbound_line(&text)?;

        let mut writer = self.writer.lock().await;
        let Some(writer) = writer.as_mut() else {
            return Err(TransportError::Closed);
        };
        writer
            .send(text)
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))?;
        writer
            .flush()
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    async fn close(&self) -> TransportResult<()> {
        *self.state.lock().expect("stdio state mutex poisoned") = State::Closed;
        *self.writer.lock().await = None;
        Ok(())
    }
}

/// Spawns the MCP provider as a child process and talks to its
/// stdin/stdout — the shape an MCP *client* speaking stdio uses.
pub struct StdioClientTransport {
    state: StdMutex<State>,
    child: TokioMutex<Option<Child>>,
    writer: TokioMutex<Option<FramedWrite<ChildStdin, LinesCodec>>>,
    stdout: TokioMutex<Option<ChildStdout>>,
    shutdown_grace: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct ChildProcessSpec {
    pub command: String,
    pub args: Vec<String>,
    pub cwd: Option<String>,
    pub env: Vec<(String, String)>,
}

impl StdioClientTransport {
    /// Spawn `spec` as a child process and wire up its stdin/stdout. The
    /// reader task doesn't start until [`Transport::start`] is called.
    pub fn spawn(spec: ChildProcessSpec) -> TransportResult<Self> {
        let mut command = Command::new(&spec.command);
        command
            .args(&spec.args)
            .stdin(StdStdio::piped())
            .stdout(StdStdio::piped())
            .stderr(StdStdio::inherit())
            .kill_on_drop(true);
        if let Some(cwd) = &spec.cwd {
            command.current_dir(cwd);
        }
        for (key, value) in &spec.env {
            command.env(key, value);
        }

        let mut child = command
            .spawn()
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| TransportError::ConnectionFailed("child has no stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| TransportError::ConnectionFailed("child has no stdout".to_string()))?;

        Ok(Self {
            state: StdMutex::new(State::Idle),
            child: TokioMutex::new(Some(child)),
            writer: TokioMutex::new(Some(FramedWrite::new(stdin, LinesCodec::new()))),
            stdout: TokioMutex::new(Some(stdout)),
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        })
    }
}

#[async_trait::async_trait]
impl Transport for StdioClientTransport {
    async fn start(&self) -> TransportResult<mpsc::UnboundedReceiver<TransportEvent>> {
        {
            let mut state = self.state.lock().expect("stdio state mutex poisoned");
            if *state == State::Started {
                return Err(TransportError::ConnectionFailed(
                    "already started".to_string(),
                ));
            }
            *state = State::Started;
        }

        let stdout = self
            .stdout
            .lock()
            .await
            .take()
            .ok_or_else(|| TransportError::ConnectionFailed("already started".to_string()))?;

        let (tx, rx) = mpsc::unbounded_channel();
        let mut reader = FramedRead::new(BufReader::new(stdout), LinesCodec::new());
        tokio::spawn(async move {
            while let Some(line) = reader.next().await {
                match line {
                    Ok(line) => match parse_inbound_line(&line) {
                        Some(Ok(value)) => {
                            trace!("stdio client received message");
                            if tx.send(TransportEvent::Message(value)).is_err() {
                                break;
                            }
                        }
                        Some(Err(err)) => {
                            if tx.send(TransportEvent::Error(err)).is_err() {
                                break;
                            }
                        }
                        None => {}
                    },
                    Err(err) => {
                        let _ = tx.send(TransportEvent::Error(TransportError::Io(err.to_string())));
                        break;
                    }
                }
            }
            let _ = tx.send(TransportEvent::Closed);
            debug!("stdio client reader task exited");
        });

        Ok(rx)
    }

    async fn send(&self, message: &serde_json::Value) -> TransportResult<()> {
        let text = serde_json::to_string(message)
            .map_err(|e| TransportError::SendFailed(e.to_string()))?;
        validate_outbound_line(&text)?;

        let mut writer = self.writer.lock().await;
        let Some(writer) = writer.as_mut() else {
            return Err(TransportError::Closed);
        };
        writer
            .send(text)
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))?;
        writer
            .flush()
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    async fn close(&self) -> TransportResult<()> {
        *self.state.lock().expect("stdio state mutex poisoned") = State::Closed;
        *self.writer.lock().await = None;

        let mut child_slot = self.child.lock().await;
        if let Some(mut child) = child_slot.take() {
            match tokio::time::timeout(self.shutdown_grace, child.wait()).await {
                Ok(Ok(status)) => debug!("child process exited: {status}"),
                Ok(Err(err)) => warn!("error waiting for child process: {err}"),
                Err(_) => {
                    warn!("child process did not exit within the grace period, killing it");
                    let _ = child.kill().await;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_lines_with_embedded_newlines() {
        assert!(validate_outbound_line("line1\nline2").is_err());
        assert!(validate_outbound_line("line1\rline2").is_err());
        assert!(validate_outbound_line("single line, no breaks").is_ok());
    }

    #[test]
    fn escaped_newlines_inside_json_strings_are_fine() {
        let text = r#"{"text":"line1\nline2"}"#;
        assert!(!text.contains('\n'));
        assert!(validate_outbound_line(text).is_ok());
    }

    #[test]
    fn empty_lines_are_dropped_not_errored() {
        assert!(parse_inbound_line("").is_none());
        assert!(parse_inbound_line("   ").is_none());
    }

    #[test]
    fn malformed_json_line_surfaces_as_an_error_not_a_panic() {
        let result = parse_inbound_line("not json");
        assert!(matches!(result, Some(Err(TransportError::Protocol(_)))));
    }
}
