//! A logical streamable-HTTP session (spec.md §4.E "Session"): one
//! [`mcprt_transport::Transport`] implementation shared by every POST/GET
//! that carries the same `Mcp-Session-Id`, plus the table that tracks
//! every session this process is hosting.
//!
//! Outbound routing rule: a response whose id matches a POST currently
//! blocked waiting for it is delivered straight back as that POST's HTTP
//! body; everything else (notifications, server-initiated requests, and
//! responses to requests nobody is synchronously waiting on) goes out
//! over the SSE broadcast channel instead.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::trace;

use mcprt_transport::{Transport, TransportError, TransportEvent, TransportResult};

const SSE_BROADCAST_CAPACITY: usize = 256;

/// The transport handed to [`mcprt_engine::Engine`] for one session. Reads
/// come from the `inbound` channel fed by POST handlers; writes are routed
/// either to a waiting POST or to the SSE broadcast channel.
pub struct HttpSessionTransport {
    session_id: String,
    inbound_tx: mpsc::UnboundedSender<TransportEvent>,
    inbound_rx: Mutex<Option<mpsc::UnboundedReceiver<TransportEvent>>>,
    sse_tx: broadcast::Sender<String>,
    /// Keyed by the JSON-encoded request id, registered by a POST handler
    /// that wants its own request's response back synchronously rather
    /// than over SSE.
    waiters: DashMap<String, oneshot::Sender<Value>>,
    protocol_version: RwLock<Option<String>>,
    closed: std::sync::atomic::AtomicBool,
}

impl HttpSessionTransport {
    fn new(session_id: String) -> Arc<Self> {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (sse_tx, _) = broadcast::channel(SSE_BROADCAST_CAPACITY);
        Arc::new(Self {
            session_id,
            inbound_tx,
            inbound_rx: Mutex::new(Some(inbound_rx)),
            sse_tx,
            waiters: DashMap::new(),
            protocol_version: RwLock::new(None),
            closed: std::sync::atomic::AtomicBool::new(false),
        })
    }

    /// Feed one inbound POST body to the engine reading this session.
    pub fn deliver_inbound(&self, message: Value) {
        let _ = self.inbound_tx.send(TransportEvent::Message(message));
    }

    /// Register interest in the response for `id`; used by a POST handler
    /// that wants to return the result synchronously in its HTTP response
    /// rather than let it go out over SSE.
    pub fn await_response(&self, id_key: String) -> oneshot::Receiver<Value> {
        let (tx, rx) = oneshot::channel();
        self.waiters.insert(id_key, tx);
        rx
    }

    pub fn cancel_wait(&self, id_key: &str) {
        self.waiters.remove(id_key);
    }

    /// Subscribe to this session's SSE broadcast stream.
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.sse_tx.subscribe()
    }

    pub fn negotiated_protocol_version(&self) -> Option<String> {
        self.protocol_version.read().clone()
    }
}

#[async_trait::async_trait]
impl Transport for HttpSessionTransport {
    async fn start(&self) -> TransportResult<mpsc::UnboundedReceiver<TransportEvent>> {
        self.inbound_rx
            .lock()
            .take()
            .ok_or_else(|| TransportError::ConnectionFailed("session already started".to_string()))
    }

    async fn send(&self, message: &Value) -> TransportResult<()> {
        if self.closed.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        if let Some(id) = message.get("id") {
            let key = id.to_string();
            if let Some((_, waiter)) = self.waiters.remove(&key) {
                let _ = waiter.send(message.clone());
                return Ok(());
            }
        }
        let text = serde_json::to_string(message)
            .map_err(|e| TransportError::SendFailed(e.to_string()))?;
        // No live SSE subscriber is not an error: the peer may reconnect
        // and the message is simply not replayed (resumability beyond
        // last-event-id is out of scope for this core).
        let _ = self.sse_tx.send(text);
        Ok(())
    }

    async fn close(&self) -> TransportResult<()> {
        self.closed.store(true, std::sync::atomic::Ordering::SeqCst);
        self.waiters.clear();
        Ok(())
    }

    fn session_id(&self) -> Option<String> {
        Some(self.session_id.clone())
    }

    async fn set_protocol_version(&self, version: &str) {
        *self.protocol_version.write() = Some(version.to_string());
    }
}

struct SessionEntry {
    transport: Arc<HttpSessionTransport>,
    last_seen: Mutex<Instant>,
}

/// Every session this HTTP endpoint is currently hosting, keyed by the
/// `Mcp-Session-Id` value. A concurrent map since requests for different
/// sessions arrive on unrelated connections (spec.md §5 "Session table
/// inside the HTTP transport: updates guarded by a mutex").
#[derive(Default)]
pub struct SessionTable {
    sessions: DashMap<String, SessionEntry>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh session id and its transport, e.g. on `initialize`.
    pub fn create(&self) -> Arc<HttpSessionTransport> {
        let id = uuid::Uuid::new_v4().to_string();
        let transport = HttpSessionTransport::new(id.clone());
        self.sessions.insert(
            id,
            SessionEntry {
                transport: transport.clone(),
                last_seen: Mutex::new(Instant::now()),
            },
        );
        transport
    }

    pub fn get(&self, session_id: &str) -> Option<Arc<HttpSessionTransport>> {
        let entry = self.sessions.get(session_id)?;
        *entry.last_seen.lock() = Instant::now();
        Some(entry.transport.clone())
    }

    pub fn remove(&self, session_id: &str) -> Option<Arc<HttpSessionTransport>> {
        self.sessions.remove(session_id).map(|(_, e)| e.transport)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Evict every session idle for longer than `idle_timeout`, closing
    /// its transport (which drains pending requests via the engine).
    pub async fn evict_idle(&self, idle_timeout: Duration) {
        let stale: Vec<String> = self
            .sessions
            .iter()
            .filter(|e| e.last_seen.lock().elapsed() > idle_timeout)
            .map(|e| e.key().clone())
            .collect();
        for id in stale {
            if let Some(transport) = self.remove(&id) {
                trace!(session_id = %id, "evicting idle streamable-HTTP session");
                let _ = transport.close().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn response_to_a_waited_id_is_delivered_to_the_waiter_not_sse() {
        let transport = HttpSessionTransport::new("s1".to_string());
        let mut sse_rx = transport.subscribe();
        let waiter = transport.await_response(json!(1).to_string());

        transport
            .send(&json!({"jsonrpc": "2.0", "id": 1, "result": {"ok": true}}))
            .await
            .unwrap();

        let delivered = waiter.await.unwrap();
        assert_eq!(delivered["result"]["ok"], json!(true));
        assert!(sse_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn unwaited_messages_go_out_over_sse() {
        let transport = HttpSessionTransport::new("s1".to_string());
        let mut sse_rx = transport.subscribe();
        transport
            .send(&json!({"jsonrpc": "2.0", "method": "notifications/progress"}))
            .await
            .unwrap();
        let frame = sse_rx.recv().await.unwrap();
        assert!(frame.contains("notifications/progress"));
    }

    #[tokio::test]
    async fn session_table_round_trips_by_id() {
        let table = SessionTable::new();
        let transport = table.create();
        let id = transport.session_id().unwrap();
        assert!(table.get(&id).is_some());
        assert!(table.get("missing").is_none());
        assert_eq!(table.len(), 1);
    }

    #[tokio::test]
    async fn idle_sessions_are_evicted() {
        let table = SessionTable::new();
        table.create();
        table.evict_idle(Duration::from_millis(0)).await;
        assert!(table.is_empty());
    }
}
