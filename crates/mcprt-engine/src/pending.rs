//! The outbound pending-request table: id → waiter, plus the state
//! machine from spec.md §4.F:
//!
//! ```text
//! NEW → SENT → (RESPONSE|ERROR) → DONE
//!         │
//!         ├─ TIMEOUT → CANCEL_SENT → DONE
//!         └─ USER_CANCEL → CANCEL_SENT → DONE
//! ```
//!
//! `CANCEL_SENT` discards any late response: once we've told the peer we
//! gave up, a response that arrives afterward is logged and dropped
//! rather than resolving a waiter a second time.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot, Notify};
use tokio_util::sync::CancellationToken;
use tracing::trace;

use mcprt_wire::ids::RequestId;

use crate::error::EngineError;

/// A progress event surfaced to whoever is awaiting an outbound request.
#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub progress: f64,
    pub total: Option<f64>,
    pub message: Option<String>,
}

/// Shared handle that lets a caller (or the handler issuing the request)
/// extend the waiter's deadline, per spec.md §5 "Timeouts": `touch()` is
/// opt-in, not automatic on every progress notification.
#[derive(Clone)]
pub struct TouchHandle {
    inner: Arc<Notify>,
}

impl TouchHandle {
    fn new() -> Self {
        Self {
            inner: Arc::new(Notify::new()),
        }
    }

    pub fn touch(&self) {
        self.inner.notify_one();
    }
}

pub(crate) struct Waiter {
    result_tx: Option<oneshot::Sender<Result<serde_json::Value, EngineError>>>,
    progress_tx: Option<mpsc::UnboundedSender<ProgressEvent>>,
    cancel: CancellationToken,
    touch: TouchHandle,
}

/// Returned from [`crate::Engine::request`]. Drives the deadline/cancel
/// race and yields progress events as they arrive.
pub struct RequestHandle {
    pub(crate) id: RequestId,
    pub(crate) result_rx: oneshot::Receiver<Result<serde_json::Value, EngineError>>,
    pub(crate) progress_rx: Option<mpsc::UnboundedReceiver<ProgressEvent>>,
    pub(crate) cancel: CancellationToken,
    pub(crate) touch: TouchHandle,
    pub(crate) deadline: Instant,
}

impl RequestHandle {
    pub fn id(&self) -> &RequestId {
        &self.id
    }

    /// Extend this request's deadline. Call this from a progress callback
    /// to keep a long-running call alive past its original timeout.
    pub fn touch(&self) {
        self.touch.touch();
    }

    /// Cancel this request from the caller's side. Equivalent to the
    /// deadline elapsing except the resolved error is [`EngineError::Cancelled`]
    /// rather than [`EngineError::Timeout`].
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Pull the next progress event, if this request was created with
    /// progress tracking. Returns `None` immediately otherwise.
    pub async fn next_progress(&mut self) -> Option<ProgressEvent> {
        self.progress_rx.as_mut()?.recv().await
    }

    /// Await the final outcome: response, remote error, timeout, or
    /// cancellation — exactly one, never more (spec.md §8 invariant 3).
    ///
    /// Each call to [`Self::touch`] (or [`crate::context::RequestContext::touch_handle`])
    /// pushes the deadline `extension` further into the future rather than
    /// resolving the request; this loop re-derives the remaining sleep on
    /// every iteration so a touch that lands mid-sleep is observed
    /// immediately instead of on the next spin.
    pub async fn wait(mut self, extension: Duration) -> Result<serde_json::Value, EngineError> {
        loop {
            let remaining = self.deadline.saturating_duration_since(Instant::now());
            tokio::select! {
                result = &mut self.result_rx => {
                    return result.unwrap_or(Err(EngineError::Closed));
                }
                _ = self.cancel.cancelled() => {
                    return Err(EngineError::Cancelled);
                }
                _ = self.touch.inner.notified() => {
                    self.deadline = Instant::now() + extension;
                }
                _ = tokio::time::sleep(remaining) => {
                    return Err(EngineError::Timeout);
                }
            }
        }
    }
}

/// The outbound pending-request table.
#[derive(Default)]
pub struct PendingRequests {
    table: DashMap<RequestId, Waiter>,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new waiter and return the pieces the caller needs:
    /// a [`RequestHandle`] to await, and the [`TouchHandle`] the engine
    /// uses internally to extend the deadline when the handle's `touch()`
    /// fires (wired through the same `Notify`).
    pub fn register(
        &self,
        id: RequestId,
        timeout: Duration,
        with_progress: bool,
    ) -> RequestHandle {
        let (result_tx, result_rx) = oneshot::channel();
        let (progress_tx, progress_rx) = if with_progress {
            let (tx, rx) = mpsc::unbounded_channel();
            (Some(tx), Some(rx))
        } else {
            (None, None)
        };
        let cancel = CancellationToken::new();
        let touch = TouchHandle::new();

        self.table.insert(
            id.clone(),
            Waiter {
                result_tx: Some(result_tx),
                progress_tx,
                cancel: cancel.clone(),
                touch: touch.clone(),
            },
        );

        RequestHandle {
            id,
            result_rx,
            progress_rx,
            cancel,
            touch,
            deadline: Instant::now() + timeout,
        }
    }

    /// Resolve a waiter with its final result. A second resolution for
    /// the same id (a race with CANCEL_SENT, or a duplicate response from
    /// a misbehaving peer) is logged and dropped, never delivered twice
    /// (spec.md §5 "second responses are logged and dropped").
    pub fn resolve(&self, id: &RequestId, result: Result<serde_json::Value, EngineError>) {
        if let Some((_, mut waiter)) = self.table.remove(id) {
            if let Some(tx) = waiter.result_tx.take() {
                let _ = tx.send(result);
            }
        } else {
            trace!(?id, "response for unknown or already-resolved request id");
        }
    }

    /// Deliver a progress event to the waiter for `id`, if one is
    /// registered and was created with progress tracking.
    pub fn deliver_progress(&self, id: &RequestId, event: ProgressEvent) {
        if let Some(waiter) = self.table.get(id) {
            if let Some(tx) = &waiter.progress_tx {
                let _ = tx.send(event);
            }
        }
    }

    /// True if `id` still has a registered waiter (used to distinguish a
    /// stray response from one legitimately awaited).
    pub fn contains(&self, id: &RequestId) -> bool {
        self.table.contains_key(id)
    }

    /// Remove `id`'s entry without resolving it — used once the caller has
    /// already observed timeout/cancellation locally, so a late response
    /// finds nothing to resolve (spec.md §4.F "CANCEL_SENT").
    pub fn discard(&self, id: &RequestId) {
        self.table.remove(id);
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Drain every pending waiter with a closed-session error, used when
    /// the transport goes away (spec.md §7 "Recovery").
    pub fn drain_closed(&self) {
        let ids: Vec<RequestId> = self.table.iter().map(|e| e.key().clone()).collect();
        for id in ids {
            self.resolve(&id, Err(EngineError::Closed));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolves_once_and_drops_duplicates() {
        let table = PendingRequests::new();
        let id = RequestId::Number(1);
        let handle = table.register(id.clone(), Duration::from_secs(5), false);

        table.resolve(&id, Ok(serde_json::json!({"ok": true})));
        // Second resolution for the same id is a no-op (already removed).
        table.resolve(&id, Ok(serde_json::json!({"ok": false})));

        let result = handle.wait(Duration::from_secs(5)).await.unwrap();
        assert_eq!(result, serde_json::json!({"ok": true}));
    }

    #[tokio::test]
    async fn times_out_when_never_resolved() {
        let table = PendingRequests::new();
        let id = RequestId::Number(1);
        let handle = table.register(id, Duration::from_millis(20), false);
        let result = handle.wait(Duration::from_millis(20)).await;
        assert!(matches!(result, Err(EngineError::Timeout)));
    }

    #[tokio::test]
    async fn user_cancel_resolves_with_cancelled() {
        let table = PendingRequests::new();
        let id = RequestId::Number(1);
        let handle = table.register(id, Duration::from_secs(5), false);
        handle.cancel();
        let result = handle.wait(Duration::from_secs(5)).await;
        assert!(matches!(result, Err(EngineError::Cancelled)));
    }

    #[tokio::test]
    async fn progress_events_reach_the_handle() {
        let table = PendingRequests::new();
        let id = RequestId::Number(1);
        let mut handle = table.register(id.clone(), Duration::from_secs(5), true);
        table.deliver_progress(
            &id,
            ProgressEvent {
                progress: 25.0,
                total: Some(100.0),
                message: None,
            },
        );
        let event = handle.next_progress().await.unwrap();
        assert_eq!(event.progress, 25.0);
    }
}
