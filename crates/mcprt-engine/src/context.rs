//! The context passed into an inbound handler: how it reports progress,
//! observes cancellation, and extends the deadline of any outbound request
//! it makes in turn (spec.md §4.F "Progress", §5 "Timeouts").

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use mcprt_wire::ids::ProgressToken;

use crate::engine::EngineHandle;

/// Handed to every dispatched handler. Cloning is cheap: it shares the
/// cancellation token and progress-token with the original request.
#[derive(Clone)]
pub struct RequestContext {
    progress_token: Option<ProgressToken>,
    cancel: CancellationToken,
    engine: EngineHandle,
    session_id: Option<String>,
}

impl RequestContext {
    pub(crate) fn new(
        progress_token: Option<ProgressToken>,
        cancel: CancellationToken,
        engine: EngineHandle,
        session_id: Option<String>,
    ) -> Self {
        Self {
            progress_token,
            cancel,
            engine,
            session_id,
        }
    }

    /// The session this request arrived on, if the transport has one
    /// (streamable-HTTP does; stdio does not).
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// True once the requester has sent `notifications/cancelled` for this
    /// request, or the session has closed. Handlers should check this
    /// periodically during long-running work and return promptly.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves when this request is cancelled. Useful in `tokio::select!`
    /// alongside the handler's own I/O.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await;
    }

    /// Emit a progress update. Dropped silently if the requester did not
    /// attach a `_meta.progressToken` (spec.md §4.F). `progress` must be
    /// monotonically non-decreasing across calls for the same request;
    /// the engine does not itself enforce this on inbound handlers (it
    /// would require shared state per in-flight handler with no upside
    /// over the handler simply tracking its own last-reported value).
    pub async fn report_progress(&self, progress: f64, total: Option<f64>, message: Option<String>) {
        if let Some(token) = &self.progress_token {
            self.engine
                .send_progress(token.clone(), progress, total, message)
                .await;
        }
    }

    /// Record the protocol version negotiated by this request (meant for
    /// the `initialize` handler only) so the transport can start attaching
    /// it to subsequent outbound frames (spec.md §4.E, §4.G server role).
    pub async fn set_protocol_version(&self, version: &str) {
        self.engine.set_protocol_version(version).await;
    }

    /// Extend the deadline of an outbound request this handler itself
    /// issued, keyed by the handle returned from [`crate::Engine::request`].
    /// Exposed here (rather than only on the handle) so a handler that
    /// forwards its own progress token can thread a single touch point
    /// through nested calls.
    pub fn touch_handle(&self, handle: &crate::pending::TouchHandle) {
        handle.touch();
    }
}
