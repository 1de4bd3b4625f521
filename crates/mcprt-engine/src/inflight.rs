//! The inbound-request table: id → running handler task, so a
//! `notifications/cancelled` naming that id can signal it (spec.md §4.F
//! "Request path (inbound)" step 6).

use std::time::Instant;

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;

use mcprt_wire::ids::RequestId;

struct Running {
    cancel: CancellationToken,
    #[allow(dead_code)] // surfaced for future observability/metrics hooks
    started_at: Instant,
}

#[derive(Default)]
pub struct InflightRequests {
    table: DashMap<RequestId, Running>,
}

impl InflightRequests {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a dispatched handler, returning the token its task should
    /// observe for cooperative cancellation.
    pub fn start(&self, id: RequestId) -> CancellationToken {
        let cancel = CancellationToken::new();
        self.table.insert(
            id,
            Running {
                cancel: cancel.clone(),
                started_at: Instant::now(),
            },
        );
        cancel
    }

    /// A `notifications/cancelled` arrived naming `id`: fire its token.
    /// Repeated cancellation for the same id is idempotent — firing an
    /// already-cancelled token is a no-op (spec.md §8 invariant 9).
    pub fn cancel(&self, id: &RequestId) {
        if let Some(entry) = self.table.get(id) {
            entry.cancel.cancel();
        }
    }

    /// A request is cancelled if its handler either observed cancellation
    /// or has already finished and been removed (so: "no response should
    /// be sent" applies only while the entry is still live AND cancelled).
    pub fn is_cancelled(&self, id: &RequestId) -> bool {
        self.table
            .get(id)
            .is_some_and(|entry| entry.cancel.is_cancelled())
    }

    /// Mark a handler finished, e.g. just before sending its response.
    pub fn finish(&self, id: &RequestId) {
        self.table.remove(id);
    }
}
