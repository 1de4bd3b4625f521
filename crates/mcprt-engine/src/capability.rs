//! Capability gating (spec.md §8 invariant 4): a pluggable seam so the
//! role layer (`mcprt-client`/`mcprt-server`) can tell the engine which
//! capability a method needs and whether local/peer advertised it,
//! without the engine itself knowing whether it's playing client or
//! server this session.

/// Implemented once per role (`ClientSession`, `ServerSession`) and handed
/// to the engine at construction.
pub trait CapabilityGate: Send + Sync {
    /// The capability name required to call/handle `method`, if any.
    fn required(&self, method: &str) -> Option<&'static str>;

    /// Does *this side's own* advertised capability set satisfy `cap`?
    /// Used to gate inbound dispatch (spec.md §4.F "handle-side gate").
    fn local_satisfies(&self, cap: &str) -> bool;

    /// Does the *peer's* advertised capability set satisfy `cap`?
    /// Used to gate outbound requests (spec.md §4.F "request-side gate").
    fn peer_satisfies(&self, cap: &str) -> bool;
}

/// No gating at all — used before a handshake has populated capability
/// sets, or by tests that don't care about this invariant.
pub struct NoGate;

impl CapabilityGate for NoGate {
    fn required(&self, _method: &str) -> Option<&'static str> {
        None
    }

    fn local_satisfies(&self, _cap: &str) -> bool {
        true
    }

    fn peer_satisfies(&self, _cap: &str) -> bool {
        true
    }
}
