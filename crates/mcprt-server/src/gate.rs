//! The capability gate for a server session (spec.md §4.G "Server role",
//! mirror image of `mcprt-client`'s `ClientGate`): `local` is what we
//! advertised (governs inbound `tools`/`resources`/`prompts`/... dispatch),
//! `peer` is what the client advertised back (governs our outbound
//! `sampling`/`elicitation`/`roots` calls).

use parking_lot::RwLock;

use mcprt_engine::CapabilityGate;
use mcprt_wire::capabilities::{
    required_client_capability, required_server_capability, ClientCapabilities, ServerCapabilities,
};

pub(crate) struct ServerGate {
    pub(crate) local: ServerCapabilities,
    pub(crate) peer: RwLock<ClientCapabilities>,
}

impl CapabilityGate for ServerGate {
    fn required(&self, method: &str) -> Option<&'static str> {
        required_server_capability(method).or_else(|| required_client_capability(method))
    }

    fn local_satisfies(&self, cap: &str) -> bool {
        self.local.satisfies(cap)
    }

    fn peer_satisfies(&self, cap: &str) -> bool {
        self.peer.read().satisfies(cap)
    }
}
