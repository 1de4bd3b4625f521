//! `ping` request and the `notifications/initialized` handshake notification
//! (spec.md §3 "Lifecycle").

use serde::{Deserialize, Serialize};

/// `ping` carries no meaningful params; either side may send it at any
/// time after the connection is open, including mid-handshake.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PingRequest {}

/// Sent by the client once it has processed the `initialize` response,
/// telling the server normal operation may begin.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct InitializedNotification {}
