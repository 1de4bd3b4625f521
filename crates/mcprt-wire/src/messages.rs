//! The method catalog: one name per request/notification direction,
//! per spec.md §3.
//!
//! The source this was ported from matched incoming envelopes by looking
//! up `method` against a registry of classes (spec.md §9 "Dynamic-dispatch
//! message unions"). We replace that with a plain `&str` match against the
//! tables below — callers own the `method` string from the envelope and
//! use these helpers to decide how to decode `params`/`result`.

/// Every request method, tagged with which direction may send it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    ClientToServer,
    ServerToClient,
    Either,
}

/// Requests defined by the protocol (spec.md §3 "Message catalog").
pub const REQUEST_METHODS: &[(&str, Direction)] = &[
    ("initialize", Direction::ClientToServer),
    ("ping", Direction::Either),
    ("resources/list", Direction::ClientToServer),
    ("resources/templates/list", Direction::ClientToServer),
    ("resources/read", Direction::ClientToServer),
    ("resources/subscribe", Direction::ClientToServer),
    ("resources/unsubscribe", Direction::ClientToServer),
    ("prompts/list", Direction::ClientToServer),
    ("prompts/get", Direction::ClientToServer),
    ("tools/list", Direction::ClientToServer),
    ("tools/call", Direction::ClientToServer),
    ("logging/setLevel", Direction::ClientToServer),
    ("completion/complete", Direction::ClientToServer),
    ("sampling/createMessage", Direction::ServerToClient),
    ("elicitation/create", Direction::ServerToClient),
    ("roots/list", Direction::ServerToClient),
];

/// Notifications defined by the protocol.
pub const NOTIFICATION_METHODS: &[(&str, Direction)] = &[
    ("notifications/initialized", Direction::ClientToServer),
    ("notifications/cancelled", Direction::Either),
    ("notifications/progress", Direction::Either),
    ("notifications/message", Direction::ServerToClient),
    (
        "notifications/resources/updated",
        Direction::ServerToClient,
    ),
    (
        "notifications/resources/list_changed",
        Direction::ServerToClient,
    ),
    (
        "notifications/prompts/list_changed",
        Direction::ServerToClient,
    ),
    (
        "notifications/tools/list_changed",
        Direction::ServerToClient,
    ),
    (
        "notifications/roots/list_changed",
        Direction::ClientToServer,
    ),
];

/// Notification methods that should coalesce under rapid-fire bursts
/// (spec.md §4.F "Notification debouncing"). Exposed as a default; callers
/// may override via engine configuration per the open question in
/// spec.md §9.
pub const DEFAULT_DEBOUNCED_METHODS: &[&str] = &[
    "notifications/resources/list_changed",
    "notifications/tools/list_changed",
    "notifications/prompts/list_changed",
    "notifications/roots/list_changed",
];

pub fn is_known_request_method(method: &str) -> bool {
    REQUEST_METHODS.iter().any(|(m, _)| *m == method)
}

pub fn is_known_notification_method(method: &str) -> bool {
    NOTIFICATION_METHODS.iter().any(|(m, _)| *m == method)
}

pub fn request_direction(method: &str) -> Option<Direction> {
    REQUEST_METHODS
        .iter()
        .find(|(m, _)| *m == method)
        .map(|(_, d)| *d)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initialize_is_client_to_server() {
        assert_eq!(
            request_direction("initialize"),
            Some(Direction::ClientToServer)
        );
    }

    #[test]
    fn ping_is_bidirectional() {
        assert_eq!(request_direction("ping"), Some(Direction::Either));
    }

    #[test]
    fn unknown_method_has_no_direction() {
        assert_eq!(request_direction("tools/explode"), None);
    }
}
