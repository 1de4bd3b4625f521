//! Request identifiers, progress tokens, and pagination cursors.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A JSON-RPC request id: either a string or an integer.
///
/// Unique per direction while a request is in flight (spec.md §3). Never
/// reused until the in-flight request has resolved.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// String-valued id
    String(String),
    /// Integer-valued id
    Number(i64),
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "{s}"),
            Self::Number(n) => write!(f, "{n}"),
        }
    }
}

impl From<i64> for RequestId {
    fn from(n: i64) -> Self {
        Self::Number(n)
    }
}

impl From<String> for RequestId {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

/// A response id, which may be `null` when the request that produced a
/// parse error could not even be identified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResponseId(pub Option<RequestId>);

impl ResponseId {
    /// Wrap a known request id.
    pub fn from_request(id: RequestId) -> Self {
        Self(Some(id))
    }

    /// The `null` id used for parse errors that precede id extraction.
    pub const fn null() -> Self {
        Self(None)
    }

    /// Borrow the inner id, if any.
    pub fn as_request_id(&self) -> Option<&RequestId> {
        self.0.as_ref()
    }

    /// True if this is the `null` parse-error id.
    pub const fn is_null(&self) -> bool {
        self.0.is_none()
    }
}

/// Progress token: requester-chosen, embedded in `params._meta.progressToken`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProgressToken {
    /// String-valued token
    String(String),
    /// Integer-valued token
    Number(i64),
}

impl From<&RequestId> for ProgressToken {
    fn from(id: &RequestId) -> Self {
        match id {
            RequestId::String(s) => Self::String(s.clone()),
            RequestId::Number(n) => Self::Number(*n),
        }
    }
}

/// Opaque, non-empty pagination cursor.
pub type Cursor = String;
