//! Envelope shape validation and JSON-Schema-subset validation for tool
//! output, plus the per-session cache that makes the latter possible
//! without a round-trip on every `tools/call`.

pub mod cache;
pub mod envelope;
pub mod error;
pub mod schema;

pub use cache::ToolOutputSchemaCache;
pub use envelope::{validate_envelope, EnvelopeKind};
pub use error::{SchemaError, SchemaErrors};
pub use schema::validate;
