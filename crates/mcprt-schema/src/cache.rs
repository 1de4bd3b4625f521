//! Per-session cache of each tool's declared `outputSchema`, populated from
//! `tools/list` results so a later `tools/call` response can be validated
//! without re-fetching the tool list (spec.md §4.I).
//!
//! Keyed per session rather than globally: a client connected to two
//! servers must not let one server's `echo` tool validate against the
//! other's schema for a tool of the same name.

use dashmap::DashMap;
use mcprt_wire::tools::ObjectSchema;

#[derive(Debug, Default)]
pub struct ToolOutputSchemaCache {
    by_session: DashMap<String, DashMap<String, ObjectSchema>>,
}

impl ToolOutputSchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace all known schemas for `session_id`, e.g. after a fresh
    /// `tools/list` page. Tools without an `outputSchema` are simply
    /// absent from the resulting cache entries.
    pub fn populate(
        &self,
        session_id: &str,
        tools: impl IntoIterator<Item = (String, Option<ObjectSchema>)>,
    ) {
        let session_cache = self
            .by_session
            .entry(session_id.to_string())
            .or_default();
        for (name, schema) in tools {
            match schema {
                Some(schema) => {
                    session_cache.insert(name, schema);
                }
                None => {
                    session_cache.remove(&name);
                }
            }
        }
    }

    pub fn get(&self, session_id: &str, tool_name: &str) -> Option<ObjectSchema> {
        self.by_session
            .get(session_id)?
            .get(tool_name)
            .map(|entry| entry.clone())
    }

    /// Drop every schema cached for a session, e.g. on disconnect.
    pub fn clear_session(&self, session_id: &str) {
        self.by_session.remove(session_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schemas_from_different_sessions_do_not_leak() {
        let cache = ToolOutputSchemaCache::new();
        let mut schema_a = ObjectSchema::default();
        schema_a.required = Some(vec!["a".to_string()]);
        cache.populate("session-a", [("echo".to_string(), Some(schema_a))]);
        cache.populate("session-b", [("echo".to_string(), None)]);

        assert!(cache.get("session-a", "echo").is_some());
        assert!(cache.get("session-b", "echo").is_none());
    }

    #[test]
    fn clearing_a_session_drops_its_schemas() {
        let cache = ToolOutputSchemaCache::new();
        cache.populate(
            "session-a",
            [("echo".to_string(), Some(ObjectSchema::default()))],
        );
        cache.clear_session("session-a");
        assert!(cache.get("session-a", "echo").is_none());
    }
}
