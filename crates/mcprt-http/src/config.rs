//! Streamable-HTTP transport configuration (spec.md §6 "HTTP bind").

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
    /// Path both POST and SSE GET share, e.g. `/mcp`.
    pub endpoint_path: String,
    /// Sessions with no traffic for this long are evicted.
    pub session_idle_timeout: Duration,
    /// Interval between `:ping` SSE keepalive comments.
    pub sse_keepalive: Duration,
    /// `Host` header allow-list, DNS-rebinding protection (spec.md §4.E
    /// "Security"). Empty means "allow any host" — fine for local dev,
    /// not for a public deployment.
    pub allowed_hosts: Vec<String>,
    pub max_body_size: usize,
    /// How long a POST carrying a request waits for that request's own
    /// response before falling back to `202` and letting SSE deliver it.
    pub sync_response_timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            endpoint_path: "/mcp".to_string(),
            session_idle_timeout: Duration::from_secs(30 * 60),
            sse_keepalive: Duration::from_secs(30),
            allowed_hosts: Vec::new(),
            max_body_size: 4 * 1024 * 1024,
            sync_response_timeout: Duration::from_secs(30),
        }
    }
}

impl HttpConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn host_allowed(&self, host_header: Option<&str>) -> bool {
        if self.allowed_hosts.is_empty() {
            return true;
        }
        let Some(host) = host_header else {
            return false;
        };
        let bare = host.split(':').next().unwrap_or(host);
        self.allowed_hosts.iter().any(|h| h == bare || h == host)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_allow_list_accepts_anything() {
        let cfg = HttpConfig::default();
        assert!(cfg.host_allowed(Some("evil.example")));
    }

    #[test]
    fn non_empty_allow_list_rejects_unknown_host() {
        let mut cfg = HttpConfig::default();
        cfg.allowed_hosts = vec!["localhost".to_string()];
        assert!(cfg.host_allowed(Some("localhost:8080")));
        assert!(!cfg.host_allowed(Some("evil.example")));
        assert!(!cfg.host_allowed(None));
    }
}
