//! URL scheme allow-listing, enforced on every URL field the OAuth
//! subsystem accepts from a client: redirect URIs at registration and
//! authorization time, and the display URIs (`client_uri`, `logo_uri`,
//! `tos_uri`, `policy_uri`) dynamic registration echoes back (spec.md §3
//! invariants, §4.H "reject ... schemes of `javascript:`, `data:`,
//! `vbscript:`... enforced across all URL fields everywhere in the
//! subsystem"). Grounded in the teacher's scheme-rejection style in
//! `turbomcp-auth::ssrf` (there applied to fetch targets; here to
//! client-supplied redirect/display URIs).

const BLOCKED_SCHEMES: &[&str] = &["javascript", "data", "vbscript"];

#[derive(Debug, Clone, thiserror::Error)]
#[error("unsafe URL scheme \"{0}\"")]
pub struct UnsafeUrlScheme(pub String);

/// Rejects URLs whose scheme is in the blocked set. Unparseable strings
/// are rejected too — a redirect URI must be an absolute URI per RFC
/// 6749 §3.1.2.
pub fn check_url(raw: &str) -> Result<(), UnsafeUrlScheme> {
    let parsed = url::Url::parse(raw).map_err(|_| UnsafeUrlScheme(raw.to_string()))?;
    let scheme = parsed.scheme().to_ascii_lowercase();
    if BLOCKED_SCHEMES.contains(&scheme.as_str()) {
        return Err(UnsafeUrlScheme(raw.to_string()));
    }
    Ok(())
}

pub fn check_all<'a>(urls: impl IntoIterator<Item = &'a str>) -> Result<(), UnsafeUrlScheme> {
    for url in urls {
        check_url(url)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_https_and_loopback_http() {
        assert!(check_url("https://app.example.com/cb").is_ok());
        assert!(check_url("http://localhost:3000/cb").is_ok());
    }

    #[test]
    fn rejects_javascript_data_and_vbscript_schemes() {
        assert!(check_url("javascript:alert(1)").is_err());
        assert!(check_url("data:text/html,<script>alert(1)</script>").is_err());
        assert!(check_url("vbscript:msgbox(1)").is_err());
        assert!(check_url("JavaScript:alert(1)").is_err());
    }

    #[test]
    fn rejects_unparseable_urls() {
        assert!(check_url("not a url").is_err());
    }

    #[test]
    fn check_all_stops_at_first_offender() {
        assert!(check_all(["https://ok.example/cb", "javascript:evil()"]).is_err());
        assert!(check_all(["https://ok.example/cb", "https://also-ok.example/cb"]).is_ok());
    }
}
