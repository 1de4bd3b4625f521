//! PKCE (RFC 7636) verification — spec.md §3 "PKCE `code_verifier`" and
//! the soundness invariant in §8: token issuance succeeds iff
//! `base64url(sha256(code_verifier)) == stored code_challenge`.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Computes `BASE64URL(SHA256(verifier))` with no padding, per RFC 7636
/// §4.2's `S256` transform.
pub fn challenge_from_verifier(verifier: &str) -> String {
    let digest = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}

/// Constant-time comparison against the stored challenge — timing leaks
/// here would let an attacker brute-force the verifier byte by byte.
pub fn verify(verifier: &str, stored_challenge: &str) -> bool {
    let computed = challenge_from_verifier(verifier);
    computed.as_bytes().ct_eq(stored_challenge.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rfc7636_appendix_b_vector() {
        // RFC 7636 Appendix B's worked example.
        let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
        let challenge = "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM";
        assert!(verify(verifier, challenge));
    }

    #[test]
    fn mismatched_verifier_fails() {
        assert!(!verify("wrong-verifier", &challenge_from_verifier("right-verifier")));
    }

    #[test]
    fn round_trips_through_challenge_from_verifier() {
        let verifier = "a-random-verifier-of-sufficient-entropy-1234567890";
        let challenge = challenge_from_verifier(verifier);
        assert!(verify(verifier, &challenge));
    }
}
