use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::types::PkceChallenge;

const VERIFIER_LEN: usize = 64;
const STATE_LEN: usize = 32;

/// Generates an RFC 7636 PKCE verifier/challenge pair (`S256`).
pub fn generate_pkce() -> PkceChallenge {
    let verifier = random_url_safe_string(VERIFIER_LEN);
    let challenge = URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()));
    PkceChallenge { verifier, challenge }
}

/// Generates an opaque `state` value for CSRF protection during the
/// authorization-code round trip.
pub fn generate_state() -> String {
    random_url_safe_string(STATE_LEN)
}

fn random_url_safe_string(byte_len: usize) -> String {
    let mut bytes = vec![0u8; byte_len];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn challenge_is_sha256_of_verifier() {
        let pkce = generate_pkce();
        let expected = URL_SAFE_NO_PAD.encode(Sha256::digest(pkce.verifier.as_bytes()));
        assert_eq!(pkce.challenge, expected);
    }

    #[test]
    fn successive_calls_are_not_equal() {
        assert_ne!(generate_pkce().verifier, generate_pkce().verifier);
        assert_ne!(generate_state(), generate_state());
    }
}
