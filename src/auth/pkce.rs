//! PKCE code verifier and challenge

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::Rng;
use sha2::{Digest, Sha256};

/// PKCE code challenge data
#[derive(Debug, Clone)]
pub struct PkceChallenge {
    /// Code verifier (random string, kept by the client)
    pub verifier: String,
    /// Code challenge (SHA-256 hash of verifier, base64url encoded)
    pub challenge: String,
}

impl PkceChallenge {
    /// Generate a new PKCE pair from 32 random bytes
    #[must_use]
    pub fn generate() -> Self {
        let mut entropy = [0u8; 32];
        rand::rng().fill(&mut entropy);

        // 32 bytes base64url encoded gives a 43 char verifier
        let verifier = URL_SAFE_NO_PAD.encode(entropy);
        let challenge = Self::challenge_for(&verifier);

        Self {
            verifier,
            challenge,
        }
    }

    /// BASE64URL(SHA256(verifier))
    #[must_use]
    pub fn challenge_for(verifier: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(verifier.as_bytes());
        URL_SAFE_NO_PAD.encode(hasher.finalize())
    }
}
