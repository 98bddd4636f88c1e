// guard/token.rs - elevation and impersonation token helpers

use rand::{distributions::Alphanumeric, Rng};
use sha2::{Digest, Sha256};

/// Length of a raw step-up token. 48 alphanumerics is ~285 bits of
/// entropy, far past guessable for a window measured in minutes.
pub const TOKEN_LEN: usize = 48;

/// SHA-256 digest of a raw token, lowercase hex.
///
/// Only digests ever reach storage or comparison; a leaked sessions
/// table contains nothing that authorizes anything.
pub fn hash_token(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Mint a fresh random token. Returns `(raw, hash)`: the raw value is
/// shown to the caller exactly once, the hash is what the store keeps.
pub fn generate_token() -> (String, String) {
    let raw: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LEN)
        .map(char::from)
        .collect();
    let hash = hash_token(&raw);
    (raw, hash)
}
