//! Opaque single-use tokens.
//!
//! The raw value goes to the recipient (email link, client storage); only its
//! SHA-256 digest is ever persisted.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Digest;
use sha2::Sha256;

/// Size of secure tokens in bytes (256 bits of entropy).
pub const SECURE_TOKEN_BYTES: usize = 32;

/// Generate a cryptographically secure token.
///
/// Returns a URL-safe base64 string (no padding) of 32 random bytes drawn
/// from the operating system CSPRNG, 43 characters long.
pub fn generate_secure_token() -> String {
    let mut bytes = [0u8; SECURE_TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Hash a token using SHA-256, hex encoded.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}
