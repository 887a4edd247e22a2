//! ID generation utilities with prefix support
//!
//! Entity ids are generated with at least 96 bits of entropy and are
//! URL-safe, in the form `{prefix}_{random_string}`.

use base64::{Engine, prelude::BASE64_URL_SAFE_NO_PAD};
use rand::{TryRngCore, rngs::OsRng};

/// Generate a prefixed ID with 96 bits of entropy.
///
/// # Panics
///
/// Panics if the OS random number generator fails, which indicates a
/// system-level entropy failure no security-sensitive operation should
/// survive.
pub fn generate_prefixed_id(prefix: &str) -> String {
    let mut bytes = [0u8; 12];
    OsRng
        .try_fill_bytes(&mut bytes)
        .expect("OS RNG failure - system entropy source unavailable");

    let encoded = BASE64_URL_SAFE_NO_PAD.encode(bytes);

    format!("{prefix}_{encoded}")
}

/// Validate that a prefixed ID has the expected format.
pub fn validate_prefixed_id(id: &str, expected_prefix: &str) -> bool {
    let Some(random_part) = id.strip_prefix(&format!("{expected_prefix}_")) else {
        return false;
    };

    match BASE64_URL_SAFE_NO_PAD.decode(random_part) {
        Ok(decoded) => decoded.len() >= 12, // at least 96 bits
        Err(_) => false,
    }
}
