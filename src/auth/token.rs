//! Opaque bearer tokens for sessions and password resets.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand_core::{OsRng, RngCore};

/// Random bytes per token (256 bits).
pub const TOKEN_BYTES: usize = 32;

/// Generate a fresh token from the operating system's CSPRNG.
///
/// The result is URL-safe base64 without padding, so it can travel in a
/// cookie or a query string unescaped.
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_token_length() {
        // 32 bytes -> ceil(32 * 4 / 3) characters without padding
        assert_eq!(generate_token().len(), 43);
    }

    #[test]
    fn test_token_is_cookie_safe() {
        let token = generate_token();
        assert!(token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_tokens_are_unique() {
        let tokens: HashSet<String> = (0..1000).map(|_| generate_token()).collect();
        assert_eq!(tokens.len(), 1000);
    }
}
