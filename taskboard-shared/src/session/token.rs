/// Opaque session tokens
///
/// The token handed to the client is a capability: whoever holds it acts as
/// the session's user. It is never stored or logged. Storage and session
/// listings use the token's SHA-256 digest instead, the *session id*, which
/// can be shown to the user without granting anything.
///
/// # Format
///
/// 43 random base62 characters (about 256 bits).
///
/// # Example
///
/// ```
/// use taskboard_shared::session::token::SessionToken;
///
/// let token = SessionToken::generate();
/// assert_eq!(token.as_str().len(), 43);
/// assert_eq!(token.session_id().len(), 64);
/// assert_eq!(token.session_id(), SessionToken::from_raw(token.as_str()).session_id());
/// ```

use rand::Rng;
use sha2::{Digest, Sha256};
use std::fmt;

const TOKEN_LENGTH: usize = 43;
const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    /// Draws a new random token
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let token = (0..TOKEN_LENGTH)
            .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
            .collect();
        Self(token)
    }

    /// Wraps a token received from a client
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Hex SHA-256 digest of the token, the public session id
    pub fn session_id(&self) -> String {
        hash_token(&self.0)
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionToken(..)")
    }
}

fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_is_base62() {
        let token = SessionToken::generate();
        assert_eq!(token.as_str().len(), TOKEN_LENGTH);
        assert!(token.as_str().chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_tokens_are_unique() {
        assert_ne!(SessionToken::generate(), SessionToken::generate());
    }

    #[test]
    fn test_session_id_is_deterministic_digest() {
        let token = SessionToken::from_raw("abc");
        assert_eq!(
            token.session_id(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_debug_redacts_token() {
        let token = SessionToken::from_raw("secret-token");
        assert!(!format!("{:?}", token).contains("secret"));
    }
}
