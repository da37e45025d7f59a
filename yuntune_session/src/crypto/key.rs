//! Purpose-bound key derivation
//!
//! Keys are expanded from the server secret with HKDF-SHA256. The secret is
//! expected to be machine generated, so a single extract/expand is enough and
//! no password hashing is involved.

use ring::hkdf;

use crate::config::SessionSecret;
use crate::errors::SessionError;

/// HKDF salt identifying the session format version.
pub const SESSION_KEY_LABEL: &str = "yuntune-session-v1";
/// HKDF info for the session cookie encryption key.
pub const SESSION_KEY_CONTEXT: &str = "aes-256-gcm";

const KEY_LEN: usize = 32;

struct KeyLen(usize);

impl hkdf::KeyType for KeyLen {
    fn len(&self) -> usize {
        self.0
    }
}

/// Derives a 256-bit key for `context` from the server secret.
///
/// Different contexts yield independent keys from the same secret.
pub fn derive_key(secret: &SessionSecret, context: &str) -> Result<[u8; 32], SessionError> {
    let salt = hkdf::Salt::new(hkdf::HKDF_SHA256, SESSION_KEY_LABEL.as_bytes());
    let prk = salt.extract(secret.as_bytes());
    let info = [context.as_bytes()];
    let okm = prk
        .expand(&info, KeyLen(KEY_LEN))
        .map_err(|_| SessionError::Crypto("HKDF expand failed".to_string()))?;

    let mut key = [0u8; KEY_LEN];
    okm.fill(&mut key)
        .map_err(|_| SessionError::Crypto("HKDF fill failed".to_string()))?;
    Ok(key)
}
