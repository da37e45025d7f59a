//! AEAD sealing of JSON values into URL-safe tokens
//!
//! Token layout is `nonce(12) || tag(16) || ciphertext`, base64url without
//! padding, sealed with AES-256-GCM under the key from [`derive_key`].

use std::fmt;
use std::sync::Arc;

use ring::aead::{AES_256_GCM, Aad, LessSafeKey, NONCE_LEN, Nonce, UnboundKey};
use serde::{Serialize, de::DeserializeOwned};

use crate::config::SessionSecret;
use crate::errors::SessionError;
use crate::utils::{base64url_decode, base64url_encode, random_bytes};

use super::key::{SESSION_KEY_CONTEXT, derive_key};

const TAG_LEN: usize = 16;

/// Holds the derived session key for the lifetime of the process.
///
/// A rotated secret means a new `Sealer`; tokens sealed under the old one
/// then fail to open and read as "no session".
#[derive(Clone)]
pub struct Sealer {
    key: Arc<LessSafeKey>,
}

impl fmt::Debug for Sealer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sealer").finish_non_exhaustive()
    }
}

impl Sealer {
    pub fn new(secret: &SessionSecret) -> Result<Self, SessionError> {
        let key_bytes = derive_key(secret, SESSION_KEY_CONTEXT)?;
        let unbound = UnboundKey::new(&AES_256_GCM, &key_bytes)
            .map_err(|_| SessionError::Crypto("Invalid AES-256-GCM key".to_string()))?;
        Ok(Self {
            key: Arc::new(LessSafeKey::new(unbound)),
        })
    }

    /// Serializes `value` to JSON and seals it under a fresh random nonce.
    pub fn seal<T: Serialize + ?Sized>(&self, value: &T) -> Result<String, SessionError> {
        let mut in_out =
            serde_json::to_vec(value).map_err(|e| SessionError::Serialize(e.to_string()))?;

        let nonce_bytes = random_bytes::<NONCE_LEN>()?;
        let tag = self
            .key
            .seal_in_place_separate_tag(
                Nonce::assume_unique_for_key(nonce_bytes),
                Aad::empty(),
                &mut in_out,
            )
            .map_err(|_| SessionError::Crypto("Failed to seal session".to_string()))?;

        let mut payload = Vec::with_capacity(NONCE_LEN + TAG_LEN + in_out.len());
        payload.extend_from_slice(&nonce_bytes);
        payload.extend_from_slice(tag.as_ref());
        payload.extend_from_slice(&in_out);

        Ok(base64url_encode(&payload))
    }

    /// Opens a token produced by [`Sealer::seal`].
    ///
    /// Any failure (bad encoding, short payload, authentication failure,
    /// unexpected JSON) yields `None`.
    pub fn unseal<T: DeserializeOwned>(&self, token: &str) -> Option<T> {
        let Ok(payload) = base64url_decode(token) else {
            tracing::debug!("Session token is not valid base64url");
            return None;
        };
        if payload.len() < NONCE_LEN + TAG_LEN {
            tracing::debug!("Session token too short: {} bytes", payload.len());
            return None;
        }

        let (nonce, rest) = payload.split_at(NONCE_LEN);
        let (tag, ciphertext) = rest.split_at(TAG_LEN);

        // ring expects ciphertext || tag
        let mut in_out = Vec::with_capacity(ciphertext.len() + TAG_LEN);
        in_out.extend_from_slice(ciphertext);
        in_out.extend_from_slice(tag);

        let nonce = Nonce::try_assume_unique_for_key(nonce).ok()?;
        let Ok(plaintext) = self.key.open_in_place(nonce, Aad::empty(), &mut in_out) else {
            tracing::debug!("Session token failed authentication");
            return None;
        };

        match serde_json::from_slice(plaintext) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("Authenticated session payload did not parse: {}", e);
                None
            }
        }
    }
}

/// One-shot seal that derives the key on every call.
pub fn seal_json<T: Serialize + ?Sized>(
    secret: &SessionSecret,
    value: &T,
) -> Result<String, SessionError> {
    Sealer::new(secret)?.seal(value)
}

/// One-shot unseal that derives the key on every call.
pub fn unseal_json<T: DeserializeOwned>(secret: &SessionSecret, token: &str) -> Option<T> {
    Sealer::new(secret).ok()?.unseal(token)
}
