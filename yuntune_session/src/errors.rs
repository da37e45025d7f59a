use thiserror::Error;

use crate::utils::UtilError;

/// Errors that can cross the session boundary.
///
/// Decryption and parse failures never show up here: they are folded into
/// "no session" by [`crate::unseal_json`] and [`crate::SessionManager::read`].
#[derive(Debug, Error, Clone)]
pub enum SessionError {
    /// Missing or unusable configuration, fatal at startup
    #[error("Configuration error: {0}")]
    Config(String),

    /// Sealed token needs more cookie fragments than allowed
    #[error("Session too large: {required} fragments required, {max} allowed")]
    Capacity { required: usize, max: usize },

    #[error("Serialization error: {0}")]
    Serialize(String),

    #[error("Crypto error: {0}")]
    Crypto(String),

    #[error("Chunk error: {0}")]
    Chunk(String),

    #[error("Header error: {0}")]
    HeaderError(String),

    /// Error from utils operations
    #[error("Utils error: {0}")]
    Utils(#[from] UtilError),
}
