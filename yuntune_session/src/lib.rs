//! yuntune-session - Encrypted, chunked cookie sessions for a music-service BFF
//!
//! The server keeps no session state. Everything, including the upstream
//! service's credentials, lives in a JSON value sealed with AES-256-GCM and
//! split across as many `HttpOnly` cookies as needed.
//!
//! ```text
//! request  -> SessionManager::read  -> reassemble -> unseal -> SessionData
//! upstream -> CredentialExtractor -> merge -> SessionManager::write
//!          -> seal -> chunk -> Set-Cookie fragments
//! ```
//!
//! Invalid, tampered, or foreign cookies always read as "no session".

mod config;
mod cookie;
mod crypto;
mod errors;
mod session;
mod upstream;
mod utils;

pub use config::{
    DEFAULT_COOKIE_PREFIX, DEFAULT_MAX_FRAGMENT_BYTES, DEFAULT_MAX_FRAGMENTS, SameSite,
    SessionConfig, SessionSecret,
};
pub use cookie::{CookieJar, RequestCookieJar, SetCookie, chunk_by_bytes, reassemble};
pub use crypto::{SESSION_KEY_CONTEXT, SESSION_KEY_LABEL, Sealer, derive_key, seal_json, unseal_json};
pub use errors::SessionError;
pub use session::{SESSION_VERSION, SessionData, SessionManager, SessionUser, UpstreamCredentials};
pub use upstream::{
    CredentialExtractor, DEFAULT_ALLOWED_CREDENTIALS, format_cookie_header, set_cookie_headers,
    split_folded_set_cookie,
};
pub use utils::UtilError;
