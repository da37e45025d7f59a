//! Upstream credential extraction
//!
//! Turns upstream `Set-Cookie` headers or embedded cookie strings into the
//! allow-listed [`crate::UpstreamCredentials`] kept in the session.

mod credentials;
mod set_cookie;

pub use credentials::{CredentialExtractor, DEFAULT_ALLOWED_CREDENTIALS, format_cookie_header};
pub use set_cookie::{set_cookie_headers, split_folded_set_cookie};
