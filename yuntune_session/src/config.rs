//! Session configuration
//!
//! Everything the session layer needs is carried by [`SessionConfig`] and handed
//! to [`crate::SessionManager::new`] explicitly, so tests can use a throwaway
//! secret without touching process-wide state.

use std::env;
use std::fmt;
use std::str::FromStr;

use crate::errors::SessionError;

pub const DEFAULT_COOKIE_PREFIX: &str = "__Host-yuntune_s";
/// Per-fragment ceiling, leaving room for the name and attributes under the
/// common 4096-byte browser limit.
pub const DEFAULT_MAX_FRAGMENT_BYTES: usize = 3600;
pub const DEFAULT_MAX_FRAGMENTS: usize = 10;

/// Long-term server secret the session keys are derived from.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionSecret(String);

impl SessionSecret {
    /// Blank secrets are rejected.
    pub fn new(secret: impl Into<String>) -> Result<Self, SessionError> {
        let secret = secret.into();
        if secret.trim().is_empty() {
            return Err(SessionError::Config(
                "SESSION_SECRET must not be empty".to_string(),
            ));
        }
        Ok(Self(secret))
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Debug for SessionSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionSecret(<redacted>)")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SameSite {
    Strict,
    #[default]
    Lax,
    None,
}

impl SameSite {
    pub fn as_str(&self) -> &'static str {
        match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        }
    }
}

impl fmt::Display for SameSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub(crate) secret: SessionSecret,
    pub(crate) cookie_prefix: String,
    pub(crate) max_fragment_bytes: usize,
    pub(crate) max_fragments: usize,
    pub(crate) secure: bool,
    pub(crate) same_site: SameSite,
    pub(crate) path: String,
    pub(crate) max_age: Option<u64>,
}

impl SessionConfig {
    pub fn new(secret: SessionSecret) -> Self {
        Self {
            secret,
            cookie_prefix: DEFAULT_COOKIE_PREFIX.to_string(),
            max_fragment_bytes: DEFAULT_MAX_FRAGMENT_BYTES,
            max_fragments: DEFAULT_MAX_FRAGMENTS,
            secure: true,
            same_site: SameSite::Lax,
            path: "/".to_string(),
            max_age: None,
        }
    }

    /// Builds a configuration from environment variables.
    ///
    /// `SESSION_SECRET` is required. The optional knobs are
    /// `SESSION_COOKIE_PREFIX`, `SESSION_COOKIE_MAX_BYTES`,
    /// `SESSION_COOKIE_MAX_FRAGMENTS`, `SESSION_COOKIE_SECURE` and
    /// `SESSION_COOKIE_MAX_AGE`; values that fail to parse fall back to the
    /// defaults.
    pub fn from_env() -> Result<Self, SessionError> {
        let secret = env::var("SESSION_SECRET").map_err(|_| {
            SessionError::Config("Missing required env: SESSION_SECRET".to_string())
        })?;
        Self::new(SessionSecret::new(secret)?).with_env_overrides()
    }

    /// Applies the optional `SESSION_COOKIE_*` variables on top of `self`
    /// and validates the result.
    pub fn with_env_overrides(mut self) -> Result<Self, SessionError> {
        if let Ok(prefix) = env::var("SESSION_COOKIE_PREFIX") {
            if !prefix.trim().is_empty() {
                self.cookie_prefix = prefix;
            }
        }
        if let Some(bytes) = parse_env("SESSION_COOKIE_MAX_BYTES") {
            self.max_fragment_bytes = bytes;
        }
        if let Some(fragments) = parse_env("SESSION_COOKIE_MAX_FRAGMENTS") {
            self.max_fragments = fragments;
        }
        if let Some(secure) = parse_env("SESSION_COOKIE_SECURE") {
            self.secure = secure;
        }
        if let Some(max_age) = parse_env("SESSION_COOKIE_MAX_AGE") {
            self.max_age = Some(max_age);
        }

        self.validate()?;
        Ok(self)
    }

    #[must_use]
    pub fn with_cookie_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.cookie_prefix = prefix.into();
        self
    }

    #[must_use]
    pub fn with_max_fragment_bytes(mut self, max_fragment_bytes: usize) -> Self {
        self.max_fragment_bytes = max_fragment_bytes;
        self
    }

    #[must_use]
    pub fn with_max_fragments(mut self, max_fragments: usize) -> Self {
        self.max_fragments = max_fragments;
        self
    }

    #[must_use]
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    #[must_use]
    pub fn with_same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = same_site;
        self
    }

    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    #[must_use]
    pub fn with_max_age(mut self, max_age: Option<u64>) -> Self {
        self.max_age = max_age;
        self
    }

    pub fn cookie_prefix(&self) -> &str {
        &self.cookie_prefix
    }

    pub fn max_fragment_bytes(&self) -> usize {
        self.max_fragment_bytes
    }

    pub fn max_fragments(&self) -> usize {
        self.max_fragments
    }

    /// Cookie name of the 1-based fragment `index`.
    pub fn fragment_name(&self, index: usize) -> String {
        format!("{}{}", self.cookie_prefix, index)
    }

    pub fn validate(&self) -> Result<(), SessionError> {
        if self.cookie_prefix.trim().is_empty() {
            return Err(SessionError::Config(
                "Cookie prefix must not be empty".to_string(),
            ));
        }
        if self.max_fragment_bytes == 0 {
            return Err(SessionError::Config(
                "Max fragment bytes must be at least 1".to_string(),
            ));
        }
        if self.max_fragments == 0 {
            return Err(SessionError::Config(
                "Max fragments must be at least 1".to_string(),
            ));
        }
        // Browsers drop SameSite=None cookies that lack Secure
        if self.same_site == SameSite::None && !self.secure {
            return Err(SessionError::Config(
                "SameSite=None requires Secure cookies".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_env<T: FromStr>(key: &str) -> Option<T> {
    let raw = env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Ignoring invalid value for {}", key);
            None
        }
    }
}
