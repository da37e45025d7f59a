use std::collections::HashSet;

use http::HeaderMap;

use crate::session::UpstreamCredentials;

use super::set_cookie::set_cookie_headers;

/// Upstream cookies needed to authenticate later upstream calls.
pub const DEFAULT_ALLOWED_CREDENTIALS: [&str; 6] = [
    "MUSIC_U",
    "MUSIC_A",
    "__csrf",
    "NMTID",
    "MUSIC_R_T",
    "MUSIC_SNS",
];

/// Harvests allow-listed credentials from upstream cookie data.
///
/// Malformed entries are skipped one by one; extraction itself never fails.
#[derive(Debug, Clone)]
pub struct CredentialExtractor {
    allow_list: HashSet<String>,
}

impl Default for CredentialExtractor {
    fn default() -> Self {
        Self::with_allow_list(DEFAULT_ALLOWED_CREDENTIALS)
    }
}

impl CredentialExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_allow_list<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allow_list: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_allowed(&self, name: &str) -> bool {
        self.allow_list.contains(name)
    }

    /// Each item is one `Set-Cookie` line. Only the `name=value` part before
    /// the first `;` is used; a later duplicate name wins.
    pub fn from_set_cookie_headers<I, S>(&self, headers: I) -> UpstreamCredentials
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut credentials = UpstreamCredentials::new();
        for header in headers {
            let header = header.as_ref();
            let first = header.split(';').next().unwrap_or_default().trim();
            self.accept_pair(first, &mut credentials);
        }
        credentials
    }

    /// Parses a `name=value; name=value` string, as found in upstream JSON
    /// bodies that embed cookies instead of sending headers.
    pub fn from_cookie_string(&self, raw: &str) -> UpstreamCredentials {
        let mut credentials = UpstreamCredentials::new();
        for part in raw.split(';') {
            self.accept_pair(part.trim(), &mut credentials);
        }
        credentials
    }

    /// Extracts from every `Set-Cookie` header of an upstream response.
    pub fn from_response_headers(&self, headers: &HeaderMap) -> UpstreamCredentials {
        self.from_set_cookie_headers(set_cookie_headers(headers))
    }

    fn accept_pair(&self, pair: &str, credentials: &mut UpstreamCredentials) {
        let Some((name, value)) = pair.split_once('=') else {
            return;
        };
        if name.is_empty() {
            return;
        }
        if !self.is_allowed(name) {
            tracing::trace!("Dropping upstream cookie {}", name);
            return;
        }
        credentials.insert(name, value);
    }
}

/// Renders credentials as a `Cookie` request header value for the upstream.
pub fn format_cookie_header(credentials: &UpstreamCredentials) -> Option<String> {
    if credentials.is_empty() {
        return None;
    }
    let pairs: Vec<String> = credentials
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect();
    Some(pairs.join("; "))
}
