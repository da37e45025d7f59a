use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Discriminant of the only session layout currently written.
pub const SESSION_VERSION: u8 = 1;

/// Third-party credentials forwarded to the upstream service.
///
/// Entries only come from [`crate::CredentialExtractor`] or from a session
/// that was sealed by this server, so every name is on the allow-list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UpstreamCredentials(BTreeMap<String, String>);

impl UpstreamCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Adds or refreshes entries from `newer`; entries it lacks are kept.
    pub fn merge(&mut self, newer: UpstreamCredentials) {
        self.0.extend(newer.0);
    }
}

/// Identity summary of the upstream account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub user_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

/// The value sealed into the session cookies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionData {
    pub v: u8,
    #[serde(
        rename = "cookies",
        default,
        skip_serializing_if = "UpstreamCredentials::is_empty"
    )]
    pub upstream_credentials: UpstreamCredentials,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<SessionUser>,
    /// Diagnostics only, never used for expiry
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "chrono::serde::ts_milliseconds_option"
    )]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Default for SessionData {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionData {
    pub fn new() -> Self {
        Self {
            v: SESSION_VERSION,
            upstream_credentials: UpstreamCredentials::new(),
            user: None,
            updated_at: None,
        }
    }

    pub fn is_current_version(&self) -> bool {
        self.v == SESSION_VERSION
    }

    pub fn has_credentials(&self) -> bool {
        !self.upstream_credentials.is_empty()
    }

    pub fn merge_credentials(&mut self, newer: UpstreamCredentials) {
        self.upstream_credentials.merge(newer);
    }

    /// Sets the identity. Only call this with a profile fetched upstream
    /// using this session's credentials.
    #[must_use]
    pub fn with_user(mut self, user: SessionUser) -> Self {
        self.user = Some(user);
        self
    }

    /// Stamps the version and a millisecond-precision `updated_at`.
    pub(crate) fn touch(&mut self) {
        self.v = SESSION_VERSION;
        let now = Utc::now();
        self.updated_at = DateTime::from_timestamp_millis(now.timestamp_millis()).or(Some(now));
    }
}
