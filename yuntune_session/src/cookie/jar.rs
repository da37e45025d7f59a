use std::collections::BTreeMap;

use headers::HeaderMapExt;
use http::header::{HeaderMap, HeaderValue, SET_COOKIE};

use crate::config::SameSite;
use crate::errors::SessionError;

/// An outbound cookie change, rendered as one `Set-Cookie` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetCookie {
    pub name: String,
    pub value: String,
    pub http_only: bool,
    pub secure: bool,
    pub same_site: SameSite,
    pub path: String,
    pub max_age: Option<i64>,
}

impl SetCookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            http_only: true,
            secure: true,
            same_site: SameSite::Lax,
            path: "/".to_string(),
            max_age: None,
        }
    }

    /// Empty value with `Max-Age=0`, which makes the client drop the cookie.
    pub fn removal(name: impl Into<String>) -> Self {
        Self {
            max_age: Some(0),
            ..Self::new(name, "")
        }
    }

    pub fn is_removal(&self) -> bool {
        matches!(self.max_age, Some(age) if age <= 0)
    }

    pub fn to_header_value(&self) -> String {
        let mut cookie = format!(
            "{}={}; SameSite={}",
            self.name, self.value, self.same_site
        );
        if self.secure {
            cookie.push_str("; Secure");
        }
        if self.http_only {
            cookie.push_str("; HttpOnly");
        }
        cookie.push_str("; Path=");
        cookie.push_str(&self.path);
        if let Some(max_age) = self.max_age {
            cookie.push_str(&format!("; Max-Age={max_age}"));
        }
        cookie
    }
}

/// Cookie storage as seen by one request/response cycle.
pub trait CookieJar {
    /// Current value of `name`, including changes made during this cycle.
    fn get(&self, name: &str) -> Option<&str>;

    /// Records an outbound change. A later change to the same name replaces
    /// an earlier one.
    fn set(&mut self, cookie: SetCookie);
}

/// Jar seeded from a request's `Cookie` header that collects `Set-Cookie`
/// changes for the response.
#[derive(Debug, Clone, Default)]
pub struct RequestCookieJar {
    incoming: BTreeMap<String, String>,
    pending: Vec<SetCookie>,
}

impl RequestCookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads all `Cookie` headers; when a name repeats the first value wins.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let mut incoming = BTreeMap::new();
        if let Some(cookies) = headers.typed_get::<headers::Cookie>() {
            for (name, value) in cookies.iter() {
                incoming
                    .entry(name.to_string())
                    .or_insert_with(|| value.to_string());
            }
        } else if headers.contains_key(http::header::COOKIE) {
            tracing::debug!("Cookie header present but not decodable");
        }
        Self {
            incoming,
            pending: Vec::new(),
        }
    }

    /// Outbound changes in the order they were first made.
    pub fn pending(&self) -> &[SetCookie] {
        &self.pending
    }

    /// Appends one `Set-Cookie` header per pending change.
    pub fn apply_to(&self, headers: &mut HeaderMap) -> Result<(), SessionError> {
        for cookie in &self.pending {
            let value = HeaderValue::from_str(&cookie.to_header_value()).map_err(|_| {
                SessionError::HeaderError(format!("Invalid Set-Cookie value for {}", cookie.name))
            })?;
            headers.append(SET_COOKIE, value);
        }
        Ok(())
    }

    pub fn into_header_map(self) -> Result<HeaderMap, SessionError> {
        let mut headers = HeaderMap::new();
        self.apply_to(&mut headers)?;
        Ok(headers)
    }
}

impl CookieJar for RequestCookieJar {
    fn get(&self, name: &str) -> Option<&str> {
        if let Some(cookie) = self.pending.iter().find(|c| c.name == name) {
            return (!cookie.is_removal()).then_some(cookie.value.as_str());
        }
        self.incoming.get(name).map(String::as_str)
    }

    fn set(&mut self, cookie: SetCookie) {
        match self.pending.iter_mut().find(|c| c.name == cookie.name) {
            Some(existing) => *existing = cookie,
            None => self.pending.push(cookie),
        }
    }
}
