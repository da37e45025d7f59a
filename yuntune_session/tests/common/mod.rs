#![allow(dead_code)]

// Shared helpers for integration tests.
//
// `Browser` keeps a cookie store the way a user agent would: it applies the
// `Set-Cookie` headers of each response and sends the survivors back in a
// `Cookie` header on the next request.
use std::collections::BTreeMap;

use http::header::{COOKIE, HeaderMap, HeaderValue, SET_COOKIE};
use yuntune_session::{SessionConfig, SessionManager, SessionSecret};

pub const TEST_SECRET: &str = "integration-test-secret-0123456789";

pub fn test_config() -> SessionConfig {
    SessionConfig::new(SessionSecret::new(TEST_SECRET).unwrap())
        .with_cookie_prefix("yt_s")
        .with_secure(false)
}

pub fn test_manager() -> SessionManager {
    SessionManager::new(test_config()).unwrap()
}

#[derive(Debug, Default)]
pub struct Browser {
    cookies: BTreeMap<String, String>,
}

impl Browser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Headers for the next request.
    pub fn request_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if !self.cookies.is_empty() {
            let cookie = self
                .cookies
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect::<Vec<_>>()
                .join("; ");
            headers.insert(COOKIE, HeaderValue::from_str(&cookie).unwrap());
        }
        headers
    }

    /// Applies the `Set-Cookie` headers of a response.
    pub fn receive(&mut self, response_headers: &HeaderMap) {
        for value in response_headers.get_all(SET_COOKIE) {
            let line = value.to_str().unwrap();
            let mut attributes = line.split(';').map(str::trim);
            let (name, value) = attributes.next().unwrap().split_once('=').unwrap();
            let expired = attributes.any(|attr| attr.eq_ignore_ascii_case("Max-Age=0"));
            if expired || value.is_empty() {
                self.cookies.remove(name);
            } else {
                self.cookies.insert(name.to_string(), value.to_string());
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    pub fn set(&mut self, name: &str, value: &str) {
        self.cookies.insert(name.to_string(), value.to_string());
    }

    pub fn remove(&mut self, name: &str) {
        self.cookies.remove(name);
    }

    pub fn names(&self) -> Vec<String> {
        self.cookies.keys().cloned().collect()
    }
}
