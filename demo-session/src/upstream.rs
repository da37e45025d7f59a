//! Client for the upstream music API
//!
//! Every call forwards the session's credentials as a `Cookie` header and
//! harvests allow-listed credentials from the response's `Set-Cookie` headers.

use std::time::Duration;

use reqwest::{StatusCode, header::COOKIE};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::Value;
use thiserror::Error;

use yuntune_session::{CredentialExtractor, SessionUser, UpstreamCredentials, format_cookie_header};

use crate::errors::ErrorCode;

const UPSTREAM_OK: i64 = 200;

#[derive(Debug, Error)]
pub(crate) enum UpstreamError {
    #[error("Upstream request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Upstream responded with status {0}")]
    Status(StatusCode),

    #[error("Upstream returned code {code}: {message}")]
    Api { code: i64, message: String },

    #[error("Invalid upstream response: {0}")]
    InvalidResponse(String),
}

impl UpstreamError {
    pub(crate) fn error_code(&self) -> ErrorCode {
        match self {
            UpstreamError::Api { code: 301, .. } => ErrorCode::LoginRequired,
            UpstreamError::Api { code: 302, .. } => ErrorCode::LoginExpired,
            UpstreamError::Api { code: 403, .. } => ErrorCode::NoCopyright,
            UpstreamError::Api { message, .. } if is_copyright_message(message) => {
                ErrorCode::NoCopyright
            }
            UpstreamError::Api { message, .. } if is_rate_limit_message(message) => {
                ErrorCode::RateLimited
            }
            _ => ErrorCode::UpstreamError,
        }
    }

    /// The upstream no longer accepts the stored credentials.
    pub(crate) fn is_login_rejected(&self) -> bool {
        matches!(
            self.error_code(),
            ErrorCode::LoginRequired | ErrorCode::LoginExpired
        )
    }

    /// Message that may be shown to the browser.
    pub(crate) fn public_message(&self) -> String {
        match (self.error_code(), self) {
            (ErrorCode::LoginRequired, _) => "Login required".to_string(),
            (ErrorCode::LoginExpired, _) => "Login expired".to_string(),
            (ErrorCode::NoCopyright, _) => "No copyright".to_string(),
            (ErrorCode::RateLimited, _) => "Rate limited".to_string(),
            (_, UpstreamError::Api { code: 404, .. }) => "Not found".to_string(),
            (_, UpstreamError::Api { message, .. }) => message.clone(),
            (_, UpstreamError::InvalidResponse(_)) => "Invalid upstream response".to_string(),
            _ => "Upstream request failed".to_string(),
        }
    }
}

fn is_copyright_message(message: &str) -> bool {
    message.contains("无版权") || message.to_lowercase().contains("copyright")
}

fn is_rate_limit_message(message: &str) -> bool {
    message.contains("频繁") || message.to_lowercase().contains("too many")
}

fn message_from(body: &Value) -> String {
    ["message", "msg"]
        .iter()
        .filter_map(|key| body.get(key).and_then(Value::as_str))
        .find(|message| !message.trim().is_empty())
        .unwrap_or("Upstream error")
        .to_string()
}

/// A decoded upstream response plus the credentials it set.
#[derive(Debug)]
pub(crate) struct UpstreamReply<T> {
    pub(crate) data: T,
    pub(crate) refreshed: UpstreamCredentials,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Profile {
    user_id: i64,
    nickname: Option<String>,
    avatar_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AccountResponse {
    profile: Option<Profile>,
}

#[derive(Debug, Default, Deserialize)]
struct QrKeyData {
    unikey: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QrKeyResponse {
    #[serde(default)]
    data: QrKeyData,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct QrImage {
    pub(crate) qrimg: Option<String>,
    pub(crate) qrurl: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QrCreateResponse {
    #[serde(default)]
    data: QrImage,
}

/// Raw result of a QR login check. `cookie` carries credentials embedded in
/// the body once the login is authorized.
#[derive(Debug, Deserialize)]
pub(crate) struct QrCheck {
    pub(crate) code: i64,
    pub(crate) cookie: Option<String>,
}

#[derive(Debug, Clone)]
pub(crate) struct UpstreamClient {
    client: reqwest::Client,
    base_url: String,
    extractor: CredentialExtractor,
}

impl UpstreamClient {
    pub(crate) fn new(
        base_url: &str,
        extractor: CredentialExtractor,
    ) -> Result<Self, UpstreamError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            extractor,
        })
    }

    pub(crate) fn extractor(&self) -> &CredentialExtractor {
        &self.extractor
    }

    /// Calls `path` and returns the HTTP status, the JSON body if there is
    /// one, and the allow-listed credentials from `Set-Cookie`.
    async fn send(
        &self,
        path: &str,
        query: &[(&str, &str)],
        credentials: &UpstreamCredentials,
    ) -> Result<(StatusCode, Option<Value>, UpstreamCredentials), UpstreamError> {
        let url = format!("{}{}", self.base_url, path);
        let timestamp = chrono::Utc::now().timestamp_millis().to_string();

        let mut request = self
            .client
            .get(&url)
            .query(query)
            .query(&[("timestamp", timestamp.as_str())]);
        if let Some(cookie) = format_cookie_header(credentials) {
            request = request.header(COOKIE, cookie);
        }

        tracing::debug!("Upstream GET {}", path);
        let response = request.send().await?;
        let status = response.status();
        let refreshed = self.extractor.from_response_headers(response.headers());
        let body = response.json::<Value>().await.ok();
        Ok((status, body, refreshed))
    }

    /// GET without interpreting the body's result code.
    async fn get_raw<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        credentials: &UpstreamCredentials,
    ) -> Result<UpstreamReply<T>, UpstreamError> {
        let (status, body, refreshed) = self.send(path, query, credentials).await?;
        if !status.is_success() {
            return Err(UpstreamError::Status(status));
        }
        let body = body.ok_or_else(|| UpstreamError::InvalidResponse("Body is not JSON".into()))?;
        let data = serde_json::from_value(body)
            .map_err(|e| UpstreamError::InvalidResponse(e.to_string()))?;
        Ok(UpstreamReply { data, refreshed })
    }

    /// GET that requires `code == 200` in the body.
    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        credentials: &UpstreamCredentials,
    ) -> Result<UpstreamReply<T>, UpstreamError> {
        let (status, body, refreshed) = self.send(path, query, credentials).await?;

        // The body's code is more specific than the HTTP status
        let code = body.as_ref().and_then(|b| b.get("code")).and_then(Value::as_i64);
        match (code, body) {
            (Some(UPSTREAM_OK), Some(body)) => {
                let data = serde_json::from_value(body)
                    .map_err(|e| UpstreamError::InvalidResponse(e.to_string()))?;
                Ok(UpstreamReply { data, refreshed })
            }
            (Some(code), Some(body)) => {
                let message = message_from(&body);
                tracing::debug!("Upstream {} returned code {}: {}", path, code, message);
                Err(UpstreamError::Api { code, message })
            }
            _ if !status.is_success() => Err(UpstreamError::Status(status)),
            _ => Err(UpstreamError::InvalidResponse("Missing result code".into())),
        }
    }

    /// Looks up the account the credentials belong to.
    ///
    /// `Ok` with `None` data means the upstream answered without a usable
    /// profile.
    pub(crate) async fn fetch_account(
        &self,
        credentials: &UpstreamCredentials,
    ) -> Result<UpstreamReply<Option<SessionUser>>, UpstreamError> {
        let reply: UpstreamReply<AccountResponse> =
            self.get("/user/account", &[], credentials).await?;
        let user = reply
            .data
            .profile
            .filter(|profile| profile.user_id != 0)
            .map(|profile| SessionUser {
                user_id: profile.user_id,
                nickname: profile.nickname,
                avatar_url: profile.avatar_url,
            });
        Ok(UpstreamReply {
            data: user,
            refreshed: reply.refreshed,
        })
    }

    pub(crate) async fn qr_key(&self) -> Result<String, UpstreamError> {
        let reply: UpstreamReply<QrKeyResponse> = self
            .get("/login/qr/key", &[], &UpstreamCredentials::new())
            .await?;
        reply
            .data
            .data
            .unikey
            .filter(|key| !key.is_empty())
            .ok_or_else(|| UpstreamError::InvalidResponse("Missing QR key".into()))
    }

    pub(crate) async fn qr_create(&self, key: &str) -> Result<QrImage, UpstreamError> {
        let reply: UpstreamReply<QrCreateResponse> = self
            .get(
                "/login/qr/create",
                &[("key", key), ("qrimg", "true")],
                &UpstreamCredentials::new(),
            )
            .await?;
        let image = reply.data.data;
        if image.qrimg.is_none() && image.qrurl.is_none() {
            return Err(UpstreamError::InvalidResponse("Missing QR image".into()));
        }
        Ok(image)
    }

    /// Polls a QR login. The status codes (800-803) are not errors here.
    pub(crate) async fn qr_check(
        &self,
        key: &str,
    ) -> Result<UpstreamReply<QrCheck>, UpstreamError> {
        self.get_raw("/login/qr/check", &[("key", key)], &UpstreamCredentials::new())
            .await
    }
}
