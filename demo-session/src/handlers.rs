use axum::{
    Json,
    extract::{Query, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use yuntune_session::{RequestCookieJar, SessionData, SessionManager, SessionUser};

use crate::errors::{AppError, login_expired, login_required, ok};
use crate::upstream::{UpstreamClient, UpstreamError};

/// How long a QR code stays scannable upstream.
const QR_TTL_MS: i64 = 5 * 60 * 1000;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) sessions: SessionManager,
    pub(crate) upstream: UpstreamClient,
}

/// What the browser may learn about its session: credential names only.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SessionView {
    logged_in: bool,
    user: Option<SessionUser>,
    credential_names: Vec<String>,
}

impl From<Option<&SessionData>> for SessionView {
    fn from(session: Option<&SessionData>) -> Self {
        match session {
            Some(session) => Self {
                logged_in: session.has_credentials(),
                user: session.user.clone(),
                credential_names: session
                    .upstream_credentials
                    .names()
                    .map(str::to_string)
                    .collect(),
            },
            None => Self {
                logged_in: false,
                user: None,
                credential_names: Vec::new(),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct StoreCredentialsRequest {
    cookie: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct QrPollQuery {
    key: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct QrStartView {
    key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    qrimg: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    qrurl: Option<String>,
    expires_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum QrStatus {
    Expired,
    Waiting,
    Scanned,
    Authorized,
    Unknown,
}

impl QrStatus {
    fn from_code(code: i64) -> Self {
        match code {
            800 => QrStatus::Expired,
            801 => QrStatus::Waiting,
            802 => QrStatus::Scanned,
            803 => QrStatus::Authorized,
            _ => QrStatus::Unknown,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct QrPollView {
    status: QrStatus,
}

/// Attaches the upstream account for the session's credentials.
///
/// A failed lookup keeps whatever identity the session already had.
async fn with_upstream_identity(
    upstream: &UpstreamClient,
    mut session: SessionData,
) -> SessionData {
    match upstream.fetch_account(&session.upstream_credentials).await {
        Ok(reply) => {
            session.merge_credentials(reply.refreshed);
            if let Some(user) = reply.data {
                session = session.with_user(user);
            }
        }
        Err(e) => tracing::warn!("Account lookup failed: {}", e),
    }
    session
}

pub(crate) async fn get_session(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let jar = RequestCookieJar::from_headers(&headers);
    let session = state.sessions.read(&jar);
    ok(SessionView::from(session.as_ref()))
}

/// Confirms the stored login upstream and refreshes the identity.
pub(crate) async fn me(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let mut jar = RequestCookieJar::from_headers(&headers);
    let Some(session) = state
        .sessions
        .read(&jar)
        .filter(SessionData::has_credentials)
    else {
        return Ok(login_required());
    };

    let reply = match state
        .upstream
        .fetch_account(&session.upstream_credentials)
        .await
    {
        Ok(reply) => reply,
        Err(e) if e.is_login_rejected() => {
            tracing::info!("Upstream rejected the stored login, clearing session");
            state.sessions.clear(&mut jar);
            return Ok((jar.into_header_map()?, login_expired()).into_response());
        }
        Err(e) => return Err(e.into()),
    };

    let Some(user) = reply.data else {
        return Err(UpstreamError::InvalidResponse("Missing profile".to_string()).into());
    };

    let mut session = session.with_user(user);
    session.merge_credentials(reply.refreshed);
    let stored = state.sessions.write(&mut jar, session)?;
    Ok((jar.into_header_map()?, ok(stored.user)).into_response())
}

/// Stores credentials handed over as a raw cookie string. The identity is
/// only ever taken from the upstream account lookup.
pub(crate) async fn store_credentials(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<StoreCredentialsRequest>,
) -> Result<impl IntoResponse, AppError> {
    let credentials = state.upstream.extractor().from_cookie_string(&request.cookie);
    if credentials.is_empty() {
        return Err(AppError::BadRequest(
            "No usable upstream credentials".to_string(),
        ));
    }

    let mut jar = RequestCookieJar::from_headers(&headers);
    let mut session = state.sessions.read(&jar).unwrap_or_default();
    session.merge_credentials(credentials);
    let session = with_upstream_identity(&state.upstream, session).await;

    let stored = state.sessions.write(&mut jar, session)?;
    tracing::debug!(
        "Stored session with {} credentials",
        stored.upstream_credentials.len()
    );

    let view = SessionView::from(Some(&stored));
    Ok((jar.into_header_map()?, ok(view)))
}

pub(crate) async fn qr_start(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let key = state.upstream.qr_key().await?;
    let image = state.upstream.qr_create(&key).await?;
    Ok(ok(QrStartView {
        key,
        qrimg: image.qrimg,
        qrurl: image.qrurl,
        expires_at: chrono::Utc::now().timestamp_millis() + QR_TTL_MS,
    }))
}

/// Polls a QR login and, once authorized, stores the harvested credentials.
///
/// Credentials merge in order: existing session, response `Set-Cookie`
/// headers, then the cookie string embedded in the body.
pub(crate) async fn qr_poll(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<QrPollQuery>,
) -> Result<Response, AppError> {
    let key = query
        .key
        .filter(|key| !key.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("Missing key".to_string()))?;

    let check = state.upstream.qr_check(&key).await?;
    let status = QrStatus::from_code(check.data.code);
    if status != QrStatus::Authorized {
        return Ok(ok(QrPollView { status }).into_response());
    }

    let mut jar = RequestCookieJar::from_headers(&headers);
    let mut session = state.sessions.read(&jar).unwrap_or_default();
    session.merge_credentials(check.refreshed);
    if let Some(cookie) = check.data.cookie.as_deref() {
        session.merge_credentials(state.upstream.extractor().from_cookie_string(cookie));
    }
    let session = with_upstream_identity(&state.upstream, session).await;

    state.sessions.write(&mut jar, session)?;
    tracing::info!("QR login authorized");
    Ok((jar.into_header_map()?, ok(QrPollView { status })).into_response())
}

pub(crate) async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let mut jar = RequestCookieJar::from_headers(&headers);
    state.sessions.clear(&mut jar);
    Ok((jar.into_header_map()?, ok(SessionView::from(None))))
}
