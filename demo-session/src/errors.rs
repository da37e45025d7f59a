use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use yuntune_session::SessionError;

use crate::upstream::UpstreamError;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub(crate) enum ErrorCode {
    LoginRequired,
    LoginExpired,
    NoCopyright,
    RateLimited,
    UpstreamError,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: ErrorCode,
    message: String,
}

/// `{ ok: true, data }` / `{ ok: false, error: { code, message } }`
#[derive(Debug, Serialize)]
pub(crate) struct Envelope<T: Serialize> {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorBody>,
}

pub(crate) fn ok<T: Serialize>(data: T) -> Json<Envelope<T>> {
    Json(Envelope {
        ok: true,
        data: Some(data),
        error: None,
    })
}

fn fail(code: ErrorCode, message: &str) -> Json<Envelope<()>> {
    Json(Envelope {
        ok: false,
        data: None,
        error: Some(ErrorBody {
            code,
            message: message.to_string(),
        }),
    })
}

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                fail(ErrorCode::UpstreamError, &message),
            )
                .into_response(),
            AppError::Upstream(e) => {
                tracing::warn!("Upstream call failed: {}", e);
                (
                    StatusCode::BAD_GATEWAY,
                    fail(e.error_code(), &e.public_message()),
                )
                    .into_response()
            }
            other => {
                // Details stay in the log; the client gets a generic message
                tracing::error!("Request failed: {}", other);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    fail(ErrorCode::UpstreamError, "Server error"),
                )
                    .into_response()
            }
        }
    }
}

pub(crate) fn login_required() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        fail(ErrorCode::LoginRequired, "Login required"),
    )
        .into_response()
}

pub(crate) fn login_expired() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        fail(ErrorCode::LoginExpired, "Login expired"),
    )
        .into_response()
}
