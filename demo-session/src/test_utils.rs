//! Local stand-in for the upstream music API
//!
//! `MUSIC_U=good` is the only credential the stub accepts. QR key `done` is
//! authorized, every other key is still waiting.

use std::collections::HashMap;

use axum::{
    Json, Router,
    extract::Query,
    http::{HeaderMap, header},
    response::{AppendHeaders, IntoResponse, Response},
    routing::get,
};
use serde_json::json;
use tokio::net::TcpListener;

use yuntune_session::{CredentialExtractor, SessionConfig, SessionManager, SessionSecret};

use crate::handlers::AppState;
use crate::upstream::UpstreamClient;

pub(crate) const STUB_USER_ID: i64 = 42;

async fn account(headers: HeaderMap) -> Response {
    let cookie = headers
        .get(header::COOKIE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    if !cookie.split("; ").any(|pair| pair == "MUSIC_U=good") {
        return Json(json!({"code": 301, "msg": "需要登录"})).into_response();
    }
    (
        AppendHeaders([(header::SET_COOKIE, "__csrf=fresh; Path=/")]),
        Json(json!({
            "code": 200,
            "profile": {
                "userId": STUB_USER_ID,
                "nickname": "listener",
                "avatarUrl": "https://img.example/42.jpg"
            }
        })),
    )
        .into_response()
}

async fn qr_key() -> Json<serde_json::Value> {
    Json(json!({"code": 200, "data": {"code": 200, "unikey": "k1"}}))
}

async fn qr_create(Query(query): Query<HashMap<String, String>>) -> Json<serde_json::Value> {
    let key = query.get("key").cloned().unwrap_or_default();
    Json(json!({
        "code": 200,
        "data": {"qrurl": format!("https://music.example/login?codekey={key}")}
    }))
}

async fn qr_check(Query(query): Query<HashMap<String, String>>) -> Response {
    if query.get("key").map(String::as_str) != Some("done") {
        return Json(json!({"code": 801, "message": "等待扫码"})).into_response();
    }
    (
        AppendHeaders([
            (header::SET_COOKIE, "MUSIC_U=good; Path=/; HttpOnly"),
            (header::SET_COOKIE, "_ntes_nuid=tracker; Path=/"),
        ]),
        Json(json!({
            "code": 803,
            "message": "授权登陆成功",
            "cookie": "NMTID=n1; Path=/; __csrf=c1; Max-Age=1296000"
        })),
    )
        .into_response()
}

/// Serves the stub on an ephemeral port and returns its base URL.
pub(crate) async fn spawn_stub_upstream() -> String {
    let router = Router::new()
        .route("/user/account", get(account))
        .route("/login/qr/key", get(qr_key))
        .route("/login/qr/create", get(qr_create))
        .route("/login/qr/check", get(qr_check));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

pub(crate) fn test_session_config() -> SessionConfig {
    SessionConfig::new(SessionSecret::new("demo-test-secret").unwrap())
        .with_cookie_prefix("yt_s")
        .with_secure(false)
}

pub(crate) async fn test_state_with(config: SessionConfig) -> AppState {
    let base_url = spawn_stub_upstream().await;
    AppState {
        sessions: SessionManager::new(config).unwrap(),
        upstream: UpstreamClient::new(&base_url, CredentialExtractor::default()).unwrap(),
    }
}

pub(crate) async fn test_state() -> AppState {
    test_state_with(test_session_config()).await
}
