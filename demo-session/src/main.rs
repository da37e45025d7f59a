use std::path::Path;

use axum::{
    Router,
    routing::{get, post},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use yuntune_session::{CredentialExtractor, SessionConfig, SessionManager, SessionSecret};

mod config;
mod errors;
mod handlers;
#[cfg(test)]
mod test_utils;
mod upstream;

use crate::{
    config::AppConfig,
    errors::AppError,
    handlers::{AppState, get_session, logout, me, qr_poll, qr_start, store_credentials},
    upstream::UpstreamClient,
};

pub(crate) fn app(state: AppState) -> Router {
    Router::new()
        .route("/api/session", get(get_session))
        .route("/api/session/credentials", post(store_credentials))
        .route("/api/me", get(me))
        .route("/api/auth/qr/start", post(qr_start))
        .route("/api/auth/qr/poll", get(qr_poll))
        .route("/api/auth/logout", post(logout))
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("{}=debug,yuntune_session=debug", env!("CARGO_CRATE_NAME")).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let app_config = AppConfig::load(Path::new("config.json"))?;
    let session_config =
        SessionConfig::new(SessionSecret::new(app_config.session_secret)?).with_env_overrides()?;
    tracing::info!(
        "{}: session cookies {}1..{}, upstream {}",
        app_config.app_name,
        session_config.cookie_prefix(),
        session_config.max_fragments(),
        app_config.upstream_base_url
    );

    let state = AppState {
        sessions: SessionManager::new(session_config)?,
        upstream: UpstreamClient::new(
            &app_config.upstream_base_url,
            CredentialExtractor::default(),
        )?,
    };

    let listener = tokio::net::TcpListener::bind("0.0.0.0:3001").await?;
    tracing::info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, app(state)).await?;
    Ok(())
}
