//! Application bootstrap configuration
//!
//! Values come from an optional `config.json` in the working directory, with
//! environment variables as the fallback for each key.

use std::env;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::errors::AppError;

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    #[serde(rename = "SESSION_SECRET")]
    session_secret: Option<String>,
    #[serde(rename = "NETEASE_API_BASE_URL")]
    netease_api_base_url: Option<String>,
    #[serde(rename = "NEXT_PUBLIC_APP_NAME")]
    app_name: Option<String>,
}

#[derive(Debug, Clone)]
pub(crate) struct AppConfig {
    pub(crate) session_secret: String,
    pub(crate) upstream_base_url: String,
    pub(crate) app_name: String,
}

impl AppConfig {
    /// Loads `path` if it exists; a missing or malformed file counts as empty.
    pub(crate) fn load(path: &Path) -> Result<Self, AppError> {
        let file = read_file_config(path);

        let session_secret = pick(file.session_secret, "SESSION_SECRET").ok_or_else(|| {
            AppError::Config("Missing required config: SESSION_SECRET".to_string())
        })?;
        let upstream_base_url = pick(file.netease_api_base_url, "NETEASE_API_BASE_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .ok_or_else(|| {
                AppError::Config("Missing required config: NETEASE_API_BASE_URL".to_string())
            })?;
        let app_name =
            pick(file.app_name, "NEXT_PUBLIC_APP_NAME").unwrap_or_else(|| "YunTune".to_string());

        Ok(Self {
            session_secret,
            upstream_base_url,
            app_name,
        })
    }
}

fn read_file_config(path: &Path) -> FileConfig {
    let Ok(raw) = fs::read_to_string(path) else {
        tracing::debug!("No config file at {}", path.display());
        return FileConfig::default();
    };
    match serde_json::from_str(&raw) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!("Ignoring unreadable config file {}: {}", path.display(), e);
            FileConfig::default()
        }
    }
}

/// File value when non-blank, otherwise the environment variable.
fn pick(from_file: Option<String>, key: &str) -> Option<String> {
    from_file
        .filter(|value| !value.trim().is_empty())
        .or_else(|| env::var(key).ok().filter(|value| !value.trim().is_empty()))
}
