mod manager;
mod types;

pub use manager::SessionManager;
pub use types::{SESSION_VERSION, SessionData, SessionUser, UpstreamCredentials};
