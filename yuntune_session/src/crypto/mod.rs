mod key;
mod seal;

pub use key::{SESSION_KEY_CONTEXT, SESSION_KEY_LABEL, derive_key};
pub use seal::{Sealer, seal_json, unseal_json};
