mod chunk;
mod jar;

pub use chunk::{chunk_by_bytes, reassemble};
pub use jar::{CookieJar, RequestCookieJar, SetCookie};
