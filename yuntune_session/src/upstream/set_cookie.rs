use http::header::{HeaderMap, SET_COOKIE};

/// Every `Set-Cookie` header value of a response, one cookie per entry.
///
/// Separate header values are used as they are. A lone value goes through
/// [`split_folded_set_cookie`], since a proxy may have folded several
/// cookies into it. Values that are not visible ASCII are skipped.
pub fn set_cookie_headers(headers: &HeaderMap) -> Vec<String> {
    let values: Vec<&str> = headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| match value.to_str() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::debug!("Skipping undecodable Set-Cookie header");
                None
            }
        })
        .collect();

    match values.as_slice() {
        [single] => split_folded_set_cookie(single)
            .into_iter()
            .map(str::to_string)
            .collect(),
        _ => values.into_iter().map(str::to_string).collect(),
    }
}

/// Best-effort split of several `Set-Cookie` lines folded into one string.
///
/// Only for sources that join the headers with `", "`. A new cookie is
/// assumed wherever `", "` is followed by `name=value` text, so a value or
/// attribute shaped like that is split wrongly. [`set_cookie_headers`] only
/// falls back to this for a lone header value.
pub fn split_folded_set_cookie(raw: &str) -> Vec<&str> {
    if raw.trim().is_empty() {
        return Vec::new();
    }

    let mut parts = Vec::new();
    let mut start = 0;
    for (index, separator) in raw.match_indices(", ") {
        let next = index + separator.len();
        if starts_new_cookie(&raw[next..]) {
            parts.push(&raw[start..index]);
            start = next;
        }
    }
    parts.push(&raw[start..]);
    parts
}

fn starts_new_cookie(rest: &str) -> bool {
    let Some(stop) = rest.find([';', '=']) else {
        return false;
    };
    if stop == 0 || !rest[stop..].starts_with('=') {
        return false;
    }
    rest[stop + 1..].chars().next().is_some_and(|c| c != ';')
}
