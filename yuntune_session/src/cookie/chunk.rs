use crate::errors::SessionError;

/// Splits `value` into fragments of at most `max_bytes` UTF-8 bytes each.
///
/// Fragments never split a code point, and concatenating them in order gives
/// back `value`. An empty input produces no fragments.
pub fn chunk_by_bytes(value: &str, max_bytes: usize) -> Result<Vec<&str>, SessionError> {
    if max_bytes == 0 {
        return Err(SessionError::Chunk(
            "Fragment size must be at least 1 byte".to_string(),
        ));
    }

    let mut fragments = Vec::with_capacity(value.len().div_ceil(max_bytes));
    let mut rest = value;
    while !rest.is_empty() {
        let mut end = rest.len().min(max_bytes);
        while !rest.is_char_boundary(end) {
            end -= 1;
        }
        if end == 0 {
            return Err(SessionError::Chunk(format!(
                "A character wider than {max_bytes} bytes cannot be placed in a fragment"
            )));
        }
        let (head, tail) = rest.split_at(end);
        fragments.push(head);
        rest = tail;
    }

    Ok(fragments)
}

/// Joins fragments back into the original token.
pub fn reassemble<S: AsRef<str>>(fragments: &[S]) -> String {
    let mut token = String::with_capacity(fragments.iter().map(|f| f.as_ref().len()).sum());
    for fragment in fragments {
        token.push_str(fragment.as_ref());
    }
    token
}
