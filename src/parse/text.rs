//! Plain text helpers

/// Longest sanitized title kept in a stored filename
pub const MAX_SAFE_TITLE_CHARS: usize = 100;

/// Reduce a title to alphanumerics, `-` and `_` (spaces become `_`), capped in length
pub fn safe_title(title: &str) -> String {
    title
        .chars()
        .filter_map(|c| match c {
            c if c.is_ascii_alphanumeric() || c == '-' || c == '_' => Some(c),
            c if c.is_whitespace() => Some('_'),
            _ => None,
        })
        .take(MAX_SAFE_TITLE_CHARS)
        .collect()
}

/// Make an external ID (`arxiv:2401.01234v2`) usable as a filename prefix
pub fn safe_external_id(external_id: &str) -> String {
    external_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
