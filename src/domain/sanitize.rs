//! Filesystem-safe names for opaque identifiers.

/// Maximum length, in chars, of a sanitized name.
pub const MAX_NAME_LEN: usize = 100;

/// Placeholder written in place of every unsafe char.
const PLACEHOLDER: char = '_';

const fn is_reserved(c: char) -> bool {
    matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' | '\u{0}'..='\u{1f}')
}

/// Maps an arbitrary string to a name usable as a file or directory name.
///
/// The mapping is deterministic, so the same message id always lands on the
/// same media file across runs.
#[must_use]
pub fn sanitize(raw: &str) -> String {
    raw.chars()
        .map(|c| if is_reserved(c) { PLACEHOLDER } else { c })
        .take(MAX_NAME_LEN)
        .collect()
}
