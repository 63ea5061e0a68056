//! Stream and file name handling for manifest text.
//!
//! Manifest tokens are separated by whitespace, so names escape it:
//! - space, tab, and newline become `\040`, `\011`, `\012`
//! - a backslash becomes `\134` only when it would otherwise read as an
//!   octal escape; every other backslash is kept as-is
//!
//! Unescaping decodes three-digit octal escapes and nothing else, so a
//! normalized token survives unescape then escape byte for byte.

/// Escape a stream or file name for use as a manifest token.
///
/// ```
/// use keep_types::escape_name;
///
/// assert_eq!(escape_name("my file.txt"), "my\\040file.txt");
/// ```
pub fn escape_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for (i, ch) in name.char_indices() {
        match ch {
            ' ' => out.push_str("\\040"),
            '\t' => out.push_str("\\011"),
            '\n' => out.push_str("\\012"),
            '\\' if octal_escape(&name.as_bytes()[i + 1..]).is_some() => {
                out.push_str("\\134")
            }
            c => out.push(c),
        }
    }
    out
}

/// Reverse [`escape_name`].
pub fn unescape_name(token: &str) -> String {
    let bytes = token.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' {
            if let Some(value) = octal_escape(&bytes[i + 1..]) {
                out.push(value);
                i += 4;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    match String::from_utf8(out) {
        Ok(s) => s,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    }
}

fn octal_escape(digits: &[u8]) -> Option<u8> {
    let digits = digits.get(..3)?;
    if !digits.iter().all(|d| (b'0'..=b'7').contains(d)) {
        return None;
    }
    let value = digits
        .iter()
        .fold(0u32, |acc, d| acc * 8 + u32::from(d - b'0'));
    u8::try_from(value).ok()
}

/// Split a `/`-separated collection path into `(stream_name, file_name)`.
///
/// A path without a `/` lives in the root stream `.`.
///
/// ```
/// use keep_types::split_path;
///
/// assert_eq!(split_path("./foo/bar/count.txt"), ("./foo/bar", "count.txt"));
/// assert_eq!(split_path("count.txt"), (".", "count.txt"));
/// ```
pub fn split_path(path: &str) -> (&str, &str) {
    match path.rsplit_once('/') {
        Some((stream, file)) => (stream, file),
        None => (".", path),
    }
}
