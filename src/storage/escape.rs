//! Path escaping for the digest store line format
//!
//! A record line is `<repository>@<image-digest> <escaped-path>`. The path
//! is the last field, but it must not contain the line separator, and
//! keeping whitespace and quotes out of it makes the files easy to grep.
//! Those bytes (plus `%` itself, backslash, every other ASCII control and
//! all non-ASCII bytes) are written as `%XX` with uppercase hex.

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use thiserror::Error;

/// Bytes escaped in addition to controls and non-ASCII
const PATH_ESCAPES: &AsciiSet = &CONTROLS
    .add(b'%')
    .add(b' ')
    .add(b'"')
    .add(b'\'')
    .add(b'\\');

#[derive(Debug, Error, PartialEq)]
pub enum EscapeError {
    #[error("Truncated escape at byte {0}")]
    Truncated(usize),

    #[error("Invalid escape '%{0}'")]
    InvalidHex(String),

    #[error("Escaped path is not valid UTF-8")]
    InvalidUtf8,
}

/// Escapes a path so that it contains no whitespace, quotes or controls
pub fn escape_path(path: &str) -> String {
    utf8_percent_encode(path, PATH_ESCAPES).to_string()
}

/// Reverses [`escape_path`].
///
/// Unlike `percent_decode_str` on its own, a `%` that does not start a
/// two-digit hex escape is an error rather than a literal.
pub fn unescape_path(escaped: &str) -> Result<String, EscapeError> {
    let bytes = escaped.as_bytes();
    for (i, _) in escaped.match_indices('%') {
        let hex = bytes.get(i + 1..i + 3).ok_or(EscapeError::Truncated(i))?;
        if !hex.iter().all(u8::is_ascii_hexdigit) {
            return Err(EscapeError::InvalidHex(
                String::from_utf8_lossy(hex).into_owned(),
            ));
        }
    }

    percent_decode_str(escaped)
        .decode_utf8()
        .map(|path| path.into_owned())
        .map_err(|_| EscapeError::InvalidUtf8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn plain_path_unchanged() {
        let path = "/lib/x86_64-linux-gnu/libc.so.6";
        assert_eq!(escape_path(path), path);
    }

    #[test]
    fn escapes_whitespace_and_quotes() {
        let escaped = escape_path("/opt/my lib/it's \"here\"\n");
        assert_eq!(escaped, "/opt/my%20lib/it%27s%20%22here%22%0A");
        assert!(!escaped.contains(char::is_whitespace));
    }

    #[test]
    fn escapes_percent_sign() {
        assert_eq!(escape_path("/tmp/100%"), "/tmp/100%25");
        assert_eq!(unescape_path("/tmp/100%25").unwrap(), "/tmp/100%");
    }

    #[test]
    fn non_ascii_escaped_as_utf8_bytes() {
        let path = "/usr/lib/é.so";
        assert_eq!(escape_path(path), "/usr/lib/%C3%A9.so");
        assert_eq!(unescape_path("/usr/lib/%C3%A9.so").unwrap(), path);
    }

    #[test]
    fn backslash_escaped() {
        assert_eq!(escape_path("C:\\lib"), "C:%5Clib");
    }

    #[test]
    fn truncated_escape_rejected() {
        assert_eq!(unescape_path("/lib/%2"), Err(EscapeError::Truncated(5)));
        assert_eq!(unescape_path("/lib/%"), Err(EscapeError::Truncated(5)));
    }

    #[test]
    fn non_hex_escape_rejected() {
        assert!(matches!(unescape_path("/lib/%zz"), Err(EscapeError::InvalidHex(_))));
    }

    #[test]
    fn invalid_utf8_rejected() {
        assert_eq!(unescape_path("/lib/%FF"), Err(EscapeError::InvalidUtf8));
    }

    proptest! {
        #[test]
        fn round_trip_any_path(path in any::<String>()) {
            prop_assert_eq!(unescape_path(&escape_path(&path)).unwrap(), path);
        }

        #[test]
        fn escaped_has_no_separators(path in any::<String>()) {
            let escaped = escape_path(&path);
            prop_assert!(!escaped.contains([' ', '\n', '\r', '\t', '"', '\'']));
        }
    }
}
