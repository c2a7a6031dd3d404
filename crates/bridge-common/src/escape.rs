//! Bounded escaping of untrusted bytes for log output.

use std::fmt::Write;

/// Maximum number of visible characters kept before truncating.
pub const MAX_ESCAPED_LEN: usize = 1000;

/// Appended when input did not fit in [`MAX_ESCAPED_LEN`].
pub const TRUNCATION_MARKER: &str = "...";

/// Render a sequence of byte chunks as a printable, escaped string.
///
/// Printable ASCII passes through unchanged, a backslash becomes `\\` and any
/// other byte becomes `\` followed by two lowercase hex digits. Chunks are
/// consumed lazily and concatenated in order. Once the next rendered byte would
/// push the output past [`MAX_ESCAPED_LEN`], [`TRUNCATION_MARKER`] is appended
/// and the remaining input is never pulled.
///
/// ```rust
/// use bridge_common::log_escape;
///
/// assert_eq!(log_escape([&b"ok\n"[..], &b"\\"[..]]), "ok\\0a\\\\");
/// ```
pub fn log_escape<I, C>(chunks: I) -> String
where
    I: IntoIterator<Item = C>,
    C: AsRef<[u8]>,
{
    let mut result = String::new();
    for chunk in chunks {
        for &byte in chunk.as_ref() {
            let width = match byte {
                b'\\' => 2,
                0x20..=0x7e => 1,
                _ => 3,
            };
            if result.len() + width > MAX_ESCAPED_LEN {
                result.push_str(TRUNCATION_MARKER);
                return result;
            }
            match byte {
                b'\\' => result.push_str("\\\\"),
                0x20..=0x7e => result.push(byte as char),
                _ => {
                    let _ = write!(result, "\\{:02x}", byte);
                }
            }
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_printable_passes_through() {
        let input = "hello, world ~ [ok] {}";
        assert_eq!(log_escape([input.as_bytes()]), input);
    }

    #[test]
    fn test_backslash_is_doubled() {
        assert_eq!(log_escape([b"\\"]), "\\\\");
        assert_eq!(log_escape([&b"a\\b"[..]]), "a\\\\b");
    }

    #[test]
    fn test_control_and_high_bytes() {
        assert_eq!(log_escape([&[0u8][..]]), "\\00");
        assert_eq!(log_escape([&[0x7f, 0x80, 0xff][..]]), "\\7f\\80\\ff");
        assert_eq!(log_escape([&b"\r\n\t"[..]]), "\\0d\\0a\\09");
    }

    #[test]
    fn test_chunks_are_concatenated_in_order() {
        let chunks = vec![b"ab".to_vec(), Vec::new(), b"c\x01".to_vec()];
        assert_eq!(log_escape(chunks), "abc\\01");
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(log_escape(Vec::<Vec<u8>>::new()), "");
        assert_eq!(log_escape([b""]), "");
    }

    #[test]
    fn test_non_printable_input_is_truncated() {
        let input = vec![0u8; 2000];
        let out = log_escape([&input[..]]);
        assert!(out.ends_with(TRUNCATION_MARKER));
        assert!(out.len() <= MAX_ESCAPED_LEN + TRUNCATION_MARKER.len());
        assert!(out.starts_with("\\00\\00"));
    }

    #[test]
    fn test_exact_bound_is_not_truncated() {
        let input = "x".repeat(MAX_ESCAPED_LEN);
        assert_eq!(log_escape([input.as_bytes()]), input);

        let longer = "x".repeat(MAX_ESCAPED_LEN + 1);
        let out = log_escape([longer.as_bytes()]);
        assert_eq!(out.len(), MAX_ESCAPED_LEN + TRUNCATION_MARKER.len());
        assert!(out.ends_with(TRUNCATION_MARKER));
    }

    #[test]
    fn test_stops_pulling_chunks_after_truncation() {
        let mut pulled = 0;
        let chunks = std::iter::repeat_with(|| {
            pulled += 1;
            vec![b'a'; 100]
        })
        .take(50);
        let out = log_escape(chunks);
        assert!(out.ends_with(TRUNCATION_MARKER));
        assert_eq!(pulled, 11);
    }
}
