//! Byte-offset search over raw PDF bytes.
//!
//! PDF files are binary, so these helpers never decode text.

/// Offset of the first occurrence of `needle` at or after `from`.
#[must_use]
pub fn find_from(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if needle.is_empty() || from > haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|pos| pos + from)
}

/// Offset of the last occurrence of `needle`.
#[must_use]
pub fn find_last(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    find_last_before(haystack, needle, haystack.len())
}

/// Offset of the last occurrence of `needle` that ends at or before `end`.
#[must_use]
pub fn find_last_before(haystack: &[u8], needle: &[u8], end: usize) -> Option<usize> {
    if needle.is_empty() {
        return None;
    }
    let end = end.min(haystack.len());
    haystack[..end]
        .windows(needle.len())
        .rposition(|window| window == needle)
}

/// Rightmost occurrence of any of `needles`, with the index of the needle that matched.
#[must_use]
pub fn find_last_of(haystack: &[u8], needles: &[&[u8]]) -> Option<(usize, usize)> {
    needles
        .iter()
        .enumerate()
        .filter_map(|(idx, needle)| find_last(haystack, needle).map(|pos| (pos, idx)))
        .max_by_key(|(pos, _)| *pos)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_forward_from_offset() {
        let data = b"abc/Contents<00>/Contents<11>";
        assert_eq!(find_from(data, b"/Contents", 0), Some(3));
        assert_eq!(find_from(data, b"/Contents", 4), Some(16));
        assert_eq!(find_from(data, b"/Contents", 17), None);
        assert_eq!(find_from(data, b"x", data.len() + 1), None);
    }

    #[test]
    fn finds_rightmost_occurrence() {
        let data = b"/ByteRange [1 2 3 4] /ByteRange[5 6 7 8]";
        assert_eq!(find_last(data, b"/ByteRange"), Some(21));
        assert_eq!(find_last_before(data, b"/ByteRange", 21), Some(0));
        assert_eq!(
            find_last_of(data, &[b"/ByteRange[", b"/ByteRange ["]),
            Some((21, 0))
        );
    }

    #[test]
    fn empty_needle_never_matches() {
        assert_eq!(find_last(b"abc", b""), None);
        assert_eq!(find_from(b"abc", b"", 0), None);
    }
}
