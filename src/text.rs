//! Byte-window helpers shared by the match-reporting modules
//!
//! Context windows are cut by byte count but must never split a UTF-8
//! sequence, so every window edge is pulled back to a char boundary.

/// Largest char boundary at or before `index`
pub fn floor_char_boundary(s: &str, index: usize) -> usize {
    let mut i = index.min(s.len());
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

/// Smallest char boundary at or after `index`
pub fn ceil_char_boundary(s: &str, index: usize) -> usize {
    let mut i = index.min(s.len());
    while i < s.len() && !s.is_char_boundary(i) {
        i += 1;
    }
    i
}

/// Context window of `before`/`after` bytes around `[start, end)`.
///
/// Returns the window text and the byte offset where it begins.
pub fn context_window(s: &str, start: usize, end: usize, before: usize, after: usize) -> (&str, usize) {
    let lo = floor_char_boundary(s, start.saturating_sub(before));
    let hi = ceil_char_boundary(s, end.saturating_add(after));
    (&s[lo..hi], lo)
}

/// Collapse newlines so a window renders on one report line
pub fn single_line(s: &str) -> String {
    s.replace(['\n', '\r'], " ")
}

/// Truncate to at most `max_bytes` on a char boundary
pub fn truncate_to_char_boundary(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    &s[..floor_char_boundary(s, max_bytes)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_clamps_at_edges() {
        let (win, off) = context_window("abcdef", 1, 2, 10, 10);
        assert_eq!(win, "abcdef");
        assert_eq!(off, 0);
    }

    #[test]
    fn test_window_respects_multibyte() {
        let s = "aé⚡bc";
        for start in 0..s.len() {
            let (win, off) = context_window(s, start, start, 2, 2);
            assert!(s.is_char_boundary(off));
            assert!(!win.is_empty() || s.is_empty());
        }
    }

    #[test]
    fn test_truncate_on_boundary() {
        let s = "a⚡b";
        assert_eq!(truncate_to_char_boundary(s, 2), "a");
        assert_eq!(truncate_to_char_boundary(s, 10), s);
    }
}
