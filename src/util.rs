// src/util.rs — Shared string helpers

/// Truncate a string to at most `max_len` bytes on a UTF-8 boundary.
pub fn truncate_str(s: &str, max_len: usize) -> &str {
    if s.len() <= max_len {
        s
    } else {
        let mut end = max_len;
        while end > 0 && !s.is_char_boundary(end) {
            end -= 1;
        }
        &s[..end]
    }
}

/// First `n` whitespace-delimited tokens of `s`, joined by single spaces.
pub fn first_words(s: &str, n: usize) -> String {
    s.split_whitespace().take(n).collect::<Vec<_>>().join(" ")
}

/// Single-line preview for terminal listings: newlines collapsed, `...` when cut.
pub fn preview(s: &str, max_len: usize) -> String {
    let flat = s.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.len() <= max_len {
        return flat;
    }
    format!("{}...", truncate_str(&flat, max_len.saturating_sub(3)))
}
