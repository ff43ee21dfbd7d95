/// Truncate a string to at most `max_bytes` bytes at a character boundary.
pub fn truncate_to_char_boundary(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) && end > 0 {
        end -= 1;
    }
    &s[..end]
}

/// Short preview for logs: truncated at a char boundary, `...` appended when cut.
pub fn summarize(s: &str, max_bytes: usize) -> String {
    let cut = truncate_to_char_boundary(s, max_bytes);
    if cut.len() < s.len() {
        format!("{cut}...")
    } else {
        cut.to_string()
    }
}

/// Strip a markdown code fence some models wrap around JSON.
pub fn strip_code_blocks(response: &str) -> &str {
    response
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_multibyte_chars() {
        let text = "Hi 🎨 there";
        let truncated = truncate_to_char_boundary(text, 5);
        assert!(truncated.len() <= 5);
        assert!(text.starts_with(truncated));
    }

    #[test]
    fn summarize_marks_cut_text() {
        assert_eq!(summarize("abcdef", 3), "abc...");
        assert_eq!(summarize("abc", 3), "abc");
    }

    #[test]
    fn strip_code_blocks_handles_fences() {
        assert_eq!(strip_code_blocks("```json\n{}\n```"), "{}");
        assert_eq!(strip_code_blocks("```\n{}\n```"), "{}");
        assert_eq!(strip_code_blocks("{}"), "{}");
    }
}
