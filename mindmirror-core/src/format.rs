//! Text formatting helpers shared across components.

/// Marker appended when text is cut short.
pub const ELLIPSIS: &str = "...";

/// Truncate `text` to at most `max_chars` characters, appending `...` when
/// anything was cut. Counts chars, not bytes, so multi-byte text is safe.
pub fn truncate_with_ellipsis(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}{}", &text[..byte_idx], ELLIPSIS),
        None => text.to_string(),
    }
}

/// Short single-line preview of a payload for log fields.
pub fn log_preview(text: &str, max_chars: usize) -> String {
    truncate_with_ellipsis(&text.replace('\n', " "), max_chars)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_unchanged() {
        assert_eq!(truncate_with_ellipsis("hello", 150), "hello");
        assert_eq!(truncate_with_ellipsis("", 3), "");
    }

    #[test]
    fn long_text_is_cut_at_char_boundary() {
        let text = "é".repeat(200);
        let cut = truncate_with_ellipsis(&text, 150);
        assert_eq!(cut.chars().count(), 153);
        assert!(cut.ends_with("..."));
    }

    #[test]
    fn exact_length_is_not_marked() {
        let text = "a".repeat(150);
        assert_eq!(truncate_with_ellipsis(&text, 150), text);
    }

    #[test]
    fn preview_flattens_newlines() {
        assert_eq!(log_preview("a\nb", 10), "a b");
    }
}
