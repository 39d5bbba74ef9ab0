const MAX_ERROR_LENGTH: usize = 2_000;

/// Cut `text` to at most `max` bytes on a char boundary, noting how much was dropped.
pub fn truncate_for_log(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... [truncated {} bytes]", &text[..end], text.len() - end)
}

pub fn truncate_error(error: &str) -> String {
    truncate_for_log(error, MAX_ERROR_LENGTH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_unchanged() {
        assert_eq!(truncate_for_log("SecRule ARGS", 100), "SecRule ARGS");
    }

    #[test]
    fn test_long_text_is_cut() {
        let out = truncate_for_log(&"a".repeat(50), 10);
        assert_eq!(out, format!("{}... [truncated 40 bytes]", "a".repeat(10)));
    }

    #[test]
    fn test_respects_char_boundaries() {
        // 'é' is two bytes; byte 3 falls inside the second one.
        let out = truncate_for_log("éééé", 3);
        assert!(out.starts_with("é..."));
    }
}
