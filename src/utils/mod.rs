use std::sync::OnceLock;

use regex::Regex;

fn ansi_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"\x1b\[[0-9;]*[A-Za-z]").ok())
        .as_ref()
}

/// Strip terminal color sequences and surrounding whitespace
pub fn clean_display(text: &str) -> String {
    match ansi_pattern() {
        Some(re) => re.replace_all(text, "").trim().to_string(),
        None => text.trim().to_string(),
    }
}

/// First `max_chars` characters of `text`, never splitting a character
pub fn snippet(text: &str, max_chars: usize) -> String {
    text.trim().chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_display() {
        assert_eq!(clean_display("\u{1b}[0;94m 42.0%\u{1b}[0m"), "42.0%");
        assert_eq!(clean_display("  1.21MiB/s "), "1.21MiB/s");
    }

    #[test]
    fn test_snippet() {
        assert_eq!(snippet("short", 45), "short");
        assert_eq!(snippet("ñandú ñandú", 5), "ñandú");
    }
}
