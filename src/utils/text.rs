use std::sync::OnceLock;

use regex::Regex;

/// Collapses internal whitespace and trims; empty input becomes `None`.
pub fn normalize_text(text: &str) -> Option<String> {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed)
    }
}

fn phone_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // Belarus phone numbers: +375 XX XXX-XX-XX and close variants
    PATTERN.get_or_init(|| {
        Regex::new(r"\+375\s?\d{2}\s?\d{3}[-.\s]?\d{2}[-.\s]?\d{2}")
            .expect("static regex must compile")
    })
}

pub fn extract_phone(text: &str) -> Option<String> {
    phone_pattern().find(text).map(|m| m.as_str().to_string())
}
