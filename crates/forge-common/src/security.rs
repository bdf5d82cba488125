//! Heuristic for flagging security-relevant tasks so they get an extra review.

use std::sync::OnceLock;

use regex::Regex;

fn security_keywords() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)auth|login|password|credential|secret|token|jwt|oauth|session|permission|api[_\s-]?key|encrypt|decrypt|certificate|ssl|tls|csrf|xss|injection|security|vulnerable|sanitiz",
        )
        .expect("security keyword pattern is a fixed, valid regex")
    })
}

/// Whether the given text mentions anything that warrants a security review.
pub fn is_security_relevant(text: &str) -> bool {
    security_keywords().is_match(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_known_keywords_case_insensitively() {
        assert!(is_security_relevant("Rotate the JWT secret"));
        assert!(is_security_relevant("add OAUTH login flow"));
        assert!(is_security_relevant("sanitize user input"));
    }

    #[test]
    fn matches_partial_word_sanitiz_prefix() {
        assert!(is_security_relevant("sanitizing html before render"));
    }

    #[test]
    fn does_not_match_unrelated_text() {
        assert!(!is_security_relevant("Update README formatting"));
        assert!(!is_security_relevant("Refactor CSS grid layout"));
    }

    #[test]
    fn matches_api_key_with_separators() {
        assert!(is_security_relevant("store the api_key safely"));
        assert!(is_security_relevant("store the api-key safely"));
        assert!(is_security_relevant("store the api key safely"));
    }
}
