//! Scrubbing of credentials from text that may reach logs or users.

use std::sync::OnceLock;

use regex::Regex;

const REDACTED: &str = "[REDACTED]";

/// Pattern plus replacement. `$1` keeps a captured label in front of the value.
fn secret_patterns() -> &'static [(Regex, &'static str)] {
    static PATTERNS: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            (r"sk-[A-Za-z0-9_\-]{8,}", REDACTED),
            (r"(?i)bearer\s+[A-Za-z0-9_\-\.=]{8,}", REDACTED),
            (
                r#"(?i)(api[_-]?key["']?\s*[:=]\s*["']?)[A-Za-z0-9_\-]{8,}"#,
                "${1}[REDACTED]",
            ),
        ]
        .into_iter()
        .filter_map(|(p, r)| Regex::new(p).ok().map(|re| (re, r)))
        .collect()
    })
}

/// Replace credential-looking substrings with `[REDACTED]`.
///
/// `known_secret` is the configured key, if any; every literal occurrence is
/// removed before the pattern pass.
pub fn redact_secrets(text: &str, known_secret: Option<&str>) -> String {
    let mut out = match known_secret.map(str::trim) {
        Some(secret) if !secret.is_empty() => text.replace(secret, REDACTED),
        _ => text.to_string(),
    };

    for (re, replacement) in secret_patterns() {
        out = re.replace_all(&out, *replacement).into_owned();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_secret_removed() {
        let out = redact_secrets("key was abc123xyz in request", Some("abc123xyz"));
        assert_eq!(out, "key was [REDACTED] in request");
    }

    #[test]
    fn test_blank_known_secret_is_ignored() {
        let out = redact_secrets("nothing to hide", Some("  "));
        assert_eq!(out, "nothing to hide");
    }

    #[test]
    fn test_openai_style_key_removed() {
        let out = redact_secrets("Incorrect API key provided: sk-proj-AbCdEf123456", None);
        assert!(!out.contains("sk-proj-AbCdEf123456"));
        assert!(out.contains(REDACTED));
    }

    #[test]
    fn test_bearer_token_removed() {
        let out = redact_secrets("Authorization: Bearer abcdefgh12345678", None);
        assert!(!out.contains("abcdefgh12345678"));
    }

    #[test]
    fn test_api_key_assignment_keeps_label() {
        let out = redact_secrets(r#"{"api_key": "zzzzzzzzzzzz"}"#, None);
        assert!(out.contains("api_key"));
        assert!(!out.contains("zzzzzzzzzzzz"));
    }

    #[test]
    fn test_plain_text_untouched() {
        let text = "Alice is 30 years old and lives in Paris";
        assert_eq!(redact_secrets(text, None), text);
    }
}
