//! Line normalization and domain validation for downloaded lists

use once_cell::sync::Lazy;
use regex_lite::Regex;

/// Lines starting with `#`, `//`, `!` or `/*` are comments
static COMMENT_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(#|//|!|/\*)").expect("Invalid regex pattern for comment lines")
});

/// Labels of 1-63 alphanumerics with inner hyphens, alphabetic TLD of 2-63
static DOMAIN_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?\.)+[a-z]{2,63}$")
        .expect("Invalid regex pattern for domain validation")
});

const HOSTS_PREFIXES: [&str; 3] = ["0.0.0.0", "127.0.0.1", "::1"];
const ADBLOCK_PREFIXES: [&str; 3] = ["||", "*.", "^"];

/// Whether a trimmed line carries no entry
pub fn is_comment_or_blank(line: &str) -> bool {
    line.trim().is_empty() || COMMENT_PATTERN.is_match(line)
}

/// Reduce a hosts-file, adblock or plain line to a bare lowercase domain
///
/// The result is not validated; pass it through [`is_valid_domain`].
pub fn normalize_line(line: &str) -> String {
    let mut s = line.trim();

    for prefix in HOSTS_PREFIXES {
        if let Some(rest) = s.strip_prefix(prefix) {
            if rest.starts_with(char::is_whitespace) {
                s = rest.trim_start();
                break;
            }
        }
    }
    for prefix in ADBLOCK_PREFIXES {
        if let Some(rest) = s.strip_prefix(prefix) {
            s = rest;
        }
    }

    // Trailing metadata after the first space
    let s = s.split(char::is_whitespace).next().unwrap_or_default();
    let s = s.trim_end_matches(|c: char| c == '^' || c == '/' || c.is_whitespace());
    let s = s.trim_matches(|c: char| c == '|' || c.is_whitespace());

    s.to_lowercase()
}

/// Whether `candidate` is a syntactically valid, already normalized domain
pub fn is_valid_domain(candidate: &str) -> bool {
    DOMAIN_PATTERN.is_match(candidate)
}

/// Normalized domain for a line, or `None` for comments and invalid entries
pub fn parse_line(line: &str) -> Option<String> {
    if is_comment_or_blank(line) {
        return None;
    }
    let normalized = normalize_line(line);
    is_valid_domain(&normalized).then_some(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_table() {
        let cases = [
            ("example.com", "example.com"),
            ("  Example.COM  ", "example.com"),
            ("0.0.0.0 ads.example.com", "ads.example.com"),
            ("127.0.0.1 tracker.net", "tracker.net"),
            ("::1 localhost.example.org", "localhost.example.org"),
            ("0.0.0.0\tads.example.com", "ads.example.com"),
            ("||ads.example.com^", "ads.example.com"),
            ("||ads.example.com^$third-party", "ads.example.com^$third-party"),
            ("*.doubleclick.net", "doubleclick.net"),
            ("^weird.example", "weird.example"),
            ("example.com # trailing comment", "example.com"),
            ("example.com/", "example.com"),
            ("|pipe.example.com|", "pipe.example.com"),
        ];
        for (input, expected) in cases {
            assert_eq!(normalize_line(input), expected, "input: {:?}", input);
        }
    }

    #[test]
    fn test_comments_and_blank_lines() {
        assert!(is_comment_or_blank(""));
        assert!(is_comment_or_blank("   "));
        assert!(is_comment_or_blank("# hosts file"));
        assert!(is_comment_or_blank("  // note"));
        assert!(is_comment_or_blank("! Title: EasyList"));
        assert!(is_comment_or_blank("/* block */"));
        assert!(!is_comment_or_blank("example.com"));
    }

    #[test]
    fn test_domain_validation() {
        assert!(is_valid_domain("example.com"));
        assert!(is_valid_domain("a.b.c.example.co"));
        assert!(is_valid_domain("xn--80ak6aa92e.com"));
        assert!(is_valid_domain("my-site.example.org"));

        assert!(!is_valid_domain("localhost"));
        assert!(!is_valid_domain("-bad.example.com"));
        assert!(!is_valid_domain("bad-.example.com"));
        assert!(!is_valid_domain("example.c"));
        assert!(!is_valid_domain("example.123"));
        assert!(!is_valid_domain("Example.com"));
        assert!(!is_valid_domain("exa mple.com"));
        assert!(!is_valid_domain(&format!("{}.com", "a".repeat(64))));
        assert!(is_valid_domain(&format!("{}.com", "a".repeat(63))));
    }

    #[test]
    fn test_parse_line() {
        assert_eq!(
            parse_line("0.0.0.0 Ads.Example.com"),
            Some("ads.example.com".to_string())
        );
        assert_eq!(parse_line("# comment"), None);
        assert_eq!(parse_line("0.0.0.0 0.0.0.0"), None);
        assert_eq!(parse_line("||ads.example.com^$third-party"), None);
    }
}
