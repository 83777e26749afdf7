//! Byte-level email and credential extraction.
//!
//! Patterns run over raw bytes so the scan is independent of the input's
//! encoding; only captured groups are decoded, lossily. The three credential
//! patterns are applied independently and their results unioned, so overlap
//! between them is expected and resolved by `(email, password)` dedup later.

use once_cell::sync::Lazy;
use regex::bytes::Regex;
use serde::Serialize;

pub use leakscope_core::MAX_CREDENTIAL_SPAN;

/// Bare email addresses (permissive; validation happens later)
static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?-u)[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}")
        .expect("Email regex is hardcoded and valid")
});

/// `email<sep>password` with sep one of `: | , ;`
///
/// The email must start at the beginning of the buffer or after a byte that
/// cannot be part of a local part, so an overlong local part is skipped
/// rather than cut down to its last 64 bytes.
static SEPARATED_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?-u)(?:^|[^A-Za-z0-9._%+-])([A-Za-z0-9._%+-]{1,64}@[A-Za-z0-9.-]{1,249}\.[A-Za-z]{2,63})[:|,;]([^\s]{1,100})",
    )
    .expect("Separated credential regex is hardcoded and valid")
});

/// `scheme://host/path:email:password` combo-list lines
static URL_EMBEDDED_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?-u)[A-Za-z][A-Za-z0-9+.-]{1,15}://[^\s]{1,200}?[:|,;]([A-Za-z0-9._%+-]{1,64}@[A-Za-z0-9.-]{1,249}\.[A-Za-z]{2,63})[:|,;]([^\s]{1,100})",
    )
    .expect("URL credential regex is hardcoded and valid")
});

/// `label:email:password` where label is 3+ bytes without colon or space
static LABELED_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?-u)[^\s:]{3,64}:([A-Za-z0-9._%+-]{1,64}@[A-Za-z0-9.-]{1,249}\.[A-Za-z]{2,63}):([^\s]{1,100})",
    )
    .expect("Labeled credential regex is hardcoded and valid")
});

/// The credential shapes recognized in leaked dumps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CredentialPattern {
    /// `user@host.tld:secret` and friends
    Separated,
    /// `https://site/login:user@host.tld:secret`
    UrlEmbedded,
    /// `service:user@host.tld:secret`
    Labeled,
}

impl CredentialPattern {
    pub const ALL: [Self; 3] = [Self::Separated, Self::UrlEmbedded, Self::Labeled];

    fn regex(self) -> &'static Regex {
        match self {
            Self::Separated => &SEPARATED_PATTERN,
            Self::UrlEmbedded => &URL_EMBEDDED_PATTERN,
            Self::Labeled => &LABELED_PATTERN,
        }
    }
}

/// Unvalidated candidates from one buffer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawFindings {
    pub emails: Vec<String>,
    pub creds: Vec<(String, String)>,
}

impl RawFindings {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.emails.is_empty() && self.creds.is_empty()
    }
}

/// Pattern matchers for emails and credentials
#[derive(Debug, Clone)]
pub struct PatternSet {
    credential_patterns: Vec<CredentialPattern>,
}

impl PatternSet {
    /// All three credential patterns.
    #[must_use]
    pub fn new() -> Self {
        Self::with_patterns(&CredentialPattern::ALL)
    }

    /// A specific subset (and order) of credential patterns.
    #[must_use]
    pub fn with_patterns(patterns: &[CredentialPattern]) -> Self {
        Self {
            credential_patterns: patterns.to_vec(),
        }
    }

    /// Check if a buffer contains something email-shaped
    #[must_use]
    pub fn has_email(&self, buf: &[u8]) -> bool {
        EMAIL_PATTERN.is_match(buf)
    }

    /// Find every email and credential candidate in `buf`.
    #[must_use]
    pub fn extract(&self, buf: &[u8]) -> RawFindings {
        let mut findings = RawFindings::default();
        if !self.has_email(buf) {
            return findings;
        }

        findings.emails = EMAIL_PATTERN
            .find_iter(buf)
            .map(|m| decode(m.as_bytes()))
            .collect();

        for pattern in &self.credential_patterns {
            for caps in pattern.regex().captures_iter(buf) {
                if let (Some(email), Some(password)) = (caps.get(1), caps.get(2)) {
                    findings
                        .creds
                        .push((decode(email.as_bytes()), decode(password.as_bytes())));
                }
            }
        }

        findings
    }
}

impl Default for PatternSet {
    fn default() -> Self {
        Self::new()
    }
}

fn decode(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn pair(email: &str, password: &str) -> (String, String) {
        (email.to_string(), password.to_string())
    }

    #[test]
    fn test_email_pattern() {
        let patterns = PatternSet::new();

        assert!(patterns.has_email(b"contact me at john@example.com"));
        assert!(patterns.has_email(b"Email: alice.smith@company.co.uk"));
        assert!(!patterns.has_email(b"not an email"));
        assert!(!patterns.has_email(b"@invalid"));
    }

    #[test]
    fn test_separated_credentials() {
        let findings = PatternSet::with_patterns(&[CredentialPattern::Separated])
            .extract(b"a@x.org:pw1\nb@x.org|pw2\nc@x.org,pw3\nd@x.org;pw4\n");

        assert_eq!(
            findings.creds,
            vec![
                pair("a@x.org", "pw1"),
                pair("b@x.org", "pw2"),
                pair("c@x.org", "pw3"),
                pair("d@x.org", "pw4"),
            ]
        );
        assert_eq!(findings.emails.len(), 4);
    }

    #[test]
    fn test_password_stops_at_whitespace() {
        let findings =
            PatternSet::new().extract(b"leak dump: admin@example.org:Secret123 more text");
        assert!(findings.creds.contains(&pair("admin@example.org", "Secret123")));
    }

    #[test]
    fn test_password_length_bound() {
        let long = format!("a@x.org:{}", "p".repeat(150));
        let findings =
            PatternSet::with_patterns(&[CredentialPattern::Separated]).extract(long.as_bytes());
        assert_eq!(findings.creds[0].1.len(), 100);
    }

    #[test]
    fn test_overlong_local_part_is_not_truncated() {
        let line = format!("{}@corp.com:Secret1\n", "x".repeat(70));
        let findings = PatternSet::new().extract(line.as_bytes());

        assert!(findings.creds.is_empty());
        assert_eq!(findings.emails, vec![format!("{}@corp.com", "x".repeat(70))]);
    }

    #[test]
    fn test_separated_email_after_punctuation() {
        let findings = PatternSet::with_patterns(&[CredentialPattern::Separated])
            .extract(b"<a@x.org:pw1 \"b@x.org;pw2");
        assert_eq!(findings.creds, vec![pair("a@x.org", "pw1"), pair("b@x.org", "pw2")]);
    }

    #[test]
    fn test_domain_as_long_as_an_email_allows() {
        let email = format!("ab@{}.org", "d".repeat(247));
        let line = format!("{email}:Secret1\n");
        let findings = PatternSet::new().extract(line.as_bytes());

        assert!(findings.creds.contains(&pair(&email, "Secret1")));
    }

    #[test]
    fn test_url_embedded_credentials() {
        let findings = PatternSet::with_patterns(&[CredentialPattern::UrlEmbedded])
            .extract(b"https://login.site.com/auth:user@corp.com:hunter2\n");
        assert_eq!(findings.creds, vec![pair("user@corp.com", "hunter2")]);
    }

    #[test]
    fn test_labeled_credentials() {
        let findings = PatternSet::with_patterns(&[CredentialPattern::Labeled])
            .extract(b"netflix:viewer@corp.com:letmein\nab:short@corp.com:nope\n");
        // Two-byte labels are too short
        assert_eq!(findings.creds, vec![pair("viewer@corp.com", "letmein")]);
    }

    #[test]
    fn test_invalid_utf8_is_decoded_lossily() {
        let mut buf = b"a@x.org:p".to_vec();
        buf.push(0xFF);
        buf.extend_from_slice(b"w\n");
        let findings = PatternSet::with_patterns(&[CredentialPattern::Separated]).extract(&buf);
        assert_eq!(findings.creds.len(), 1);
        assert_eq!(findings.creds[0].1, "p\u{FFFD}w");
    }

    #[test]
    fn test_pattern_order_does_not_change_result_set() {
        let buf = b"https://a.com/login:u1@corp.com:pw1\n\
                    svc:u2@corp.com:pw2\n\
                    u3@corp.com;pw3 and u4@corp.com|pw4\n";

        let forward: HashSet<_> = PatternSet::with_patterns(&[
            CredentialPattern::Separated,
            CredentialPattern::UrlEmbedded,
            CredentialPattern::Labeled,
        ])
        .extract(buf)
        .creds
        .into_iter()
        .collect();

        let reverse: HashSet<_> = PatternSet::with_patterns(&[
            CredentialPattern::Labeled,
            CredentialPattern::UrlEmbedded,
            CredentialPattern::Separated,
        ])
        .extract(buf)
        .creds
        .into_iter()
        .collect();

        assert_eq!(forward, reverse);
        assert!(forward.contains(&pair("u1@corp.com", "pw1")));
        assert!(forward.contains(&pair("u2@corp.com", "pw2")));
        assert!(forward.contains(&pair("u3@corp.com", "pw3")));
        assert!(forward.contains(&pair("u4@corp.com", "pw4")));
    }

    #[test]
    fn test_no_email_short_circuits() {
        let findings = PatternSet::new().extract(b"label:nothing:here");
        assert!(findings.is_empty());
    }
}
