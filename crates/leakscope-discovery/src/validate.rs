//! Email normalization on top of [`Email::parse`], plus the domain policy.

use leakscope_core::{Email, EmailRejection, ValidationConfig};
use tracing::trace;

/// Top-level "domains" that are really image file names, e.g. `logo@2x.png`
const ASSET_TLDS: &[&str] = &["png", "jpg", "jpeg", "gif", "svg", "webp", "bmp", "ico"];

/// Normalizes raw email candidates and applies the blocked-domain policy.
#[derive(Debug, Clone, Default)]
pub struct Validator {
    blocked_domains: Vec<String>,
}

impl Validator {
    #[must_use]
    pub fn new(blocked_domains: impl IntoIterator<Item = String>) -> Self {
        Self {
            blocked_domains: blocked_domains
                .into_iter()
                .map(|d| d.trim().trim_start_matches('.').to_ascii_lowercase())
                .filter(|d| !d.is_empty())
                .collect(),
        }
    }

    #[must_use]
    pub fn from_config(config: &ValidationConfig) -> Self {
        Self::new(config.blocked_domains.iter().cloned())
    }

    /// Clean, check and lowercase one candidate.
    ///
    /// # Errors
    /// Returns the reason the candidate was dropped. Callers discard it; a
    /// rejection never fails the scan.
    pub fn normalize(&self, raw: &str) -> Result<Email, EmailRejection> {
        let email = Email::parse(raw)?;
        let domain = email.domain();

        let tld = domain.rsplit('.').next().unwrap_or_default();
        if ASSET_TLDS.contains(&tld) || self.is_blocked(domain) {
            trace!(domain, "dropping candidate with disallowed domain");
            return Err(EmailRejection::DisallowedDomain {
                domain: domain.to_string(),
            });
        }
        Ok(email)
    }

    /// Exact match or subdomain of a blocked domain
    fn is_blocked(&self, domain: &str) -> bool {
        self.blocked_domains.iter().any(|blocked| {
            domain == blocked
                || domain
                    .strip_suffix(blocked.as_str())
                    .is_some_and(|prefix| prefix.ends_with('.'))
        })
    }
}
