//! Scope filtering: which normalized emails are worth alerting on.

use leakscope_core::{Email, ScopeConfig, UnscopedPolicy};

/// Accepts emails matching the configured target email or domain.
///
/// With neither configured, the [`UnscopedPolicy`] decides.
#[derive(Debug, Clone)]
pub struct ScopeFilter {
    target_email: Option<String>,
    domain_suffix: Option<String>,
    unscoped: UnscopedPolicy,
}

impl ScopeFilter {
    #[must_use]
    pub fn new(config: &ScopeConfig) -> Self {
        let clean = |s: &str| {
            let s = s.trim().to_ascii_lowercase();
            (!s.is_empty()).then_some(s)
        };

        Self {
            target_email: clean(&config.target_email),
            domain_suffix: clean(config.target_domain.trim_start_matches('@'))
                .map(|domain| format!("@{domain}")),
            unscoped: config.unscoped,
        }
    }

    /// Whether any target is configured.
    #[must_use]
    pub fn is_scoped(&self) -> bool {
        self.target_email.is_some() || self.domain_suffix.is_some()
    }

    /// Emails are already lowercase, so plain string comparison is
    /// case-insensitive here.
    #[must_use]
    pub fn in_scope(&self, email: &Email) -> bool {
        let candidate = email.as_str();

        if let Some(target) = &self.target_email {
            if candidate.ends_with(target.as_str()) {
                return true;
            }
        }
        if let Some(suffix) = &self.domain_suffix {
            return candidate.ends_with(suffix.as_str());
        }
        if self.target_email.is_some() {
            return false;
        }

        self.unscoped == UnscopedPolicy::Open
    }
}
