//! Shared domain types used across the leakscope pipeline.
//!
//! [`Email`] is a validated, lower-cased address; [`Credential`] pairs one
//! with a password; [`ScanResult`] is the immutable output of scanning one
//! input unit.

use crate::error::{CoreError, EmailRejection};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Maximum accepted email length in characters.
pub const MAX_EMAIL_LEN: usize = 254;

/// Longest byte span a credential pattern can match: a 16-byte scheme,
/// `://`, a 200-byte URL, a separator, a 378-byte email, a separator and a
/// 100-byte password.
///
/// Chunked reads need an overlap at least this long so a token holding a
/// whole credential is carried across a chunk boundary intact.
pub const MAX_CREDENTIAL_SPAN: usize = 700;

/// Characters stripped from the front of a raw match before validation.
const LEADING_JUNK: &[char] = &['+', '-', '.', '_'];

/// A canonical, lower-cased email address.
///
/// Construct with [`Email::parse`], which applies the strict shape check.
/// The extraction regexes are deliberately looser than this.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Email(String);

impl Email {
    /// Clean, validate, and lower-case a raw email candidate.
    ///
    /// Leading `+`, `-`, `.` and `_` are stripped first. The candidate is then
    /// rejected if it is a `+`-prefixed phone number, longer than
    /// [`MAX_EMAIL_LEN`], or not of the form `local@domain.tld`.
    pub fn parse(raw: &str) -> Result<Self, EmailRejection> {
        let trimmed = raw.trim();

        if is_phone_artifact(trimmed) {
            return Err(EmailRejection::PhoneNumber);
        }

        let cleaned = trimmed.trim_start_matches(LEADING_JUNK);
        if cleaned.is_empty() {
            return Err(EmailRejection::Empty);
        }

        let len = cleaned.chars().count();
        if len > MAX_EMAIL_LEN {
            return Err(EmailRejection::TooLong { len });
        }

        if !EMAIL_SHAPE.is_match(cleaned) {
            return Err(EmailRejection::Malformed);
        }

        let (local, _) = cleaned.split_once('@').ok_or(EmailRejection::Malformed)?;
        if local.contains("..") {
            return Err(EmailRejection::Malformed);
        }

        Ok(Self(cleaned.to_ascii_lowercase()))
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The part after `@`.
    #[must_use]
    pub fn domain(&self) -> &str {
        self.0.rsplit_once('@').map_or("", |(_, domain)| domain)
    }

    /// The part before `@`.
    #[must_use]
    pub fn local_part(&self) -> &str {
        self.0.rsplit_once('@').map_or("", |(local, _)| local)
    }
}

/// Canonical `local@domain.tld` shape, stricter than the extraction regexes.
static EMAIL_SHAPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^[A-Za-z0-9%][A-Za-z0-9._%+-]{0,63}@[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?)*\.[A-Za-z]{2,63}$",
    )
    .expect("email shape regex is hardcoded and valid")
});

/// `+15551234567@host` style matches, where a phone number was captured as
/// the local part.
fn is_phone_artifact(candidate: &str) -> bool {
    let Some((local, _)) = candidate.rsplit_once('@') else {
        return false;
    };
    let local = local.trim_start_matches(['-', '.', '_']);
    match local.strip_prefix('+') {
        Some(digits) => !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()),
        None => false,
    }
}

impl TryFrom<String> for Email {
    type Error = EmailRejection;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Email> for String {
    fn from(email: Email) -> Self {
        email.0
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An `(email, password)` pair discovered in scanned content.
///
/// Identity (equality, hashing, ordering) is the pair itself, which is also
/// the persistent dedup key.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "RawCredential")]
pub struct Credential {
    /// Normalized email half
    pub email: Email,
    /// Password exactly as captured (lossy-decoded)
    pub password: String,
}

impl Credential {
    /// Pair an email with a password.
    ///
    /// # Errors
    /// Returns error if the password is empty.
    pub fn new(email: Email, password: impl Into<String>) -> Result<Self, CoreError> {
        let password = password.into();
        if password.is_empty() {
            return Err(CoreError::Validation(format!(
                "empty password for {email}"
            )));
        }
        Ok(Self { email, password })
    }

    /// The dedup key for this credential.
    #[must_use]
    pub fn key(&self) -> (String, String) {
        (self.email.as_str().to_string(), self.password.clone())
    }
}

// Passwords stay out of logs.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("email", &self.email.as_str())
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Deserialize)]
struct RawCredential {
    email: String,
    password: String,
}

impl TryFrom<RawCredential> for Credential {
    type Error = CoreError;

    fn try_from(raw: RawCredential) -> Result<Self, Self::Error> {
        let email = Email::parse(&raw.email)?;
        Self::new(email, raw.password)
    }
}

/// Output of scanning one input unit.
///
/// Immutable once built. `emails` always contains every email that appears
/// in `creds`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanResult {
    emails: BTreeSet<Email>,
    creds: BTreeSet<Credential>,
}

impl ScanResult {
    /// Sorted, deduplicated emails.
    pub fn emails(&self) -> impl Iterator<Item = &Email> {
        self.emails.iter()
    }

    /// Deduplicated credentials in `(email, password)` order.
    pub fn creds(&self) -> impl Iterator<Item = &Credential> {
        self.creds.iter()
    }

    /// Number of distinct emails.
    #[must_use]
    pub fn email_count(&self) -> usize {
        self.emails.len()
    }

    /// Number of distinct credentials.
    #[must_use]
    pub fn cred_count(&self) -> usize {
        self.creds.len()
    }

    /// True when neither emails nor credentials were found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.emails.is_empty() && self.creds.is_empty()
    }

    /// Check whether a specific email was found.
    #[must_use]
    pub fn contains_email(&self, email: &str) -> bool {
        self.emails.iter().any(|e| e.as_str() == email)
    }

    /// Consume the result, returning credentials as an owned list.
    #[must_use]
    pub fn into_creds(self) -> Vec<Credential> {
        self.creds.into_iter().collect()
    }
}

/// Accumulates findings (possibly across many chunks) into a [`ScanResult`].
#[derive(Debug, Default)]
pub struct ScanResultBuilder {
    emails: BTreeSet<Email>,
    creds: BTreeSet<Credential>,
}

impl ScanResultBuilder {
    /// Create an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a bare email.
    pub fn add_email(&mut self, email: Email) {
        self.emails.insert(email);
    }

    /// Record a credential; its email is recorded too.
    pub fn add_credential(&mut self, credential: Credential) {
        self.emails.insert(credential.email.clone());
        self.creds.insert(credential);
    }

    /// Merge another finished result into this one.
    pub fn merge(&mut self, other: ScanResult) {
        self.emails.extend(other.emails);
        self.creds.extend(other.creds);
    }

    /// Number of credentials collected so far.
    #[must_use]
    pub fn cred_count(&self) -> usize {
        self.creds.len()
    }

    /// Freeze into a [`ScanResult`].
    #[must_use]
    pub fn build(self) -> ScanResult {
        ScanResult {
            emails: self.emails,
            creds: self.creds,
        }
    }
}
