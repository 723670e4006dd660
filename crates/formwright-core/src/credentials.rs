//! Login credentials
//!
//! The secret half of a credential lives in a [`SecureString`], which is
//! zeroed on drop and never printed.

use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A string wiped from memory when dropped.
///
/// ```
/// use formwright_core::credentials::SecureString;
///
/// let secret = SecureString::new("hunter2");
/// assert_eq!(secret.expose(), "hunter2");
/// assert!(!format!("{secret:?}").contains("hunter2"));
/// ```
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecureString {
    inner: String,
}

impl SecureString {
    /// Wrap a secret
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self { inner: s.into() }
    }

    /// Borrow the plaintext. Keep the borrow short.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.inner
    }

    /// Length in bytes
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether the secret is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl std::fmt::Debug for SecureString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SecureString([REDACTED, {} bytes])", self.inner.len())
    }
}

// Constant-time so comparisons don't leak prefix length
impl PartialEq for SecureString {
    fn eq(&self, other: &Self) -> bool {
        self.inner.as_bytes().ct_eq(other.inner.as_bytes()).into()
    }
}

impl Eq for SecureString {}

static EMAIL_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").ok());

/// Account name plus secret for one identity
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    /// Account name (usually an email address)
    pub account: String,
    /// Password or equivalent secret
    pub secret: SecureString,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("account", &self.account)
            .field("secret", &self.secret)
            .finish()
    }
}

impl Credential {
    /// Create a credential
    #[must_use]
    pub fn new(account: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            secret: SecureString::new(secret),
        }
    }

    /// Check the credential is well-formed before any login is attempted.
    ///
    /// The account must be non-empty with no whitespace, and must look like
    /// an email address if it contains `@`. The secret must be non-empty.
    pub fn validate(&self) -> Result<(), String> {
        let account = self.account.as_str();
        if account.is_empty() {
            return Err("account is empty".to_string());
        }
        if account.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err("account contains whitespace".to_string());
        }
        if account.contains('@') {
            let is_email = EMAIL_RE
                .as_ref()
                .map(|re| re.is_match(account))
                .unwrap_or(false);
            if !is_email {
                return Err(format!("'{account}' is not a valid account address"));
            }
        }
        if self.secret.is_empty() {
            return Err("secret is empty".to_string());
        }
        Ok(())
    }
}

/// Lookup of the credential to use for an identity
pub trait CredentialSource: Send + Sync {
    /// Credential for `identity`, if one is known
    fn credential_for(&self, identity: &str) -> Option<Credential>;
}

/// Fixed identity → credential table
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials {
    entries: HashMap<String, Credential>,
}

impl StaticCredentials {
    /// Empty table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the credential for `identity`
    #[must_use]
    pub fn with(mut self, identity: impl Into<String>, credential: Credential) -> Self {
        self.entries.insert(identity.into(), credential);
        self
    }

    /// Add or replace the credential for `identity`
    pub fn insert(&mut self, identity: impl Into<String>, credential: Credential) {
        self.entries.insert(identity.into(), credential);
    }

    /// Number of identities with a credential
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl CredentialSource for StaticCredentials {
    fn credential_for(&self, identity: &str) -> Option<Credential> {
        self.entries.get(identity).cloned()
    }
}
