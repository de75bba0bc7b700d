//! Header sensitivity classification and redaction.

use std::collections::BTreeMap;

/// Placeholder written in place of a sensitive header's value.
pub const REDACTED: &str = "REDACTED";

/// Header name patterns treated as secret-bearing unless configured otherwise.
pub const DEFAULT_SENSITIVE_PATTERNS: &[&str] = &[
    "authorization",
    "cookie",
    "x-api-key",
    "x-auth-token",
    "authentication",
    "x-access-token",
    "bearer",
];

/// Decides which header values may be logged verbatim.
///
/// A header is sensitive when its lower-cased name contains any of the patterns as a
/// substring, so `x-authorization-extra` matches `authorization`. Patterns are lower-cased on
/// construction. The policy is built once and shared read-only.
///
/// # Examples
///
/// ```rust
/// use request_snapshot::SensitivityPolicy;
///
/// let policy = SensitivityPolicy::default();
/// assert!(policy.is_sensitive("X-Api-Key"));
/// assert!(!policy.is_sensitive("Accept"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensitivityPolicy {
    patterns: Vec<String>,
    redact_sensitive: bool,
}

impl SensitivityPolicy {
    /// Create a policy from an arbitrary set of patterns.
    pub fn new<I, P>(patterns: I, redact_sensitive: bool) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<str>,
    {
        Self {
            patterns: patterns
                .into_iter()
                .map(|p| p.as_ref().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
            redact_sensitive,
        }
    }

    /// The default patterns, with redaction switched off. Every header is logged as received.
    pub fn disabled() -> Self {
        Self::new(DEFAULT_SENSITIVE_PATTERNS, false)
    }

    /// Whether sensitive values are replaced with [`REDACTED`].
    pub fn redact_sensitive(&self) -> bool {
        self.redact_sensitive
    }

    /// The lower-cased patterns.
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Whether a header name matches any pattern, ignoring case.
    pub fn is_sensitive(&self, header_name: &str) -> bool {
        let name = header_name.to_lowercase();
        self.patterns.iter().any(|p| name.contains(p.as_str()))
    }
}

impl Default for SensitivityPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_SENSITIVE_PATTERNS, true)
    }
}

/// Replace the values of sensitive headers with [`REDACTED`].
///
/// Every input key appears in the output exactly once; only values change. When the policy
/// has redaction switched off the map is returned as is.
pub fn sanitize_headers<'a, I>(headers: I, policy: &SensitivityPolicy) -> BTreeMap<String, String>
where
    I: IntoIterator<Item = (&'a String, &'a String)>,
{
    headers
        .into_iter()
        .map(|(name, value)| {
            let value = if policy.redact_sensitive && policy.is_sensitive(name) {
                REDACTED.to_string()
            } else {
                value.clone()
            };
            (name.clone(), value)
        })
        .collect()
}
