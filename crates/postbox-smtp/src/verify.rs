//! Sender address verification.

use regex::Regex;
use trust_dns_resolver::config::{ResolverConfig, ResolverOpts};
use trust_dns_resolver::TokioAsyncResolver;

/// Default address format pattern.
///
/// Intentionally coarse: it gates obvious garbage, not RFC 5322 grammar.
pub const DEFAULT_ADDRESS_PATTERN: &str = r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$";

/// Configurable sender-address verifier.
///
/// Three independent switches: a regex format check (on by default), an
/// MX-existence lookup (off by default), and allow/block lists matched
/// against the address domain exactly or by suffix, case-insensitively.
#[derive(Debug, Clone)]
pub struct SenderVerifier {
    pattern: Regex,
    check_format: bool,
    check_mx: bool,
    allow: Vec<String>,
    block: Vec<String>,
}

impl Default for SenderVerifier {
    fn default() -> Self {
        Self::new()
    }
}

impl SenderVerifier {
    /// Creates a verifier with the default switches: format check on,
    /// MX check off, empty lists.
    #[must_use]
    pub fn new() -> Self {
        Self {
            // The default pattern is a valid regex; compiling it cannot fail.
            pattern: Regex::new(DEFAULT_ADDRESS_PATTERN).unwrap_or_else(|_| unreachable!()),
            check_format: true,
            check_mx: false,
            allow: Vec::new(),
            block: Vec::new(),
        }
    }

    /// Replaces the format pattern.
    ///
    /// # Errors
    ///
    /// Returns the regex compilation error for an invalid pattern.
    pub fn with_pattern(mut self, pattern: &str) -> Result<Self, regex::Error> {
        self.pattern = Regex::new(pattern)?;
        Ok(self)
    }

    /// Enables or disables the format check.
    #[must_use]
    pub fn with_format_check(mut self, check: bool) -> Self {
        self.check_format = check;
        self
    }

    /// Enables or disables the MX-existence check.
    #[must_use]
    pub fn with_mx_check(mut self, check: bool) -> Self {
        self.check_mx = check;
        self
    }

    /// Sets the allowed domains. An empty list allows every domain.
    #[must_use]
    pub fn with_allow_list(mut self, domains: Vec<String>) -> Self {
        self.allow = domains;
        self
    }

    /// Sets the blocked domains.
    #[must_use]
    pub fn with_block_list(mut self, domains: Vec<String>) -> Self {
        self.block = domains;
        self
    }

    /// Verifies an address against the configured checks.
    ///
    /// Returns `false` for an empty address, a format mismatch (when
    /// enabled), a blocked domain, a domain outside a non-empty allow
    /// list, or a failed MX lookup (when enabled).
    pub async fn verify(&self, addr: &str) -> bool {
        let addr = addr.trim();
        if addr.is_empty() {
            return false;
        }

        if self.check_format && !self.pattern.is_match(addr) {
            return false;
        }

        let Some((_, domain)) = addr.rsplit_once('@') else {
            return false;
        };
        let domain = domain.to_ascii_lowercase();

        if self.block.iter().any(|blocked| domain_matches(&domain, blocked)) {
            return false;
        }

        if !self.allow.is_empty()
            && !self.allow.iter().any(|allowed| domain_matches(&domain, allowed))
        {
            return false;
        }

        if self.check_mx && !mx_exists(&domain).await {
            return false;
        }

        true
    }
}

/// Exact or suffix domain match, case-insensitive.
fn domain_matches(domain: &str, candidate: &str) -> bool {
    let candidate = candidate.to_ascii_lowercase();
    domain == candidate || domain.ends_with(&format!(".{candidate}"))
}

async fn mx_exists(domain: &str) -> bool {
    let resolver = TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default());
    match resolver.mx_lookup(domain).await {
        Ok(lookup) => lookup.iter().next().is_some(),
        Err(e) => {
            tracing::debug!(?e, domain, "MX lookup failed");
            false
        }
    }
}
