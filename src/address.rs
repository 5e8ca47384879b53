//! Human-readable address parsing.
//!
//! A BIP-353 address looks like an email address (`₿alice@example.com`) but isn't one: both
//! halves end up as DNS labels, so they are validated with DNS label rules. The user part may
//! contain dots (each dot-separated piece becomes its own label), but never an underscore, which
//! keeps it from colliding with the fixed `_bitcoin-payment` label.

use crate::error::ResolutionError;
use crate::query_name::FIXED_LABELS_LEN;

/// The optional currency glyph an address may be prefixed with.
pub const CURRENCY_PREFIX: char = '₿';

/// Maximum length of a domain name in presentation format, without the trailing dot.
pub const MAX_NAME_LEN: usize = 253;

/// Maximum length of a single DNS label.
pub const MAX_LABEL_LEN: usize = 63;

/// A validated `(user, domain)` pair. Both parts are lowercase ASCII and free of `@`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParsedAddress {
    user: String,
    domain: String,
}

impl ParsedAddress {
    /// Validate an already-split identity.
    ///
    /// # Errors
    ///
    /// Returns [`ResolutionError::MalformedAddress`] when either part is empty, contains
    /// characters outside the DNS letter-digit-hyphen set, or when the resulting query name would
    /// exceed DNS length limits.
    pub fn new(user: &str, domain: &str) -> Result<Self, ResolutionError> {
        let user = user.to_ascii_lowercase();
        let domain = domain.to_ascii_lowercase();
        let domain = domain.strip_suffix('.').unwrap_or(&domain).to_string();

        validate_labels("user", &user)?;
        validate_labels("domain", &domain)?;
        if domain.len() > MAX_NAME_LEN {
            return Err(malformed(format!(
                "domain is {} octets, more than {MAX_NAME_LEN}",
                domain.len()
            )));
        }
        // "<user>.user._bitcoin-payment.<domain>"
        let total = user.len() + 1 + FIXED_LABELS_LEN + 1 + domain.len();
        if total > MAX_NAME_LEN {
            return Err(malformed(format!(
                "query name would be {total} octets, more than {MAX_NAME_LEN}"
            )));
        }
        Ok(Self { user, domain })
    }

    #[must_use]
    pub fn user(&self) -> &str {
        &self.user
    }

    #[must_use]
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Display form with the currency prefix, e.g. `₿alice@example.com`.
    #[must_use]
    pub fn to_hrn(&self) -> String {
        format!("{CURRENCY_PREFIX}{}@{}", self.user, self.domain)
    }
}

/// Split and validate a human-readable address.
///
/// Surrounding whitespace and one leading `₿` are stripped, as is whitespace on either side of
/// the `@`. Exactly one `@` must separate a non-empty user from a non-empty domain.
///
/// # Errors
///
/// Returns [`ResolutionError::MalformedAddress`] for any input that isn't a well-formed
/// address.
pub fn parse(input: &str) -> Result<ParsedAddress, ResolutionError> {
    let trimmed = input.trim();
    let trimmed = trimmed.strip_prefix(CURRENCY_PREFIX).unwrap_or(trimmed);

    let mut parts = trimmed.split('@');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(user), Some(domain), None) => ParsedAddress::new(user.trim(), domain.trim()),
        (_, None, _) => Err(malformed("missing '@' separator")),
        (_, Some(_), Some(_)) => Err(malformed("more than one '@' separator")),
        (None, _, _) => Err(malformed("empty address")),
    }
}

fn validate_labels(part: &str, value: &str) -> Result<(), ResolutionError> {
    if value.is_empty() {
        return Err(malformed(format!("{part} is empty")));
    }
    for label in value.split('.') {
        validate_label(part, label)?;
    }
    Ok(())
}

fn validate_label(part: &str, label: &str) -> Result<(), ResolutionError> {
    if label.is_empty() {
        return Err(malformed(format!("{part} contains an empty label")));
    }
    if label.len() > MAX_LABEL_LEN {
        return Err(malformed(format!(
            "{part} label \"{label}\" is longer than {MAX_LABEL_LEN} octets"
        )));
    }
    if let Some(c) = label
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '-'))
    {
        return Err(malformed(format!("{part} contains invalid character {c:?}")));
    }
    if label.starts_with('-') || label.ends_with('-') {
        return Err(malformed(format!(
            "{part} label \"{label}\" starts or ends with a hyphen"
        )));
    }
    Ok(())
}

fn malformed(reason: impl Into<String>) -> ResolutionError {
    ResolutionError::MalformedAddress(reason.into())
}
