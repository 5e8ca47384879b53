//! Query name derivation.

use crate::address::ParsedAddress;
use crate::error::ResolutionError;
use std::fmt;
use trust_dns_proto::rr::Name;

/// Labels inserted between the user and the domain.
pub const FIXED_LABELS: [&str; 2] = ["user", "_bitcoin-payment"];

/// Presentation length of `user._bitcoin-payment`.
pub(crate) const FIXED_LABELS_LEN: usize = 21;

/// The fully-qualified name holding the payment TXT record for an address:
/// `<user>.user._bitcoin-payment.<domain>.`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryName {
    labels: Vec<String>,
}

/// Derive the query name for a parsed address. Pure and deterministic; distinct addresses map
/// to distinct names since user labels never contain `_` and the fixed labels can't be
/// produced by the domain part alone.
#[must_use]
pub fn derive(addr: &ParsedAddress) -> QueryName {
    let labels = addr
        .user()
        .split('.')
        .chain(FIXED_LABELS)
        .chain(addr.domain().split('.'))
        .map(str::to_string)
        .collect();
    QueryName { labels }
}

impl QueryName {
    #[must_use]
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Convert to a wire-ready [`Name`]. Labels are passed as raw bytes so no IDNA mapping is
    /// applied to them.
    ///
    /// # Errors
    ///
    /// Returns [`ResolutionError::MalformedAddress`] if the labels don't form a valid DNS name.
    pub fn to_name(&self) -> Result<Name, ResolutionError> {
        Name::from_labels(self.labels.iter().map(String::as_bytes))
            .map_err(|err| ResolutionError::MalformedAddress(err.to_string()))
    }
}

impl fmt::Display for QueryName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for label in &self.labels {
            write!(f, "{label}.")?;
        }
        Ok(())
    }
}
