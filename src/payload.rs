//! Payment record selection.
//!
//! A name may publish any number of TXT records, but exactly one of them may be a payment URI.
//! Each record's character-strings are joined in wire order before looking at it; records that
//! don't start with `bitcoin:` (in any case) are ignored.

use crate::dnssec::AuthenticatedRRset;
use crate::error::ResolutionError;
use trust_dns_proto::rr::{RData, Record};

/// Scheme prefix identifying a payment record.
pub const URI_PREFIX: &str = "bitcoin:";

/// Pick the payment URI out of an authenticated TXT RRset.
///
/// # Errors
///
/// Returns [`ResolutionError::NotFound`] when no record is a payment URI,
/// [`ResolutionError::AmbiguousResult`] when more than one is, and
/// [`ResolutionError::InvalidUri`] when the payment record isn't valid UTF-8.
pub fn parse_payload(rrset: &AuthenticatedRRset) -> Result<String, ResolutionError> {
    select_uri(rrset.records())
}

fn select_uri(records: &[Record]) -> Result<String, ResolutionError> {
    let candidates: Vec<Vec<u8>> = records
        .iter()
        .filter_map(|record| match record.data() {
            Some(RData::TXT(txt)) => Some(txt.txt_data().concat()),
            _ => None,
        })
        .filter(|text| {
            text.get(..URI_PREFIX.len())
                .map_or(false, |prefix| prefix.eq_ignore_ascii_case(URI_PREFIX.as_bytes()))
        })
        .collect();

    match candidates.as_slice() {
        [] => Err(ResolutionError::NotFound(
            "no bitcoin: payment record published".to_string(),
        )),
        [uri] => String::from_utf8(uri.clone()).map_err(|_| {
            ResolutionError::InvalidUri("payment record is not valid UTF-8".to_string())
        }),
        many => Err(ResolutionError::AmbiguousResult(many.len())),
    }
}
