//! Root trust anchors.
//!
//! Anchors are `DS` records for the root zone in presentation format, as published by IANA in
//! [root-anchors.xml][root-anchors]:
//!
//! ```text
//! 20326 8 2 E06D44B80B8F1D39A95C0B0D7C65D08458E880409BBC683457104237C7F8EC8D
//! ```
//!
//! An optional leading owner name (`.`) is accepted and ignored.
//!
//! [root-anchors]: https://data.iana.org/root-anchors/root-anchors.xml
use crate::error::Error;
use data_encoding::HEXUPPER_PERMISSIVE;
use trust_dns_proto::rr::dnssec::rdata::DS;
use trust_dns_proto::rr::dnssec::{Algorithm, DigestType};

/// The IANA root KSKs: KSK-2017 and KSK-2024.
pub const ROOT_ANCHORS: [&str; 2] = [
    "20326 8 2 E06D44B80B8F1D39A95C0B0D7C65D08458E880409BBC683457104237C7F8EC8D",
    "38696 8 2 683D2D0ACB8C9B712A1948B27F741219298D0A450D612C483AF444A4C0FB2B16",
];

/// The set of root `DS` records validation chains must end in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustAnchors {
    ds: Vec<DS>,
}

impl TrustAnchors {
    /// The IANA root anchors.
    #[must_use]
    pub fn iana() -> Self {
        Self {
            ds: ROOT_ANCHORS
                .iter()
                .filter_map(|anchor| parse_ds(anchor).ok())
                .collect(),
        }
    }

    /// Anchors from already decoded `DS` records.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoTrustAnchors`] if `ds` is empty.
    pub fn from_ds(ds: Vec<DS>) -> Result<Self, Error> {
        if ds.is_empty() {
            return Err(Error::NoTrustAnchors);
        }
        Ok(Self { ds })
    }

    /// Parse anchors from presentation format.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTrustAnchor`] for the first entry that can't be parsed, or
    /// [`Error::NoTrustAnchors`] if `entries` is empty.
    pub fn parse<S: AsRef<str>>(entries: &[S]) -> Result<Self, Error> {
        let ds = entries
            .iter()
            .map(|entry| parse_ds(entry.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_ds(ds)
    }

    #[must_use]
    pub fn ds(&self) -> &[DS] {
        &self.ds
    }
}

impl Default for TrustAnchors {
    fn default() -> Self {
        Self::iana()
    }
}

/// Parse a single `DS` record in presentation format.
///
/// # Errors
///
/// Returns [`Error::InvalidTrustAnchor`] if the fields are missing, malformed, or the digest
/// length doesn't match its type.
pub fn parse_ds(s: &str) -> Result<DS, Error> {
    let invalid = || Error::InvalidTrustAnchor(s.to_string());

    let mut fields: Vec<&str> = s.split_whitespace().collect();
    if fields.first() == Some(&".") {
        fields.remove(0);
    }
    if fields.len() < 4 {
        return Err(invalid());
    }

    let key_tag: u16 = fields[0].parse().map_err(|_| invalid())?;
    let algorithm = Algorithm::from_u8(fields[1].parse().map_err(|_| invalid())?);
    let digest_type = DigestType::from_u8(fields[2].parse().map_err(|_| invalid())?)
        .map_err(|_| invalid())?;
    // Digests may be split into several whitespace separated chunks.
    let hex: String = fields[3..].concat();
    let digest = HEXUPPER_PERMISSIVE
        .decode(hex.as_bytes())
        .map_err(|_| invalid())?;

    let expected_len = match digest_type {
        DigestType::SHA256 => 32,
        DigestType::SHA384 => 48,
        _ => return Err(invalid()),
    };
    if digest.len() != expected_len {
        return Err(invalid());
    }

    Ok(DS::new(key_tag, algorithm, digest_type, digest))
}
