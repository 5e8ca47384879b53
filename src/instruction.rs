//! Resolved payment instructions.
use base64::engine::general_purpose;
use base64::{alphabet, engine, Engine};
use lazy_static::lazy_static;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

lazy_static! {
    static ref BASE64_ENGINE: engine::GeneralPurpose =
        engine::GeneralPurpose::new(&alphabet::STANDARD, general_purpose::PAD);
}

/// How a payment instruction can be paid.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PaymentType {
    /// Only on-chain targets: an address, a silent payment address or segwit fallbacks.
    OnChain,
    /// Only Lightning targets: a BOLT11 invoice or BOLT12 offer.
    Lightning,
    /// Both on-chain and Lightning targets.
    Unified,
    /// Only a payment method this crate doesn't recognize, named by its parameter.
    Other(String),
}

impl fmt::Display for PaymentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OnChain => f.write_str("on-chain"),
            Self::Lightning => f.write_str("lightning"),
            Self::Unified => f.write_str("unified"),
            Self::Other(name) => f.write_str(name),
        }
    }
}

/// A validated payment URI and what it allows.
///
/// Built by [`uri::interpret`][crate::uri::interpret]. Instructions returned by the
/// [`Resolver`][crate::resolver::Resolver] additionally carry the address they were resolved
/// from and the DNSSEC proof that authenticated them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentInstruction {
    #[serde(skip_serializing_if = "Option::is_none")]
    hrn: Option<String>,
    uri: String,
    payment_type: PaymentType,
    reusable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    amount_sats: Option<u64>,
    parameters: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    expires: Option<u32>,
    #[serde(
        skip_serializing_if = "Vec::is_empty",
        serialize_with = "serialize_base64"
    )]
    dnssec_proof: Vec<u8>,
}

fn serialize_base64<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&BASE64_ENGINE.encode(bytes))
}

impl PaymentInstruction {
    pub(crate) fn new(
        uri: String,
        payment_type: PaymentType,
        reusable: bool,
        amount_sats: Option<u64>,
        parameters: BTreeMap<String, String>,
    ) -> Self {
        Self {
            hrn: None,
            uri,
            payment_type,
            reusable,
            amount_sats,
            parameters,
            expires: None,
            dnssec_proof: Vec::new(),
        }
    }

    /// Attach the address and proof an instruction was resolved from.
    pub(crate) fn with_origin(mut self, hrn: String, expires: u32, dnssec_proof: Vec<u8>) -> Self {
        self.hrn = Some(hrn);
        self.expires = Some(expires);
        self.dnssec_proof = dnssec_proof;
        self
    }

    /// The URI exactly as published.
    #[must_use]
    pub fn uri(&self) -> &str {
        &self.uri
    }

    #[must_use]
    pub fn payment_type(&self) -> &PaymentType {
        &self.payment_type
    }

    /// `false` when the URI carries a single-use BOLT11 invoice.
    #[must_use]
    pub fn is_reusable(&self) -> bool {
        self.reusable
    }

    #[must_use]
    pub fn amount_sats(&self) -> Option<u64> {
        self.amount_sats
    }

    /// Decoded query parameters, keyed by lowercase name (including any `req-` prefix).
    #[must_use]
    pub fn parameters(&self) -> &BTreeMap<String, String> {
        &self.parameters
    }

    #[must_use]
    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).map(String::as_str)
    }

    /// The `₿user@domain` this was resolved from.
    #[must_use]
    pub fn hrn(&self) -> Option<&str> {
        self.hrn.as_deref()
    }

    /// When the earliest signature in the proof expires, in seconds since the Unix epoch.
    #[must_use]
    pub fn expires(&self) -> Option<u32> {
        self.expires
    }

    /// Wire-format DNSSEC proof, empty for instructions that weren't resolved.
    #[must_use]
    pub fn dnssec_proof(&self) -> &[u8] {
        &self.dnssec_proof
    }
}
