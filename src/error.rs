//! Error types.
//!
//! Two families live here. [`Error`] covers setting a resolver up (loading a
//! [`Config`][crate::config::Config], parsing trust anchors, reading proofs from disk) and is
//! returned before any lookup happens. [`ResolutionError`] is what a single
//! [`Resolver::resolve`][crate::resolver::Resolver::resolve] call fails with; every kind maps
//! to a stable [`ErrorKind`] code that is also used across the [C boundary][crate::ffi].

use std::fmt;
use trust_dns_proto::error::ProtoError;

/// Convenience alias for results carrying a setup [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Error enumerates the ways constructing a resolver or its inputs can fail.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Returned when a trust anchor can't be parsed from its `DS` presentation format
    /// (`<key tag> <algorithm> <digest type> <hex digest>`).
    #[error("invalid trust anchor \"{0}\"")]
    InvalidTrustAnchor(String),

    /// Returned when the configuration has no trust anchors at all. Validation could never
    /// succeed, so this is refused up front.
    #[error("at least one trust anchor is required")]
    NoTrustAnchors,

    /// Returned when [`Config::timeout`][crate::config::Config::timeout] is zero.
    #[error("resolution timeout must be greater than zero")]
    InvalidTimeout,

    /// Returned when [`Config::max_chain_depth`][crate::config::Config::max_chain_depth] is
    /// outside of the supported range.
    #[error("max chain depth {0} is outside of 1..={1}")]
    InvalidChainDepth(usize, usize),

    /// Returned when a network name isn't one of `main`, `testnet`, `signet` or `regtest`.
    #[error("unknown network \"{0}\"")]
    UnknownNetwork(String),

    /// Returned when a generic IO error occurs.
    #[error("an IO error occurred")]
    IO(#[from] std::io::Error),

    /// Returned when processing JSON from disk (e.g. when
    /// [trying to load a `Config`][crate::config::Config::try_from_file]) fails due to invalid
    /// JSON content.
    #[error("invalid JSON")]
    InvalidJSON(#[from] serde_json::Error),

    /// Returned when DNS wire data (e.g. a
    /// [serialized proof][crate::transport::proof::ProofTransport::from_wire]) can't be decoded.
    #[error("DNS error")]
    DNSError(#[from] ProtoError),
}

/// The reason a single resolution failed.
///
/// No resolution is ever reported successful alongside one of these: each is terminal for the
/// call that produced it.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    /// The human-readable address doesn't follow `user@domain` DNS label rules.
    #[error("malformed address: {0}")]
    MalformedAddress(String),

    /// The name or record is authenticated as nonexistent, or no `bitcoin:` record was present.
    #[error("not found: {0}")]
    NotFound(String),

    /// More than one `bitcoin:` TXT record was published for the name.
    #[error("ambiguous result: {0} payment records found")]
    AmbiguousResult(usize),

    /// The answer could not be authenticated up to a trust anchor.
    #[error("DNSSEC validation failed: {0}")]
    DnssecValidationFailed(String),

    /// The published URI is structurally invalid, requires a parameter we don't understand, or
    /// pays a target on a different network.
    #[error("invalid payment URI: {0}")]
    InvalidUri(String),

    /// The configured resolution timeout elapsed.
    #[error("resolution timed out")]
    Timeout,

    /// The DNS transport couldn't reach a server or got an unusable response.
    #[error("DNS transport unavailable: {0}")]
    TransportUnavailable(String),

    /// A null, unknown or already released handle was passed across the C boundary.
    #[error("invalid handle")]
    InvalidHandle,
}

/// Stable, data-free discriminant of a [`ResolutionError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    MalformedAddress,
    NotFound,
    AmbiguousResult,
    DnssecValidationFailed,
    InvalidUri,
    Timeout,
    TransportUnavailable,
    InvalidHandle,
}

impl ResolutionError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MalformedAddress(_) => ErrorKind::MalformedAddress,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::AmbiguousResult(_) => ErrorKind::AmbiguousResult,
            Self::DnssecValidationFailed(_) => ErrorKind::DnssecValidationFailed,
            Self::InvalidUri(_) => ErrorKind::InvalidUri,
            Self::Timeout => ErrorKind::Timeout,
            Self::TransportUnavailable(_) => ErrorKind::TransportUnavailable,
            Self::InvalidHandle => ErrorKind::InvalidHandle,
        }
    }
}

impl ErrorKind {
    /// Every kind, in status code order.
    pub const ALL: [ErrorKind; 8] = [
        Self::MalformedAddress,
        Self::NotFound,
        Self::AmbiguousResult,
        Self::DnssecValidationFailed,
        Self::InvalidUri,
        Self::Timeout,
        Self::TransportUnavailable,
        Self::InvalidHandle,
    ];

    /// The status code reported for this kind across the C boundary. Success is `0`, every
    /// error kind is a distinct negative value. These values never change between releases.
    #[must_use]
    pub fn code(self) -> i32 {
        match self {
            Self::MalformedAddress => -1,
            Self::NotFound => -2,
            Self::AmbiguousResult => -3,
            Self::DnssecValidationFailed => -4,
            Self::InvalidUri => -5,
            Self::Timeout => -6,
            Self::TransportUnavailable => -7,
            Self::InvalidHandle => -8,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::MalformedAddress => "malformed-address",
            Self::NotFound => "not-found",
            Self::AmbiguousResult => "ambiguous-result",
            Self::DnssecValidationFailed => "dnssec-validation-failed",
            Self::InvalidUri => "invalid-uri",
            Self::Timeout => "timeout",
            Self::TransportUnavailable => "transport-unavailable",
            Self::InvalidHandle => "invalid-handle",
        };
        f.write_str(name)
    }
}
