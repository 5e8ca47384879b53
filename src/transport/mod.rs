//! DNS transports.
//!
//! The resolver never talks to sockets directly. It asks a [`DnsTransport`] for the raw answer
//! and authority sections of a `(name, type)` query and does all authentication itself, so a
//! transport only needs to move bytes and distinguish "the server said no" (`NXDOMAIN`, empty
//! answers) from "there was no usable server" ([`TransportError`]).
//!
//! Three implementations are provided:
//!
//! * [`tcp::TcpTransport`] sends DNSSEC-enabled queries to a configured stub resolver.
//! * [`memory::InMemoryTransport`] answers from a fixed table, useful for fixtures.
//! * [`proof::ProofTransport`] replays a serialized
//!   [`ValidationProof`][crate::dnssec::ValidationProof] so answers can be re-validated offline.

use crate::error::ResolutionError;
use std::sync::Arc;
use trust_dns_proto::error::ProtoError;
use trust_dns_proto::op::ResponseCode;
use trust_dns_proto::rr::{Name, Record, RecordType};

pub mod memory;
pub mod proof;
pub mod tcp;

#[allow(clippy::module_name_repetitions)]
pub use memory::InMemoryTransport;
#[allow(clippy::module_name_repetitions)]
pub use proof::ProofTransport;
#[allow(clippy::module_name_repetitions)]
pub use tcp::TcpTransport;

/// `DynTransport` is a type alias for a [`DnsTransport`] shared by every concurrent resolution.
#[allow(clippy::module_name_repetitions)]
pub type DynTransport = Arc<dyn DnsTransport + Send + Sync>;

/// The parts of a DNS response the validator looks at. Records are unauthenticated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DnsResponse {
    pub response_code: ResponseCode,
    pub answers: Vec<Record>,
    pub authority: Vec<Record>,
}

impl DnsResponse {
    #[must_use]
    pub fn answer(answers: Vec<Record>) -> Self {
        Self {
            response_code: ResponseCode::NoError,
            answers,
            authority: Vec::new(),
        }
    }

    #[must_use]
    pub fn nxdomain(authority: Vec<Record>) -> Self {
        Self {
            response_code: ResponseCode::NXDomain,
            answers: Vec::new(),
            authority,
        }
    }

    /// Replace the authority section.
    #[must_use]
    pub fn with_authority(mut self, authority: Vec<Record>) -> Self {
        self.authority = authority;
        self
    }

    /// `NOERROR` with no answers, proven empty by the given authority records.
    #[must_use]
    pub fn nodata(authority: Vec<Record>) -> Self {
        Self {
            response_code: ResponseCode::NoError,
            answers: Vec::new(),
            authority,
        }
    }
}

/// Failures to obtain any DNS answer at all.
#[derive(thiserror::Error, Debug)]
#[allow(clippy::module_name_repetitions)]
pub enum TransportError {
    /// The query didn't complete within the transport's timeout.
    #[error("DNS query timed out")]
    Timeout,

    /// No server could be reached, or it answered with a failure code (e.g. `SERVFAIL`).
    #[error("DNS server unreachable: {0}")]
    Unreachable(String),

    /// The server answered with something that isn't a well-formed response to our query.
    #[error("DNS protocol error")]
    Protocol(#[from] ProtoError),
}

impl From<TransportError> for ResolutionError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Timeout => ResolutionError::Timeout,
            TransportError::Unreachable(reason) => ResolutionError::TransportUnavailable(reason),
            TransportError::Protocol(err) => ResolutionError::TransportUnavailable(err.to_string()),
        }
    }
}

/// An async trait describing a stub DNS client. Implementations must request DNSSEC records
/// (or otherwise supply `RRSIG`, `DNSKEY`, `DS`, `NSEC` and `NSEC3` records alongside answers)
/// and must not filter or validate them.
#[async_trait::async_trait]
#[allow(clippy::module_name_repetitions)]
pub trait DnsTransport {
    /// Query for records of `record_type` at `name`.
    async fn query(&self, name: &Name, record_type: RecordType)
        -> Result<DnsResponse, TransportError>;
}
