//! An in-memory implementation of the [`DnsTransport`][super::DnsTransport] trait.
use crate::transport::{DnsResponse, DnsTransport, TransportError};
use std::collections::BTreeMap;
use trust_dns_proto::rr::dnssec::rdata::DNSSECRData;
use trust_dns_proto::rr::{Name, RData, Record, RecordType};

/// Answers queries from a fixed table of responses keyed by `(name, type)`. Names compare
/// case-insensitively. Queries with no entry get an empty `NXDOMAIN`, which the validator
/// treats as an unauthenticated denial.
#[derive(Default, Debug, Clone)]
#[allow(clippy::module_name_repetitions)]
pub struct InMemoryTransport {
    responses: BTreeMap<(Name, RecordType), DnsResponse>,
}

impl InMemoryTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the response for `(name, record_type)`, replacing any previous one.
    pub fn insert(&mut self, name: Name, record_type: RecordType, response: DnsResponse) {
        self.responses.insert((name, record_type), response);
    }

    /// Build a transport that answers every `(owner, type)` RRset found in `records`, along with
    /// the `RRSIG`s covering it.
    #[must_use]
    pub fn from_records(records: &[Record]) -> Self {
        let mut transport = Self::new();
        for record in records {
            let record_type = covered_type(record);
            let response = transport
                .responses
                .entry((record.name().clone(), record_type))
                .or_insert_with(|| DnsResponse::answer(Vec::new()));
            if !response.answers.contains(record) {
                response.answers.push(record.clone());
            }
        }
        transport
    }

    /// The stored response for `(name, record_type)`, if any.
    #[must_use]
    pub fn get(&self, name: &Name, record_type: RecordType) -> Option<&DnsResponse> {
        self.responses.get(&(name.clone(), record_type))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.responses.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.responses.is_empty()
    }
}

/// The type an `RRSIG` signs, or the record's own type for everything else.
pub(crate) fn covered_type(record: &Record) -> RecordType {
    match record.data() {
        Some(RData::DNSSEC(DNSSECRData::SIG(sig))) if record.rr_type() == RecordType::RRSIG => {
            sig.type_covered()
        }
        _ => record.rr_type(),
    }
}

#[async_trait::async_trait]
impl DnsTransport for InMemoryTransport {
    async fn query(
        &self,
        name: &Name,
        record_type: RecordType,
    ) -> Result<DnsResponse, TransportError> {
        Ok(self
            .get(name, record_type)
            .cloned()
            .unwrap_or_else(|| DnsResponse::nxdomain(Vec::new())))
    }
}
