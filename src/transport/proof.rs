//! Offline replay of a serialized DNSSEC proof.
//!
//! A proof is a concatenation of wire-format resource records (the layout used by
//! [RFC-9102][RFC-9102] chains): every `DNSKEY`, `DS`, `RRSIG` and answer record needed to
//! authenticate a payment record. Wrapping it in a [`ProofTransport`] lets a
//! [`Resolver`][crate::resolver::Resolver] re-run full validation against it without any
//! network access, e.g. on a device that only receives the proof.
//!
//! Queries are answered the way a server would have answered them: a name holding a `CNAME`
//! answers with it for any type, and the `NSEC`/`NSEC3` records of the enclosing zone are
//! returned in the authority section so wildcard answers can be checked again.
//!
//! [RFC-9102]: https://www.rfc-editor.org/rfc/rfc9102
use crate::error::Error;
use crate::transport::memory::{covered_type, InMemoryTransport};
use crate::transport::{DnsResponse, DnsTransport, TransportError};
use std::collections::BTreeMap;
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use trust_dns_proto::rr::dnssec::rdata::DNSSECRData;
use trust_dns_proto::rr::{Name, RData, Record, RecordType};
use trust_dns_proto::serialize::binary::{BinDecodable, BinDecoder};

/// Answers queries only from the records contained in a proof.
#[derive(Default, Debug, Clone)]
#[allow(clippy::module_name_repetitions)]
pub struct ProofTransport {
    transport: InMemoryTransport,
    /// `NSEC`/`NSEC3` records and their `RRSIG`s, with the zone that signed them.
    denial: Vec<(Name, Record)>,
    records: usize,
}

impl ProofTransport {
    /// Decode a proof from its wire format.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DNSError`] if the bytes aren't a sequence of well-formed resource
    /// records.
    pub fn from_wire(bytes: &[u8]) -> Result<Self, Error> {
        let mut decoder = BinDecoder::new(bytes);
        let mut records = Vec::new();
        while !decoder.is_empty() {
            records.push(Record::read(&mut decoder)?);
        }
        tracing::debug!("decoded proof with {} records", records.len());
        Ok(Self {
            transport: InMemoryTransport::from_records(&records),
            denial: denial_records(&records),
            records: records.len(),
        })
    }

    /// Load a proof from the file at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IO`] if the path can't be opened or read.
    ///
    /// Returns [`Error::DNSError`] if its contents aren't a valid proof.
    pub async fn try_from_file(p: &str) -> Result<Self, Error> {
        let mut f = File::open(p).await?;
        let mut buf = vec![];
        f.read_to_end(&mut buf).await?;
        Self::from_wire(&buf)
    }

    /// Number of records contained in the proof.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records == 0
    }

    fn authority_for(&self, name: &Name) -> Vec<Record> {
        self.denial
            .iter()
            .filter(|(zone, _)| zone.zone_of(name))
            .map(|(_, record)| record.clone())
            .collect()
    }
}

fn is_denial(record_type: RecordType) -> bool {
    matches!(record_type, RecordType::NSEC | RecordType::NSEC3)
}

/// Pick out the denial RRsets of a proof, keyed by the zone named in their signatures.
fn denial_records(records: &[Record]) -> Vec<(Name, Record)> {
    let signers: BTreeMap<(Name, RecordType), Name> = records
        .iter()
        .filter_map(|record| match record.data() {
            Some(RData::DNSSEC(DNSSECRData::SIG(sig)))
                if record.rr_type() == RecordType::RRSIG && is_denial(sig.type_covered()) =>
            {
                Some((
                    (record.name().clone(), sig.type_covered()),
                    sig.signer_name().clone(),
                ))
            }
            _ => None,
        })
        .collect();

    records
        .iter()
        .filter_map(|record| {
            let record_type = covered_type(record);
            if !is_denial(record_type) {
                return None;
            }
            signers
                .get(&(record.name().clone(), record_type))
                .map(|zone| (zone.clone(), record.clone()))
        })
        .collect()
}

#[async_trait::async_trait]
impl DnsTransport for ProofTransport {
    async fn query(
        &self,
        name: &Name,
        record_type: RecordType,
    ) -> Result<DnsResponse, TransportError> {
        let response = self
            .transport
            .get(name, record_type)
            .or_else(|| self.transport.get(name, RecordType::CNAME))
            .cloned()
            .unwrap_or_else(|| DnsResponse::nxdomain(Vec::new()));
        Ok(response.with_authority(self.authority_for(name)))
    }
}
