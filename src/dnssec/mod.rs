//! DNSSEC-validated lookups.
//!
//! [`DnssecValidator::resolve_authenticated`] is the only way to obtain an
//! [`AuthenticatedRRset`]. It fetches the answer for a name together with every `DNSKEY`, `DS`
//! and `RRSIG` needed to connect it to the configured [trust anchors][TrustAnchors], and
//! refuses to return anything it couldn't authenticate:
//!
//! * unsigned answers, broken chains, signatures outside their validity window, and
//!   unsupported algorithms fail with
//!   [`ResolutionError::DnssecValidationFailed`];
//! * names or types proven absent with `NSEC`/`NSEC3` fail with [`ResolutionError::NotFound`];
//! * absence claims that aren't backed by a valid proof are treated as validation failures.
//!
//! There is no insecure fallback. A zone that isn't signed can't be resolved.
//!
//! Signed `CNAME`s are followed, each hop validated on its own, up to
//! [`DnssecValidator::max_depth`] hops.

pub mod anchor;
mod chain;
mod denial;
mod rrset;
#[cfg(test)]
pub(crate) mod testing;

use crate::error::ResolutionError;
use crate::query_name::QueryName;
use crate::transport::DynTransport;
use denial::{Denial, DenialRecord};
use rrset::{failed, SignedRRset};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;
use time::OffsetDateTime;
use trust_dns_proto::error::ProtoError;
use trust_dns_proto::rr::dnssec::rdata::{DNSSECRData, DNSKEY, SIG};
use trust_dns_proto::rr::{Name, RData, Record, RecordType};
use trust_dns_proto::serialize::binary::{BinEncodable, BinEncoder};

pub use anchor::TrustAnchors;

/// Default bound on zone cuts in one chain, and on `CNAME` hops.
pub const DEFAULT_MAX_DEPTH: usize = 16;

/// Default tolerance applied to both ends of RRSIG validity windows.
pub const DEFAULT_CLOCK_SKEW: Duration = Duration::from_secs(60);

/// Records whose authenticity has been proven up to a trust anchor.
#[derive(Debug, Clone)]
pub struct AuthenticatedRRset {
    name: Name,
    record_type: RecordType,
    records: Vec<Record>,
    proof: ValidationProof,
}

impl AuthenticatedRRset {
    /// Owner of the records. Differs from the queried name when `CNAME`s were followed.
    #[must_use]
    pub fn name(&self) -> &Name {
        &self.name
    }

    #[must_use]
    pub fn record_type(&self) -> RecordType {
        self.record_type
    }

    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    #[must_use]
    pub fn proof(&self) -> &ValidationProof {
        &self.proof
    }

    #[must_use]
    pub fn into_proof(self) -> ValidationProof {
        self.proof
    }
}

/// Everything that was used to authenticate an answer.
///
/// The records can be [serialized][ValidationProof::to_wire] and later replayed with a
/// [`ProofTransport`][crate::transport::ProofTransport] to re-check the answer offline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationProof {
    zones: Vec<Name>,
    records: Vec<Record>,
    valid_from: u32,
    expires: u32,
    ttl: u32,
}

impl ValidationProof {
    pub(crate) fn new() -> Self {
        Self {
            zones: Vec::new(),
            records: Vec::new(),
            valid_from: 0,
            expires: u32::MAX,
            ttl: u32::MAX,
        }
    }

    fn add(&mut self, rrset: &SignedRRset, rrsig: &Record, sig: &SIG) {
        for record in rrset.records().iter().chain([rrsig]) {
            if !self.records.contains(record) {
                self.records.push(record.clone());
            }
            self.ttl = self.ttl.min(record.ttl());
        }
        self.ttl = self.ttl.min(sig.original_ttl());
        self.valid_from = self.valid_from.max(sig.sig_inception());
        self.expires = self.expires.min(sig.sig_expiration());
    }

    fn add_zone(&mut self, zone: &Name) {
        if !self.zones.contains(zone) {
            self.zones.push(zone.clone());
        }
    }

    /// Zones whose keys were authenticated, root first.
    #[must_use]
    pub fn zones(&self) -> &[Name] {
        &self.zones
    }

    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Latest inception time of any signature used, in seconds since the Unix epoch.
    #[must_use]
    pub fn valid_from(&self) -> u32 {
        self.valid_from
    }

    /// Earliest expiration time of any signature used, in seconds since the Unix epoch.
    #[must_use]
    pub fn expires(&self) -> u32 {
        self.expires
    }

    /// Smallest TTL of any record or signature used.
    #[must_use]
    pub fn ttl(&self) -> u32 {
        self.ttl
    }

    /// Serialize as a concatenation of uncompressed wire-format resource records.
    ///
    /// # Errors
    ///
    /// Returns a [`ProtoError`] if a record can't be encoded.
    pub fn to_wire(&self) -> Result<Vec<u8>, ProtoError> {
        let mut buf = Vec::new();
        let mut encoder = BinEncoder::new(&mut buf);
        encoder.set_canonical_names(true);
        for record in &self.records {
            record.emit(&mut encoder)?;
        }
        Ok(buf)
    }
}

/// Per-call state: the validation clock, keys already authenticated during this call, and the
/// proof being assembled.
struct Walk {
    now: i64,
    keys: BTreeMap<Name, Vec<DNSKEY>>,
    proof: ValidationProof,
}

/// Fetches and authenticates RRsets through a [`DnsTransport`][crate::transport::DnsTransport].
#[derive(Clone)]
pub struct DnssecValidator {
    transport: DynTransport,
    anchors: TrustAnchors,
    max_depth: usize,
    clock_skew: Duration,
}

impl DnssecValidator {
    #[must_use]
    pub fn new(transport: DynTransport, anchors: TrustAnchors) -> Self {
        Self {
            transport,
            anchors,
            max_depth: DEFAULT_MAX_DEPTH,
            clock_skew: DEFAULT_CLOCK_SKEW,
        }
    }

    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    #[must_use]
    pub fn with_clock_skew(mut self, clock_skew: Duration) -> Self {
        self.clock_skew = clock_skew;
        self
    }

    #[must_use]
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    #[must_use]
    pub fn clock_skew(&self) -> Duration {
        self.clock_skew
    }

    /// Look up `record_type` records for `name` and authenticate them.
    ///
    /// # Errors
    ///
    /// Returns [`ResolutionError::NotFound`] when the name or type is proven not to exist,
    /// [`ResolutionError::DnssecValidationFailed`] when anything can't be authenticated, and
    /// [`ResolutionError::Timeout`] or [`ResolutionError::TransportUnavailable`] when the
    /// transport fails.
    pub async fn resolve_authenticated(
        &self,
        name: &QueryName,
        record_type: RecordType,
    ) -> Result<AuthenticatedRRset, ResolutionError> {
        let mut walk = Walk {
            now: OffsetDateTime::now_utc().unix_timestamp(),
            keys: BTreeMap::new(),
            proof: ValidationProof::new(),
        };
        let mut target = name.to_name()?;

        for _ in 0..self.max_depth {
            let response = self.transport.query(&target, record_type).await?;

            if let Some(answer) =
                SignedRRset::from_section(&target, record_type, &response.answers)?
            {
                let sig = self.authenticate(&answer, &mut walk).await?;
                self.check_wildcard(&answer, &sig, &response.authority, &mut walk)
                    .await?;
                tracing::debug!("authenticated {target} {record_type}");
                return Ok(AuthenticatedRRset {
                    name: target,
                    record_type,
                    records: answer.records().to_vec(),
                    proof: walk.proof,
                });
            }

            if let Some(cname) =
                SignedRRset::from_section(&target, RecordType::CNAME, &response.answers)?
            {
                let sig = self.authenticate(&cname, &mut walk).await?;
                self.check_wildcard(&cname, &sig, &response.authority, &mut walk)
                    .await?;
                let next = match cname.rdata().collect::<Vec<_>>().as_slice() {
                    [RData::CNAME(next)] => next.clone(),
                    _ => {
                        return Err(failed(
                            &target,
                            RecordType::CNAME,
                            "expected exactly one CNAME target",
                        ))
                    }
                };
                tracing::debug!("following CNAME {target} -> {next}");
                target = next;
                continue;
            }

            let denial = self.denial_records(&response.authority, &mut walk).await?;
            let reason = match denial::classify(&target, record_type, &denial) {
                Ok(Denial::NxDomain) => format!("{target} does not exist"),
                Ok(Denial::NoData) => format!("{target} has no {record_type} records"),
                Err(reason) => {
                    tracing::warn!("unauthenticated negative answer for {target}: {reason}");
                    return Err(failed(&target, record_type, &reason));
                }
            };
            tracing::debug!("authenticated denial: {reason}");
            return Err(ResolutionError::NotFound(reason));
        }

        Err(ResolutionError::DnssecValidationFailed(format!(
            "CNAME chain from {name} exceeds {} hops",
            self.max_depth
        )))
    }

    /// Authenticate the keys of `rrset`'s signer, then `rrset` itself.
    async fn authenticate(
        &self,
        rrset: &SignedRRset,
        walk: &mut Walk,
    ) -> Result<SIG, ResolutionError> {
        let keys = self.zone_keys(rrset.signer(), walk).await?;
        let (rrsig, sig) = rrset.verify(&keys, walk.now, self.skew())?;
        walk.proof.add(rrset, rrsig, sig);
        Ok(sig.clone())
    }

    async fn zone_keys(
        &self,
        zone: &Name,
        walk: &mut Walk,
    ) -> Result<Vec<DNSKEY>, ResolutionError> {
        if let Some(keys) = walk.keys.get(zone) {
            return Ok(keys.clone());
        }
        let cuts = chain::gather(&self.transport, zone, self.max_depth).await?;
        let keys = chain::verify(&cuts, &self.anchors, walk.now, self.skew(), &mut walk.proof)?;
        walk.keys.insert(zone.clone(), keys.clone());
        Ok(keys)
    }

    /// A wildcard-synthesized answer is only valid alongside proof that the exact name
    /// doesn't exist.
    async fn check_wildcard(
        &self,
        rrset: &SignedRRset,
        sig: &SIG,
        authority: &[Record],
        walk: &mut Walk,
    ) -> Result<(), ResolutionError> {
        if !rrset.is_wildcard_expansion(sig) {
            return Ok(());
        }
        let denial = self.denial_records(authority, walk).await?;
        denial::proves_wildcard_expansion(rrset.name(), sig.num_labels(), &denial)
            .map_err(|reason| failed(rrset.name(), sig.type_covered(), &reason))
    }

    /// Authenticate every `NSEC` and `NSEC3` RRset in an authority section.
    async fn denial_records(
        &self,
        authority: &[Record],
        walk: &mut Walk,
    ) -> Result<Vec<DenialRecord>, ResolutionError> {
        let mut out = Vec::new();
        for record_type in [RecordType::NSEC, RecordType::NSEC3] {
            let owners: BTreeSet<Name> = authority
                .iter()
                .filter(|r| r.rr_type() == record_type)
                .map(|r| r.name().clone())
                .collect();
            for owner in owners {
                let Some(rrset) = SignedRRset::from_section(&owner, record_type, authority)? else {
                    continue;
                };
                self.authenticate(&rrset, walk).await?;
                let zone = rrset.signer().clone();
                for rdata in rrset.rdata() {
                    match rdata {
                        RData::DNSSEC(DNSSECRData::NSEC(nsec)) => out.push(DenialRecord::Nsec {
                            owner: owner.clone(),
                            zone: zone.clone(),
                            nsec: nsec.clone(),
                        }),
                        RData::DNSSEC(DNSSECRData::NSEC3(nsec3)) => {
                            out.push(DenialRecord::Nsec3 {
                                owner: owner.clone(),
                                zone: zone.clone(),
                                nsec3: nsec3.clone(),
                            });
                        }
                        _ => {}
                    }
                }
            }
        }
        Ok(out)
    }

    fn skew(&self) -> i64 {
        i64::try_from(self.clock_skew.as_secs()).unwrap_or(i64::MAX)
    }
}
