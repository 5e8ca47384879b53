//! RRset grouping and signature verification.
use crate::error::ResolutionError;
use trust_dns_proto::rr::dnssec::rdata::{DNSSECRData, DNSKEY, SIG};
use trust_dns_proto::rr::dnssec::{Algorithm, Verifier};
use trust_dns_proto::rr::{DNSClass, Name, RData, Record, RecordType};

/// Signature algorithms we can verify. Anything else fails closed.
pub(crate) fn supported_algorithm(algorithm: Algorithm) -> bool {
    matches!(
        algorithm,
        Algorithm::RSASHA256
            | Algorithm::RSASHA512
            | Algorithm::ECDSAP256SHA256
            | Algorithm::ECDSAP384SHA384
            | Algorithm::ED25519
    )
}

/// The records of one `(owner, type)` RRset taken from a response section, along with the
/// `RRSIG`s covering it. Nothing in here is trusted until [`SignedRRset::verify`] succeeds.
#[derive(Debug, Clone)]
pub(crate) struct SignedRRset {
    name: Name,
    record_type: RecordType,
    records: Vec<Record>,
    sigs: Vec<(Record, SIG)>,
    signer: Name,
}

impl SignedRRset {
    /// Pick the `record_type` RRset owned by `name` out of `section`.
    ///
    /// Returns `Ok(None)` when the section holds no such records. When it does, they must be
    /// signed, and every signature must come from the same zone, which must enclose `name`.
    pub(crate) fn from_section(
        name: &Name,
        record_type: RecordType,
        section: &[Record],
    ) -> Result<Option<Self>, ResolutionError> {
        let records: Vec<Record> = section
            .iter()
            .filter(|r| {
                r.rr_type() == record_type && r.dns_class() == DNSClass::IN && r.name() == name
            })
            .cloned()
            .collect();
        if records.is_empty() {
            return Ok(None);
        }

        let sigs: Vec<(Record, SIG)> = section
            .iter()
            .filter(|r| r.rr_type() == RecordType::RRSIG && r.name() == name)
            .filter_map(|r| match r.data() {
                Some(RData::DNSSEC(DNSSECRData::SIG(sig))) if sig.type_covered() == record_type => {
                    Some((r.clone(), sig.clone()))
                }
                _ => None,
            })
            .collect();

        let signer = match sigs.first() {
            None => return Err(failed(name, record_type, "RRset is not signed")),
            Some((_, sig)) => sig.signer_name().clone(),
        };
        if sigs.iter().any(|(_, sig)| *sig.signer_name() != signer) {
            return Err(failed(name, record_type, "RRSIGs name different signers"));
        }
        if !signer.zone_of(name) {
            return Err(failed(
                name,
                record_type,
                &format!("signer {signer} is not an ancestor of the owner"),
            ));
        }

        Ok(Some(Self {
            name: name.clone(),
            record_type,
            records,
            sigs,
            signer,
        }))
    }

    pub(crate) fn name(&self) -> &Name {
        &self.name
    }

    pub(crate) fn records(&self) -> &[Record] {
        &self.records
    }

    /// The zone all signatures claim to come from.
    pub(crate) fn signer(&self) -> &Name {
        &self.signer
    }

    /// Iterate the record data, skipping anything that didn't decode.
    pub(crate) fn rdata(&self) -> impl Iterator<Item = &RData> {
        self.records.iter().filter_map(Record::data)
    }

    /// Verify the RRset against `keys`. One valid signature is enough.
    ///
    /// Only keys that are zone keys, not revoked, and match the signature's key tag and
    /// algorithm are tried. Signatures are accepted while `now` is inside
    /// `[inception - skew, expiration + skew]`.
    ///
    /// Returns the `RRSIG` record that verified, and its data.
    pub(crate) fn verify(
        &self,
        keys: &[DNSKEY],
        now: i64,
        skew: i64,
    ) -> Result<(&Record, &SIG), ResolutionError> {
        let mut reason = String::from("no RRSIG was made by a trusted key");
        for (sig_record, sig) in &self.sigs {
            if let Err(why) = self.check_sig(sig, now, skew) {
                reason = why;
                continue;
            }
            let candidates = keys.iter().filter(|key| {
                key.zone_key()
                    && !key.revoke()
                    && key.algorithm() == sig.algorithm()
                    && key.calculate_key_tag().ok() == Some(sig.key_tag())
            });
            for key in candidates {
                match key.verify_rrsig(&self.name, DNSClass::IN, sig, &self.records) {
                    Ok(()) => return Ok((sig_record, sig)),
                    Err(_) => reason = format!("bad signature from key {}", sig.key_tag()),
                }
            }
        }
        Err(failed(&self.name, self.record_type, &reason))
    }

    fn check_sig(&self, sig: &SIG, now: i64, skew: i64) -> Result<(), String> {
        if !supported_algorithm(sig.algorithm()) {
            return Err(format!("unsupported algorithm {:?}", sig.algorithm()));
        }
        if sig.num_labels() > self.name.num_labels() {
            return Err("RRSIG label count exceeds owner".to_string());
        }
        let inception = i64::from(sig.sig_inception());
        let expiration = i64::from(sig.sig_expiration());
        if now + skew < inception {
            return Err(format!("RRSIG not valid before {inception}"));
        }
        if now - skew > expiration {
            return Err(format!("RRSIG expired at {expiration}"));
        }
        Ok(())
    }

    /// Whether `sig` was made over a wildcard that expanded into this owner name.
    pub(crate) fn is_wildcard_expansion(&self, sig: &SIG) -> bool {
        sig.num_labels() < self.name.num_labels()
    }
}

pub(crate) fn failed(name: &Name, record_type: RecordType, reason: &str) -> ResolutionError {
    ResolutionError::DnssecValidationFailed(format!("{name} {record_type}: {reason}"))
}
