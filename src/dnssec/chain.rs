//! Chains of trust from a zone up to the root.
//!
//! Building a chain is split in two. [`gather`] walks up from the zone that signed an answer,
//! fetching each zone's `DNSKEY` RRset and the `DS` RRset its parent publishes for it, until it
//! reaches the root. Nothing is trusted yet, so this step only checks shape. [`verify`] then
//! walks that explicit list top-down: root `DNSKEY`s against the trust anchors, each child's
//! `DS` against its parent's keys, and each child's `DNSKEY`s against those `DS` records.
use crate::dnssec::anchor::TrustAnchors;
use crate::dnssec::rrset::{failed, SignedRRset};
use crate::dnssec::ValidationProof;
use crate::error::ResolutionError;
use crate::transport::DynTransport;
use trust_dns_proto::rr::dnssec::rdata::{DNSSECRData, DNSKEY, DS};
use trust_dns_proto::rr::dnssec::DigestType;
use trust_dns_proto::rr::{Name, RData, RecordType};

/// One zone in a chain of trust.
#[derive(Debug, Clone)]
pub(crate) struct ZoneCut {
    zone: Name,
    dnskeys: SignedRRset,
    /// Signed by the parent zone. `None` for the root.
    ds: Option<SignedRRset>,
}

/// Fetch the cuts from `zone` up to the root, child first.
pub(crate) async fn gather(
    transport: &DynTransport,
    zone: &Name,
    max_depth: usize,
) -> Result<Vec<ZoneCut>, ResolutionError> {
    let mut cuts = Vec::new();
    let mut zone = zone.clone();
    loop {
        if cuts.len() >= max_depth {
            return Err(ResolutionError::DnssecValidationFailed(format!(
                "chain of trust for {zone} exceeds {max_depth} zone cuts"
            )));
        }

        let response = transport.query(&zone, RecordType::DNSKEY).await?;
        let dnskeys = SignedRRset::from_section(&zone, RecordType::DNSKEY, &response.answers)?
            .ok_or_else(|| failed(&zone, RecordType::DNSKEY, "zone has no DNSKEY records"))?;
        if *dnskeys.signer() != zone {
            return Err(failed(
                &zone,
                RecordType::DNSKEY,
                "DNSKEY RRset is not signed by its own zone",
            ));
        }
        tracing::debug!("gathered DNSKEY RRset for {zone}");

        if zone.is_root() {
            cuts.push(ZoneCut {
                zone,
                dnskeys,
                ds: None,
            });
            return Ok(cuts);
        }

        let response = transport.query(&zone, RecordType::DS).await?;
        let ds = SignedRRset::from_section(&zone, RecordType::DS, &response.answers)?
            .ok_or_else(|| failed(&zone, RecordType::DS, "no DS records, delegation is insecure"))?;
        let parent = ds.signer().clone();
        if parent.num_labels() >= zone.num_labels() {
            return Err(failed(
                &zone,
                RecordType::DS,
                &format!("signed by {parent}, which is not a parent zone"),
            ));
        }
        cuts.push(ZoneCut {
            zone,
            dnskeys,
            ds: Some(ds),
        });
        zone = parent;
    }
}

/// Verify gathered cuts from the root down and return the authenticated keys of the first
/// (lowest) zone. Every RRSIG that verified is added to `proof`.
pub(crate) fn verify(
    cuts: &[ZoneCut],
    anchors: &TrustAnchors,
    now: i64,
    skew: i64,
    proof: &mut ValidationProof,
) -> Result<Vec<DNSKEY>, ResolutionError> {
    let mut parent_keys: Option<Vec<DNSKEY>> = None;
    for cut in cuts.iter().rev() {
        let entry_ds = match (&cut.ds, &parent_keys) {
            (None, _) => anchors.ds().to_vec(),
            (Some(ds_set), Some(keys)) => {
                let (rrsig, sig) = ds_set.verify(keys, now, skew)?;
                proof.add(ds_set, rrsig, sig);
                ds_set
                    .rdata()
                    .filter_map(|rdata| match rdata {
                        RData::DNSSEC(DNSSECRData::DS(ds)) => Some(ds.clone()),
                        _ => None,
                    })
                    .collect()
            }
            (Some(_), None) => {
                return Err(failed(
                    &cut.zone,
                    RecordType::DS,
                    "chain of trust does not reach the root",
                ))
            }
        };

        let keys = verify_dnskeys(cut, &entry_ds, now, skew, proof)?;
        tracing::debug!("authenticated DNSKEY RRset for {}", cut.zone);
        proof.add_zone(&cut.zone);
        parent_keys = Some(keys);
    }
    parent_keys.ok_or_else(|| {
        ResolutionError::DnssecValidationFailed("empty chain of trust".to_string())
    })
}

/// Authenticate a zone's `DNSKEY` RRset: at least one key must match a trusted `DS`, and that
/// key must have signed the whole RRset. Returns every key in the set.
fn verify_dnskeys(
    cut: &ZoneCut,
    trusted_ds: &[DS],
    now: i64,
    skew: i64,
    proof: &mut ValidationProof,
) -> Result<Vec<DNSKEY>, ResolutionError> {
    let keys: Vec<DNSKEY> = cut
        .dnskeys
        .rdata()
        .filter_map(|rdata| match rdata {
            RData::DNSSEC(DNSSECRData::DNSKEY(key)) => Some(key.clone()),
            _ => None,
        })
        .collect();

    let zone = cut.zone.to_lowercase();
    let entry_keys: Vec<DNSKEY> = keys
        .iter()
        .filter(|key| trusted_ds.iter().any(|ds| ds_matches(&zone, ds, key)))
        .cloned()
        .collect();
    if entry_keys.is_empty() {
        return Err(failed(
            &cut.zone,
            RecordType::DNSKEY,
            "no DNSKEY matches a trusted DS record",
        ));
    }

    let (rrsig, sig) = cut.dnskeys.verify(&entry_keys, now, skew)?;
    proof.add(&cut.dnskeys, rrsig, sig);
    Ok(keys)
}

fn ds_matches(zone: &Name, ds: &DS, key: &DNSKEY) -> bool {
    matches!(ds.digest_type(), DigestType::SHA256 | DigestType::SHA384)
        && ds.algorithm() == key.algorithm()
        && key.calculate_key_tag().ok() == Some(ds.key_tag())
        && ds.covers(zone, key).unwrap_or(false)
}
