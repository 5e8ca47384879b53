//! Authenticated denial of existence.
//!
//! Given `NSEC` or `NSEC3` records that have already been verified, decide whether they prove
//! that the query name doesn't exist ([RFC-4035 §5.4][RFC-4035], [RFC-5155 §8][RFC-5155]) or
//! that it exists without the queried type. Proofs that don't hold together are rejected; a
//! missing proof is never read as "not found".
//!
//! [RFC-4035]: https://www.rfc-editor.org/rfc/rfc4035#section-5.4
//! [RFC-5155]: https://www.rfc-editor.org/rfc/rfc5155#section-8
use data_encoding::BASE32HEX_NOPAD;
use trust_dns_proto::rr::dnssec::rdata::{NSEC, NSEC3};
use trust_dns_proto::rr::dnssec::Nsec3HashAlgorithm;
use trust_dns_proto::rr::{Name, RecordType};

/// Upper bound on NSEC3 hash iterations we are willing to compute.
pub(crate) const MAX_NSEC3_ITERATIONS: u16 = 150;

/// trust-dns has no named variant for `DNAME` (type 39).
const DNAME: RecordType = RecordType::Unknown(39);

/// A verified denial record along with the zone that signed it.
#[derive(Debug, Clone)]
pub(crate) enum DenialRecord {
    Nsec {
        owner: Name,
        zone: Name,
        nsec: NSEC,
    },
    Nsec3 {
        owner: Name,
        zone: Name,
        nsec3: NSEC3,
    },
}

/// What a set of denial records proves about the query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Denial {
    /// The name doesn't exist.
    NxDomain,
    /// The name exists, but has no records of the queried type.
    NoData,
}

/// Work out what `records` prove about `(qname, qtype)`.
pub(crate) fn classify(
    qname: &Name,
    qtype: RecordType,
    records: &[DenialRecord],
) -> Result<Denial, String> {
    let mut nsec = Vec::new();
    let mut nsec3 = Vec::new();
    for record in records {
        match record {
            DenialRecord::Nsec { owner, zone, nsec: rdata } if zone.zone_of(qname) => {
                nsec.push((owner, rdata));
            }
            DenialRecord::Nsec3 { owner, zone, nsec3: rdata } if zone.zone_of(qname) => {
                nsec3.push((owner, zone, rdata));
            }
            _ => {}
        }
    }

    if !nsec.is_empty() {
        return classify_nsec(qname, qtype, &nsec);
    }
    if !nsec3.is_empty() {
        return classify_nsec3(qname, qtype, &nsec3);
    }
    Err("no denial of existence records for the query name".to_string())
}

/// Check that a wildcard answer for `qname`, synthesized from a wildcard with `source_labels`
/// labels, is backed by proof that `qname` itself doesn't exist.
pub(crate) fn proves_wildcard_expansion(
    qname: &Name,
    source_labels: u8,
    records: &[DenialRecord],
) -> Result<(), String> {
    let closest_encloser = qname.trim_to(usize::from(source_labels));
    let next_closer = qname.trim_to(usize::from(source_labels) + 1);

    let nsec_covered = records.iter().any(|record| match record {
        DenialRecord::Nsec { owner, zone, nsec } => {
            zone.zone_of(qname) && nsec_covers(owner, nsec, qname)
        }
        DenialRecord::Nsec3 { .. } => false,
    });
    if nsec_covered {
        return Ok(());
    }

    let nsec3: Vec<_> = records
        .iter()
        .filter_map(|record| match record {
            DenialRecord::Nsec3 { owner, zone, nsec3 } if zone.zone_of(qname) => {
                Some((owner, zone, nsec3))
            }
            _ => None,
        })
        .collect();
    if !nsec3.is_empty() {
        let params = Nsec3Params::from_records(&nsec3)?;
        let hash = params.hash(&next_closer)?;
        if nsec3
            .iter()
            .any(|(owner, _, rdata)| nsec3_covers(owner, rdata, &hash) && !rdata.opt_out())
        {
            return Ok(());
        }
    }
    Err(format!(
        "wildcard answer from {closest_encloser} lacks proof that {qname} does not exist"
    ))
}

fn classify_nsec(
    qname: &Name,
    qtype: RecordType,
    records: &[(&Name, &NSEC)],
) -> Result<Denial, String> {
    if let Some((_, nsec)) = records.iter().find(|(owner, _)| *owner == qname) {
        let types = nsec.type_bit_maps();
        if types.contains(&qtype) || types.contains(&RecordType::CNAME) {
            return Err(format!("NSEC at {qname} shows the queried type exists"));
        }
        return Ok(Denial::NoData);
    }

    let (owner, nsec) = records
        .iter()
        .find(|(owner, nsec)| nsec_covers(owner, nsec, qname))
        .ok_or_else(|| format!("no NSEC covers {qname}"))?;

    // Delegations only prove what's in the parent zone, not what's below the cut.
    let types = nsec.type_bit_maps();
    if owner.zone_of(qname) && types.contains(&RecordType::NS) && !types.contains(&RecordType::SOA)
    {
        return Err(format!("NSEC at delegation {owner} can't deny {qname}"));
    }

    let closest_encloser = longer(
        common_ancestor(qname, owner),
        common_ancestor(qname, nsec.next_domain_name()),
    );
    let wildcard = wildcard_of(&closest_encloser)?;
    let wildcard_denied = records
        .iter()
        .any(|(owner, nsec)| nsec_covers(owner, nsec, &wildcard));
    if !wildcard_denied {
        return Err(format!("no NSEC denies wildcard {wildcard}"));
    }
    Ok(Denial::NxDomain)
}

fn classify_nsec3(
    qname: &Name,
    qtype: RecordType,
    records: &[(&Name, &Name, &NSEC3)],
) -> Result<Denial, String> {
    let params = Nsec3Params::from_records(records)?;

    let qhash = params.hash(qname)?;
    if let Some((_, _, rdata)) = records
        .iter()
        .find(|(owner, _, _)| nsec3_matches(owner, &qhash))
    {
        let types = rdata.type_bit_maps();
        if types.contains(&qtype) || types.contains(&RecordType::CNAME) {
            return Err(format!("NSEC3 for {qname} shows the queried type exists"));
        }
        return Ok(Denial::NoData);
    }

    // Closest encloser proof: walk up from the parent of qname until a name whose hash
    // matches an NSEC3 owner.
    let zone = records[0].1;
    let mut closest_encloser = None;
    let mut labels = usize::from(qname.num_labels());
    while labels > usize::from(zone.num_labels()) {
        labels -= 1;
        let candidate = qname.trim_to(labels);
        let hash = params.hash(&candidate)?;
        if let Some((_, _, rdata)) = records
            .iter()
            .find(|(owner, _, _)| nsec3_matches(owner, &hash))
        {
            let types = rdata.type_bit_maps();
            if types.contains(&DNAME)
                || (types.contains(&RecordType::NS) && !types.contains(&RecordType::SOA))
            {
                return Err(format!("closest encloser {candidate} is a delegation"));
            }
            closest_encloser = Some(candidate);
            break;
        }
    }
    let closest_encloser =
        closest_encloser.ok_or_else(|| format!("no closest encloser proof for {qname}"))?;

    let next_closer = qname.trim_to(usize::from(closest_encloser.num_labels()) + 1);
    let next_closer_hash = params.hash(&next_closer)?;
    let covering = records
        .iter()
        .find(|(owner, _, rdata)| nsec3_covers(owner, rdata, &next_closer_hash))
        .ok_or_else(|| format!("no NSEC3 covers next closer name {next_closer}"))?;
    if covering.2.opt_out() {
        return Err(format!("opt-out NSEC3 covering {next_closer} is not accepted"));
    }

    let wildcard = wildcard_of(&closest_encloser)?;
    let wildcard_hash = params.hash(&wildcard)?;
    if !records
        .iter()
        .any(|(owner, _, rdata)| nsec3_covers(owner, rdata, &wildcard_hash))
    {
        return Err(format!("no NSEC3 denies wildcard {wildcard}"));
    }
    Ok(Denial::NxDomain)
}

/// Whether `name` falls strictly between an NSEC's owner and its next name in canonical order.
/// The last NSEC of a zone wraps around to the apex.
fn nsec_covers(owner: &Name, nsec: &NSEC, name: &Name) -> bool {
    let next = nsec.next_domain_name();
    if owner < next {
        owner < name && name < next
    } else {
        owner < name || name < next
    }
}

/// The shared hashing parameters of an NSEC3 chain.
struct Nsec3Params<'a> {
    salt: &'a [u8],
    iterations: u16,
}

impl<'a> Nsec3Params<'a> {
    fn from_records(records: &[(&Name, &Name, &'a NSEC3)]) -> Result<Self, String> {
        let first = records
            .first()
            .map(|(_, _, rdata)| *rdata)
            .ok_or_else(|| "no NSEC3 records".to_string())?;
        if first.hash_algorithm() != Nsec3HashAlgorithm::SHA1 {
            return Err("unsupported NSEC3 hash algorithm".to_string());
        }
        if first.iterations() > MAX_NSEC3_ITERATIONS {
            return Err(format!(
                "NSEC3 iterations {} exceed {MAX_NSEC3_ITERATIONS}",
                first.iterations()
            ));
        }
        let consistent = records.iter().all(|(_, zone, rdata)| {
            rdata.hash_algorithm() == first.hash_algorithm()
                && rdata.iterations() == first.iterations()
                && rdata.salt() == first.salt()
                && *zone == records[0].1
        });
        if !consistent {
            return Err("NSEC3 records disagree on zone or hash parameters".to_string());
        }
        Ok(Self {
            salt: first.salt(),
            iterations: first.iterations(),
        })
    }

    fn hash(&self, name: &Name) -> Result<Vec<u8>, String> {
        Nsec3HashAlgorithm::SHA1
            .hash(self.salt, &name.to_lowercase(), self.iterations)
            .map(|digest| digest.as_ref().to_vec())
            .map_err(|err| err.to_string())
    }
}

/// Decode the hashed first label of an NSEC3 owner name.
fn owner_hash(owner: &Name) -> Option<Vec<u8>> {
    let label = owner.iter().next()?;
    BASE32HEX_NOPAD
        .decode(&label.to_ascii_uppercase())
        .ok()
}

fn nsec3_matches(owner: &Name, hash: &[u8]) -> bool {
    owner_hash(owner).map_or(false, |owner| owner == hash)
}

fn nsec3_covers(owner: &Name, nsec3: &NSEC3, hash: &[u8]) -> bool {
    let Some(owner) = owner_hash(owner) else {
        return false;
    };
    let next = nsec3.next_hashed_owner_name();
    if owner.as_slice() < next {
        owner.as_slice() < hash && hash < next
    } else {
        owner.as_slice() < hash || hash < next
    }
}

fn common_ancestor(a: &Name, b: &Name) -> Name {
    let mut labels = usize::from(a.num_labels().min(b.num_labels()));
    loop {
        let candidate = a.trim_to(labels);
        if labels == 0 || candidate == b.trim_to(labels) {
            return candidate;
        }
        labels -= 1;
    }
}

fn longer(a: Name, b: Name) -> Name {
    if a.num_labels() >= b.num_labels() {
        a
    } else {
        b
    }
}

fn wildcard_of(name: &Name) -> Result<Name, String> {
    Name::from_labels(vec![b"*" as &[u8]])
        .and_then(|star| star.append_name(name))
        .map_err(|err| err.to_string())
}
