//! Ed25519 zone signing for unit tests.
use ring::signature::{Ed25519KeyPair, KeyPair};
use trust_dns_proto::rr::dnssec::rdata::{DNSSECRData, DNSKEY, DS, SIG};
use trust_dns_proto::rr::dnssec::{tbs, Algorithm, DigestType};
use trust_dns_proto::rr::{DNSClass, Name, RData, Record, RecordType};

pub(crate) fn now() -> u32 {
    u32::try_from(time::OffsetDateTime::now_utc().unix_timestamp()).unwrap()
}

pub(crate) struct ZoneKey {
    zone: Name,
    keypair: Ed25519KeyPair,
}

impl ZoneKey {
    pub(crate) fn new(zone: Name, seed: u8) -> Self {
        let keypair = Ed25519KeyPair::from_seed_unchecked(&[seed; 32]).unwrap();
        Self { zone, keypair }
    }

    pub(crate) fn zone(&self) -> &Name {
        &self.zone
    }

    pub(crate) fn dnskey(&self) -> DNSKEY {
        DNSKEY::new(
            true,
            true,
            false,
            Algorithm::ED25519,
            self.keypair.public_key().as_ref().to_vec(),
        )
    }

    pub(crate) fn dnskey_record(&self) -> Record {
        Record::from_rdata(
            self.zone.clone(),
            3600,
            RData::DNSSEC(DNSSECRData::DNSKEY(self.dnskey())),
        )
    }

    pub(crate) fn ds(&self) -> DS {
        let dnskey = self.dnskey();
        let digest = dnskey.to_digest(&self.zone, DigestType::SHA256).unwrap();
        DS::new(
            dnskey.calculate_key_tag().unwrap(),
            Algorithm::ED25519,
            DigestType::SHA256,
            digest.as_ref().to_vec(),
        )
    }

    /// Sign the RRset formed by `records` (all sharing owner and type).
    pub(crate) fn sign(&self, records: &[Record], inception: u32, expiration: u32) -> Record {
        let owner = records[0].name().clone();
        let unsigned = SIG::new(
            records[0].rr_type(),
            Algorithm::ED25519,
            owner.num_labels(),
            records[0].ttl(),
            expiration,
            inception,
            self.dnskey().calculate_key_tag().unwrap(),
            self.zone.clone(),
            Vec::new(),
        );
        let tbs = tbs::rrset_tbs_with_sig(&owner, DNSClass::IN, &unsigned, records).unwrap();
        let signature = self.keypair.sign(tbs.as_ref()).as_ref().to_vec();
        let mut rrsig = Record::from_rdata(
            owner,
            records[0].ttl(),
            RData::DNSSEC(DNSSECRData::SIG(unsigned.set_sig(signature))),
        );
        rrsig.set_rr_type(RecordType::RRSIG);
        rrsig
    }
}
