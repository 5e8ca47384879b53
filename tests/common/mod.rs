//! A signed `.` → `com.` → `example.com.` hierarchy for end-to-end tests.
#![allow(dead_code)]

use async_trait::async_trait;
use bip353::transport::{DnsResponse, DnsTransport, TransportError};
use bip353::{Config, InMemoryTransport, Network, Resolver};
use data_encoding::{BASE32HEX_NOPAD, HEXUPPER};
use ring::signature::{Ed25519KeyPair, KeyPair};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use trust_dns_proto::op::{Header, ResponseCode};
use trust_dns_proto::rr::dnssec::rdata::{DNSSECRData, DNSKEY, DS, NSEC, NSEC3, SIG};
use trust_dns_proto::rr::dnssec::{tbs, Algorithm, DigestType, Nsec3HashAlgorithm};
use trust_dns_proto::rr::rdata::TXT;
use trust_dns_proto::rr::{DNSClass, Name, RData, Record, RecordType};
use trust_dns_server::authority::MessageResponseBuilder;
use trust_dns_server::server::{Request, RequestHandler, ResponseHandler, ResponseInfo};
use trust_dns_server::ServerFuture;

pub const MAIN_ADDRESS: &str = "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4";
pub const TEST_ADDRESS: &str = "tb1qw508d6qejxtdg4y5r3zarvary0c5xw7kxpjzsx";

pub fn now() -> u32 {
    u32::try_from(time::OffsetDateTime::now_utc().unix_timestamp()).unwrap()
}

pub fn name(s: &str) -> Name {
    Name::from_ascii(s).unwrap()
}

/// `<user>.user._bitcoin-payment.example.com.`
pub fn payment_name(user: &str) -> Name {
    name(&format!("{user}.user._bitcoin-payment.example.com."))
}

pub struct ZoneKey {
    zone: Name,
    keypair: Ed25519KeyPair,
}

impl ZoneKey {
    pub fn new(zone: Name, seed: u8) -> Self {
        let keypair = Ed25519KeyPair::from_seed_unchecked(&[seed; 32]).unwrap();
        Self { zone, keypair }
    }

    pub fn zone(&self) -> &Name {
        &self.zone
    }

    pub fn dnskey(&self) -> DNSKEY {
        DNSKEY::new(
            true,
            true,
            false,
            Algorithm::ED25519,
            self.keypair.public_key().as_ref().to_vec(),
        )
    }

    pub fn ds(&self) -> DS {
        let dnskey = self.dnskey();
        let digest = dnskey.to_digest(&self.zone, DigestType::SHA256).unwrap();
        DS::new(
            dnskey.calculate_key_tag().unwrap(),
            Algorithm::ED25519,
            DigestType::SHA256,
            digest.as_ref().to_vec(),
        )
    }

    /// The `DS` in trust anchor presentation format.
    pub fn anchor(&self) -> String {
        let ds = self.ds();
        format!("{} 15 2 {}", ds.key_tag(), HEXUPPER.encode(ds.digest()))
    }

    pub fn sign(&self, records: &[Record], inception: u32, expiration: u32) -> Record {
        self.sign_with_labels(records, records[0].name().num_labels(), inception, expiration)
    }

    /// Sign with an explicit RRSIG label count. A count below the owner's makes the RRset a
    /// wildcard expansion.
    pub fn sign_with_labels(
        &self,
        records: &[Record],
        labels: u8,
        inception: u32,
        expiration: u32,
    ) -> Record {
        let owner = records[0].name().clone();
        let unsigned = SIG::new(
            records[0].rr_type(),
            Algorithm::ED25519,
            labels,
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

pub struct Hierarchy {
    pub root: ZoneKey,
    pub com: ZoneKey,
    pub example: ZoneKey,
    pub transport: InMemoryTransport,
    pub inception: u32,
    pub expiration: u32,
}

impl Hierarchy {
    pub fn new() -> Self {
        Self::build(false)
    }

    /// A hierarchy whose `example.com.` `DS` (as signed by `com.`) has one digest byte flipped.
    pub fn with_corrupt_ds() -> Self {
        Self::build(true)
    }

    fn build(corrupt_ds: bool) -> Self {
        let mut hierarchy = Self {
            root: ZoneKey::new(Name::root(), 1),
            com: ZoneKey::new(name("com."), 2),
            example: ZoneKey::new(name("example.com."), 3),
            transport: InMemoryTransport::new(),
            inception: now() - 3600,
            expiration: now() + 86_400,
        };

        for key in [&hierarchy.root, &hierarchy.com, &hierarchy.example] {
            let dnskey = Record::from_rdata(
                key.zone().clone(),
                3600,
                RData::DNSSEC(DNSSECRData::DNSKEY(key.dnskey())),
            );
            let rrsig = key.sign(&[dnskey.clone()], hierarchy.inception, hierarchy.expiration);
            hierarchy.transport.insert(
                key.zone().clone(),
                RecordType::DNSKEY,
                DnsResponse::answer(vec![dnskey, rrsig]),
            );
        }

        let com_ds = hierarchy.com.ds();
        let mut example_ds = hierarchy.example.ds();
        if corrupt_ds {
            let mut digest = example_ds.digest().to_vec();
            digest[0] ^= 0x01;
            example_ds = DS::new(
                example_ds.key_tag(),
                example_ds.algorithm(),
                example_ds.digest_type(),
                digest,
            );
        }
        for (parent, child, ds) in [
            (&hierarchy.root, &hierarchy.com, com_ds),
            (&hierarchy.com, &hierarchy.example, example_ds),
        ] {
            let record = Record::from_rdata(
                child.zone().clone(),
                3600,
                RData::DNSSEC(DNSSECRData::DS(ds)),
            );
            let rrsig = parent.sign(&[record.clone()], hierarchy.inception, hierarchy.expiration);
            hierarchy.transport.insert(
                child.zone().clone(),
                RecordType::DS,
                DnsResponse::answer(vec![record, rrsig]),
            );
        }
        hierarchy
    }

    pub fn config(&self, network: Network) -> Config {
        Config::default()
            .with_network(network)
            .with_trust_anchors([self.root.anchor()])
    }

    pub fn resolver(&self, network: Network) -> Resolver {
        Resolver::new(&self.config(network), Arc::new(self.transport.clone())).unwrap()
    }

    fn txt_records(owner: &Name, texts: &[&str]) -> Vec<Record> {
        texts
            .iter()
            .map(|text| {
                Record::from_rdata(
                    owner.clone(),
                    300,
                    RData::TXT(TXT::new(vec![(*text).to_string()])),
                )
            })
            .collect()
    }

    /// Publish one TXT record per entry of `texts` at `user`'s payment name, signed by
    /// `example.com.`.
    pub fn publish(&mut self, user: &str, texts: &[&str]) {
        self.publish_with_validity(user, texts, self.inception, self.expiration);
    }

    pub fn publish_with_validity(
        &mut self,
        user: &str,
        texts: &[&str],
        inception: u32,
        expiration: u32,
    ) {
        let owner = payment_name(user);
        let mut answers = Self::txt_records(&owner, texts);
        answers.push(self.example.sign(&answers, inception, expiration));
        self.transport
            .insert(owner, RecordType::TXT, DnsResponse::answer(answers));
    }

    pub fn publish_unsigned(&mut self, user: &str, texts: &[&str]) {
        let owner = payment_name(user);
        let answers = Self::txt_records(&owner, texts);
        self.transport
            .insert(owner, RecordType::TXT, DnsResponse::answer(answers));
    }

    /// Point `alias`'s payment name at `target`'s with a signed CNAME.
    pub fn publish_cname(&mut self, alias: &str, target: &str) {
        let owner = payment_name(alias);
        let cname = Record::from_rdata(owner.clone(), 300, RData::CNAME(payment_name(target)));
        let rrsig = self
            .example
            .sign(&[cname.clone()], self.inception, self.expiration);
        self.transport
            .insert(owner, RecordType::TXT, DnsResponse::answer(vec![cname, rrsig]));
    }

    fn signed(&self, record: Record) -> Vec<Record> {
        let rrsig = self
            .example
            .sign(&[record.clone()], self.inception, self.expiration);
        vec![record, rrsig]
    }

    /// Answer `user` from `*.user._bitcoin-payment.example.com.`, with the apex NSEC proving
    /// that `user`'s own name doesn't exist.
    pub fn publish_wildcard(&mut self, user: &str, texts: &[&str]) {
        let owner = payment_name(user);
        let mut answers = Self::txt_records(&owner, texts);
        let wildcard_labels = owner.num_labels() - 1;
        answers.push(self.example.sign_with_labels(
            &answers,
            wildcard_labels,
            self.inception,
            self.expiration,
        ));
        let authority = self.signed(self.apex_nsec());
        self.transport.insert(
            owner,
            RecordType::TXT,
            DnsResponse::answer(answers).with_authority(authority),
        );
    }

    /// The NSEC from the apex to `matt`, covering every name sorting between them.
    fn apex_nsec(&self) -> Record {
        Record::from_rdata(
            name("example.com."),
            300,
            RData::DNSSEC(DNSSECRData::NSEC(NSEC::new(
                payment_name("matt"),
                vec![
                    RecordType::SOA,
                    RecordType::NS,
                    RecordType::DNSKEY,
                    RecordType::NSEC,
                    RecordType::RRSIG,
                ],
            ))),
        )
    }

    /// Answer `user` with NXDOMAIN, proven by an NSEC from the apex to `matt`.
    pub fn deny_with_nsec(&mut self, user: &str) {
        let authority = self.signed(self.apex_nsec());
        self.transport.insert(
            payment_name(user),
            RecordType::TXT,
            DnsResponse::nxdomain(authority),
        );
    }

    /// Answer `user` with NODATA: the name exists with only an `A` record.
    pub fn nodata_with_nsec(&mut self, user: &str) {
        let nsec = Record::from_rdata(
            payment_name(user),
            300,
            RData::DNSSEC(DNSSECRData::NSEC(NSEC::new(
                payment_name("matt"),
                vec![RecordType::A, RecordType::NSEC, RecordType::RRSIG],
            ))),
        );
        let authority = self.signed(nsec);
        self.transport.insert(
            payment_name(user),
            RecordType::TXT,
            DnsResponse::nodata(authority),
        );
    }

    /// Answer `user` from an NSEC3 chain over `names` (each with its type bitmap).
    pub fn deny_with_nsec3(&mut self, user: &str, names: &[(Name, Vec<RecordType>)], nxdomain: bool) {
        let chain = nsec3_chain(&name("example.com."), names);
        self.deny_with_nsec3_records(user, chain, nxdomain);
    }

    /// Answer `user` with exactly the given NSEC3 records, signed by `example.com.`.
    pub fn deny_with_nsec3_records(&mut self, user: &str, chain: Vec<(Name, NSEC3)>, nxdomain: bool) {
        let mut authority = Vec::new();
        for (owner, nsec3) in chain {
            let record = Record::from_rdata(
                owner,
                300,
                RData::DNSSEC(DNSSECRData::NSEC3(nsec3)),
            );
            authority.extend(self.signed(record));
        }
        let response = if nxdomain {
            DnsResponse::nxdomain(authority)
        } else {
            DnsResponse::nodata(authority)
        };
        self.transport
            .insert(payment_name(user), RecordType::TXT, response);
    }
}

/// The names of `example.com.` that exist when only `matt` publishes a payment record,
/// empty non-terminals included.
pub fn example_names() -> Vec<(Name, Vec<RecordType>)> {
    vec![
        (
            name("example.com."),
            vec![RecordType::SOA, RecordType::NS, RecordType::DNSKEY],
        ),
        (name("_bitcoin-payment.example.com."), vec![]),
        (name("user._bitcoin-payment.example.com."), vec![]),
        (payment_name("matt"), vec![RecordType::TXT]),
    ]
}

/// The NSEC3 owner name `name` hashes to in `zone` (no salt, one iteration).
pub fn nsec3_owner(zone: &Name, name: &Name) -> Name {
    let hash = Nsec3HashAlgorithm::SHA1
        .hash(&[], &name.to_lowercase(), 1)
        .unwrap();
    let label = BASE32HEX_NOPAD.encode(hash.as_ref()).to_ascii_lowercase();
    Name::from_labels(vec![label.as_bytes()])
        .unwrap()
        .append_name(zone)
        .unwrap()
}

/// NSEC3 records (no salt, one iteration) for a zone holding exactly `names`.
pub fn nsec3_chain(zone: &Name, names: &[(Name, Vec<RecordType>)]) -> Vec<(Name, NSEC3)> {
    let mut hashed: Vec<(Vec<u8>, Vec<RecordType>)> = names
        .iter()
        .map(|(n, types)| {
            let hash = Nsec3HashAlgorithm::SHA1
                .hash(&[], &n.to_lowercase(), 1)
                .unwrap()
                .as_ref()
                .to_vec();
            (hash, types.clone())
        })
        .collect();
    hashed.sort();
    (0..hashed.len())
        .map(|i| {
            let (hash, types) = &hashed[i];
            let next = hashed[(i + 1) % hashed.len()].0.clone();
            let label = BASE32HEX_NOPAD.encode(hash).to_ascii_lowercase();
            let owner = Name::from_labels(vec![label.as_bytes()])
                .unwrap()
                .append_name(zone)
                .unwrap();
            let nsec3 = NSEC3::new(
                Nsec3HashAlgorithm::SHA1,
                false,
                1,
                vec![],
                next,
                types.clone(),
            );
            (owner, nsec3)
        })
        .collect()
}

/// Counts queries before handing them to the wrapped transport, optionally stalling first.
pub struct CountingTransport {
    inner: InMemoryTransport,
    delay: Option<Duration>,
    queries: AtomicUsize,
}

impl CountingTransport {
    pub fn new(inner: InMemoryTransport) -> Self {
        Self {
            inner,
            delay: None,
            queries: AtomicUsize::new(0),
        }
    }

    pub fn stalling(inner: InMemoryTransport, delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::new(inner)
        }
    }

    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DnsTransport for CountingTransport {
    async fn query(
        &self,
        name: &Name,
        record_type: RecordType,
    ) -> Result<DnsResponse, TransportError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.inner.query(name, record_type).await
    }
}

/// Serves a transport's table as an authoritative-looking DNS server.
struct FixtureHandler {
    transport: InMemoryTransport,
}

#[async_trait]
impl RequestHandler for FixtureHandler {
    async fn handle_request<R: ResponseHandler>(
        &self,
        request: &Request,
        mut response_handle: R,
    ) -> ResponseInfo {
        let query = request.query();
        let qname: Name = query.name().into();
        let mut header = Header::response_from_request(request.header());
        let answer = self.transport.query(&qname, query.query_type()).await;
        let builder = MessageResponseBuilder::from_message_request(request);
        let result = match answer {
            Ok(answer) => {
                header.set_response_code(answer.response_code);
                let response = builder.build(
                    header,
                    answer.answers.iter(),
                    answer.authority.iter(),
                    &[],
                    &[],
                );
                response_handle.send_response(response).await
            }
            Err(_) => {
                header.set_response_code(ResponseCode::ServFail);
                response_handle
                    .send_response(builder.build_no_records(header))
                    .await
            }
        };
        result.unwrap_or_else(|_| {
            let mut header = Header::new();
            header.set_response_code(ResponseCode::ServFail);
            header.into()
        })
    }
}

/// Serve `transport` over TCP on a loopback port. The server runs until the runtime shuts down.
pub async fn serve_tcp(transport: InMemoryTransport) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let mut server = ServerFuture::new(FixtureHandler { transport });
    server.register_listener(listener, Duration::from_secs(5));
    tokio::spawn(server.block_until_done());
    addr
}
