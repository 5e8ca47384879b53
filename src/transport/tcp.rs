//! A DNS-over-TCP stub client.
//!
//! DNSSEC answers carry signatures and keys that routinely exceed classic UDP payload sizes, so
//! every query goes over TCP: one connection per query, two-octet length framing
//! ([RFC-1035 §4.2.2][RFC-1035]). Queries set `RD` so the upstream recurses, `DO` so it returns
//! DNSSEC records, and `CD` so it hands back data even when its own validation disagrees; the
//! [validator][crate::dnssec] makes the decision.
//!
//! [RFC-1035]: https://www.rfc-editor.org/rfc/rfc1035#section-4.2.2
use crate::transport::{DnsResponse, DnsTransport, TransportError};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use trust_dns_proto::op::{Edns, Message, MessageType, OpCode, Query, ResponseCode};
use trust_dns_proto::rr::{Name, RecordType};

const MAX_PAYLOAD: u16 = 4096;

#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub struct TcpTransport {
    server: SocketAddr,
    timeout: Duration,
    next_id: AtomicU16,
}

impl TcpTransport {
    #[must_use]
    pub fn new(server: SocketAddr, timeout: Duration) -> Self {
        // Start IDs somewhere unpredictable; responses are matched per connection anyway.
        let seed = time::OffsetDateTime::now_utc().nanosecond().to_le_bytes();
        Self {
            server,
            timeout,
            next_id: AtomicU16::new(u16::from_le_bytes([seed[0], seed[1]])),
        }
    }

    #[must_use]
    pub fn server(&self) -> SocketAddr {
        self.server
    }

    fn request(&self, name: &Name, record_type: RecordType) -> Message {
        let mut edns = Edns::new();
        edns.set_dnssec_ok(true);
        edns.set_max_payload(MAX_PAYLOAD);

        let mut message = Message::new();
        message
            .set_id(self.next_id.fetch_add(1, Ordering::Relaxed))
            .set_message_type(MessageType::Query)
            .set_op_code(OpCode::Query)
            .set_recursion_desired(true)
            .set_checking_disabled(true)
            .add_query(Query::query(name.clone(), record_type))
            .set_edns(edns);
        message
    }

    async fn exchange(&self, request: &[u8]) -> Result<Vec<u8>, TransportError> {
        let len = u16::try_from(request.len())
            .map_err(|_| TransportError::Unreachable("query too large".to_string()))?;
        let mut stream = TcpStream::connect(self.server)
            .await
            .map_err(|err| unreachable(self.server, &err))?;
        stream
            .write_u16(len)
            .await
            .map_err(|err| unreachable(self.server, &err))?;
        stream
            .write_all(request)
            .await
            .map_err(|err| unreachable(self.server, &err))?;
        stream
            .flush()
            .await
            .map_err(|err| unreachable(self.server, &err))?;

        let resp_len = stream
            .read_u16()
            .await
            .map_err(|err| unreachable(self.server, &err))?;
        let mut buf = vec![0; usize::from(resp_len)];
        stream
            .read_exact(&mut buf)
            .await
            .map_err(|err| unreachable(self.server, &err))?;
        Ok(buf)
    }
}

fn unreachable(server: SocketAddr, err: &std::io::Error) -> TransportError {
    TransportError::Unreachable(format!("{server}: {err}"))
}

#[async_trait::async_trait]
impl DnsTransport for TcpTransport {
    async fn query(
        &self,
        name: &Name,
        record_type: RecordType,
    ) -> Result<DnsResponse, TransportError> {
        let request = self.request(name, record_type);
        let request_bytes = request.to_vec()?;
        tracing::debug!("querying {} for {name} {record_type}", self.server);

        let response_bytes = tokio::time::timeout(self.timeout, self.exchange(&request_bytes))
            .await
            .map_err(|_| TransportError::Timeout)??;

        let mut response = Message::from_vec(&response_bytes)?;
        if response.id() != request.id() || response.message_type() != MessageType::Response {
            return Err(TransportError::Protocol(
                format!("unexpected response to query {}", request.id()).into(),
            ));
        }
        match response.response_code() {
            ResponseCode::NoError | ResponseCode::NXDomain => Ok(DnsResponse {
                response_code: response.response_code(),
                answers: response.take_answers(),
                authority: response.take_name_servers(),
            }),
            code => Err(TransportError::Unreachable(format!(
                "{} answered {code} for {name} {record_type}",
                self.server
            ))),
        }
    }
}
