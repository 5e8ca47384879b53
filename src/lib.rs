//! BIP-353 resolver
//!
//! Resolves human-readable Bitcoin payment addresses like `₿matt@example.com` into
//! [payment instructions][PaymentInstruction], following [BIP-353]: the address maps to a TXT
//! record at `matt.user._bitcoin-payment.example.com.` holding a [BIP-21] `bitcoin:` URI.
//!
//! Every answer is authenticated with [DNSSEC][RFC-4035] from the root trust anchors down.
//! Anything that can't be authenticated is an error: there is no insecure fallback, because
//! an unauthenticated answer could redirect funds. Successful resolutions carry the
//! [proof][dnssec::ValidationProof] that authenticated them, which can be replayed offline
//! with a [`ProofTransport`].
//!
//! ```no_run
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let resolver = bip353::Resolver::from_config(&bip353::Config::default())?;
//! let instruction = resolver.resolve("₿matt@mattcorallo.com").await?;
//! println!("{} ({})", instruction.uri(), instruction.payment_type());
//! # Ok(())
//! # }
//! ```
//!
//! [BIP-353]: https://github.com/bitcoin/bips/blob/master/bip-0353.mediawiki
//! [BIP-21]: https://github.com/bitcoin/bips/blob/master/bip-0021.mediawiki
//! [RFC-4035]: https://www.rfc-editor.org/rfc/rfc4035
//!
#![warn(clippy::pedantic)]

pub mod address;
pub mod config;
pub mod dnssec;
pub mod error;
#[cfg(feature = "ffi")]
pub mod ffi;
pub mod instruction;
pub mod metrics;
pub mod network;
pub mod payload;
pub mod query_name;
pub mod resolver;
pub mod transport;
pub mod uri;

pub use address::{parse, ParsedAddress};
pub use config::{Config, SharedConfig};
pub use dnssec::{AuthenticatedRRset, DnssecValidator, TrustAnchors, ValidationProof};
pub use error::{Error, ErrorKind, ResolutionError};
pub use instruction::{PaymentInstruction, PaymentType};
pub use metrics::{ResolutionStats, ResolverMetrics};
pub use network::Network;
pub use query_name::{derive, QueryName};
pub use resolver::Resolver;
pub use transport::{DnsTransport, DynTransport, InMemoryTransport, ProofTransport, TcpTransport};
pub use uri::interpret;
