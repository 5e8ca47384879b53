use crate::dnssec::anchor::ROOT_ANCHORS;
use crate::dnssec::{TrustAnchors, DEFAULT_CLOCK_SKEW, DEFAULT_MAX_DEPTH};
use crate::error::Error;
use crate::network::Network;
use serde::Deserialize;
use serde_with::{serde_as, DurationMilliSeconds, DurationSeconds};
use std::fs::File;
use std::io::BufReader;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

pub type SharedConfig = Arc<Config>;

/// Upper bound accepted for [`Config::max_chain_depth`].
pub const MAX_CHAIN_DEPTH_LIMIT: usize = 64;

/// Resolver settings. Every field has a default, so `{}` is a complete config file.
#[serde_as]
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub network: Network,
    /// Recursive resolver the TCP transport sends queries to.
    pub dns_resolver: SocketAddr,
    /// Bound on one whole resolution, chain of trust included.
    #[serde(rename = "timeout_ms")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub timeout: Duration,
    #[serde(rename = "clock_skew_secs")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub clock_skew: Duration,
    pub max_chain_depth: usize,
    /// Root `DS` records in presentation format.
    pub trust_anchors: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            network: Network::default(),
            dns_resolver: SocketAddr::from((Ipv4Addr::new(8, 8, 8, 8), 53)),
            timeout: Duration::from_millis(5000),
            clock_skew: DEFAULT_CLOCK_SKEW,
            max_chain_depth: DEFAULT_MAX_DEPTH,
            trust_anchors: ROOT_ANCHORS.iter().map(ToString::to_string).collect(),
        }
    }
}

impl Config {
    /// Load and validate a JSON config file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IO`] if the file can't be read, [`Error::InvalidJSON`] if it doesn't
    /// deserialize, and any error [`Config::validate`] returns.
    pub fn try_from_file(p: impl AsRef<Path>) -> Result<Self, Error> {
        let f = File::open(p)?;
        let reader = BufReader::new(f);
        let conf: Config = serde_json::from_reader(reader)?;
        conf.validate()?;
        Ok(conf)
    }

    /// Check the settings are usable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTimeout`] for a zero timeout, [`Error::InvalidChainDepth`] when
    /// the depth is outside `1..=64`, and the [trust anchor][Config::trust_anchors] errors.
    pub fn validate(&self) -> Result<(), Error> {
        if self.timeout.is_zero() {
            return Err(Error::InvalidTimeout);
        }
        if !(1..=MAX_CHAIN_DEPTH_LIMIT).contains(&self.max_chain_depth) {
            return Err(Error::InvalidChainDepth(
                self.max_chain_depth,
                MAX_CHAIN_DEPTH_LIMIT,
            ));
        }
        self.trust_anchors().map(|_| ())
    }

    /// Parsed trust anchors.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTrustAnchor`] or [`Error::NoTrustAnchors`].
    pub fn trust_anchors(&self) -> Result<TrustAnchors, Error> {
        TrustAnchors::parse(self.trust_anchors.as_slice())
    }

    #[must_use]
    pub fn with_network(mut self, network: Network) -> Self {
        self.network = network;
        self
    }

    #[must_use]
    pub fn with_dns_resolver(mut self, dns_resolver: SocketAddr) -> Self {
        self.dns_resolver = dns_resolver;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_trust_anchors<S: Into<String>>(mut self, anchors: impl IntoIterator<Item = S>) -> Self {
        self.trust_anchors = anchors.into_iter().map(Into::into).collect();
        self
    }
}
