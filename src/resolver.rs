//! End-to-end resolution of `₿user@domain` addresses.
//!
//! A [`Resolver`] runs one fixed pipeline per call: [parse][crate::address::parse] the address,
//! [derive][crate::query_name::derive] the query name, look up and
//! [authenticate][DnssecValidator::resolve_authenticated] its TXT RRset,
//! [select][crate::payload::parse_payload] the payment record and
//! [interpret][crate::uri::interpret] it for the resolver's [`Network`]. The first failing
//! stage ends the call. Nothing is retried and nothing is cached, so concurrent calls share
//! only the immutable settings, the transport and the [outcome counters][Resolver::stats].
use crate::address::{self, ParsedAddress};
use crate::config::Config;
use crate::dnssec::DnssecValidator;
use crate::error::{Error, ResolutionError};
use crate::instruction::PaymentInstruction;
use crate::metrics::{ResolutionStats, ResolverMetrics};
use crate::network::Network;
use crate::payload::parse_payload;
use crate::query_name::derive;
use crate::transport::{DynTransport, TcpTransport};
use crate::uri::interpret;
use std::sync::Arc;
use std::time::Duration;
use trust_dns_proto::rr::RecordType;

#[derive(Clone)]
pub struct Resolver {
    network: Network,
    validator: DnssecValidator,
    timeout: Duration,
    metrics: Arc<ResolverMetrics>,
}

impl Resolver {
    /// Build a resolver that queries through `transport`.
    ///
    /// # Errors
    ///
    /// Returns the [`Config::validate`] errors.
    pub fn new(config: &Config, transport: DynTransport) -> Result<Self, Error> {
        config.validate()?;
        let validator = DnssecValidator::new(transport, config.trust_anchors()?)
            .with_max_depth(config.max_chain_depth)
            .with_clock_skew(config.clock_skew);
        Ok(Self {
            network: config.network,
            validator,
            timeout: config.timeout,
            metrics: Arc::new(ResolverMetrics::new()),
        })
    }

    /// Build a resolver that sends queries over TCP to [`Config::dns_resolver`].
    ///
    /// # Errors
    ///
    /// Returns the [`Config::validate`] errors.
    pub fn from_config(config: &Config) -> Result<Self, Error> {
        let transport = TcpTransport::new(config.dns_resolver, config.timeout);
        Self::new(config, Arc::new(transport))
    }

    #[must_use]
    pub fn network(&self) -> Network {
        self.network
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Outcomes of every call made through this resolver or its clones so far.
    #[must_use]
    pub fn stats(&self) -> ResolutionStats {
        self.metrics.stats()
    }

    /// Resolve a `user@domain` address, optionally prefixed with `₿`.
    ///
    /// # Errors
    ///
    /// Returns a [`ResolutionError`] from the first stage that fails.
    pub async fn resolve(&self, address: &str) -> Result<PaymentInstruction, ResolutionError> {
        let result = match address::parse(address) {
            Ok(parsed) => self.run(&parsed).await,
            Err(err) => Err(err),
        };
        self.record(result)
    }

    /// Resolve an address that was already split into its user and domain parts.
    ///
    /// # Errors
    ///
    /// Returns a [`ResolutionError`] from the first stage that fails.
    pub async fn resolve_parts(
        &self,
        user: &str,
        domain: &str,
    ) -> Result<PaymentInstruction, ResolutionError> {
        let result = match ParsedAddress::new(user, domain) {
            Ok(parsed) => self.run(&parsed).await,
            Err(err) => Err(err),
        };
        self.record(result)
    }

    fn record(
        &self,
        result: Result<PaymentInstruction, ResolutionError>,
    ) -> Result<PaymentInstruction, ResolutionError> {
        match &result {
            Ok(_) => self.metrics.record_success(),
            Err(err) => self.metrics.record_failure(err.kind()),
        }
        result
    }

    async fn run(&self, address: &ParsedAddress) -> Result<PaymentInstruction, ResolutionError> {
        let hrn = address.to_hrn();
        let result = tokio::time::timeout(self.timeout, self.pipeline(address))
            .await
            .unwrap_or(Err(ResolutionError::Timeout));
        match &result {
            Ok(instruction) => tracing::info!(
                "resolved {hrn} to a {} payment instruction",
                instruction.payment_type()
            ),
            Err(err) => tracing::warn!("failed to resolve {hrn}: {err}"),
        }
        result
    }

    async fn pipeline(&self, address: &ParsedAddress) -> Result<PaymentInstruction, ResolutionError> {
        let qname = derive(address);
        tracing::debug!("resolving {} via {qname}", address.to_hrn());

        let rrset = self
            .validator
            .resolve_authenticated(&qname, RecordType::TXT)
            .await?;
        let uri = parse_payload(&rrset)?;
        tracing::debug!("selected payment URI {uri}");

        let instruction = interpret(&uri, self.network)?;
        let proof = rrset.into_proof();
        let wire = proof.to_wire().map_err(|err| {
            ResolutionError::DnssecValidationFailed(format!("proof can't be serialized: {err}"))
        })?;
        Ok(instruction.with_origin(address.to_hrn(), proof.expires(), wire))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::transport::InMemoryTransport;

    fn resolver(config: &Config) -> Resolver {
        Resolver::new(config, Arc::new(InMemoryTransport::new())).unwrap()
    }

    #[test]
    fn takes_settings_from_config() {
        let config = Config::default()
            .with_network(Network::Testnet)
            .with_timeout(Duration::from_millis(1234));
        let resolver = resolver(&config);
        assert_eq!(resolver.network(), Network::Testnet);
        assert_eq!(resolver.timeout(), Duration::from_millis(1234));
        assert_eq!(resolver.validator.max_depth(), config.max_chain_depth);
        assert_eq!(resolver.validator.clock_skew(), config.clock_skew);
    }

    #[test]
    fn invalid_config_is_refused() {
        let config = Config::default().with_timeout(Duration::ZERO);
        assert!(matches!(
            Resolver::new(&config, Arc::new(InMemoryTransport::new())),
            Err(Error::InvalidTimeout)
        ));
    }

    #[tokio::test]
    async fn malformed_address_never_queries() {
        let resolver = resolver(&Config::default());
        let err = resolver.resolve("no-at-sign").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedAddress);
        let err = resolver.resolve_parts("a_b", "example.com").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedAddress);
    }

    #[tokio::test]
    async fn clones_share_outcome_counters() {
        let resolver = resolver(&Config::default());
        let clone = resolver.clone();
        assert!(resolver.resolve("no-at-sign").await.is_err());
        assert!(clone.resolve("matt@example.com").await.is_err());

        let stats = resolver.stats();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.success, 0);
        assert_eq!(stats.failures.get("malformed-address"), Some(&1));
        assert_eq!(stats.failures.get("dnssec-validation-failed"), Some(&1));
        assert_eq!(clone.stats(), stats);
    }

    #[tokio::test]
    async fn unsigned_absence_fails_closed() {
        // The empty transport answers NXDOMAIN with no proof attached.
        let resolver = resolver(&Config::default());
        let err = resolver.resolve("₿matt@example.com").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DnssecValidationFailed);
    }
}
