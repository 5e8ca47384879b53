//! Resolution counters.
//!
//! Every [`Resolver`][crate::resolver::Resolver] counts the outcome of each call it handles,
//! successes and failures by [`ErrorKind`]. Clones of a resolver share one set of counters.
//! [`ResolverMetrics::stats`] takes a point-in-time snapshot.
//!
//! With the `prometheus` feature the same outcomes are also counted in the default Prometheus
//! registry as `bip353_resolutions_total{outcome="success"|"<error kind>"}`.
use crate::error::ErrorKind;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

#[cfg(feature = "prometheus")]
use lazy_static::lazy_static;
#[cfg(feature = "prometheus")]
use prometheus::{register_int_counter_vec, IntCounterVec};

#[cfg(feature = "prometheus")]
lazy_static! {
    /// `None` if another collector already registered the name.
    static ref RESOLUTIONS: Option<IntCounterVec> = register_int_counter_vec!(
        "bip353_resolutions_total",
        "Total number of BIP-353 resolutions by outcome",
        &["outcome"]
    )
    .ok();
}

/// Live counters, updated lock-free from concurrent resolutions.
#[derive(Debug, Default)]
pub struct ResolverMetrics {
    success: AtomicU64,
    failures: [AtomicU64; ErrorKind::ALL.len()],
}

impl ResolverMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&self) {
        self.success.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "prometheus")]
        export("success");
    }

    pub fn record_failure(&self, kind: ErrorKind) {
        self.failures[kind as usize].fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "prometheus")]
        export(&kind.to_string());
    }

    #[must_use]
    pub fn stats(&self) -> ResolutionStats {
        let success = self.success.load(Ordering::Relaxed);
        let failures: BTreeMap<String, u64> = ErrorKind::ALL
            .iter()
            .map(|kind| {
                (
                    kind.to_string(),
                    self.failures[*kind as usize].load(Ordering::Relaxed),
                )
            })
            .filter(|(_, count)| *count > 0)
            .collect();
        let failed = failures.values().sum();
        ResolutionStats {
            total: success + failed,
            success,
            failed,
            failures,
        }
    }
}

#[cfg(feature = "prometheus")]
fn export(outcome: &str) {
    if let Some(counter) = &*RESOLUTIONS {
        counter.with_label_values(&[outcome]).inc();
    }
}

/// A snapshot of [`ResolverMetrics`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolutionStats {
    pub total: u64,
    pub success: u64,
    pub failed: u64,
    /// Failure counts keyed by error kind (`not-found`, `timeout`, ...). Kinds that never
    /// occurred are left out.
    pub failures: BTreeMap<String, u64>,
}

impl ResolutionStats {
    /// Fraction of calls that succeeded, `0.0` before the first call.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.success as f64 / self.total as f64
        }
    }
}
