//! The producer connection seam.
//!
//! The actual message transport is not this crate's business: the damper only
//! needs something it can stop and restart against a new set of broker URLs.
//! Implementations typically wrap an AMQP connection built from the
//! [aggregated failover URL](failover_url).

use std::collections::HashSet;

use async_trait::async_trait;

/// Error type for producer start/stop failures.
pub type ProducerError = Box<dyn std::error::Error + Send + Sync>;

/// A message producer whose connection can be rebuilt against a changing set
/// of broker endpoints.
///
/// Contract: [`stop`](Self::stop) must be safe to call even if the producer
/// was never started, and [`start`](Self::start) after a stop must fully
/// reinitialize the connection from the given URL set. Failures of either
/// call are logged by the damper and not retried; the next topology change
/// triggers a fresh attempt.
#[async_trait]
pub trait Producer: Send + Sync + 'static {
    /// Establishes the producer connection against the given broker URLs.
    async fn start(&self, broker_urls: &HashSet<String>) -> Result<(), ProducerError>;

    /// Tears down the current connection, if any.
    async fn stop(&self) -> Result<(), ProducerError>;
}

/// Composes the aggregated failover URL for the current broker endpoints.
///
/// All endpoints are listed in a single descriptor; the client picks one at
/// random and ignores any alternate endpoint list offered by the server, so
/// the route-derived set stays authoritative. The URLs are listed in sorted
/// order purely to keep logs and tests deterministic; selection is randomized
/// by the descriptor itself.
#[must_use]
pub fn failover_url(broker_urls: &HashSet<String>) -> String {
    let mut urls: Vec<&str> = broker_urls.iter().map(String::as_str).collect();
    urls.sort_unstable();

    format!(
        "failover://({})?failover.randomize=true&failover.amqpOpenServerListAction=IGNORE",
        urls.join(",")
    )
}
