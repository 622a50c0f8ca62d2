//! Connection parameters and route name filtering.
//!
//! Every broker URL is derived from a route's host plus one fixed set of
//! connection parameters, so the parameters are configured once at startup
//! and shared by the tracker for the lifetime of the watch. The route filter
//! is likewise compiled once; it selects the acceptor routes that belong to
//! the watched cluster out of everything the label selector returns.

use std::path::PathBuf;

use regex::Regex;

use crate::Result;

/// Fixed connection parameters applied to every discovered broker endpoint.
#[derive(Clone, Debug)]
pub struct ConnectionParams {
    /// URL scheme for broker connections, e.g. `amqps`.
    pub protocol: String,

    /// Port the route's external acceptor is reachable on.
    pub port: u16,

    /// Client id presented to the broker (`jms.clientID`).
    pub client_id: String,

    /// Broker username.
    pub username: String,

    /// Broker password.
    pub password: String,

    /// Path to the TLS trust store holding the broker certificates.
    pub trust_store: PathBuf,

    /// Password protecting the trust store.
    pub trust_store_password: String,
}

impl ConnectionParams {
    /// Derives the broker URL for a single acceptor host.
    ///
    /// The parameter set and its order are part of the wire/log contract with
    /// existing deployments and must not be reordered.
    #[must_use]
    pub fn broker_url(&self, host: &str) -> String {
        let Self {
            protocol,
            port,
            client_id,
            username,
            password,
            trust_store,
            trust_store_password,
        } = self;

        format!(
            "{protocol}://{host}:{port}\
             ?jms.clientID={client_id}\
             &jms.username={username}\
             &jms.password={password}\
             &transport.trustStoreLocation={}\
             &transport.trustStorePassword={trust_store_password}",
            trust_store.display()
        )
    }
}

/// Compiled filter deciding which route names are relevant.
///
/// Matching is always against the whole name, never a substring.
#[derive(Clone, Debug)]
pub struct RouteFilter {
    pattern: Regex,
}

impl RouteFilter {
    /// Compiles the filter for one of a cluster's named acceptors.
    ///
    /// The operator exposes each broker instance's acceptor as a route named
    /// `<cluster>-<acceptor>-<ordinal>-svc-rte`; this filter matches exactly
    /// those names. Cluster and acceptor names are escaped, so names
    /// containing regex metacharacters are matched literally.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidFilter`] if the composed pattern fails
    /// to compile.
    pub fn for_acceptor(cluster_name: &str, acceptor_name: &str) -> Result<Self> {
        Self::from_pattern(&format!(
            "{}-{}-\\d+-svc-rte",
            regex::escape(cluster_name),
            regex::escape(acceptor_name)
        ))
    }

    /// Compiles a filter from a raw pattern.
    ///
    /// The pattern is anchored on both ends, giving full-string match
    /// semantics regardless of how it is written.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidFilter`] if the pattern fails to
    /// compile.
    pub fn from_pattern(pattern: &str) -> Result<Self> {
        let pattern = Regex::new(&format!("^(?:{pattern})$"))?;
        Ok(Self { pattern })
    }

    /// Tests whether the whole route name matches the filter.
    #[must_use]
    pub fn matches(&self, route_name: &str) -> bool {
        self.pattern.is_match(route_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> ConnectionParams {
        ConnectionParams {
            protocol: "amqps".to_string(),
            port: 443,
            client_id: "console-producer".to_string(),
            username: "admin".to_string(),
            password: "secret".to_string(),
            trust_store: PathBuf::from("./client.ts"),
            trust_store_password: "password".to_string(),
        }
    }

    #[test]
    fn broker_url_format() {
        let url = params().broker_url("broker-0.apps.example.com");

        assert_eq!(
            url,
            "amqps://broker-0.apps.example.com:443\
             ?jms.clientID=console-producer\
             &jms.username=admin\
             &jms.password=secret\
             &transport.trustStoreLocation=./client.ts\
             &transport.trustStorePassword=password"
        );
    }

    #[test]
    fn broker_url_is_deterministic() {
        let params = params();

        assert_eq!(params.broker_url("h1"), params.broker_url("h1"));
    }

    #[test]
    fn filter_matches_acceptor_route() {
        let filter = RouteFilter::for_acceptor("cluster", "acceptor").unwrap();

        assert!(filter.matches("cluster-acceptor-3-svc-rte"));
        assert!(filter.matches("cluster-acceptor-0-svc-rte"));
        assert!(filter.matches("cluster-acceptor-12-svc-rte"));
    }

    #[test]
    fn filter_rejects_other_acceptor() {
        let filter = RouteFilter::for_acceptor("cluster", "acceptor").unwrap();

        assert!(!filter.matches("cluster-other-3-svc-rte"));
    }

    #[test]
    fn filter_requires_ordinal() {
        let filter = RouteFilter::for_acceptor("cluster", "acceptor").unwrap();

        assert!(!filter.matches("cluster-acceptor--svc-rte"));
        assert!(!filter.matches("cluster-acceptor-svc-rte"));
    }

    #[test]
    fn filter_matches_full_string_only() {
        let filter = RouteFilter::for_acceptor("cluster", "acceptor").unwrap();

        assert!(!filter.matches("x-cluster-acceptor-3-svc-rte"));
        assert!(!filter.matches("cluster-acceptor-3-svc-rte-backup"));
    }

    #[test]
    fn filter_escapes_metacharacters() {
        let filter = RouteFilter::for_acceptor("my.broker", "amqps").unwrap();

        assert!(filter.matches("my.broker-amqps-0-svc-rte"));
        assert!(!filter.matches("myxbroker-amqps-0-svc-rte"));
    }

    #[test]
    fn raw_pattern_is_anchored() {
        let filter = RouteFilter::from_pattern("broker-\\d+").unwrap();

        assert!(filter.matches("broker-1"));
        assert!(!filter.matches("my-broker-1"));
        assert!(!filter.matches("broker-1-rte"));
    }

    #[test]
    fn raw_pattern_alternation_stays_anchored() {
        // The non-capturing group keeps `^`/`$` applying to both branches.
        let filter = RouteFilter::from_pattern("a|b").unwrap();

        assert!(filter.matches("a"));
        assert!(filter.matches("b"));
        assert!(!filter.matches("ab"));
    }

    #[test]
    fn invalid_pattern_is_rejected() {
        assert!(RouteFilter::from_pattern("(unclosed").is_err());
    }
}
