#![deny(missing_docs)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! `OpenShift` route discovery for `ActiveMQ` Artemis failover connections.
//!
//! A clustered Artemis deployment on `OpenShift` exposes each broker instance's
//! external acceptor through its own `Route` resource. Route topology changes
//! in bursts during rolling restarts and scale events, and rebuilding the
//! producer connection on every individual add/remove would thrash it. This
//! crate watches the acceptor routes for one cluster, maintains a deduplicated
//! set of derived broker URLs, and coalesces bursts of changes into a single
//! producer refresh once the topology has been quiet for one second.
//!
//! # Features
//!
//! - **`OpenShift` API discovery**: Real-time acceptor updates via `Route` watch
//! - **Change damping**: Each change restarts a quiescence window; only an
//!   uninterrupted expiry rebuilds the connection
//! - **User-controlled transport**: You implement [`Producer`] however you
//!   want; the crate tells it when and with which broker URLs to reconnect
//!
//! # Usage
//!
//! ```ignore
//! use std::path::PathBuf;
//!
//! use artemis_failover_k8s::{
//!     ConnectionParams, Damper, EndpointSet, RouteFilter, RouteTracker, WatchConfig,
//!     watch_routes,
//! };
//!
//! let params = ConnectionParams {
//!     protocol: "amqps".into(),
//!     port: 443,
//!     client_id: "console-producer".into(),
//!     username: "admin".into(),
//!     password: "admin".into(),
//!     trust_store: PathBuf::from("./client.ts"),
//!     trust_store_password: "password".into(),
//! };
//!
//! // MyProducer implements the Producer trait over your AMQP transport.
//! let endpoints = EndpointSet::new();
//! let damper = Damper::spawn(MyProducer::new("foo"), endpoints.clone());
//!
//! let filter = RouteFilter::for_acceptor("my-broker", "amqps")?;
//! let tracker = RouteTracker::new(params, filter, endpoints, damper.signal());
//!
//! // Watch the cluster's acceptor routes until shutdown.
//! watch_routes(WatchConfig::new("my-broker"), tracker);
//! ```

mod config;
mod damper;
mod k8s;
mod producer;
mod tracker;

pub use config::{ConnectionParams, RouteFilter};
pub use damper::{ChangeSignal, DEFAULT_QUIESCENCE, Damper};
pub use k8s::{Route, RouteSpec, WatchConfig, watch_routes};
pub use producer::{Producer, ProducerError, failover_url};
pub use tracker::{EndpointSet, RouteTracker};

/// Error type for route discovery and endpoint tracking failures.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A watched route carries no name in its metadata.
    #[error("route has no name")]
    MissingRouteName,

    /// A filter-matching route has no host to derive a broker URL from.
    #[error("route {route} has no host")]
    MissingRouteHost {
        /// Name of the offending route.
        route: String,
    },

    /// The route filter pattern failed to compile.
    #[error("invalid route filter pattern: {0}")]
    InvalidFilter(#[from] regex::Error),

    /// The Kubernetes client could not be constructed or queried.
    #[error("kubernetes client error: {0}")]
    Kube(#[from] kube::Error),

    /// The route watch stream failed.
    #[error("route watch failed: {0}")]
    Watch(#[from] kube::runtime::watcher::Error),
}

/// Result type for route discovery and endpoint tracking operations.
pub type Result<T> = std::result::Result<T, Error>;
