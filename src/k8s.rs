//! `OpenShift` route discovery driving the endpoint tracker.
//!
//! This module watches the `Route` resources that expose a broker cluster's
//! external acceptors and feeds their lifecycle events to a [`RouteTracker`].
//!
//! # How It Works
//!
//! 1. Watches `Route` resources labeled for the configured cluster
//! 2. Dispatches apply events to [`RouteTracker::on_add`] and delete events
//!    to [`RouteTracker::on_delete`]
//! 3. The tracker maintains the broker URL set and signals the damper, which
//!    refreshes the producer once the topology settles
//!
//! The watch stream restarts with backoff on failure; the tracker's set
//! semantics tolerate the at-least-once replay that a restart produces.

use futures::TryStreamExt;
use kube::runtime::WatchStreamExt;
use kube::runtime::watcher::{self, Config as WatcherConfig, Event};
use kube::{Api, Client, CustomResource};
use serde::{Deserialize, Serialize};

use crate::Result;
use crate::tracker::RouteTracker;

/// Subset of the `OpenShift` route spec this crate consumes.
///
/// The full `route.openshift.io/v1` schema is much larger; only the host is
/// relevant for deriving broker URLs, and unknown fields are dropped during
/// deserialization.
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize)]
#[kube(
    group = "route.openshift.io",
    version = "v1",
    kind = "Route",
    namespaced,
    schema = "disabled"
)]
pub struct RouteSpec {
    /// Externally resolvable host name the router exposes for this route.
    pub host: Option<String>,
}

/// Configuration for the acceptor route watch.
#[derive(Clone, Debug)]
pub struct WatchConfig {
    /// Name of the broker cluster whose routes are watched; routes are
    /// selected by the `ActiveMQArtemis=<cluster_name>` label.
    pub cluster_name: String,

    /// The namespace the broker cluster is deployed in.
    /// If `None`, uses the current namespace from the kube client.
    pub namespace: Option<String>,
}

impl WatchConfig {
    /// Creates a watch configuration for the named broker cluster.
    ///
    /// Uses the current namespace from the kube client configuration.
    #[must_use]
    pub fn new(cluster_name: impl Into<String>) -> Self {
        Self {
            cluster_name: cluster_name.into(),
            namespace: None,
        }
    }

    /// Sets an explicit namespace for the broker cluster.
    #[must_use]
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }
}

/// Starts watching acceptor routes and feeds their events to the tracker.
///
/// This function spawns a background task that watches `Route` resources for
/// the configured cluster and drives the tracker until the watch stream ends.
/// Malformed routes are logged and skipped; they never stop the watch.
///
/// # Requirements
///
/// - The application must have RBAC permissions to watch `Route` resources
/// - Kubernetes client configuration (in-cluster or kubeconfig)
pub fn watch_routes(config: WatchConfig, tracker: RouteTracker) {
    tokio::spawn(async move {
        if let Err(e) = watch_loop(config, tracker).await {
            tracing::error!("OpenShift route watcher failed: {e}");
        }
    });
}

/// Background task that watches `Route` resources and drives the tracker.
async fn watch_loop(config: WatchConfig, tracker: RouteTracker) -> Result<()> {
    let client = Client::try_default().await?;
    let namespace = config
        .namespace
        .unwrap_or_else(|| client.default_namespace().to_string());
    let routes: Api<Route> = Api::namespaced(client, &namespace);

    let label_selector = format!("ActiveMQArtemis={}", config.cluster_name);
    let watcher_config = WatcherConfig::default().labels(&label_selector);

    let stream = watcher::watcher(routes, watcher_config).default_backoff();
    tokio::pin!(stream);

    tracing::debug!(
        "starting route watch for cluster {namespace}/{}",
        config.cluster_name
    );

    while let Some(event) = stream.try_next().await? {
        dispatch_event(&tracker, event);
    }

    Ok(())
}

/// Routes a watcher event to the matching tracker callback.
///
/// This function is extracted to enable unit testing of the dispatch logic.
fn dispatch_event(tracker: &RouteTracker, event: Event<Route>) {
    match event {
        Event::Apply(route) | Event::InitApply(route) => {
            if let Err(e) = tracker.on_add(&route) {
                tracing::warn!("skipping route event: {e}");
            }
        }

        Event::Delete(route) => {
            if let Err(e) = tracker.on_delete(&route, false) {
                tracing::warn!("skipping route event: {e}");
            }
        }

        Event::Init | Event::InitDone => {
            tracing::debug!("route watcher initialization event");
        }
    }
}
