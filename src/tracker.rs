//! Tracking of broker endpoints derived from acceptor routes.
//!
//! The tracker converts the watch stream's add/update/delete callbacks into
//! mutations of a shared, deduplicated broker URL set. Only mutations that
//! actually change the set raise a change signal; duplicate adds and deletes
//! of absent endpoints are silent, so the damper only ever reacts to real
//! topology changes. Event delivery across different routes may be reordered
//! at startup; set semantics make the outcome order-independent as long as
//! each route's own events arrive in order.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::{ConnectionParams, RouteFilter};
use crate::damper::ChangeSignal;
use crate::k8s::Route;
use crate::{Error, Result};

/// Shared, deduplicated set of broker URLs.
///
/// One instance is shared between the [`RouteTracker`] (the only writer) and
/// the damper worker, which reads a [`snapshot`](Self::snapshot) at the
/// moment a refresh fires. All access goes through a single lock; critical
/// sections never block on I/O.
#[derive(Clone, Debug, Default)]
pub struct EndpointSet {
    inner: Arc<Mutex<HashSet<String>>>,
}

impl EndpointSet {
    /// Creates an empty endpoint set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&self, url: String) -> bool {
        self.inner.lock().insert(url)
    }

    pub(crate) fn remove(&self, url: &str) -> bool {
        self.inner.lock().remove(url)
    }

    /// Copies the current set of broker URLs.
    #[must_use]
    pub fn snapshot(&self) -> HashSet<String> {
        self.inner.lock().clone()
    }

    /// Number of distinct broker URLs currently tracked.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Whether no broker URLs are currently tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

/// Converts route lifecycle events into endpoint set changes.
///
/// Routes whose names do not match the configured [`RouteFilter`] are
/// ignored. For matching routes the broker URL is derived from the route's
/// current host and the fixed [`ConnectionParams`]; an insertion or removal
/// that actually changes the set notifies the damper through its
/// [`ChangeSignal`]. The handlers never perform I/O and never block.
pub struct RouteTracker {
    params: ConnectionParams,
    filter: RouteFilter,
    endpoints: EndpointSet,
    changed: ChangeSignal,
}

impl RouteTracker {
    /// Creates a tracker writing to `endpoints` and signaling `changed`.
    #[must_use]
    pub fn new(
        params: ConnectionParams,
        filter: RouteFilter,
        endpoints: EndpointSet,
        changed: ChangeSignal,
    ) -> Self {
        Self {
            params,
            filter,
            endpoints,
            changed,
        }
    }

    /// Handles a newly observed route; equivalent to an update without a
    /// prior state.
    ///
    /// # Errors
    ///
    /// See [`on_update`](Self::on_update).
    pub fn on_add(&self, route: &Route) -> Result<()> {
        self.on_update(None, route)
    }

    /// Handles a route update.
    ///
    /// The previous state is not consulted: the endpoint derives purely from
    /// the route's current host, so an update that leaves the host unchanged
    /// is a duplicate insert and signals nothing. An update that does change
    /// the host inserts the new URL; the stale one is removed when that
    /// route's delete event arrives.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingRouteName`] if the route has no metadata name,
    /// or [`Error::MissingRouteHost`] if a filter-matching route has no host.
    /// Both indicate malformed upstream data; callers log and skip the event.
    pub fn on_update(&self, _old: Option<&Route>, new: &Route) -> Result<()> {
        let Some(url) = self.filtered_broker_url(new)? else {
            return Ok(());
        };

        if self.endpoints.insert(url.clone()) {
            tracing::debug!("adding broker url: [{url}]");
            self.changed.notify();
        }

        Ok(())
    }

    /// Handles a route deletion.
    ///
    /// When the delete was observed through a resync, its payload may be
    /// stale (`final_state_unknown`); the derived endpoint is still removed
    /// on a best-effort basis.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingRouteName`] if the route has no metadata name,
    /// or [`Error::MissingRouteHost`] if a filter-matching route has no host.
    pub fn on_delete(&self, route: &Route, final_state_unknown: bool) -> Result<()> {
        let Some(url) = self.filtered_broker_url(route)? else {
            return Ok(());
        };

        if self.endpoints.remove(&url) {
            tracing::debug!("removing broker url: [{url}] (final state unknown: {final_state_unknown})");
            self.changed.notify();
        }

        Ok(())
    }

    /// Derives the broker URL for a route, or `None` if the route's name
    /// does not match the filter.
    fn filtered_broker_url(&self, route: &Route) -> Result<Option<String>> {
        let name = route.metadata.name.as_deref().ok_or(Error::MissingRouteName)?;
        if !self.filter.matches(name) {
            return Ok(None);
        }

        let host = route
            .spec
            .host
            .as_deref()
            .ok_or_else(|| Error::MissingRouteHost {
                route: name.to_string(),
            })?;

        Ok(Some(self.params.broker_url(host)))
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use tokio::sync::mpsc;

    use super::*;
    use crate::damper::Signal;
    use crate::k8s::RouteSpec;

    fn params() -> ConnectionParams {
        ConnectionParams {
            protocol: "amqps".to_string(),
            port: 443,
            client_id: "console-producer".to_string(),
            username: "admin".to_string(),
            password: "admin".to_string(),
            trust_store: PathBuf::from("./client.ts"),
            trust_store_password: "password".to_string(),
        }
    }

    fn make_route(name: &str, host: Option<&str>) -> Route {
        Route::new(
            name,
            RouteSpec {
                host: host.map(String::from),
            },
        )
    }

    struct Fixture {
        tracker: RouteTracker,
        endpoints: EndpointSet,
        signals: mpsc::UnboundedReceiver<Signal>,
    }

    fn fixture() -> Fixture {
        let (tx, signals) = mpsc::unbounded_channel();
        let endpoints = EndpointSet::new();
        let tracker = RouteTracker::new(
            params(),
            RouteFilter::for_acceptor("cluster", "acceptor").unwrap(),
            endpoints.clone(),
            ChangeSignal::new(tx),
        );

        Fixture {
            tracker,
            endpoints,
            signals,
        }
    }

    impl Fixture {
        fn signal_count(&mut self) -> usize {
            let mut count = 0;
            while self.signals.try_recv().is_ok() {
                count += 1;
            }

            count
        }
    }

    #[test]
    fn add_inserts_and_signals() {
        let mut f = fixture();

        f.tracker
            .on_add(&make_route("cluster-acceptor-0-svc-rte", Some("h1")))
            .unwrap();

        assert_eq!(f.endpoints.len(), 1);
        assert!(f.endpoints.snapshot().contains(&params().broker_url("h1")));
        assert_eq!(f.signal_count(), 1);
    }

    #[test]
    fn duplicate_add_is_silent() {
        let mut f = fixture();
        let route = make_route("cluster-acceptor-0-svc-rte", Some("h1"));

        f.tracker.on_add(&route).unwrap();
        assert_eq!(f.signal_count(), 1);

        f.tracker.on_add(&route).unwrap();

        assert_eq!(f.endpoints.len(), 1);
        assert_eq!(f.signal_count(), 0);
    }

    #[test]
    fn delete_removes_and_signals() {
        let mut f = fixture();
        let route = make_route("cluster-acceptor-0-svc-rte", Some("h1"));

        f.tracker.on_add(&route).unwrap();
        f.tracker.on_delete(&route, false).unwrap();

        assert!(f.endpoints.is_empty());
        assert_eq!(f.signal_count(), 2);
    }

    #[test]
    fn delete_of_absent_endpoint_is_silent() {
        let mut f = fixture();
        let route = make_route("cluster-acceptor-0-svc-rte", Some("h1"));

        f.tracker.on_delete(&route, false).unwrap();

        assert!(f.endpoints.is_empty());
        assert_eq!(f.signal_count(), 0);
    }

    #[test]
    fn delete_with_final_state_unknown_still_removes() {
        let mut f = fixture();
        let route = make_route("cluster-acceptor-0-svc-rte", Some("h1"));

        f.tracker.on_add(&route).unwrap();
        f.tracker.on_delete(&route, true).unwrap();

        assert!(f.endpoints.is_empty());
    }

    #[test]
    fn non_matching_route_is_ignored() {
        let mut f = fixture();

        f.tracker
            .on_add(&make_route("cluster-other-3-svc-rte", Some("h1")))
            .unwrap();

        assert!(f.endpoints.is_empty());
        assert_eq!(f.signal_count(), 0);
    }

    #[test]
    fn update_reuses_add_semantics() {
        let mut f = fixture();
        let route = make_route("cluster-acceptor-1-svc-rte", Some("h2"));

        f.tracker.on_update(None, &route).unwrap();

        assert_eq!(f.endpoints.len(), 1);
        assert_eq!(f.signal_count(), 1);
    }

    #[test]
    fn update_with_unchanged_host_is_silent() {
        let mut f = fixture();
        let before = make_route("cluster-acceptor-1-svc-rte", Some("h2"));
        // Updates touching unrelated fields keep the same host.
        let after = make_route("cluster-acceptor-1-svc-rte", Some("h2"));

        f.tracker.on_add(&before).unwrap();
        assert_eq!(f.signal_count(), 1);

        f.tracker.on_update(Some(&before), &after).unwrap();

        assert_eq!(f.endpoints.len(), 1);
        assert_eq!(f.signal_count(), 0);
    }

    #[test]
    fn update_with_new_host_adds_endpoint() {
        let mut f = fixture();
        let before = make_route("cluster-acceptor-1-svc-rte", Some("h2"));
        let after = make_route("cluster-acceptor-1-svc-rte", Some("h3"));

        f.tracker.on_add(&before).unwrap();
        f.tracker.on_update(Some(&before), &after).unwrap();

        // The stale URL stays until the route's delete event arrives.
        assert_eq!(f.endpoints.len(), 2);
        assert_eq!(f.signal_count(), 2);
    }

    #[test]
    fn set_converges_regardless_of_event_interleaving() {
        let mut f = fixture();
        let first = make_route("cluster-acceptor-0-svc-rte", Some("h1"));
        let second = make_route("cluster-acceptor-1-svc-rte", Some("h2"));

        // Startup replays may interleave events of different routes.
        f.tracker.on_add(&second).unwrap();
        f.tracker.on_add(&first).unwrap();
        f.tracker.on_add(&second).unwrap();
        f.tracker.on_delete(&first, false).unwrap();

        let expected: HashSet<String> = [params().broker_url("h2")].into_iter().collect();
        assert_eq!(f.endpoints.snapshot(), expected);
        assert_eq!(f.signal_count(), 3);
    }

    #[test]
    fn route_without_name_is_an_error() {
        let f = fixture();
        let mut route = make_route("cluster-acceptor-0-svc-rte", Some("h1"));
        route.metadata.name = None;

        assert!(matches!(
            f.tracker.on_add(&route),
            Err(Error::MissingRouteName)
        ));
        assert!(f.endpoints.is_empty());
    }

    #[test]
    fn matching_route_without_host_is_an_error() {
        let f = fixture();
        let route = make_route("cluster-acceptor-0-svc-rte", None);

        assert!(matches!(
            f.tracker.on_add(&route),
            Err(Error::MissingRouteHost { route }) if route == "cluster-acceptor-0-svc-rte"
        ));
        assert!(f.endpoints.is_empty());
    }

    #[test]
    fn non_matching_route_without_host_is_ignored() {
        // The filter runs before host extraction; irrelevant routes cannot
        // fail the tracker.
        let f = fixture();

        assert!(f.tracker.on_add(&make_route("unrelated", None)).is_ok());
    }
}
