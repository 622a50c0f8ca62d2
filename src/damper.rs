//! Damped producer refreshes.
//!
//! Route topology changes arrive in bursts: a rolling restart replaces every
//! broker instance's route within seconds. Rebuilding the producer connection
//! for each individual change would thrash it, so change signals are damped:
//! every signal (re)arms a single quiescence timer, and only a timer that
//! expires uninterrupted refreshes the producer with the endpoint set as it
//! stands at that moment.
//!
//! All timer handling and every refresh run on one spawned worker task, so
//! refreshes are serialized by construction and slow reconnects never block
//! watch event delivery. Signals that arrive while a refresh is in flight
//! stay queued and arm a fresh window afterwards, converging on the latest
//! topology within one more quiescence window.

use std::time::Duration;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio::time::{Instant, timeout};

use crate::producer::Producer;
use crate::tracker::EndpointSet;

/// Quiescence window applied by [`Damper::spawn`]: the topology must stay
/// unchanged this long before the producer is refreshed.
pub const DEFAULT_QUIESCENCE: Duration = Duration::from_secs(1);

/// How long [`Damper::close`] waits for the worker before abandoning it.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug)]
pub(crate) enum Signal {
    Changed,
    Close,
}

/// Handle used by the tracker to report endpoint set changes.
///
/// Reporting never blocks; signals sent after the damper has closed are
/// dropped.
#[derive(Clone, Debug)]
pub struct ChangeSignal {
    tx: UnboundedSender<Signal>,
}

impl ChangeSignal {
    pub(crate) fn new(tx: UnboundedSender<Signal>) -> Self {
        Self { tx }
    }

    /// Reports that the endpoint set changed, restarting the quiescence
    /// window.
    pub fn notify(&self) {
        let _ = self.tx.send(Signal::Changed);
    }
}

/// Coalesces endpoint change signals into producer refreshes.
///
/// The damper owns a background worker task holding the producer; see the
/// [module docs](self) for the timing semantics.
pub struct Damper {
    tx: UnboundedSender<Signal>,
    worker: JoinHandle<()>,
}

impl Damper {
    /// Spawns the damper worker with the [default quiescence
    /// window](DEFAULT_QUIESCENCE).
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn spawn<P: Producer>(producer: P, endpoints: EndpointSet) -> Self {
        Self::with_quiescence(producer, endpoints, DEFAULT_QUIESCENCE)
    }

    /// Spawns the damper worker with a custom quiescence window.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn with_quiescence<P: Producer>(
        producer: P,
        endpoints: EndpointSet,
        window: Duration,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = tokio::spawn(run(rx, producer, endpoints, window));

        Self { tx, worker }
    }

    /// Returns a handle for reporting endpoint set changes.
    #[must_use]
    pub fn signal(&self) -> ChangeSignal {
        ChangeSignal::new(self.tx.clone())
    }

    /// Cancels any pending refresh and stops the worker.
    ///
    /// Once `close` returns, no further refresh will run. An in-flight
    /// refresh is given a bounded grace period to finish and then abandoned,
    /// so shutdown never blocks indefinitely.
    pub async fn close(self) {
        let _ = self.tx.send(Signal::Close);

        let mut worker = self.worker;
        if timeout(SHUTDOWN_GRACE, &mut worker).await.is_err() {
            worker.abort();
            let _ = worker.await;
        }
    }
}

/// Worker loop owning the quiescence timer and the producer.
///
/// The timer is a single pinned sleep plus an `armed` flag: re-arming on a
/// new signal is a deadline reset on the worker itself, so at most one
/// pending timer exists and there is no cross-task cancellation race.
async fn run<P: Producer>(
    mut rx: UnboundedReceiver<Signal>,
    producer: P,
    endpoints: EndpointSet,
    window: Duration,
) {
    let timer = tokio::time::sleep(Duration::ZERO);
    tokio::pin!(timer);
    let mut armed = false;

    loop {
        tokio::select! {
            signal = rx.recv() => match signal {
                Some(Signal::Changed) => {
                    // Every change restarts the full quiescence window.
                    timer.as_mut().reset(Instant::now() + window);
                    armed = true;
                }
                Some(Signal::Close) | None => break,
            },
            () = timer.as_mut(), if armed => {
                armed = false;
                refresh(&producer, &endpoints).await;
            }
        }
    }

    tracing::debug!("damper worker stopped");
}

/// Rebuilds the producer connection from the current endpoint set.
///
/// Failures are logged, not retried; the next topology change arms a fresh
/// refresh attempt. A failed stop does not prevent the start, since a dead
/// connection should not block reconnecting.
async fn refresh<P: Producer>(producer: &P, endpoints: &EndpointSet) {
    let urls = endpoints.snapshot();
    tracing::debug!("refreshing producer with {} broker url(s)", urls.len());

    if let Err(e) = producer.stop().await {
        tracing::warn!("failed to stop producer: {e}");
    }

    if let Err(e) = producer.start(&urls).await {
        tracing::warn!("failed to start producer: {e}");
    }
}
