//! Subscriber side of the versioned exchange.
//!
//! A [`Subscriber`] keeps exactly one request in flight against a remote
//! publisher. Each response advances the subscribed name to the sequence
//! the publisher reported, publishes the decoded value on a watch channel,
//! and paces the next request so the inter-request delay approaches the
//! configured target. A timeout re-expresses the same name immediately; the
//! request lifetime itself is the retry backoff.

use crate::config::ProtocolConfig;
use crate::transport::{RequestOutcome, Transport};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use sync_core::histogram::{HistogramSnapshot, LatencyHistogram};
use sync_core::pacing::{compute_sleep, PacingPolicy};
use sync_types::{Response, SequenceNumber, SyncError, VersionedName};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Turns a raw response into a typed value.
pub type DecodeFn<V> = Arc<dyn Fn(&Response) -> Result<V, SyncError> + Send + Sync>;

/// A running subscription to one remote publisher.
///
/// The request loop runs on its own task from construction until [`stop`]
/// or drop. The latest decoded value is available through [`latest`] or as
/// a watch channel for callers that want change notifications.
///
/// [`stop`]: Subscriber::stop
/// [`latest`]: Subscriber::latest
pub struct Subscriber<V> {
    value_rx: watch::Receiver<Option<V>>,
    latest_seen: Arc<AtomicU64>,
    histogram: Arc<LatencyHistogram>,
    handle: JoinHandle<()>,
}

impl<V> Subscriber<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Start a subscription to the publisher behind `name`.
    ///
    /// The first request targets sequence 0, so any published version
    /// satisfies it. `decode` turns each response payload into a value;
    /// `pacing` yields the target inter-request delay given the value just
    /// received.
    pub fn start<T: Transport>(
        transport: Arc<T>,
        name: VersionedName,
        decode: DecodeFn<V>,
        pacing: PacingPolicy<V>,
        config: &ProtocolConfig,
    ) -> Self {
        let (value_tx, value_rx) = watch::channel(None);
        let latest_seen = Arc::new(AtomicU64::new(name.latest_seen().value()));
        let histogram = Arc::new(LatencyHistogram::new());

        let handle = tokio::spawn(request_loop(
            transport,
            name,
            decode,
            pacing,
            value_tx,
            Arc::clone(&latest_seen),
            Arc::clone(&histogram),
            config.request_lifetime_ms,
            config.min_pacing_sleep(),
        ));

        Self {
            value_rx,
            latest_seen,
            histogram,
            handle,
        }
    }

    /// The most recently decoded value, if any response has arrived yet.
    pub fn latest(&self) -> Option<V> {
        self.value_rx.borrow().clone()
    }

    /// A watch channel following the decoded value.
    pub fn watch(&self) -> watch::Receiver<Option<V>> {
        self.value_rx.clone()
    }

    /// The highest sequence number received so far.
    pub fn latest_seen(&self) -> SequenceNumber {
        SequenceNumber::new(self.latest_seen.load(Ordering::SeqCst))
    }

    /// Snapshot of the request/response latency distribution.
    pub fn latency_snapshot(&self) -> HistogramSnapshot {
        self.histogram.snapshot()
    }

    /// Stop the request loop. Idempotent; also happens on drop.
    pub fn stop(&self) {
        self.handle.abort();
    }
}

impl<V> Drop for Subscriber<V> {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

impl<V> std::fmt::Debug for Subscriber<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscriber")
            .field("latest_seen", &self.latest_seen.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

#[allow(clippy::too_many_arguments)]
async fn request_loop<T, V>(
    transport: Arc<T>,
    mut name: VersionedName,
    decode: DecodeFn<V>,
    pacing: PacingPolicy<V>,
    value_tx: watch::Sender<Option<V>>,
    latest_seen: Arc<AtomicU64>,
    histogram: Arc<LatencyHistogram>,
    lifetime_ms: u64,
    min_sleep: Duration,
) where
    T: Transport,
    V: Clone + Send + Sync + 'static,
{
    loop {
        let request = name.build_request(lifetime_ms);
        let started = tokio::time::Instant::now();
        match transport.express_request(request).await {
            Ok(RequestOutcome::Response(response)) => {
                let elapsed = started.elapsed();
                histogram.record(elapsed);

                let value = match decode(&response) {
                    Ok(value) => value,
                    Err(e) => {
                        // Keep the current name; the next request fetches a
                        // fresh copy of the same version.
                        tracing::error!("Discarding undecodable response for {}: {}", name, e);
                        continue;
                    }
                };
                match VersionedName::from_response(&response) {
                    Ok(next) => {
                        latest_seen.store(next.latest_seen().value(), Ordering::SeqCst);
                        name = next;
                    }
                    Err(e) => {
                        tracing::error!("Discarding response with bad name: {}", e);
                        continue;
                    }
                }

                let target = pacing(&value);
                value_tx.send_replace(Some(value));

                if let Some(sleep) = compute_sleep(target, elapsed, min_sleep) {
                    tokio::time::sleep(sleep).await;
                }
            }
            Ok(RequestOutcome::Timeout) => {
                // Re-express the same name right away; the lifetime already
                // spaced the attempts.
                tracing::trace!("Request timeout for {}, re-expressing", name);
            }
            Err(e) => {
                tracing::warn!("Unable to express request for {}: {}", name, e);
                tokio::time::sleep(min_sleep).await;
            }
        }
    }
}
