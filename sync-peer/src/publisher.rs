//! Publisher side of the versioned exchange.
//!
//! A [`Publisher`] serves the latest version of one mutable value under a
//! name prefix. Incoming requests are not answered inline: they accumulate
//! in a pending set, and a periodic drain tick answers every satisfied
//! request with the current payload whenever an update was consumed since
//! the previous tick. Updates coalesce — however many writes happen between
//! ticks, the sequence number advances by exactly one.

use crate::config::ProtocolConfig;
use crate::transport::{RequestHandler, ResponseSink, SinkId, Transport};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use sync_types::{Request, ResourcePath, SequenceNumber, VersionedName};
use tokio::sync::RwLock;

/// Operational counters for one publisher.
///
/// All counters are monotonically increasing; thread-safe via `AtomicU64`.
#[derive(Debug, Default)]
pub struct PublisherMetrics {
    /// Total requests received under the listen prefix.
    pub requests_total: AtomicU64,
    /// Total replies sent successfully.
    pub replies_total: AtomicU64,
    /// Total replies that failed at the transport layer.
    pub send_failures: AtomicU64,
}

/// Identity of one pending request: the versioned name plus the requester
/// it arrived from. A re-request from the same requester overwrites its
/// previous entry; distinct requesters holding the same name are answered
/// independently.
#[derive(Clone, PartialEq, Eq, Hash)]
struct PendingKey {
    name: VersionedName,
    requester: SinkId,
}

/// Serves the latest version of a value to pull-based subscribers.
pub struct Publisher {
    listen_name: ResourcePath,
    latest: RwLock<Option<Vec<u8>>>,
    has_update: AtomicBool,
    sequence: AtomicU64,
    pending: DashMap<PendingKey, Arc<dyn ResponseSink>>,
    freshness_ms: u64,
    metrics: PublisherMetrics,
}

impl Publisher {
    /// Create a publisher serving under `listen_name`.
    ///
    /// The publisher starts at sequence 0 with no value; requests received
    /// before the first update stay pending.
    pub fn new(listen_name: ResourcePath, config: &ProtocolConfig) -> Self {
        Self {
            listen_name,
            latest: RwLock::new(None),
            has_update: AtomicBool::new(false),
            sequence: AtomicU64::new(0),
            pending: DashMap::new(),
            freshness_ms: config.freshness_ms,
            metrics: PublisherMetrics::default(),
        }
    }

    /// Create a publisher and register its prefix with the transport.
    pub async fn register<T: Transport>(
        transport: &T,
        listen_name: ResourcePath,
        config: &ProtocolConfig,
    ) -> Result<Arc<Self>, crate::transport::TransportError> {
        let publisher = Arc::new(Self::new(listen_name.clone(), config));
        tracing::debug!("Registering publisher prefix {}", listen_name);
        transport
            .register_prefix(listen_name, publisher.clone())
            .await?;
        Ok(publisher)
    }

    /// Replace the payload served to subscribers.
    ///
    /// Sets the pending-update flag; the change becomes visible to
    /// requesters on the next drain tick. Writes between ticks coalesce —
    /// intermediate payloads are dropped, not queued.
    pub async fn update_latest_value(&self, payload: Vec<u8>) {
        *self.latest.write().await = Some(payload);
        self.has_update.store(true, Ordering::SeqCst);
    }

    /// The sequence number of the most recently consumed update.
    pub fn current_sequence(&self) -> SequenceNumber {
        SequenceNumber::new(self.sequence.load(Ordering::SeqCst))
    }

    /// Number of requests currently waiting for a newer version.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Operational counters.
    pub fn metrics(&self) -> &PublisherMetrics {
        &self.metrics
    }

    /// One drain step: consume a pending update (if any), advance the
    /// sequence by exactly one, and answer every pending request whose
    /// requested sequence is satisfied by the new one.
    ///
    /// Requests whose requested sequence is still ahead of the current one
    /// (a requester that saw a newer version than this publisher currently
    /// reports) are left pending for a future tick. A reply that fails to
    /// send is logged and dropped; the requester's own timeout drives the
    /// retry.
    pub async fn drain_tick(&self) {
        if !self.has_update.swap(false, Ordering::SeqCst) {
            return;
        }
        let sequence =
            SequenceNumber::new(self.sequence.fetch_add(1, Ordering::SeqCst).saturating_add(1));

        let payload = self.latest.read().await.clone().unwrap_or_default();

        let satisfied: Vec<PendingKey> = self
            .pending
            .iter()
            .filter(|entry| entry.key().name.latest_seen() <= sequence)
            .map(|entry| entry.key().clone())
            .collect();

        for key in satisfied {
            let Some((key, sink)) = self.pending.remove(&key) else {
                continue;
            };
            let reply = key.name.with_sequence_number(sequence);
            let response = match reply.build_response(payload.clone(), self.freshness_ms) {
                Ok(response) => response,
                Err(e) => {
                    tracing::error!("Unable to build reply for {}: {}", key.name, e);
                    continue;
                }
            };
            match sink.send(response).await {
                Ok(()) => {
                    self.metrics.replies_total.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    self.metrics.send_failures.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!("Unable to send reply for {}: {}", key.name, e);
                }
            }
        }
    }
}

impl std::fmt::Debug for Publisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Publisher")
            .field("listen_name", &self.listen_name)
            .field("sequence", &self.current_sequence())
            .field("pending", &self.pending.len())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl RequestHandler for Publisher {
    async fn on_request(&self, request: Request, reply: Arc<dyn ResponseSink>) {
        match VersionedName::from_request(&request) {
            Ok(name) => {
                self.metrics.requests_total.fetch_add(1, Ordering::Relaxed);
                self.pending.insert(
                    PendingKey {
                        name,
                        requester: reply.id(),
                    },
                    reply,
                );
            }
            Err(e) => {
                tracing::warn!("Dropping request with unparseable name: {}", e);
            }
        }
    }
}

/// Spawn the periodic drain task for a publisher.
///
/// The first tick runs after the configured warm-up; every subsequent tick
/// follows at the drain interval. Returns a handle that can be used to
/// abort the task.
pub fn spawn_drain_task(
    publisher: Arc<Publisher>,
    config: &ProtocolConfig,
) -> tokio::task::JoinHandle<()> {
    let warmup = config.drain_warmup();
    let period = config.drain_interval();
    tokio::spawn(async move {
        tokio::time::sleep(warmup).await;
        let mut timer = tokio::time::interval(period);
        loop {
            timer.tick().await;
            publisher.drain_tick().await;
        }
    })
}

/// Spawn the periodic stats log line for a publisher.
pub fn spawn_stats_task(
    publisher: Arc<Publisher>,
    config: &ProtocolConfig,
) -> tokio::task::JoinHandle<()> {
    let period = config.stats_interval();
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(period);
        // The first interval tick fires immediately; skip it so the first
        // line reflects a full period.
        timer.tick().await;
        loop {
            timer.tick().await;
            tracing::info!(
                "Seen {} requests, {} pending",
                publisher
                    .metrics()
                    .requests_total
                    .load(Ordering::Relaxed),
                publisher.pending_len()
            );
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{MockHub, MockTransport};

    fn listen_name() -> ResourcePath {
        "/game/g/alice/blocks/sync".parse().unwrap()
    }

    fn publisher() -> Publisher {
        Publisher::new(listen_name(), &ProtocolConfig::default())
    }

    fn request_at(seq: u64) -> Request {
        VersionedName::with_latest_seen(listen_name(), SequenceNumber::new(seq)).build_request(1000)
    }

    async fn advance_to(publisher: &Publisher, sequence: u64) {
        while publisher.current_sequence().value() < sequence {
            publisher.update_latest_value(b"tick".to_vec()).await;
            publisher.drain_tick().await;
        }
    }

    fn received_sequence(endpoint: &MockTransport) -> Option<SequenceNumber> {
        let response = endpoint.try_recv_response()?;
        Some(
            VersionedName::from_response(&response)
                .unwrap()
                .latest_seen(),
        )
    }

    // ===========================================
    // Drain / Sequence Tests
    // ===========================================

    #[tokio::test]
    async fn drain_without_update_is_a_noop() {
        let hub = MockHub::new();
        let endpoint = hub.endpoint();
        let publisher = publisher();

        publisher.on_request(request_at(0), endpoint.sink()).await;
        publisher.drain_tick().await;

        assert_eq!(publisher.current_sequence(), SequenceNumber::zero());
        assert_eq!(publisher.pending_len(), 1);
        assert!(endpoint.try_recv_response().is_none());
    }

    #[tokio::test]
    async fn updates_between_ticks_coalesce_into_one_sequence_step() {
        let publisher = publisher();

        publisher.update_latest_value(b"one".to_vec()).await;
        publisher.update_latest_value(b"two".to_vec()).await;
        publisher.update_latest_value(b"three".to_vec()).await;
        publisher.drain_tick().await;
        assert_eq!(publisher.current_sequence(), SequenceNumber::new(1));

        // No new update: no advance
        publisher.drain_tick().await;
        assert_eq!(publisher.current_sequence(), SequenceNumber::new(1));

        publisher.update_latest_value(b"four".to_vec()).await;
        publisher.drain_tick().await;
        assert_eq!(publisher.current_sequence(), SequenceNumber::new(2));
    }

    #[tokio::test]
    async fn satisfied_request_is_answered_and_removed() {
        let hub = MockHub::new();
        let endpoint = hub.endpoint();
        let publisher = publisher();

        publisher.on_request(request_at(0), endpoint.sink()).await;
        publisher.update_latest_value(b"A".to_vec()).await;
        publisher.drain_tick().await;

        let response = endpoint.try_recv_response().unwrap();
        assert_eq!(response.payload, b"A");
        assert_eq!(response.freshness_ms, 20);
        let next = VersionedName::from_response(&response).unwrap();
        assert_eq!(next.latest_seen(), SequenceNumber::new(1));
        assert_eq!(publisher.pending_len(), 0);
    }

    #[tokio::test]
    async fn request_ahead_of_sequence_stays_pending() {
        let hub = MockHub::new();
        let endpoint = hub.endpoint();
        let publisher = publisher();

        // Requester already saw sequence 10; we only reach 1
        publisher.on_request(request_at(10), endpoint.sink()).await;
        publisher.update_latest_value(b"A".to_vec()).await;
        publisher.drain_tick().await;

        assert_eq!(publisher.pending_len(), 1);
        assert!(endpoint.try_recv_response().is_none());
    }

    #[tokio::test]
    async fn rerequest_from_same_requester_overwrites_pending_entry() {
        let hub = MockHub::new();
        let endpoint = hub.endpoint();
        let publisher = publisher();

        publisher.on_request(request_at(0), endpoint.sink()).await;
        publisher.on_request(request_at(0), endpoint.sink()).await;

        assert_eq!(publisher.pending_len(), 1);
        assert_eq!(
            publisher.metrics().requests_total.load(Ordering::Relaxed),
            2
        );
    }

    #[tokio::test]
    async fn distinct_requesters_holding_same_name_both_get_current_sequence() {
        let hub = MockHub::new();
        let first = hub.endpoint();
        let second = hub.endpoint();
        let publisher = publisher();

        advance_to(&publisher, 7).await;

        // Both stuck at sequence 3 while the publisher is at 7
        publisher.on_request(request_at(3), first.sink()).await;
        publisher.on_request(request_at(3), second.sink()).await;
        assert_eq!(publisher.pending_len(), 2);

        publisher.update_latest_value(b"fresh".to_vec()).await;
        publisher.drain_tick().await;

        // Neither gets 4; the publisher always serves its current version
        assert_eq!(received_sequence(&first), Some(SequenceNumber::new(8)));
        assert_eq!(received_sequence(&second), Some(SequenceNumber::new(8)));
        assert_eq!(publisher.pending_len(), 0);
    }

    #[tokio::test]
    async fn reply_send_failure_does_not_abort_the_drain() {
        let hub = MockHub::new();
        let failing = hub.endpoint();
        let healthy = hub.endpoint();
        let publisher = publisher();

        failing.fail_next_reply("face closed");
        publisher.on_request(request_at(0), failing.sink()).await;
        publisher.on_request(request_at(0), healthy.sink()).await;

        publisher.update_latest_value(b"A".to_vec()).await;
        publisher.drain_tick().await;

        assert_eq!(received_sequence(&healthy), Some(SequenceNumber::new(1)));
        assert_eq!(publisher.pending_len(), 0);
        assert_eq!(publisher.metrics().send_failures.load(Ordering::Relaxed), 1);
        assert_eq!(publisher.metrics().replies_total.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn unparseable_request_is_dropped() {
        let hub = MockHub::new();
        let endpoint = hub.endpoint();
        let publisher = publisher();

        let bad = Request {
            name: listen_name(), // no sequence component
            must_be_fresh: true,
            can_be_prefix: true,
            lifetime_ms: 1000,
        };
        publisher.on_request(bad, endpoint.sink()).await;

        assert_eq!(publisher.pending_len(), 0);
        assert_eq!(
            publisher.metrics().requests_total.load(Ordering::Relaxed),
            0
        );
    }

    // ===========================================
    // Background Task Tests
    // ===========================================

    #[tokio::test(start_paused = true)]
    async fn drain_task_waits_for_warmup_then_ticks() {
        let publisher = Arc::new(publisher());
        let config = ProtocolConfig::default();
        let handle = spawn_drain_task(publisher.clone(), &config);

        publisher.update_latest_value(b"A".to_vec()).await;

        // Before the warm-up elapses nothing is consumed
        tokio::time::sleep(std::time::Duration::from_millis(500)).await;
        assert_eq!(publisher.current_sequence(), SequenceNumber::zero());

        // Past warm-up + one period the update has been consumed
        tokio::time::sleep(std::time::Duration::from_millis(600)).await;
        assert_eq!(publisher.current_sequence(), SequenceNumber::new(1));

        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn stats_task_runs_without_panicking() {
        let publisher = Arc::new(publisher());
        let config = ProtocolConfig::default();
        let handle = spawn_stats_task(publisher.clone(), &config);

        tokio::time::sleep(std::time::Duration::from_secs(61)).await;
        assert!(!handle.is_finished());
        handle.abort();
    }
}
