//! Per-peer subscription supervision and world-view aggregation.
//!
//! A [`SubscriptionRegistry`] owns one [`Subscriber`] per discovered remote
//! peer, all following the same topic (for example each peer's block set).
//! The decoded values are maps keyed by item identity; because item keys
//! embed the owning peer, per-peer maps merge into one consolidated view
//! without collisions.

use crate::config::ProtocolConfig;
use crate::subscriber::{DecodeFn, Subscriber};
use crate::transport::Transport;
use dashmap::DashMap;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use sync_core::pacing::fixed;
use sync_types::{
    blocks_sync_path, Block, BlockId, BlockSet, GameId, NameError, PeerId, Request, ResourcePath,
    Response, SyncError, VersionedName,
};

/// Decodes one peer's response payload into an item map.
pub type ItemDecodeFn<K, V> =
    Arc<dyn Fn(&PeerId, &Response) -> Result<HashMap<K, V>, SyncError> + Send + Sync>;

/// Builds the resource path a peer publishes the topic under.
pub type SyncNamingFn =
    Arc<dyn Fn(&GameId, &PeerId) -> Result<ResourcePath, NameError> + Send + Sync>;

/// Builds the name a one-shot interaction request for an item targets.
pub type InteractionNamingFn<K> =
    Arc<dyn Fn(&GameId, &K) -> Result<ResourcePath, NameError> + Send + Sync>;

/// Supervises one subscriber per remote peer and merges their views.
pub struct SubscriptionRegistry<T, K, V>
where
    T: Transport,
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    transport: Arc<T>,
    game: GameId,
    local_peer: PeerId,
    subscribers: DashMap<PeerId, Subscriber<HashMap<K, V>>>,
    decode: ItemDecodeFn<K, V>,
    sync_naming: SyncNamingFn,
    interaction_naming: InteractionNamingFn<K>,
    pacing_target: Duration,
    config: ProtocolConfig,
}

impl<T, K, V> SubscriptionRegistry<T, K, V>
where
    T: Transport,
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Create an empty registry.
    ///
    /// `pacing_target` is the inter-request delay applied to every
    /// subscriber the registry spawns.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        transport: Arc<T>,
        game: GameId,
        local_peer: PeerId,
        decode: ItemDecodeFn<K, V>,
        sync_naming: SyncNamingFn,
        interaction_naming: InteractionNamingFn<K>,
        pacing_target: Duration,
        config: ProtocolConfig,
    ) -> Self {
        Self {
            transport,
            game,
            local_peer,
            subscribers: DashMap::new(),
            decode,
            sync_naming,
            interaction_naming,
            pacing_target,
            config,
        }
    }

    /// Start a subscription for every newly discovered peer.
    ///
    /// Idempotent: peers already subscribed and the local peer itself are
    /// skipped, so the same discovery result can be delivered repeatedly.
    pub fn on_peers_discovered(&self, peers: &[PeerId]) {
        for peer in peers {
            if *peer == self.local_peer {
                continue;
            }
            if let dashmap::mapref::entry::Entry::Vacant(slot) =
                self.subscribers.entry(peer.clone())
            {
                let path = match (self.sync_naming)(&self.game, peer) {
                    Ok(path) => path,
                    Err(e) => {
                        tracing::error!("Unable to build sync name for {}: {}", peer, e);
                        continue;
                    }
                };
                let decode = Arc::clone(&self.decode);
                let owner = peer.clone();
                let decode_for_peer: DecodeFn<HashMap<K, V>> =
                    Arc::new(move |response| decode(&owner, response));

                tracing::info!("Discovered {}, subscribing to {}", peer, path);
                slot.insert(Subscriber::start(
                    Arc::clone(&self.transport),
                    VersionedName::new(path),
                    decode_for_peer,
                    fixed(self.pacing_target),
                    &self.config,
                ));
            }
        }
    }

    /// Merged view of every subscriber's latest value.
    ///
    /// Subscribers with no response yet contribute nothing. Keys never
    /// collide across peers because item identity embeds the owner.
    pub fn aggregated(&self) -> HashMap<K, V> {
        let mut merged = HashMap::new();
        for entry in self.subscribers.iter() {
            if let Some(items) = entry.value().latest() {
                merged.extend(items);
            }
        }
        merged
    }

    /// Send a one-shot interaction request for `item`.
    ///
    /// Returns whether any subscriber currently holds the item. The request
    /// is fire-and-forget: it asks for an exact name, not fresh content,
    /// and its outcome is only logged.
    pub fn interact(&self, item: &K) -> bool {
        let held = self
            .subscribers
            .iter()
            .any(|entry| match entry.value().latest() {
                Some(items) => items.contains_key(item),
                None => false,
            });
        if !held {
            tracing::debug!("Interaction target not present in any peer's view");
            return false;
        }

        let name = match (self.interaction_naming)(&self.game, item) {
            Ok(name) => name,
            Err(e) => {
                tracing::error!("Unable to build interaction name: {}", e);
                return false;
            }
        };
        let request = Request {
            name,
            must_be_fresh: false,
            can_be_prefix: false,
            lifetime_ms: self.config.request_lifetime_ms,
        };
        let transport = Arc::clone(&self.transport);
        tokio::spawn(async move {
            match transport.express_request(request).await {
                Ok(outcome) => tracing::debug!("Interaction request resolved: {:?}", outcome),
                Err(e) => tracing::warn!("Interaction request failed: {}", e),
            }
        });
        true
    }

    /// Whether a subscription for `peer` is active.
    pub fn is_subscribed(&self, peer: &PeerId) -> bool {
        self.subscribers.contains_key(peer)
    }

    /// Number of active subscriptions.
    pub fn peer_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Tear down the subscription for `peer`, if one exists.
    ///
    /// Peers are never removed automatically; a departed peer's subscriber
    /// keeps re-requesting (and timing out) until this is called.
    pub fn remove_peer(&self, peer: &PeerId) -> bool {
        match self.subscribers.remove(peer) {
            Some((_, subscriber)) => {
                subscriber.stop();
                true
            }
            None => false,
        }
    }
}

impl<T: Transport> SubscriptionRegistry<T, BlockId, Block> {
    /// A registry following every remote peer's block set.
    ///
    /// Decodes payloads as [`BlockSet`], keys them by owner-scoped
    /// [`BlockId`], and routes interactions to the owner's interaction
    /// namespace.
    pub fn for_blocks(
        transport: Arc<T>,
        game: GameId,
        local_peer: PeerId,
        config: ProtocolConfig,
    ) -> Self {
        let pacing_target = config.block_pacing();
        Self::new(
            transport,
            game,
            local_peer,
            Arc::new(|owner: &PeerId, response: &Response| {
                Ok(BlockSet::from_bytes(&response.payload)?.into_keyed(owner))
            }),
            Arc::new(|game: &GameId, peer: &PeerId| blocks_sync_path(game, peer)),
            Arc::new(|game: &GameId, id: &BlockId| id.interaction_path(game)),
            pacing_target,
            config,
        )
    }
}

impl<T, K, V> std::fmt::Debug for SubscriptionRegistry<T, K, V>
where
    T: Transport,
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionRegistry")
            .field("game", &self.game)
            .field("local_peer", &self.local_peer)
            .field("peers", &self.subscribers.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publisher::{spawn_drain_task, Publisher};
    use crate::transport::{MockHub, MockTransport};
    use tokio::task::JoinHandle;

    fn game() -> GameId {
        GameId::new("room-1")
    }

    fn block(id: &str) -> Block {
        Block {
            id: id.into(),
            x: 0.0,
            y: 0.0,
            health: 5,
        }
    }

    fn test_config() -> ProtocolConfig {
        // Short warm-up keeps answers inside the first request lifetime
        ProtocolConfig {
            drain_warmup_ms: 100,
            ..ProtocolConfig::default()
        }
    }

    fn registry(transport: &MockTransport) -> SubscriptionRegistry<MockTransport, BlockId, Block> {
        SubscriptionRegistry::for_blocks(
            Arc::new(transport.clone()),
            game(),
            PeerId::new("local"),
            test_config(),
        )
    }

    /// Register a publisher serving `blocks` for `peer` and start its drain.
    async fn serve_blocks(
        hub: &MockHub,
        peer: &PeerId,
        blocks: Vec<Block>,
    ) -> (Arc<Publisher>, JoinHandle<()>) {
        let config = test_config();
        let endpoint = hub.endpoint();
        let path = blocks_sync_path(&game(), peer).unwrap();
        let publisher = Publisher::register(&endpoint, path, &config).await.unwrap();
        let payload = BlockSet { blocks }.to_bytes().unwrap();
        publisher.update_latest_value(payload).await;
        let drain = spawn_drain_task(Arc::clone(&publisher), &config);
        (publisher, drain)
    }

    // ===========================================
    // Discovery Tests
    // ===========================================

    #[tokio::test(start_paused = true)]
    async fn discovery_dedupes_and_skips_local_peer() {
        let hub = MockHub::new();
        let transport = hub.endpoint();
        let registry = registry(&transport);

        let alice = PeerId::new("alice");
        registry.on_peers_discovered(&[PeerId::new("local"), alice.clone(), alice.clone()]);
        registry.on_peers_discovered(&[alice.clone()]);

        assert_eq!(registry.peer_count(), 1);
        assert!(registry.is_subscribed(&alice));
        assert!(!registry.is_subscribed(&PeerId::new("local")));
    }

    // ===========================================
    // Aggregation Tests
    // ===========================================

    #[tokio::test(start_paused = true)]
    async fn aggregation_skips_peers_without_a_value_yet() {
        let hub = MockHub::new();
        let transport = hub.endpoint();
        let registry = registry(&transport);

        let alice = PeerId::new("alice");
        let bob = PeerId::new("bob");
        let (_publisher, drain) = serve_blocks(&hub, &alice, vec![block("b1"), block("b2")]).await;

        // Bob is discovered but publishes nothing
        registry.on_peers_discovered(&[alice.clone(), bob.clone()]);
        tokio::time::sleep(Duration::from_millis(300)).await;

        let view = registry.aggregated();
        assert_eq!(view.len(), 2);
        assert!(view.contains_key(&BlockId::new(alice.clone(), "b1")));
        assert!(view.contains_key(&BlockId::new(alice, "b2")));
        drain.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn aggregation_merges_disjoint_peer_views() {
        let hub = MockHub::new();
        let transport = hub.endpoint();
        let registry = registry(&transport);

        let alice = PeerId::new("alice");
        let bob = PeerId::new("bob");
        let (_pa, drain_a) = serve_blocks(&hub, &alice, vec![block("b1")]).await;
        let (_pb, drain_b) = serve_blocks(&hub, &bob, vec![block("b1")]).await;

        registry.on_peers_discovered(&[alice.clone(), bob.clone()]);
        tokio::time::sleep(Duration::from_millis(300)).await;

        // Same per-peer block id, two distinct identities
        let view = registry.aggregated();
        assert_eq!(view.len(), 2);
        assert!(view.contains_key(&BlockId::new(alice, "b1")));
        assert!(view.contains_key(&BlockId::new(bob, "b1")));
        drain_a.abort();
        drain_b.abort();
    }

    // ===========================================
    // Interaction Tests
    // ===========================================

    #[tokio::test(start_paused = true)]
    async fn interact_routes_to_the_holding_peer() {
        let hub = MockHub::new();
        let transport = hub.endpoint();
        let registry = registry(&transport);

        let alice = PeerId::new("alice");
        let (_publisher, drain) = serve_blocks(&hub, &alice, vec![block("b1")]).await;
        registry.on_peers_discovered(&[alice.clone()]);
        tokio::time::sleep(Duration::from_millis(300)).await;

        assert!(registry.interact(&BlockId::new(alice, "b1")));
        tokio::time::sleep(Duration::from_millis(1)).await;

        let interaction = transport
            .requests()
            .into_iter()
            .find(|r| r.name.to_string() == "/game/room-1/alice/blocks/interaction/b1")
            .unwrap();
        assert!(!interaction.must_be_fresh);
        assert!(!interaction.can_be_prefix);
        drain.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn interact_with_unknown_item_is_a_no_op() {
        let hub = MockHub::new();
        let transport = hub.endpoint();
        let registry = registry(&transport);

        let alice = PeerId::new("alice");
        registry.on_peers_discovered(&[alice.clone()]);

        let before = transport.request_count();
        assert!(!registry.interact(&BlockId::new(alice, "nope")));
        tokio::time::sleep(Duration::from_millis(1)).await;

        // No interaction request was expressed
        assert!(!transport
            .requests()
            .iter()
            .skip(before)
            .any(|r| r.name.to_string().contains("interaction")));
    }

    // ===========================================
    // Teardown Tests
    // ===========================================

    #[tokio::test(start_paused = true)]
    async fn remove_peer_tears_down_its_subscription() {
        let hub = MockHub::new();
        let transport = hub.endpoint();
        let registry = registry(&transport);

        let alice = PeerId::new("alice");
        registry.on_peers_discovered(&[alice.clone()]);
        assert_eq!(registry.peer_count(), 1);

        assert!(registry.remove_peer(&alice));
        assert_eq!(registry.peer_count(), 0);
        assert!(!registry.is_subscribed(&alice));
        // Second removal finds nothing
        assert!(!registry.remove_peer(&alice));
    }
}
