//! # sync-peer
//!
//! The ndsync protocol actors: versioned publish/subscribe state sync for
//! real-time multiplayer games over a named-content transport.
//!
//! This is the main library a game peer uses. Each peer publishes its own
//! mutable state (for example its block set) under a versioned name and
//! subscribes to every other peer's, pulling "anything newer than what I
//! last saw" in a paced loop.
//!
//! ## Features
//!
//! - **Pull-based versioning**: subscribers request by last-seen sequence;
//!   the publisher always answers with its current version
//! - **Coalescing publisher**: updates between drain ticks collapse into
//!   one sequence step
//! - **Paced subscribers**: per-resource request loops with a configurable
//!   inter-request target
//! - **Transport Abstraction**: pluggable named-content transport (mock hub
//!   for tests)
//!
//! ## Example
//!
//! ```ignore
//! use sync_peer::{ProtocolConfig, SubscriptionRegistry};
//!
//! let config = ProtocolConfig::default();
//! let registry = SubscriptionRegistry::for_blocks(transport, game, me, config);
//!
//! // Follow every discovered peer's block set
//! registry.on_peers_discovered(&peers);
//!
//! // One consolidated world view
//! let world = registry.aggregated();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod publisher;
pub mod registry;
pub mod subscriber;
pub mod transport;

pub use config::{ConfigError, ProtocolConfig};
pub use publisher::{spawn_drain_task, spawn_stats_task, Publisher, PublisherMetrics};
pub use registry::{
    InteractionNamingFn, ItemDecodeFn, SubscriptionRegistry, SyncNamingFn,
};
pub use subscriber::{DecodeFn, Subscriber};
pub use transport::{
    MockHub, MockTransport, RequestHandler, RequestOutcome, ResponseSink, SinkId, Transport,
    TransportError,
};
