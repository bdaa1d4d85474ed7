//! Transport abstraction for ndsync.
//!
//! This module provides a pluggable transport layer that abstracts the
//! underlying named-network mechanism (an NDN-style forwarder in production,
//! a mock for testing).
//!
//! # Design
//!
//! The transport trait is async and name-oriented:
//! - `register_prefix()` receives all requests under a name prefix
//! - `express_request()` fires one outbound request; exactly one outcome
//!   (response or timeout) is produced per request
//!
//! Incoming requests are handed to a [`RequestHandler`] together with a
//! [`ResponseSink`] — the reply destination the request arrived on. Sinks
//! carry a stable [`SinkId`] per requesting endpoint, so a publisher can
//! key pending requests by requester + name.
//!
//! # Example
//!
//! ```ignore
//! let hub = MockHub::new();
//! let transport = hub.endpoint();
//! transport.register_prefix(prefix, handler).await?;
//! match transport.express_request(request).await? {
//!     RequestOutcome::Response(response) => { /* decode */ }
//!     RequestOutcome::Timeout => { /* re-request */ }
//! }
//! ```

mod mock;

pub use mock::{MockHub, MockTransport};

use async_trait::async_trait;
use std::sync::Arc;
use sync_types::{Request, ResourcePath, Response};
use thiserror::Error;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Prefix registration failed.
    #[error("prefix registration failed: {0}")]
    RegistrationFailed(String),

    /// Sending a request or reply failed.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// The requester's reply channel is gone.
    #[error("requester disconnected")]
    Disconnected,
}

/// Stable identity of a reply channel (the "face" a request arrived on).
///
/// Two requests from the same endpoint carry the same id; requests from
/// distinct endpoints never share one.
pub type SinkId = u64;

/// The outcome of a single expressed request.
#[derive(Debug)]
pub enum RequestOutcome {
    /// Content arrived within the request lifetime.
    Response(Response),
    /// The lifetime elapsed with no answer.
    Timeout,
}

/// The reply destination for a received request.
#[async_trait]
pub trait ResponseSink: Send + Sync {
    /// Stable identity of the requesting endpoint.
    fn id(&self) -> SinkId;

    /// Send a reply back to the requester.
    async fn send(&self, response: Response) -> Result<(), TransportError>;
}

/// Receives requests arriving under a registered prefix.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    /// Called once per incoming request.
    async fn on_request(&self, request: Request, reply: Arc<dyn ResponseSink>);
}

/// Transport trait for expressing requests and serving named content.
///
/// Implementations handle the underlying delivery mechanism; the protocol
/// actors only see names, payloads, and timeouts.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Register to receive all requests whose name starts with `prefix`.
    async fn register_prefix(
        &self,
        prefix: ResourcePath,
        handler: Arc<dyn RequestHandler>,
    ) -> Result<(), TransportError>;

    /// Fire a single outbound request.
    ///
    /// Resolves to exactly one [`RequestOutcome`]: the response, or a
    /// timeout once the request's lifetime elapses.
    async fn express_request(&self, request: Request) -> Result<RequestOutcome, TransportError>;
}
