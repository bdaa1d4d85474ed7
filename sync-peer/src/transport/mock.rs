//! Mock transport for testing.
//!
//! A [`MockHub`] stands in for the forwarder: it holds the registered
//! prefixes and hands out per-endpoint [`MockTransport`] handles. Each
//! endpoint captures the requests it expresses and can be scripted with
//! outcomes; an unscripted request whose name matches a registered prefix
//! is delivered to that handler (loopback), so a publisher and subscriber
//! can be wired end-to-end without a network.

use super::{RequestHandler, RequestOutcome, ResponseSink, SinkId, Transport, TransportError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use sync_types::{Request, ResourcePath, Response};
use tokio::sync::mpsc;

/// The shared forwarder state behind all endpoints of one hub.
struct HubInner {
    prefixes: Mutex<Vec<(ResourcePath, Arc<dyn RequestHandler>)>>,
    next_endpoint: AtomicU64,
}

/// A mock forwarder connecting any number of endpoints.
#[derive(Clone)]
pub struct MockHub {
    inner: Arc<HubInner>,
}

impl MockHub {
    /// Create a new hub with no registered prefixes.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(HubInner {
                prefixes: Mutex::new(Vec::new()),
                next_endpoint: AtomicU64::new(1),
            }),
        }
    }

    /// Create a new endpoint attached to this hub.
    ///
    /// Every endpoint has a distinct [`SinkId`]; requests expressed through
    /// it are answered on its own reply channel.
    pub fn endpoint(&self) -> MockTransport {
        let id = self.inner.next_endpoint.fetch_add(1, Ordering::Relaxed);
        let (reply_tx, reply_rx) = mpsc::unbounded_channel();
        MockTransport {
            inner: Arc::new(EndpointInner {
                hub: Arc::clone(&self.inner),
                id,
                requests: Mutex::new(Vec::new()),
                scripted: Mutex::new(VecDeque::new()),
                fail_next_express: Mutex::new(None),
                fail_next_reply: Mutex::new(None),
                reply_tx,
                reply_rx: tokio::sync::Mutex::new(reply_rx),
            }),
        }
    }
}

impl Default for MockHub {
    fn default() -> Self {
        Self::new()
    }
}

struct EndpointInner {
    hub: Arc<HubInner>,
    id: SinkId,
    requests: Mutex<Vec<Request>>,
    scripted: Mutex<VecDeque<RequestOutcome>>,
    fail_next_express: Mutex<Option<String>>,
    fail_next_reply: Mutex<Option<String>>,
    reply_tx: mpsc::UnboundedSender<Response>,
    reply_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Response>>,
}

/// One endpoint of a [`MockHub`].
///
/// Clones share state, so a test can keep a handle while the code under
/// test owns another.
#[derive(Clone)]
pub struct MockTransport {
    inner: Arc<EndpointInner>,
}

impl MockTransport {
    /// Queue a response outcome for the next `express_request` call on
    /// this endpoint.
    pub fn queue_response(&self, response: Response) {
        self.inner
            .scripted
            .lock()
            .unwrap()
            .push_back(RequestOutcome::Response(response));
    }

    /// Queue a timeout outcome for the next `express_request` call.
    pub fn queue_timeout(&self) {
        self.inner
            .scripted
            .lock()
            .unwrap()
            .push_back(RequestOutcome::Timeout);
    }

    /// All requests expressed through this endpoint.
    pub fn requests(&self) -> Vec<Request> {
        self.inner.requests.lock().unwrap().clone()
    }

    /// The most recently expressed request.
    pub fn last_request(&self) -> Option<Request> {
        self.inner.requests.lock().unwrap().last().cloned()
    }

    /// Number of requests expressed through this endpoint.
    pub fn request_count(&self) -> usize {
        self.inner.requests.lock().unwrap().len()
    }

    /// Cause the next `express_request()` to fail with the given error.
    pub fn fail_next_express(&self, error: &str) {
        *self.inner.fail_next_express.lock().unwrap() = Some(error.to_string());
    }

    /// Cause the next reply sent through this endpoint's sink to fail.
    pub fn fail_next_reply(&self, error: &str) {
        *self.inner.fail_next_reply.lock().unwrap() = Some(error.to_string());
    }

    /// This endpoint's reply destination, as a publisher would see it.
    pub fn sink(&self) -> Arc<dyn ResponseSink> {
        Arc::new(MockSink {
            inner: Arc::clone(&self.inner),
            tx: self.inner.reply_tx.clone(),
        })
    }

    /// Take one reply delivered to this endpoint's sink, if any is waiting.
    ///
    /// Only useful when the sink was handed to a handler directly; replies
    /// to loopback requests are consumed by `express_request` itself.
    pub fn try_recv_response(&self) -> Option<Response> {
        self.inner.reply_rx.try_lock().ok()?.try_recv().ok()
    }
}

struct MockSink {
    inner: Arc<EndpointInner>,
    tx: mpsc::UnboundedSender<Response>,
}

#[async_trait]
impl ResponseSink for MockSink {
    fn id(&self) -> SinkId {
        self.inner.id
    }

    async fn send(&self, response: Response) -> Result<(), TransportError> {
        if let Some(error) = self.inner.fail_next_reply.lock().unwrap().take() {
            return Err(TransportError::SendFailed(error));
        }
        self.tx
            .send(response)
            .map_err(|_| TransportError::Disconnected)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn register_prefix(
        &self,
        prefix: ResourcePath,
        handler: Arc<dyn RequestHandler>,
    ) -> Result<(), TransportError> {
        self.inner
            .hub
            .prefixes
            .lock()
            .unwrap()
            .push((prefix, handler));
        Ok(())
    }

    async fn express_request(&self, request: Request) -> Result<RequestOutcome, TransportError> {
        self.inner.requests.lock().unwrap().push(request.clone());

        // Check for forced failure
        if let Some(error) = self.inner.fail_next_express.lock().unwrap().take() {
            return Err(TransportError::SendFailed(error));
        }

        // Scripted outcomes take precedence over loopback delivery
        if let Some(outcome) = self.inner.scripted.lock().unwrap().pop_front() {
            return Ok(outcome);
        }

        let handler = {
            let prefixes = self.inner.hub.prefixes.lock().unwrap();
            prefixes
                .iter()
                .find(|(prefix, _)| request.name.starts_with(prefix))
                .map(|(_, handler)| Arc::clone(handler))
        };

        let lifetime = Duration::from_millis(request.lifetime_ms);
        match handler {
            Some(handler) => {
                // Per-request reply channel: concurrent requests through the
                // same endpoint never see each other's replies, and a reply
                // arriving after the lifetime is dropped, not queued.
                let (tx, mut rx) = mpsc::unbounded_channel();
                let sink = Arc::new(MockSink {
                    inner: Arc::clone(&self.inner),
                    tx,
                });
                handler.on_request(request, sink).await;
                match tokio::time::timeout(lifetime, rx.recv()).await {
                    Ok(Some(response)) => Ok(RequestOutcome::Response(response)),
                    // The handler dropped its sink without replying; wait
                    // out the lifetime like any unanswered request.
                    Ok(None) => {
                        tokio::time::sleep(lifetime).await;
                        Ok(RequestOutcome::Timeout)
                    }
                    Err(_) => Ok(RequestOutcome::Timeout),
                }
            }
            None => {
                // Nothing can answer; behave like an unsatisfied forwarder
                tokio::time::sleep(lifetime).await;
                Ok(RequestOutcome::Timeout)
            }
        }
    }
}
