//! Transport request/response objects for ndsync.
//!
//! These mirror the fields the protocol needs from the named-network
//! transport: a request names what it wants and how long it is willing to
//! wait; a response carries a concrete name, an opaque payload, and the
//! freshness window intermediate caches may serve it for.

use crate::ResourcePath;
use serde::{Deserialize, Serialize};

/// Default request lifetime before the transport reports a timeout.
pub const DEFAULT_REQUEST_LIFETIME_MS: u64 = 1000;

/// Default freshness period attached to publisher replies.
pub const DEFAULT_FRESHNESS_MS: u64 = 20;

/// A pull-style request for named content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// The target name, including the requester's latest-seen sequence.
    pub name: ResourcePath,
    /// Only content newer than any cached copy may answer this request.
    pub must_be_fresh: bool,
    /// The answering name may extend this request's name.
    pub can_be_prefix: bool,
    /// How long the transport waits for an answer before timing out.
    pub lifetime_ms: u64,
}

/// A response carrying one version of a published value.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    /// The concrete name of this content, including the sequence it carries.
    pub name: ResourcePath,
    /// The encoded application payload (opaque to the protocol).
    pub payload: Vec<u8>,
    /// How long caches may serve this response without re-fetching.
    pub freshness_ms: u64,
}

impl std::fmt::Debug for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Response")
            .field("name", &self.name)
            .field("payload", &format!("[{} bytes]", self.payload.len()))
            .field("freshness_ms", &self.freshness_ms)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_debug_elides_payload_bytes() {
        let response = Response {
            name: "/a/b/seq=1".parse().unwrap(),
            payload: vec![0xDE, 0xAD],
            freshness_ms: 20,
        };
        let debug = format!("{:?}", response);
        assert!(debug.contains("[2 bytes]"));
        assert!(!debug.contains("222")); // 0xDE = 222
    }
}
