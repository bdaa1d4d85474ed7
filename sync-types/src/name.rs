//! Hierarchical resource names and versioned request naming.
//!
//! A [`ResourcePath`] identifies a published resource (for example
//! `/game/room-1/alice/blocks/sync`). A [`VersionedName`] pairs a path with
//! the latest sequence number a party has seen, and builds the names that
//! travel on the wire:
//!
//! - request name: `path/seq=<latest_seen>` ("give me anything newer")
//! - reply name: `path/seq=<requested>/seq=<published>`
//!
//! The reply keeps the requested component so it stays under the request's
//! prefix (requests are expressed with `can_be_prefix`), and appends the
//! sequence number the reply actually carries. When parsing, the **last**
//! sequence component is authoritative.

use crate::{NameError, Request, Response, SequenceNumber};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Marker prefix for sequence number components.
const SEQ_PREFIX: &str = "seq=";

/// An ordered sequence of path components naming a resource.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourcePath(Vec<String>);

impl ResourcePath {
    /// Build a path from components.
    ///
    /// Components must be non-empty and must not contain `/`.
    pub fn from_components<I, S>(components: I) -> Result<Self, NameError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut path = Self(Vec::new());
        for component in components {
            path.push(component)?;
        }
        Ok(path)
    }

    /// Append a component to this path.
    pub fn push(&mut self, component: impl Into<String>) -> Result<(), NameError> {
        let component = component.into();
        if component.is_empty() || component.contains('/') {
            return Err(NameError::InvalidComponent { component });
        }
        self.0.push(component);
        Ok(())
    }

    /// A new path with `component` appended.
    pub fn join(&self, component: impl Into<String>) -> Result<Self, NameError> {
        let mut path = self.clone();
        path.push(component)?;
        Ok(path)
    }

    /// The path components.
    pub fn components(&self) -> &[String] {
        &self.0
    }

    /// Number of components.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the path has no components.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether `prefix` is a prefix of this path.
    pub fn starts_with(&self, prefix: &ResourcePath) -> bool {
        self.0.len() >= prefix.0.len() && self.0[..prefix.0.len()] == prefix.0[..]
    }
}

impl fmt::Display for ResourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for component in &self.0 {
            write!(f, "/{}", component)?;
        }
        Ok(())
    }
}

impl fmt::Debug for ResourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResourcePath({})", self)
    }
}

impl FromStr for ResourcePath {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.strip_prefix('/').unwrap_or(s);
        if trimmed.is_empty() {
            return Ok(Self(Vec::new()));
        }
        Self::from_components(trimmed.split('/'))
    }
}

/// A resource path plus the latest sequence number a party has observed.
///
/// Created once per logical remote resource at subscription time, then
/// replaced from each reply via [`VersionedName::from_response`]. A name is
/// never shared for write across two subscribers.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct VersionedName {
    path: ResourcePath,
    latest_seen: SequenceNumber,
    published: Option<SequenceNumber>,
}

impl VersionedName {
    /// A name for `path` with nothing seen yet (sequence 0).
    pub fn new(path: ResourcePath) -> Self {
        Self::with_latest_seen(path, SequenceNumber::zero())
    }

    /// A name for `path` that has already seen `latest_seen`.
    pub fn with_latest_seen(path: ResourcePath, latest_seen: SequenceNumber) -> Self {
        Self {
            path,
            latest_seen,
            published: None,
        }
    }

    /// The resource path (without sequence components).
    pub fn path(&self) -> &ResourcePath {
        &self.path
    }

    /// The latest sequence number seen for this resource.
    pub fn latest_seen(&self) -> SequenceNumber {
        self.latest_seen
    }

    /// The sequence number a reply built from this name will carry, if set.
    pub fn published(&self) -> Option<SequenceNumber> {
        self.published
    }

    /// This name with the published sequence set to `sequence`.
    ///
    /// Used by the publisher immediately before replying, so the reply name
    /// embeds the sequence it actually represents. The published sequence
    /// may be greater than the requested one: the publisher always serves
    /// its current version. A cache holding such a reply may later satisfy
    /// a request for the older sequence with it; that staleness window is
    /// bounded by the reply's freshness period.
    pub fn with_sequence_number(&self, sequence: SequenceNumber) -> Self {
        Self {
            path: self.path.clone(),
            latest_seen: self.latest_seen,
            published: Some(sequence),
        }
    }

    /// The outgoing request name: `path/seq=<latest_seen>`.
    pub fn request_name(&self) -> ResourcePath {
        let mut name = self.path.clone();
        // Infallible: the formatted component is non-empty and has no '/'.
        let _ = name.push(format!("{}{}", SEQ_PREFIX, self.latest_seen));
        name
    }

    /// Build the transport request for this name.
    ///
    /// Requests always ask for fresh content and allow the reply name to
    /// extend the request name.
    pub fn build_request(&self, lifetime_ms: u64) -> Request {
        Request {
            name: self.request_name(),
            must_be_fresh: true,
            can_be_prefix: true,
            lifetime_ms,
        }
    }

    /// The reply name: `path/seq=<requested>/seq=<published>`.
    pub fn response_name(&self) -> Result<ResourcePath, NameError> {
        let published = self.published.ok_or_else(|| NameError::MissingPublishedSequence {
            name: self.request_name().to_string(),
        })?;
        let mut name = self.request_name();
        let _ = name.push(format!("{}{}", SEQ_PREFIX, published));
        Ok(name)
    }

    /// Build the reply answering this name with `payload`.
    pub fn build_response(
        &self,
        payload: Vec<u8>,
        freshness_ms: u64,
    ) -> Result<Response, NameError> {
        Ok(Response {
            name: self.response_name()?,
            payload,
            freshness_ms,
        })
    }

    /// Parse the versioned name out of a received request.
    pub fn from_request(request: &Request) -> Result<Self, NameError> {
        Self::parse(&request.name)
    }

    /// Parse the next versioned name out of a received reply.
    ///
    /// The returned name carries the reply's published sequence as "latest
    /// seen", so the subscriber's next request asks for anything newer than
    /// what was actually delivered, regardless of how many versions were
    /// skipped.
    pub fn from_response(response: &Response) -> Result<Self, NameError> {
        Self::parse(&response.name)
    }

    /// Split the trailing run of `seq=` components; the last one wins.
    fn parse(name: &ResourcePath) -> Result<Self, NameError> {
        let components = name.components();
        let suffix_start = components
            .iter()
            .rposition(|c| !c.starts_with(SEQ_PREFIX))
            .map(|i| i + 1)
            .unwrap_or(0);

        let last = components[suffix_start..]
            .last()
            .ok_or_else(|| NameError::MissingSequence {
                name: name.to_string(),
            })?;

        let digits = &last[SEQ_PREFIX.len()..];
        let value = digits
            .parse::<u64>()
            .map_err(|_| NameError::InvalidSequence {
                component: last.clone(),
                name: name.to_string(),
            })?;

        Ok(Self {
            path: ResourcePath(components[..suffix_start].to_vec()),
            latest_seen: SequenceNumber::new(value),
            published: None,
        })
    }
}

impl fmt::Display for VersionedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.request_name())
    }
}

impl fmt::Debug for VersionedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VersionedName")
            .field("path", &self.path)
            .field("latest_seen", &self.latest_seen)
            .field("published", &self.published)
            .finish()
    }
}
