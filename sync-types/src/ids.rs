//! Identity and ordering types for ndsync.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A unique identifier for a game session.
///
/// Every resource name published by a peer is scoped under its game id, so
/// two concurrent sessions never exchange traffic.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GameId(String);

impl GameId {
    /// Create a GameId from a session name.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the session name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GameId({})", self.0)
    }
}

/// A unique identifier for a peer (player) in the game session.
///
/// Peers are identified by their player name; the name is embedded in every
/// resource path the peer publishes under.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct PeerId(String);

impl PeerId {
    /// Create a PeerId from a player name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Get the player name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerId({})", self.0)
    }
}

/// A monotonically increasing version number for a published value.
///
/// Assigned by the publisher, advancing by exactly one per drain tick that
/// consumed an update. A subscriber's requests always carry the latest
/// sequence number it has seen, never one from the future.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct SequenceNumber(u64);

impl SequenceNumber {
    /// Create a SequenceNumber with the given value.
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the numeric value.
    pub fn value(&self) -> u64 {
        self.0
    }

    /// The sequence representing "nothing seen yet".
    pub fn zero() -> Self {
        Self(0)
    }

    /// The next sequence number.
    pub fn next(&self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for SequenceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SequenceNumber({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peer_id_display_is_plain_name() {
        let peer = PeerId::new("alice");
        assert_eq!(peer.to_string(), "alice");
        assert_eq!(peer.as_str(), "alice");
    }

    #[test]
    fn sequence_ordering() {
        let a = SequenceNumber::new(3);
        let b = SequenceNumber::new(7);
        assert!(a < b);
        assert!(b > a);
    }

    #[test]
    fn sequence_next() {
        assert_eq!(SequenceNumber::new(41).next(), SequenceNumber::new(42));
    }

    #[test]
    fn sequence_next_saturates() {
        let max = SequenceNumber::new(u64::MAX);
        assert_eq!(max.next().value(), u64::MAX);
    }

    #[test]
    fn sequence_zero_is_default() {
        assert_eq!(SequenceNumber::default(), SequenceNumber::zero());
    }
}
