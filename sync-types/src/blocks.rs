//! The block payload synced between peers.
//!
//! Each peer publishes the set of world blocks it owns; subscribers decode
//! the set and index it by [`BlockId`] so per-peer sets can be merged into
//! one world view. The protocol itself treats the encoded bytes as opaque.

use crate::{GameId, NameError, PeerId, ResourcePath, SyncError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single world block owned by a peer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Identifier unique within the owning peer's block set.
    pub id: String,
    /// World x coordinate.
    pub x: f32,
    /// World y coordinate.
    pub y: f32,
    /// Remaining health; a block at 0 is destroyed.
    pub health: u32,
}

/// The full set of blocks a peer currently publishes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct BlockSet {
    /// The blocks, in no particular order.
    pub blocks: Vec<Block>,
}

impl BlockSet {
    /// Serialize to MessagePack bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, SyncError> {
        rmp_serde::to_vec(self).map_err(SyncError::Encode)
    }

    /// Deserialize from MessagePack bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SyncError> {
        rmp_serde::from_slice(bytes).map_err(SyncError::Decode)
    }

    /// Index the set by block identity, scoped to the owning peer.
    ///
    /// Keys from different peers never collide because the owner is part of
    /// the identity.
    pub fn into_keyed(self, owner: &PeerId) -> HashMap<BlockId, Block> {
        self.blocks
            .into_iter()
            .map(|block| {
                let key = BlockId::new(owner.clone(), &block.id);
                (key, block)
            })
            .collect()
    }
}

/// Global identity of a block: owning peer plus per-peer block id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockId {
    /// The peer that publishes this block.
    pub owner: PeerId,
    /// The block's id within the owner's set.
    pub id: String,
}

impl BlockId {
    /// Create a BlockId.
    pub fn new(owner: PeerId, id: impl Into<String>) -> Self {
        Self {
            owner,
            id: id.into(),
        }
    }

    /// The name a one-shot interaction request for this block targets.
    pub fn interaction_path(&self, game: &GameId) -> Result<ResourcePath, NameError> {
        ResourcePath::from_components([
            "game",
            game.as_str(),
            self.owner.as_str(),
            "blocks",
            "interaction",
            self.id.as_str(),
        ])
    }
}

/// The name a peer publishes its block set under.
pub fn blocks_sync_path(game: &GameId, peer: &PeerId) -> Result<ResourcePath, NameError> {
    ResourcePath::from_components(["game", game.as_str(), peer.as_str(), "blocks", "sync"])
}
