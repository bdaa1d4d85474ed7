//! # ndsync-types
//!
//! Naming and wire format types for the ndsync versioned pub/sub protocol.
//!
//! This crate provides the foundational types used across all ndsync crates:
//! - [`GameId`], [`PeerId`], [`SequenceNumber`] - Identity and ordering types
//! - [`ResourcePath`], [`VersionedName`] - Hierarchical names and version suffixes
//! - [`Request`], [`Response`] - Transport exchange objects
//! - [`Block`], [`BlockSet`] - The application payload and its codec
//! - [`SyncError`], [`NameError`] - Error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod blocks;
mod error;
mod ids;
mod messages;
mod name;

pub use blocks::{blocks_sync_path, Block, BlockId, BlockSet};
pub use error::{NameError, SyncError};
pub use ids::{GameId, PeerId, SequenceNumber};
pub use messages::{Request, Response, DEFAULT_FRESHNESS_MS, DEFAULT_REQUEST_LIFETIME_MS};
pub use name::{ResourcePath, VersionedName};
