//! Error types for ndsync.

/// Errors produced while building or parsing resource names.
#[derive(Debug, thiserror::Error)]
pub enum NameError {
    /// A path component was empty or contained a path separator.
    #[error("invalid path component: {component:?}")]
    InvalidComponent {
        /// The offending component.
        component: String,
    },

    /// A name that should carry a sequence number suffix did not.
    #[error("no sequence number component in name: {name}")]
    MissingSequence {
        /// The full name that was parsed.
        name: String,
    },

    /// A sequence number component was present but not a valid integer.
    #[error("invalid sequence number component {component:?} in name: {name}")]
    InvalidSequence {
        /// The offending component.
        component: String,
        /// The full name that was parsed.
        name: String,
    },

    /// A reply name was requested before the publisher set its sequence.
    #[error("response name requires a published sequence number: {name}")]
    MissingPublishedSequence {
        /// The request name the reply would answer.
        name: String,
    },
}

/// Main error type for ndsync wire operations.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Name building or parsing failed.
    #[error("name error: {0}")]
    Name(#[from] NameError),

    /// Payload serialization failed.
    #[error("payload serialization failed: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    /// Payload deserialization failed.
    #[error("payload deserialization failed: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
}
