//! # ndsync-core
//!
//! Pure logic for ndsync (no I/O, instant tests).
//!
//! This crate implements the protocol arithmetic without any network or
//! timer dependency, enabling fast unit tests:
//! - [`pacing`] - target-delay to sleep-time computation and policies
//! - [`histogram`] - lock-free latency histogram for observability
//!
//! The actual I/O (requests, replies, timers) is performed by `ndsync-peer`,
//! which feeds these functions and shares the histogram across tasks.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod histogram;
pub mod pacing;

pub use histogram::{HistogramSnapshot, LatencyHistogram};
pub use pacing::{compute_sleep, fixed, PacingPolicy, DEFAULT_MIN_SLEEP};
