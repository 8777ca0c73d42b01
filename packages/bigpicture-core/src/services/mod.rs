//! Application services layer.
//!
//! This module contains the pipeline that turns remote playback state into
//! events for subscribers: snapshot building, diffing, fan-out and the
//! timers driving them.

pub mod broadcast_hub;
pub mod playback_mirror;
pub mod scheduler;
pub mod snapshot_builder;
pub mod state_diff;

pub use broadcast_hub::{BroadcastHub, Subscription};
pub use playback_mirror::PlaybackMirror;
pub use scheduler::Scheduler;
pub use snapshot_builder::SnapshotBuilder;
pub use state_diff::StateDiffEngine;
