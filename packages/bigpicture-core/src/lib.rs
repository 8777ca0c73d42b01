//! BigPicture Core - shared library for the BigPicture playback mirror.
//!
//! This crate continuously mirrors the playback state of a remote media player
//! service and republishes only the *changes* to any number of connected
//! viewers. Snapshots are enriched with derived data that is expensive to
//! compute and therefore cached: the dominant colors of the cover art and the
//! resolved track listing of the active playback context.
//!
//! # Architecture
//!
//! Data flows one way:
//!
//! ```text
//! Scheduler -> SnapshotBuilder -> StateDiffEngine -> BroadcastHub -> subscribers
//!                 |
//!                 +-- RemoteCallExecutor, ContextResolver, ArtworkColorCache
//! ```
//!
//! - [`remote`]: Vendor Web API client, credential refresh and the retrying executor
//! - [`artwork`]: Artwork URL resolution and the memoized color extraction
//! - [`context`]: Playback context resolution (album/playlist/artist/show/search)
//! - [`services`]: Snapshot building, diffing, fan-out and periodic scheduling
//! - [`api`]: Push (SSE) and poll HTTP surface
//! - [`bootstrap`]: Composition root wiring all of the above
//! - [`error`]: Centralized error types
//!
//! # Abstraction Traits
//!
//! - [`PlaybackApi`](remote::PlaybackApi): Remote playback service requests
//! - [`CredentialRefresher`](remote::CredentialRefresher): Access token renewal
//! - [`ImageSource`](artwork::ImageSource): Fetching artwork bytes
//! - [`ArtworkProvider`](artwork::ArtworkProvider): One step of the artwork fallback chain
//! - [`ContextStrategy`](context::ContextStrategy): Per-context-type resolution

#![warn(clippy::all)]

pub mod api;
pub mod artwork;
pub mod bootstrap;
pub mod context;
pub mod error;
pub mod events;
pub mod model;
pub mod protocol_constants;
pub mod remote;
pub mod services;
pub mod state;
pub mod utils;

#[cfg(test)]
pub(crate) mod test_fixtures;

// Re-export commonly used types at the crate root
pub use artwork::{ArtworkChain, ArtworkColorCache, ArtworkConfig};
pub use error::{ErrorCode, MirrorError, MirrorResult};
pub use events::DiffEvent;
pub use model::{ArtworkColors, ContextType, ListTrack, PlaybackSnapshot, RepeatMode, Rgb};
pub use state::{Config, RetryConfig};
pub use utils::now_millis;

// Re-export remote types
pub use remote::{
    AccessToken, ClientCredentials, CredentialRefresher, ExecutorError, PlaybackApi,
    RemoteCallExecutor, RemoteError, RetryPolicy, SingleFlightRefresher, TokenRefresher,
    WebApiClient,
};

// Re-export service types
pub use services::{
    BroadcastHub, PlaybackMirror, Scheduler, SnapshotBuilder, StateDiffEngine, Subscription,
};

// Re-export bootstrap types
pub use bootstrap::{bootstrap_services, BootstrappedServices};

// Re-export API types
pub use api::{start_server, AppState, ServerError};
