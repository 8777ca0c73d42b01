//! Trait abstractions for the remote playback service.
//!
//! Services depend on these traits rather than on [`WebApiClient`](super::WebApiClient)
//! so the whole pipeline can be driven by in-memory mocks in tests.

use async_trait::async_trait;

use super::error::RemoteResult;
use super::models::{
    Album, Artist, CurrentlyPlaying, Page, Playlist, PlaylistEntry, Show, Track,
};

/// Read-only requests against the remote playback service.
///
/// Every method performs exactly one request. Retries, backoff and credential
/// refresh are the job of the [`RemoteCallExecutor`](super::RemoteCallExecutor).
#[async_trait]
pub trait PlaybackApi: Send + Sync {
    /// Fetches the current playback descriptor.
    ///
    /// Returns `None` when nothing is playing (no active device).
    async fn current_playback(&self) -> RemoteResult<Option<CurrentlyPlaying>>;

    /// Fetches album metadata including the first page of its tracks.
    async fn album(&self, id: &str) -> RemoteResult<Album>;

    /// Fetches one page of an album's tracks.
    async fn album_tracks(&self, id: &str, offset: u32, limit: u32) -> RemoteResult<Page<Track>>;

    /// Fetches playlist metadata including the first page of its entries.
    async fn playlist(&self, id: &str) -> RemoteResult<Playlist>;

    /// Fetches one page of a playlist's entries.
    async fn playlist_tracks(
        &self,
        id: &str,
        offset: u32,
        limit: u32,
    ) -> RemoteResult<Page<PlaylistEntry>>;

    /// Fetches one page of the user's saved tracks.
    async fn saved_tracks(&self, offset: u32, limit: u32) -> RemoteResult<Page<PlaylistEntry>>;

    /// Fetches artist metadata.
    async fn artist(&self, id: &str) -> RemoteResult<Artist>;

    /// Fetches an artist's top tracks.
    async fn artist_top_tracks(&self, id: &str) -> RemoteResult<Vec<Track>>;

    /// Fetches podcast show metadata.
    async fn show(&self, id: &str) -> RemoteResult<Show>;
}

/// Renews the access credential used by [`PlaybackApi`] requests.
#[async_trait]
pub trait CredentialRefresher: Send + Sync {
    /// Obtains a new access credential and makes it visible to subsequent requests.
    async fn refresh(&self) -> RemoteResult<()>;
}
