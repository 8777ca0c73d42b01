//! HTTP implementation of [`PlaybackApi`] against the vendor Web API.
//!
//! Each method issues exactly one authenticated GET and classifies the
//! outcome into a [`RemoteError`]. Retrying is left to the executor.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;

use super::auth::AccessToken;
use super::error::{RemoteError, RemoteResult};
use super::models::{
    Album, Artist, CurrentlyPlaying, Page, Playlist, PlaylistEntry, Show, TopTracks, Track,
};
use super::traits::PlaybackApi;
use crate::protocol_constants::MAX_PAGE_SIZE;

// ─────────────────────────────────────────────────────────────────────────────
// Transport
// ─────────────────────────────────────────────────────────────────────────────

/// Client for the vendor Web API.
#[derive(Clone)]
pub struct WebApiClient {
    http: Client,
    base_url: String,
    token: AccessToken,
}

impl WebApiClient {
    /// Creates a client rooted at `base_url` (e.g. `https://api.spotify.com/v1`).
    pub fn new(http: Client, base_url: impl Into<String>, token: AccessToken) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Performs an authenticated GET and decodes the JSON body.
    ///
    /// Returns `Ok(None)` on `204 No Content`.
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> RemoteResult<Option<T>> {
        let res = self
            .http
            .get(self.url(path))
            .bearer_auth(self.token.get())
            .query(query)
            .send()
            .await?;

        let status = res.status();
        if status == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        if !status.is_success() {
            let retry_after = res
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned);
            let body = res.text().await.unwrap_or_default();
            log::debug!("[Remote] GET {} -> {}", path, status);
            return Err(RemoteError::from_status(status, retry_after.as_deref(), body));
        }

        let bytes = res.bytes().await?;
        if bytes.is_empty() {
            return Ok(None);
        }
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| RemoteError::Decode(format!("{}: {}", path, e)))
    }

    /// Like [`get_json`](Self::get_json) but treats an empty response as a decode error.
    async fn get_required<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> RemoteResult<T> {
        self.get_json(path, query)
            .await?
            .ok_or_else(|| RemoteError::Decode(format!("{}: empty response", path)))
    }
}

fn page_query(offset: u32, limit: u32) -> [(&'static str, String); 2] {
    [
        ("offset", offset.to_string()),
        ("limit", limit.clamp(1, MAX_PAGE_SIZE).to_string()),
    ]
}

// ─────────────────────────────────────────────────────────────────────────────
// Endpoints
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl PlaybackApi for WebApiClient {
    async fn current_playback(&self) -> RemoteResult<Option<CurrentlyPlaying>> {
        self.get_json(
            "/me/player",
            &[("additional_types", "episode,track".to_string())],
        )
        .await
    }

    async fn album(&self, id: &str) -> RemoteResult<Album> {
        self.get_required(&format!("/albums/{}", id), &[]).await
    }

    async fn album_tracks(&self, id: &str, offset: u32, limit: u32) -> RemoteResult<Page<Track>> {
        self.get_required(&format!("/albums/{}/tracks", id), &page_query(offset, limit))
            .await
    }

    async fn playlist(&self, id: &str) -> RemoteResult<Playlist> {
        self.get_required(
            &format!("/playlists/{}", id),
            &[("additional_types", "episode,track".to_string())],
        )
        .await
    }

    async fn playlist_tracks(
        &self,
        id: &str,
        offset: u32,
        limit: u32,
    ) -> RemoteResult<Page<PlaylistEntry>> {
        self.get_required(
            &format!("/playlists/{}/tracks", id),
            &page_query(offset, limit),
        )
        .await
    }

    async fn saved_tracks(&self, offset: u32, limit: u32) -> RemoteResult<Page<PlaylistEntry>> {
        self.get_required("/me/tracks", &page_query(offset, limit))
            .await
    }

    async fn artist(&self, id: &str) -> RemoteResult<Artist> {
        self.get_required(&format!("/artists/{}", id), &[]).await
    }

    async fn artist_top_tracks(&self, id: &str) -> RemoteResult<Vec<Track>> {
        let top: TopTracks = self
            .get_required(
                &format!("/artists/{}/top-tracks", id),
                &[("market", "from_token".to_string())],
            )
            .await?;
        Ok(top.tracks)
    }

    async fn show(&self, id: &str) -> RemoteResult<Show> {
        self.get_required(
            &format!("/shows/{}", id),
            &[("market", "from_token".to_string())],
        )
        .await
    }
}
