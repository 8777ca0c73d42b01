//! Raw response models of the vendor Web API.
//!
//! Only the fields the mirror consumes are modelled; everything else in the
//! responses is ignored. Fields the service omits for some item kinds (local
//! files, episodes inside playlists) are defaulted.

use serde::Deserialize;

/// The current playback descriptor (`GET /me/player`).
#[derive(Debug, Clone, Deserialize)]
pub struct CurrentlyPlaying {
    #[serde(default)]
    pub device: Option<Device>,
    #[serde(default)]
    pub repeat_state: Option<String>,
    #[serde(default)]
    pub shuffle_state: Option<bool>,
    #[serde(default)]
    pub context: Option<PlaybackContext>,
    #[serde(default)]
    pub progress_ms: Option<u64>,
    #[serde(default)]
    pub is_playing: bool,
    #[serde(default)]
    pub item: Option<PlayingItem>,
}

/// The device the remote player is running on.
#[derive(Debug, Clone, Deserialize)]
pub struct Device {
    pub name: String,
    #[serde(default)]
    pub volume_percent: Option<u8>,
}

/// Raw descriptor of the collection playback was started from.
#[derive(Debug, Clone, Deserialize)]
pub struct PlaybackContext {
    #[serde(rename = "type")]
    pub kind: String,
    pub uri: String,
}

/// The currently playing item.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PlayingItem {
    Track(Track),
    Episode(Episode),
    /// Ads and anything else the mirror does not display.
    #[serde(other)]
    Unsupported,
}

/// A music track (also used for playlist entries, which may be episodes).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Track {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub uri: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub artists: Vec<SimpleArtist>,
    #[serde(default)]
    pub album: Option<SimpleAlbum>,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default)]
    pub track_number: u32,
    #[serde(default)]
    pub disc_number: u32,
    #[serde(default)]
    pub is_local: bool,
}

impl Track {
    /// Artist names in credited order.
    #[must_use]
    pub fn artist_names(&self) -> Vec<String> {
        self.artists.iter().map(|a| a.name.clone()).collect()
    }
}

/// A podcast episode.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Episode {
    pub id: String,
    #[serde(default)]
    pub uri: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub images: Vec<Image>,
    #[serde(default)]
    pub show: Option<Show>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SimpleArtist {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SimpleAlbum {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub album_type: Option<String>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub images: Vec<Image>,
}

/// One rendition of an artwork.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Image {
    pub url: String,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

impl Image {
    /// Pixel area, 0 when the service does not report dimensions.
    #[must_use]
    pub fn area(&self) -> u64 {
        u64::from(self.width.unwrap_or(0)) * u64::from(self.height.unwrap_or(0))
    }
}

/// A paging object.
///
/// Items may be `null` (removed or unavailable entries); `next` is the
/// continuation link and is absent on the last page.
#[derive(Debug, Clone, Deserialize)]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<Option<T>>,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub offset: u32,
    #[serde(default)]
    pub limit: u32,
    #[serde(default)]
    pub total: u32,
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            next: None,
            offset: 0,
            limit: 0,
            total: 0,
        }
    }
}

impl<T> Page<T> {
    /// Offset of the following page, or `None` if this is the last one.
    #[must_use]
    pub fn next_offset(&self) -> Option<u32> {
        self.next.as_ref()?;
        let step = self.limit.max(self.items.len() as u32);
        (step > 0).then(|| self.offset + step)
    }
}

/// A full album (`GET /albums/{id}`), including its first page of tracks.
#[derive(Debug, Clone, Deserialize)]
pub struct Album {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub album_type: String,
    #[serde(default)]
    pub release_date: String,
    #[serde(default)]
    pub artists: Vec<SimpleArtist>,
    #[serde(default)]
    pub total_tracks: u32,
    #[serde(default)]
    pub tracks: Page<Track>,
}

/// A playlist (`GET /playlists/{id}`), including its first page of entries.
#[derive(Debug, Clone, Deserialize)]
pub struct Playlist {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tracks: Page<PlaylistEntry>,
}

/// An entry of a playlist or of the saved-tracks collection.
#[derive(Debug, Clone, Deserialize)]
pub struct PlaylistEntry {
    #[serde(default)]
    pub track: Option<Track>,
}

/// An artist (`GET /artists/{id}`).
#[derive(Debug, Clone, Deserialize)]
pub struct Artist {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub genres: Vec<String>,
}

/// Response of `GET /artists/{id}/top-tracks`.
#[derive(Debug, Clone, Deserialize)]
pub struct TopTracks {
    #[serde(default)]
    pub tracks: Vec<Track>,
}

/// A podcast show (`GET /shows/{id}`, also embedded in episodes).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Show {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub publisher: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub images: Vec<Image>,
    #[serde(default)]
    pub total_episodes: Option<u32>,
}
