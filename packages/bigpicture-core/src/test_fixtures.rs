//! Shared test fixtures: scripted remote service, image source and builders.

use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use parking_lot::Mutex;

use crate::artwork::{ArtworkChain, ArtworkColorCache, ArtworkError, ImageSource, ItemArtworkProvider};
use crate::context::ContextResolver;
use crate::remote::models::{
    Album, Artist, CurrentlyPlaying, Device, Episode, Image, Page, PlaybackContext, PlayingItem,
    Playlist, PlaylistEntry, Show, SimpleAlbum, SimpleArtist, Track,
};
use crate::remote::{
    CredentialRefresher, PlaybackApi, Remote, RemoteCallExecutor, RemoteError, RemoteResult,
    RetryPolicy, SingleFlightRefresher,
};
use crate::services::{BroadcastHub, PlaybackMirror, SnapshotBuilder, StateDiffEngine};
use crate::state::Config;

pub const DEPLOY_TIME: u64 = 1_700_000_000_000;

/// Encodes a solid-color PNG.
pub fn png(color: [u8; 4]) -> Bytes {
    let img = RgbaImage::from_pixel(16, 16, Rgba(color));
    let mut buffer = Vec::new();
    DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
        .unwrap();
    Bytes::from(buffer)
}

pub fn album_track(id: &str, title: &str) -> Track {
    Track {
        id: Some(id.to_string()),
        uri: format!("spotify:track:{}", id),
        name: title.to_string(),
        artists: vec![SimpleArtist {
            id: Some("band".into()),
            name: "The Band".into(),
        }],
        album: Some(SimpleAlbum {
            id: Some("alb1".into()),
            name: "First Record".into(),
            album_type: Some("album".into()),
            release_date: Some("1999-05-01".into()),
            images: vec![
                Image {
                    url: "https://img/64".into(),
                    width: Some(64),
                    height: Some(64),
                },
                Image {
                    url: "https://img/640".into(),
                    width: Some(640),
                    height: Some(640),
                },
            ],
        }),
        duration_ms: 200_000,
        track_number: 1,
        disc_number: 1,
        is_local: false,
    }
}

/// A track playing from album `alb1`.
pub fn track_playback(id: &str, progress_ms: u64) -> CurrentlyPlaying {
    CurrentlyPlaying {
        device: Some(Device {
            name: "Living Room".into(),
            volume_percent: Some(40),
        }),
        repeat_state: Some("context".into()),
        shuffle_state: Some(false),
        context: Some(PlaybackContext {
            kind: "album".into(),
            uri: "spotify:album:alb1".into(),
        }),
        progress_ms: Some(progress_ms),
        is_playing: true,
        item: Some(PlayingItem::Track(album_track(id, &format!("Song {}", id)))),
    }
}

/// A podcast episode played without context.
pub fn episode_playback() -> CurrentlyPlaying {
    CurrentlyPlaying {
        device: None,
        repeat_state: None,
        shuffle_state: None,
        context: None,
        progress_ms: Some(5_000),
        is_playing: true,
        item: Some(PlayingItem::Episode(Episode {
            id: "e1".into(),
            uri: "spotify:episode:e1".into(),
            name: "Episode One".into(),
            description: "Talk".into(),
            duration_ms: 1_800_000,
            release_date: Some("2023-02-01".into()),
            images: Vec::new(),
            show: Some(Show {
                id: "s1".into(),
                name: "Morning Show".into(),
                publisher: "Radio".into(),
                ..Default::default()
            }),
        })),
    }
}

/// Scripted remote service with call counters.
#[derive(Default)]
pub struct MockPlaybackApi {
    playing: Mutex<Option<CurrentlyPlaying>>,
    pub playback_calls: AtomicUsize,
    pub album_calls: AtomicUsize,
    pub fail_playback: AtomicBool,
}

impl MockPlaybackApi {
    pub fn new(playing: Option<CurrentlyPlaying>) -> Arc<Self> {
        Arc::new(Self {
            playing: Mutex::new(playing),
            ..Default::default()
        })
    }

    pub fn set_playing(&self, playing: Option<CurrentlyPlaying>) {
        *self.playing.lock() = playing;
    }
}

#[async_trait]
impl PlaybackApi for MockPlaybackApi {
    async fn current_playback(&self) -> RemoteResult<Option<CurrentlyPlaying>> {
        self.playback_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_playback.load(Ordering::SeqCst) {
            return Err(RemoteError::Transient {
                status: 503,
                message: "unavailable".into(),
            });
        }
        Ok(self.playing.lock().clone())
    }

    async fn album(&self, id: &str) -> RemoteResult<Album> {
        self.album_calls.fetch_add(1, Ordering::SeqCst);
        Ok(Album {
            id: id.to_string(),
            name: "First Record".into(),
            album_type: "album".into(),
            release_date: "1999-05-01".into(),
            artists: vec![SimpleArtist {
                id: Some("band".into()),
                name: "The Band".into(),
            }],
            total_tracks: 2,
            tracks: Page {
                items: vec![
                    Some(album_track("t1", "Song t1")),
                    Some(album_track("t2", "Song t2")),
                ],
                next: None,
                offset: 0,
                limit: 50,
                total: 2,
            },
        })
    }

    async fn album_tracks(&self, _id: &str, offset: u32, _limit: u32) -> RemoteResult<Page<Track>> {
        Ok(Page {
            offset,
            ..Default::default()
        })
    }

    async fn playlist(&self, _id: &str) -> RemoteResult<Playlist> {
        Err(RemoteError::Rejected {
            status: 404,
            message: "not found".into(),
        })
    }

    async fn playlist_tracks(
        &self,
        _id: &str,
        offset: u32,
        _limit: u32,
    ) -> RemoteResult<Page<PlaylistEntry>> {
        Ok(Page {
            offset,
            ..Default::default()
        })
    }

    async fn saved_tracks(&self, offset: u32, _limit: u32) -> RemoteResult<Page<PlaylistEntry>> {
        Ok(Page {
            offset,
            ..Default::default()
        })
    }

    async fn artist(&self, _id: &str) -> RemoteResult<Artist> {
        Err(RemoteError::Rejected {
            status: 404,
            message: "not found".into(),
        })
    }

    async fn artist_top_tracks(&self, _id: &str) -> RemoteResult<Vec<Track>> {
        Ok(Vec::new())
    }

    async fn show(&self, _id: &str) -> RemoteResult<Show> {
        Err(RemoteError::Rejected {
            status: 404,
            message: "not found".into(),
        })
    }
}

pub struct NoopRefresher;

#[async_trait]
impl CredentialRefresher for NoopRefresher {
    async fn refresh(&self) -> RemoteResult<()> {
        Ok(())
    }
}

/// Serves the same image for every URL.
pub struct StaticImageSource {
    bytes: Bytes,
    pub fetches: AtomicUsize,
}

impl StaticImageSource {
    pub fn new(bytes: Bytes) -> Arc<Self> {
        Arc::new(Self {
            bytes,
            fetches: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl ImageSource for StaticImageSource {
    async fn fetch(&self, _url: &str) -> Result<Bytes, ArtworkError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.bytes.clone())
    }
}

pub fn remote(api: Arc<MockPlaybackApi>) -> Remote {
    let refresher = Arc::new(SingleFlightRefresher::new(Arc::new(NoopRefresher)));
    let executor = Arc::new(RemoteCallExecutor::new(RetryPolicy::default(), refresher));
    Remote::new(api, executor)
}

pub fn builder(api: Arc<MockPlaybackApi>) -> SnapshotBuilder {
    let remote = remote(api);
    let resolver = ContextResolver::new(remote.clone(), &Config::default());
    let chain = ArtworkChain::new(vec![Box::new(ItemArtworkProvider)]);
    let colors = Arc::new(ArtworkColorCache::new(StaticImageSource::new(png([
        200, 30, 30, 255,
    ]))));
    SnapshotBuilder::new(remote, resolver, chain, colors, DEPLOY_TIME)
}

pub fn mirror(api: Arc<MockPlaybackApi>) -> Arc<PlaybackMirror> {
    let config = Config::default();
    Arc::new(PlaybackMirror::new(
        builder(api),
        StateDiffEngine::new(config.poll_interval_ms, config.progress_tolerance_ms),
        Arc::new(BroadcastHub::new(config.subscriber_buffer)),
    ))
}
