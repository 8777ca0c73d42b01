//! Playback context resolution.
//!
//! The [`ContextResolver`] turns the raw context descriptor of the current
//! playback (album, playlist, artist, show, saved tracks, or nothing at all)
//! into a display name, a [`ContextType`] and an ordered track listing.
//!
//! Resolution costs extra remote calls, so the result is cached under the
//! context *signature* (the context URI). A single entry is kept: it is reused
//! as long as the signature is unchanged and replaced when it changes.

mod strategies;

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;

pub use strategies::{
    AlbumStrategy, ArtistStrategy, CollectionStrategy, ContextStrategy, PlaylistStrategy,
    ShowStrategy,
};

use crate::model::{ContextType, ListTrack};
use crate::protocol_constants::{BLANK, NOT_IN_LISTING, QUEUE_PREFIX};
use crate::remote::models::{PlaybackContext, PlayingItem, Track};
use crate::remote::{ExecutorError, ExecutorResult, Remote};
use crate::state::Config;
use crate::utils::uri_id;

// ─────────────────────────────────────────────────────────────────────────────
// Types
// ─────────────────────────────────────────────────────────────────────────────

/// Context kinds with a dedicated resolution strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextKind {
    Album,
    Playlist,
    Artist,
    Show,
    Collection,
}

impl ContextKind {
    /// Parses the service's context `type` value.
    #[must_use]
    pub fn parse(kind: &str) -> Option<Self> {
        match kind {
            "album" => Some(Self::Album),
            "playlist" => Some(Self::Playlist),
            "artist" => Some(Self::Artist),
            "show" => Some(Self::Show),
            "collection" => Some(Self::Collection),
            _ => None,
        }
    }
}

/// Item-independent result of resolving a context. This is what gets cached.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedListing {
    pub name: String,
    pub context_type: ContextType,
    pub description: String,
    /// Ordered listing (a bounded prefix for large playlists).
    pub listing: Vec<ListTrack>,
    /// Number of items in the whole context.
    pub track_count: usize,
    /// Combined duration of the listing (milliseconds).
    pub total_time: u64,
}

/// The resolved context as seen by the currently playing item.
#[derive(Debug, Clone)]
pub struct ResolvedContext {
    pub signature: String,
    /// Display name, with the queue marker when an album item is played out of order.
    pub name: String,
    pub context_type: ContextType,
    pub listing: Arc<ResolvedListing>,
    /// Index of the current item in the listing, or [`NOT_IN_LISTING`].
    pub index: i32,
}

impl ResolvedListing {
    /// Whether this is the item-only listing of a [`ContextType::Search`] or
    /// [`ContextType::Fallback`] context.
    #[must_use]
    pub fn is_single_item(&self) -> bool {
        matches!(self.context_type, ContextType::Search | ContextType::Fallback)
    }
}

struct ContextCacheEntry {
    signature: String,
    listing: Arc<ResolvedListing>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Item Helpers
// ─────────────────────────────────────────────────────────────────────────────

pub(crate) fn listing_entry(track: &Track) -> ListTrack {
    ListTrack {
        id: track.id.clone(),
        artists: track.artist_names(),
        title: track.name.clone(),
        length_ms: track.duration_ms,
    }
}

/// The playing item as a listing entry. Episodes are credited to their show.
pub(crate) fn item_entry(item: &PlayingItem) -> Option<ListTrack> {
    match item {
        PlayingItem::Track(t) => Some(listing_entry(t)),
        PlayingItem::Episode(e) => Some(ListTrack {
            id: Some(e.id.clone()),
            artists: e.show.iter().map(|s| s.name.clone()).collect(),
            title: e.name.clone(),
            length_ms: e.duration_ms,
        }),
        PlayingItem::Unsupported => None,
    }
}

/// Finds `current` in `listing` by id, or by artist set and title when the
/// item has no stable id (local files).
pub(crate) fn locate(listing: &[ListTrack], current: &ListTrack) -> i32 {
    let position = match &current.id {
        Some(id) => listing.iter().position(|t| t.id.as_ref() == Some(id)),
        None => {
            let artists: BTreeSet<&String> = current.artists.iter().collect();
            listing.iter().position(|t| {
                t.title == current.title && t.artists.iter().collect::<BTreeSet<_>>() == artists
            })
        }
    };
    position
        .and_then(|i| i32::try_from(i).ok())
        .unwrap_or(NOT_IN_LISTING)
}

/// Cheap identity of "what is playing in": the context URI, or the item
/// itself when playback has no context.
pub(crate) fn signature_of(context: Option<&PlaybackContext>, item: &PlayingItem) -> String {
    match context {
        Some(c) => c.uri.clone(),
        None => {
            let uri = match item {
                PlayingItem::Track(t) => t.uri.as_str(),
                PlayingItem::Episode(e) => e.uri.as_str(),
                PlayingItem::Unsupported => "",
            };
            format!("search:{}", uri)
        }
    }
}

/// Single-item listing for playback without a resolvable context.
///
/// Depends on the item, so a cached one is rebuilt for every new item.
fn single_item(item: &PlayingItem, context_type: ContextType) -> ResolvedListing {
    let entry = item_entry(item).unwrap_or_else(|| ListTrack {
        id: None,
        artists: Vec::new(),
        title: String::new(),
        length_ms: 0,
    });
    ResolvedListing {
        name: format!("SEARCH: {} – {}", entry.artists.join(", "), entry.title),
        context_type,
        description: BLANK.to_string(),
        total_time: entry.length_ms,
        track_count: 1,
        listing: vec![entry],
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Resolver
// ─────────────────────────────────────────────────────────────────────────────

/// Resolves and caches the active playback context.
pub struct ContextResolver {
    remote: Remote,
    strategies: HashMap<ContextKind, Box<dyn ContextStrategy>>,
    cache: Mutex<Option<ContextCacheEntry>>,
}

impl ContextResolver {
    /// Creates a resolver with the standard strategy table.
    pub fn new(remote: Remote, config: &Config) -> Self {
        let mut strategies: HashMap<ContextKind, Box<dyn ContextStrategy>> = HashMap::new();
        strategies.insert(
            ContextKind::Album,
            Box::new(AlbumStrategy {
                immediate_fetch_limit: config.album_immediate_fetch_limit,
            }),
        );
        strategies.insert(
            ContextKind::Playlist,
            Box::new(PlaylistStrategy {
                prefix_size: config.playlist_prefix_size,
            }),
        );
        strategies.insert(
            ContextKind::Collection,
            Box::new(CollectionStrategy {
                prefix_size: config.playlist_prefix_size,
            }),
        );
        strategies.insert(ContextKind::Artist, Box::new(ArtistStrategy));
        strategies.insert(ContextKind::Show, Box::new(ShowStrategy));

        Self::with_strategies(remote, strategies)
    }

    /// Creates a resolver with a custom strategy table.
    pub fn with_strategies(
        remote: Remote,
        strategies: HashMap<ContextKind, Box<dyn ContextStrategy>>,
    ) -> Self {
        Self {
            remote,
            strategies,
            cache: Mutex::new(None),
        }
    }

    /// Signature of the cached context, if any.
    #[must_use]
    pub fn current_signature(&self) -> Option<String> {
        self.cache.lock().as_ref().map(|e| e.signature.clone())
    }

    fn cached_listing(&self, signature: &str) -> Option<Arc<ResolvedListing>> {
        self.cache
            .lock()
            .as_ref()
            .filter(|e| e.signature == signature)
            .map(|e| Arc::clone(&e.listing))
    }

    /// Resolves the context of `item`.
    ///
    /// Resolution is skipped and the cached listing reused when the signature
    /// is unchanged and `force_full` is false.
    ///
    /// # Errors
    /// Returns [`ExecutorError::Exhausted`] when the remote service stays
    /// unavailable. A rejected request degrades to a [`ContextType::Fallback`]
    /// context instead.
    pub async fn resolve(
        &self,
        context: Option<&PlaybackContext>,
        item: &PlayingItem,
        force_full: bool,
    ) -> ExecutorResult<ResolvedContext> {
        let signature = signature_of(context, item);

        let cached = if force_full {
            None
        } else {
            self.cached_listing(&signature)
        };

        let listing = match cached {
            Some(listing) if listing.is_single_item() => {
                Arc::new(single_item(item, listing.context_type))
            }
            Some(listing) => listing,
            None => {
                log::debug!("[Context] Resolving {}", signature);
                let listing = Arc::new(self.resolve_listing(context, item).await?);
                *self.cache.lock() = Some(ContextCacheEntry {
                    signature: signature.clone(),
                    listing: Arc::clone(&listing),
                });
                listing
            }
        };

        let index = item_entry(item).map_or(NOT_IN_LISTING, |e| locate(&listing.listing, &e));
        let album_like = matches!(
            listing.context_type,
            ContextType::Album | ContextType::Ep | ContextType::Single | ContextType::Compilation
        );
        let (name, context_type) = if album_like && index == NOT_IN_LISTING {
            (
                format!("{}{}", QUEUE_PREFIX, listing.name),
                ContextType::QueueInAlbum,
            )
        } else {
            (listing.name.clone(), listing.context_type)
        };

        Ok(ResolvedContext {
            signature,
            name,
            context_type,
            listing,
            index,
        })
    }

    async fn resolve_listing(
        &self,
        context: Option<&PlaybackContext>,
        item: &PlayingItem,
    ) -> ExecutorResult<ResolvedListing> {
        let Some(context) = context else {
            return Ok(single_item(item, ContextType::Search));
        };

        let strategy = ContextKind::parse(&context.kind).and_then(|k| self.strategies.get(&k));
        let Some(strategy) = strategy else {
            log::info!("[Context] Unsupported context type '{}'", context.kind);
            return Ok(single_item(item, ContextType::Fallback));
        };

        match strategy.resolve(&self.remote, uri_id(&context.uri), item).await {
            Ok(listing) => Ok(listing),
            Err(e @ ExecutorError::Exhausted { .. }) => Err(e),
            Err(e) => {
                log::warn!("[Context] Falling back for {}: {}", context.uri, e);
                Ok(single_item(item, ContextType::Fallback))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::models::{
        Album, Artist, CurrentlyPlaying, Page, Playlist, PlaylistEntry, Show, SimpleArtist,
    };
    use crate::remote::{
        CredentialRefresher, PlaybackApi, RemoteCallExecutor, RemoteError, RemoteResult,
        RetryPolicy, SingleFlightRefresher,
    };
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn track(id: &str, title: &str) -> Track {
        Track {
            id: Some(id.to_string()),
            uri: format!("spotify:track:{}", id),
            name: title.to_string(),
            artists: vec![SimpleArtist {
                id: None,
                name: "Band".into(),
            }],
            duration_ms: 180_000,
            ..Default::default()
        }
    }

    fn page<T>(items: Vec<T>, offset: u32, total: u32, more: bool) -> Page<T> {
        Page {
            limit: items.len() as u32,
            items: items.into_iter().map(Some).collect(),
            next: more.then(|| "next".to_string()),
            offset,
            total,
        }
    }

    #[derive(Default)]
    struct MockApi {
        album_calls: AtomicUsize,
        album_page_calls: AtomicUsize,
        playlist_calls: AtomicUsize,
        reject_playlists: bool,
    }

    #[async_trait]
    impl PlaybackApi for MockApi {
        async fn current_playback(&self) -> RemoteResult<Option<CurrentlyPlaying>> {
            Ok(None)
        }

        async fn album(&self, id: &str) -> RemoteResult<Album> {
            self.album_calls.fetch_add(1, Ordering::SeqCst);
            Ok(Album {
                id: id.to_string(),
                name: "Abbey Road".into(),
                album_type: "album".into(),
                release_date: "1969-09-26".into(),
                artists: vec![SimpleArtist {
                    id: None,
                    name: "The Beatles".into(),
                }],
                total_tracks: 3,
                tracks: page(vec![track("t1", "One"), track("t2", "Two"), track("t3", "Three")], 0, 3, false),
            })
        }

        async fn album_tracks(&self, _id: &str, offset: u32, _limit: u32) -> RemoteResult<Page<Track>> {
            self.album_page_calls.fetch_add(1, Ordering::SeqCst);
            Ok(page(vec![track("t9", "Nine")], offset, 4, false))
        }

        async fn playlist(&self, id: &str) -> RemoteResult<Playlist> {
            self.playlist_calls.fetch_add(1, Ordering::SeqCst);
            if self.reject_playlists {
                return Err(RemoteError::Rejected {
                    status: 404,
                    message: "not found".into(),
                });
            }
            Ok(Playlist {
                id: id.to_string(),
                name: "Road Trip".into(),
                description: None,
                tracks: page(
                    vec![
                        PlaylistEntry { track: Some(track("p1", "First")) },
                        PlaylistEntry { track: None },
                        PlaylistEntry { track: Some(track("p2", "Second")) },
                    ],
                    0,
                    3,
                    false,
                ),
            })
        }

        async fn playlist_tracks(&self, _id: &str, offset: u32, _limit: u32) -> RemoteResult<Page<PlaylistEntry>> {
            Ok(page(Vec::new(), offset, 0, false))
        }

        async fn saved_tracks(&self, offset: u32, _limit: u32) -> RemoteResult<Page<PlaylistEntry>> {
            Ok(page(Vec::new(), offset, 0, false))
        }

        async fn artist(&self, id: &str) -> RemoteResult<Artist> {
            Ok(Artist {
                id: id.to_string(),
                name: "Band".into(),
                genres: vec!["rock".into()],
            })
        }

        async fn artist_top_tracks(&self, _id: &str) -> RemoteResult<Vec<Track>> {
            Ok(vec![track("t1", "One")])
        }

        async fn show(&self, id: &str) -> RemoteResult<Show> {
            Ok(Show {
                id: id.to_string(),
                name: "Talk".into(),
                total_episodes: Some(12),
                ..Default::default()
            })
        }
    }

    struct NoopRefresher;

    #[async_trait]
    impl CredentialRefresher for NoopRefresher {
        async fn refresh(&self) -> RemoteResult<()> {
            Ok(())
        }
    }

    fn resolver(api: Arc<MockApi>, config: &Config) -> ContextResolver {
        let refresher = Arc::new(SingleFlightRefresher::new(Arc::new(NoopRefresher)));
        let executor = Arc::new(RemoteCallExecutor::new(RetryPolicy::default(), refresher));
        ContextResolver::new(Remote::new(api, executor), config)
    }

    fn context(kind: &str, uri: &str) -> PlaybackContext {
        PlaybackContext {
            kind: kind.to_string(),
            uri: uri.to_string(),
        }
    }

    #[tokio::test]
    async fn unchanged_signature_skips_resolution() {
        let api = Arc::new(MockApi::default());
        let resolver = resolver(api.clone(), &Config::default());
        let ctx = context("album", "spotify:album:abc");

        let first = resolver
            .resolve(Some(&ctx), &PlayingItem::Track(track("t1", "One")), false)
            .await
            .unwrap();
        let second = resolver
            .resolve(Some(&ctx), &PlayingItem::Track(track("t2", "Two")), false)
            .await
            .unwrap();

        assert_eq!(api.album_calls.load(Ordering::SeqCst), 1);
        assert_eq!(first.name, "ALBUM: The Beatles – Abbey Road (1969)");
        assert_eq!(first.index, 0);
        assert_eq!(second.index, 1);
        assert_eq!(resolver.current_signature().as_deref(), Some("spotify:album:abc"));

        resolver
            .resolve(Some(&ctx), &PlayingItem::Track(track("t2", "Two")), true)
            .await
            .unwrap();
        assert_eq!(api.album_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn short_albums_are_not_paginated_and_queue_is_detected() {
        let api = Arc::new(MockApi::default());
        let resolver = resolver(api.clone(), &Config::default());
        let ctx = context("album", "spotify:album:abc");

        let resolved = resolver
            .resolve(Some(&ctx), &PlayingItem::Track(track("zz", "Elsewhere")), false)
            .await
            .unwrap();

        assert_eq!(api.album_page_calls.load(Ordering::SeqCst), 0);
        assert_eq!(resolved.index, NOT_IN_LISTING);
        assert_eq!(resolved.context_type, ContextType::QueueInAlbum);
        assert!(resolved.name.starts_with(QUEUE_PREFIX));
    }

    #[tokio::test]
    async fn playlist_listing_drops_missing_tracks() {
        let api = Arc::new(MockApi::default());
        let resolver = resolver(api.clone(), &Config::default());
        let ctx = context("playlist", "spotify:playlist:xyz");

        let resolved = resolver
            .resolve(Some(&ctx), &PlayingItem::Track(track("p2", "Second")), false)
            .await
            .unwrap();

        assert_eq!(resolved.name, "Road Trip");
        assert_eq!(resolved.context_type, ContextType::Playlist);
        assert_eq!(resolved.listing.listing.len(), 2);
        assert_eq!(resolved.listing.total_time, 360_000);
        assert_eq!(resolved.index, 1);
    }

    #[tokio::test]
    async fn rejected_context_falls_back_to_single_item() {
        let api = Arc::new(MockApi {
            reject_playlists: true,
            ..Default::default()
        });
        let resolver = resolver(api.clone(), &Config::default());
        let ctx = context("playlist", "spotify:playlist:private");

        let resolved = resolver
            .resolve(Some(&ctx), &PlayingItem::Track(track("p1", "First")), false)
            .await
            .unwrap();

        assert_eq!(resolved.context_type, ContextType::Fallback);
        assert_eq!(resolved.listing.track_count, 1);
        assert_eq!(resolved.index, 0);
        assert_eq!(resolved.name, "SEARCH: Band – First");
        assert_eq!(api.playlist_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn fallback_follows_the_current_item() {
        let api = Arc::new(MockApi {
            reject_playlists: true,
            ..Default::default()
        });
        let resolver = resolver(api.clone(), &Config::default());
        let ctx = context("playlist", "spotify:playlist:private");

        resolver
            .resolve(Some(&ctx), &PlayingItem::Track(track("p1", "First")), false)
            .await
            .unwrap();
        let second = resolver
            .resolve(Some(&ctx), &PlayingItem::Track(track("p2", "Second")), false)
            .await
            .unwrap();

        assert_eq!(second.name, "SEARCH: Band – Second");
        assert_eq!(second.context_type, ContextType::Fallback);
        assert_eq!(second.index, 0);
        assert_eq!(second.listing.listing[0].title, "Second");
        // The rejected context is not requested again.
        assert_eq!(api.playlist_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unsupported_context_uses_search_display() {
        let api = Arc::new(MockApi::default());
        let resolver = resolver(api, &Config::default());
        let ctx = context("audiobook", "spotify:audiobook:b");

        let resolved = resolver
            .resolve(Some(&ctx), &PlayingItem::Track(track("t1", "One")), false)
            .await
            .unwrap();

        assert_eq!(resolved.name, "SEARCH: Band – One");
        assert_eq!(resolved.context_type, ContextType::Fallback);
    }

    #[tokio::test]
    async fn no_context_resolves_as_search() {
        let api = Arc::new(MockApi::default());
        let resolver = resolver(api, &Config::default());

        let resolved = resolver
            .resolve(None, &PlayingItem::Track(track("t1", "One")), false)
            .await
            .unwrap();

        assert_eq!(resolved.name, "SEARCH: Band – One");
        assert_eq!(resolved.context_type, ContextType::Search);
        assert_eq!(resolved.signature, "search:spotify:track:t1");
    }

    #[tokio::test]
    async fn artist_and_show_contexts() {
        let api = Arc::new(MockApi::default());
        let resolver = resolver(api, &Config::default());
        let item = PlayingItem::Track(track("t1", "One"));

        let artist = resolver
            .resolve(Some(&context("artist", "spotify:artist:a")), &item, false)
            .await
            .unwrap();
        assert_eq!(artist.name, "ARTIST: Band");
        assert_eq!(artist.listing.description, "rock");

        let show = resolver
            .resolve(Some(&context("show", "spotify:show:s")), &item, false)
            .await
            .unwrap();
        assert_eq!(show.name, "PODCAST: Talk");
        assert_eq!(show.listing.track_count, 12);
        assert!(show.listing.listing.is_empty());
    }

    #[test]
    fn locate_falls_back_to_artists_and_title_without_id() {
        let listing = vec![
            ListTrack {
                id: None,
                artists: vec!["B".into(), "A".into()],
                title: "Local".into(),
                length_ms: 1,
            },
        ];
        let current = ListTrack {
            id: None,
            artists: vec!["A".into(), "B".into()],
            title: "Local".into(),
            length_ms: 1,
        };
        assert_eq!(locate(&listing, &current), 0);
        let other = ListTrack {
            title: "Other".into(),
            ..current
        };
        assert_eq!(locate(&listing, &other), NOT_IN_LISTING);
    }
}
