//! Per-kind context resolution strategies.

use async_trait::async_trait;

use super::{listing_entry, ResolvedListing};
use crate::model::{ContextType, ListTrack};
use crate::protocol_constants::{
    BLANK, FAVORITES_NAME, MAX_PAGE_SIZE, SINGLE_MAX_DURATION_MS, SINGLE_MAX_TRACKS,
};
use crate::remote::models::{Page, PlayingItem, PlaylistEntry, Track};
use crate::remote::{ExecutorResult, Remote};
use crate::utils::{or_blank, release_year};

/// Resolves one kind of playback context into its display data and listing.
#[async_trait]
pub trait ContextStrategy: Send + Sync {
    /// Resolves the context identified by `id` (the last segment of its URI).
    async fn resolve(
        &self,
        remote: &Remote,
        id: &str,
        item: &PlayingItem,
    ) -> ExecutorResult<ResolvedListing>;
}

fn summarize(listing: Vec<ListTrack>) -> (Vec<ListTrack>, u64) {
    let total_time = listing.iter().map(|t| t.length_ms).sum();
    (listing, total_time)
}

// ─────────────────────────────────────────────────────────────────────────────
// Album
// ─────────────────────────────────────────────────────────────────────────────

/// Album listing: the first page immediately, the rest paginated for long albums.
pub struct AlbumStrategy {
    pub immediate_fetch_limit: usize,
}

/// Maps the service's album type onto a display type.
///
/// Singles are re-labelled as EPs when they have more than a few tracks or
/// run longer than a few minutes in total.
pub(crate) fn release_type(album_type: &str, tracks: &[Track]) -> ContextType {
    match album_type {
        "compilation" => ContextType::Compilation,
        "single" => {
            let duration: u64 = tracks.iter().map(|t| t.duration_ms).sum();
            if tracks.len() > SINGLE_MAX_TRACKS || duration > SINGLE_MAX_DURATION_MS {
                ContextType::Ep
            } else {
                ContextType::Single
            }
        }
        _ => ContextType::Album,
    }
}

fn type_label(context_type: ContextType) -> &'static str {
    match context_type {
        ContextType::Ep => "EP",
        ContextType::Single => "SINGLE",
        ContextType::Compilation => "COMPILATION",
        _ => "ALBUM",
    }
}

#[async_trait]
impl ContextStrategy for AlbumStrategy {
    async fn resolve(
        &self,
        remote: &Remote,
        id: &str,
        _item: &PlayingItem,
    ) -> ExecutorResult<ResolvedListing> {
        let api = &remote.api;
        let album = remote.executor.execute("album", || api.album(id)).await?;

        let next = album.tracks.next_offset();
        let mut tracks: Vec<Track> = album.tracks.items.into_iter().flatten().collect();
        if album.total_tracks as usize > self.immediate_fetch_limit {
            if let Some(offset) = next {
                let rest = remote
                    .executor
                    .execute_paged("album_tracks", offset, None, |page_offset| {
                        api.album_tracks(id, page_offset, MAX_PAGE_SIZE)
                    })
                    .await?;
                tracks.extend(rest);
            }
        }

        let context_type = release_type(&album.album_type, &tracks);
        let artist = album
            .artists
            .first()
            .map_or_else(String::new, |a| a.name.clone());
        let mut name = format!("{}: {} – {}", type_label(context_type), artist, album.name);
        if let Some(year) = release_year(&album.release_date) {
            name.push_str(&format!(" ({})", year));
        }

        let track_count = (album.total_tracks as usize).max(tracks.len());
        let (listing, total_time) = summarize(tracks.iter().map(listing_entry).collect());

        log::debug!("[Context] Album '{}' resolved with {} tracks", album.name, listing.len());
        Ok(ResolvedListing {
            name,
            context_type,
            description: BLANK.to_string(),
            listing,
            track_count,
            total_time,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Playlist and Saved Tracks
// ─────────────────────────────────────────────────────────────────────────────

/// Collects at most `prefix` tracks, starting from an already fetched first page.
///
/// Entries without a track (removed or unavailable) do not count towards the
/// prefix; pages are fetched until it is filled or the list ends.
async fn playlist_prefix<F, Fut>(
    remote: &Remote,
    action: &str,
    first: Page<PlaylistEntry>,
    prefix: usize,
    mut call: F,
) -> ExecutorResult<Vec<Track>>
where
    F: FnMut(u32) -> Fut,
    Fut: std::future::Future<Output = crate::remote::RemoteResult<Page<PlaylistEntry>>>,
{
    let mut next = first.next_offset();
    let mut tracks: Vec<Track> = first
        .items
        .into_iter()
        .flatten()
        .filter_map(|e| e.track)
        .collect();

    while tracks.len() < prefix {
        let Some(offset) = next else {
            break;
        };
        let page = remote.executor.execute(action, || call(offset)).await?;
        next = page.next_offset();
        tracks.extend(page.items.into_iter().flatten().filter_map(|e| e.track));
    }
    tracks.truncate(prefix);
    Ok(tracks)
}

/// Playlist listing: a bounded prefix of its tracks.
pub struct PlaylistStrategy {
    pub prefix_size: usize,
}

#[async_trait]
impl ContextStrategy for PlaylistStrategy {
    async fn resolve(
        &self,
        remote: &Remote,
        id: &str,
        _item: &PlayingItem,
    ) -> ExecutorResult<ResolvedListing> {
        let api = &remote.api;
        let playlist = remote.executor.execute("playlist", || api.playlist(id)).await?;
        let track_count = playlist.tracks.total as usize;

        let tracks = playlist_prefix(
            remote,
            "playlist_tracks",
            playlist.tracks,
            self.prefix_size,
            |offset| api.playlist_tracks(id, offset, MAX_PAGE_SIZE),
        )
        .await?;
        let (listing, total_time) = summarize(tracks.iter().map(listing_entry).collect());

        Ok(ResolvedListing {
            name: or_blank(playlist.name),
            context_type: ContextType::Playlist,
            description: or_blank(playlist.description.unwrap_or_default()),
            track_count: track_count.max(listing.len()),
            listing,
            total_time,
        })
    }
}

/// The user's saved tracks ("Liked Songs").
pub struct CollectionStrategy {
    pub prefix_size: usize,
}

#[async_trait]
impl ContextStrategy for CollectionStrategy {
    async fn resolve(
        &self,
        remote: &Remote,
        _id: &str,
        _item: &PlayingItem,
    ) -> ExecutorResult<ResolvedListing> {
        let api = &remote.api;
        let first = remote
            .executor
            .execute("saved_tracks", || api.saved_tracks(0, MAX_PAGE_SIZE))
            .await?;
        let track_count = first.total as usize;

        let tracks = playlist_prefix(remote, "saved_tracks", first, self.prefix_size, |offset| {
            api.saved_tracks(offset, MAX_PAGE_SIZE)
        })
        .await?;
        let (listing, total_time) = summarize(tracks.iter().map(listing_entry).collect());

        Ok(ResolvedListing {
            name: FAVORITES_NAME.to_string(),
            context_type: ContextType::Favorites,
            description: BLANK.to_string(),
            track_count: track_count.max(listing.len()),
            listing,
            total_time,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Artist and Show
// ─────────────────────────────────────────────────────────────────────────────

/// Artist context: the artist's top tracks.
pub struct ArtistStrategy;

#[async_trait]
impl ContextStrategy for ArtistStrategy {
    async fn resolve(
        &self,
        remote: &Remote,
        id: &str,
        _item: &PlayingItem,
    ) -> ExecutorResult<ResolvedListing> {
        let api = &remote.api;
        let artist = remote.executor.execute("artist", || api.artist(id)).await?;
        let top = remote
            .executor
            .execute("artist_top_tracks", || api.artist_top_tracks(id))
            .await?;

        let (listing, total_time) = summarize(top.iter().map(listing_entry).collect());
        Ok(ResolvedListing {
            name: format!("ARTIST: {}", artist.name),
            context_type: ContextType::Artist,
            description: or_blank(artist.genres.join(", ")),
            track_count: listing.len(),
            listing,
            total_time,
        })
    }
}

/// Podcast context. Episodes are not listed.
pub struct ShowStrategy;

#[async_trait]
impl ContextStrategy for ShowStrategy {
    async fn resolve(
        &self,
        remote: &Remote,
        id: &str,
        _item: &PlayingItem,
    ) -> ExecutorResult<ResolvedListing> {
        let api = &remote.api;
        let show = remote.executor.execute("show", || api.show(id)).await?;

        Ok(ResolvedListing {
            name: format!("PODCAST: {}", show.name),
            context_type: ContextType::Podcast,
            description: or_blank(show.publisher),
            listing: Vec::new(),
            track_count: show.total_episodes.unwrap_or(0) as usize,
            total_time: 0,
        })
    }
}
