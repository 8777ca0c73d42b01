//! Assembles playback snapshots from the remote playback descriptor.

use std::sync::Arc;

use crate::artwork::{ArtworkChain, ArtworkColorCache};
use crate::context::ContextResolver;
use crate::model::{PlaybackSnapshot, RepeatMode};
use crate::protocol_constants::{BLANK, LOCAL_RELEASE};
use crate::remote::models::{CurrentlyPlaying, PlayingItem};
use crate::remote::{ExecutorResult, Remote};
use crate::utils::{or_blank, release_year};

/// Item-specific snapshot fields.
struct ItemFields {
    id: String,
    artists: Vec<String>,
    title: String,
    album: String,
    release: String,
    description: String,
    track_number: u32,
    disc_number: u32,
    duration_ms: u64,
}

impl ItemFields {
    fn of(item: &PlayingItem) -> Option<Self> {
        match item {
            PlayingItem::Track(t) => {
                let album = t.album.as_ref();
                let release = if t.is_local {
                    LOCAL_RELEASE.to_string()
                } else {
                    album
                        .and_then(|a| a.release_date.as_deref())
                        .and_then(release_year)
                        .unwrap_or(LOCAL_RELEASE)
                        .to_string()
                };
                Some(Self {
                    // Local files have no id; their URI is stable enough.
                    id: or_blank(t.id.clone().unwrap_or_else(|| t.uri.clone())),
                    artists: t.artist_names(),
                    title: or_blank(t.name.clone()),
                    album: or_blank(album.map(|a| a.name.clone()).unwrap_or_default()),
                    release,
                    description: BLANK.to_string(),
                    track_number: t.track_number,
                    disc_number: t.disc_number,
                    duration_ms: t.duration_ms,
                })
            }
            PlayingItem::Episode(e) => {
                let show = e.show.as_ref();
                Some(Self {
                    id: or_blank(e.id.clone()),
                    artists: show
                        .map(|s| vec![s.publisher.clone()])
                        .unwrap_or_default(),
                    title: or_blank(e.name.clone()),
                    album: or_blank(show.map(|s| s.name.clone()).unwrap_or_default()),
                    release: e
                        .release_date
                        .as_deref()
                        .and_then(release_year)
                        .unwrap_or(LOCAL_RELEASE)
                        .to_string(),
                    description: or_blank(e.description.clone()),
                    track_number: 0,
                    disc_number: 0,
                    duration_ms: e.duration_ms,
                })
            }
            PlayingItem::Unsupported => None,
        }
    }
}

/// Builds complete snapshots, delegating context and artwork resolution.
pub struct SnapshotBuilder {
    remote: Remote,
    resolver: ContextResolver,
    artwork: ArtworkChain,
    colors: Arc<ArtworkColorCache>,
    deploy_time: u64,
}

impl SnapshotBuilder {
    pub fn new(
        remote: Remote,
        resolver: ContextResolver,
        artwork: ArtworkChain,
        colors: Arc<ArtworkColorCache>,
        deploy_time: u64,
    ) -> Self {
        Self {
            remote,
            resolver,
            artwork,
            colors,
            deploy_time,
        }
    }

    /// Builds a snapshot with every field populated.
    ///
    /// `full` forces context re-resolution. Returns `None` when nothing
    /// displayable is playing or the remote service is unavailable; the
    /// failure is logged and the next tick tries again.
    pub async fn build(&self, full: bool) -> Option<PlaybackSnapshot> {
        match self.try_build(full).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                log::error!("[Snapshot] Giving up on this tick: {}", e);
                None
            }
        }
    }

    async fn try_build(&self, full: bool) -> ExecutorResult<Option<PlaybackSnapshot>> {
        let api = &self.remote.api;
        let playing = self
            .remote
            .executor
            .execute("current_playback", || api.current_playback())
            .await?;

        let Some(playing) = playing else {
            log::trace!("[Snapshot] Nothing is playing");
            return Ok(None);
        };
        let Some(item) = playing.item.as_ref() else {
            return Ok(None);
        };
        let Some(fields) = ItemFields::of(item) else {
            log::debug!("[Snapshot] Skipping unsupported item type");
            return Ok(None);
        };

        let context = self
            .resolver
            .resolve(playing.context.as_ref(), item, full)
            .await?;
        let image = self.artwork.resolve(item).await;
        let image_colors = self.colors.colors_for(&image).await;

        let CurrentlyPlaying {
            device,
            repeat_state,
            shuffle_state,
            progress_ms,
            is_playing,
            ..
        } = playing;
        let listing = &context.listing;

        Ok(Some(PlaybackSnapshot {
            full: false,
            id: Some(fields.id),
            paused: Some(!is_playing),
            shuffle: Some(shuffle_state.unwrap_or(false)),
            repeat: Some(
                repeat_state
                    .as_deref()
                    .map_or(RepeatMode::Off, RepeatMode::from_remote),
            ),
            volume: Some(
                device
                    .as_ref()
                    .and_then(|d| d.volume_percent)
                    .unwrap_or(0)
                    .min(100),
            ),
            device: Some(or_blank(device.map(|d| d.name).unwrap_or_default())),
            context_signature: Some(context.signature.clone()),
            context_name: Some(or_blank(context.name.clone())),
            context_type: Some(context.context_type),
            context_description: Some(or_blank(listing.description.clone())),
            artists: Some(if fields.artists.is_empty() {
                vec![BLANK.to_string()]
            } else {
                fields.artists
            }),
            title: Some(fields.title),
            album: Some(fields.album),
            release: Some(fields.release),
            description: Some(fields.description),
            track_number: Some(fields.track_number),
            disc_number: Some(fields.disc_number),
            time_total: Some(fields.duration_ms),
            time_current: Some(progress_ms.unwrap_or(0)),
            image: Some(image),
            image_colors: Some(image_colors),
            track_count: Some(listing.track_count),
            total_time: Some(listing.total_time),
            listing: Some(listing.listing.clone()),
            listing_index: Some(context.index),
            deploy_time: Some(self.deploy_time),
        }))
    }
}
