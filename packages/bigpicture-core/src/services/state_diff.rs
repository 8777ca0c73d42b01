//! Sparse snapshot differencing.
//!
//! The engine owns the last published snapshot and reduces every new snapshot
//! to the fields that changed. The playback position changes on every tick, so
//! it gets a special rule: it is only emitted when it deviates from the linear
//! extrapolation of the previous position, when the track duration changed, or
//! when another field is emitted in the same diff.

use crate::events::DiffEvent;
use crate::model::PlaybackSnapshot;

/// Diffs consecutive snapshots against the last published one.
#[derive(Debug)]
pub struct StateDiffEngine {
    previous: Option<PlaybackSnapshot>,
    poll_interval_ms: u64,
    tolerance_ms: u64,
}

impl StateDiffEngine {
    /// Creates an engine without a baseline; the first diff is a full snapshot.
    #[must_use]
    pub fn new(poll_interval_ms: u64, tolerance_ms: u64) -> Self {
        Self {
            previous: None,
            poll_interval_ms,
            tolerance_ms,
        }
    }

    /// Returns true if the next diff will be a full snapshot.
    #[must_use]
    pub fn needs_full(&self) -> bool {
        self.previous.is_none()
    }

    /// The last published state, with every field the latest truth.
    #[must_use]
    pub fn baseline(&self) -> Option<&PlaybackSnapshot> {
        self.previous.as_ref()
    }

    /// Drops the baseline so the next diff is published in full.
    pub fn reset(&mut self) {
        self.previous = None;
    }

    /// Computes the diff of `current` against the baseline and makes
    /// `current` the new baseline.
    ///
    /// Returns [`DiffEvent::Empty`] if nothing needs to be published.
    pub fn diff(&mut self, current: PlaybackSnapshot) -> DiffEvent {
        let Some(previous) = self.previous.as_mut() else {
            let full = current.into_full();
            self.previous = Some(full.clone());
            return DiffEvent::Data(full);
        };

        let mut diff = PlaybackSnapshot::default();
        let mut changed = false;

        // The baseline always takes the new value, emitted or not.
        macro_rules! compare {
            ($($field:ident),* $(,)?) => {
                $(
                    if let Some(value) = current.$field {
                        if previous.$field.as_ref() != Some(&value) {
                            diff.$field = Some(value.clone());
                            changed = true;
                        }
                        previous.$field = Some(value);
                    }
                )*
            };
        }

        compare!(
            id,
            paused,
            shuffle,
            repeat,
            volume,
            device,
            context_signature,
            context_name,
            context_type,
            context_description,
            artists,
            title,
            album,
            release,
            description,
            track_number,
            disc_number,
            time_total,
            image,
            image_colors,
            track_count,
            total_time,
            listing,
            listing_index,
            deploy_time,
        );

        if let Some(progress) = current.time_current {
            let duration_changed = diff.time_total.is_some();
            let emit = match previous.time_current {
                Some(last) => {
                    let expected = last.saturating_add(self.poll_interval_ms);
                    duration_changed || changed || progress.abs_diff(expected) >= self.tolerance_ms
                }
                None => true,
            };
            if emit {
                diff.time_current = Some(progress);
                changed = true;
            }
            previous.time_current = Some(progress);
        }

        if changed {
            tracing::debug!(diff = ?diff, "[Diff] Emitting changed fields");
            DiffEvent::Data(diff)
        } else {
            DiffEvent::Empty
        }
    }
}
