//! The build → diff → push pipeline.
//!
//! [`PlaybackMirror`] owns the diff engine. Snapshots are built without any
//! lock held, so a build stuck in remote backoff delays only its own caller.
//! The baseline lock covers diff, push and subscriber registration, which
//! keeps pushes in computation order and lets no subscriber join between a
//! diff and its push.
//!
//! Every build takes a sequence number when it starts. A build that finishes
//! after a later-started one has already been applied is discarded.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::broadcast_hub::{BroadcastHub, Subscription};
use super::snapshot_builder::SnapshotBuilder;
use super::state_diff::StateDiffEngine;
use crate::events::DiffEvent;
use crate::model::PlaybackSnapshot;

struct Baseline {
    engine: StateDiffEngine,
    /// Sequence number of the last applied build.
    applied: u64,
}

/// Mirrors remote playback state to the subscribers of a [`BroadcastHub`].
pub struct PlaybackMirror {
    builder: SnapshotBuilder,
    baseline: Mutex<Baseline>,
    builds: AtomicU64,
    hub: Arc<BroadcastHub>,
}

impl PlaybackMirror {
    pub fn new(builder: SnapshotBuilder, engine: StateDiffEngine, hub: Arc<BroadcastHub>) -> Self {
        Self {
            builder,
            baseline: Mutex::new(Baseline { engine, applied: 0 }),
            builds: AtomicU64::new(0),
            hub,
        }
    }

    /// The hub diffs are pushed to.
    pub fn hub(&self) -> &Arc<BroadcastHub> {
        &self.hub
    }

    pub fn subscriber_count(&self) -> usize {
        self.hub.len()
    }

    /// Builds a snapshot outside the baseline lock.
    ///
    /// `full: None` forces a full build only while there is no baseline.
    async fn build(&self, full: Option<bool>) -> Option<(u64, PlaybackSnapshot)> {
        let seq = self.builds.fetch_add(1, Ordering::SeqCst) + 1;
        let full = full.unwrap_or_else(|| self.baseline.lock().engine.needs_full());
        let snapshot = self.builder.build(full).await?;
        Some((seq, snapshot))
    }

    /// Diffs `snapshot` against the baseline and pushes the result.
    ///
    /// Returns [`DiffEvent::Empty`] for a build overtaken by a newer one.
    fn apply(
        baseline: &mut Baseline,
        hub: &BroadcastHub,
        seq: u64,
        snapshot: PlaybackSnapshot,
    ) -> DiffEvent {
        if seq < baseline.applied {
            log::debug!(
                "[Mirror] Discarding build {} (build {} already applied)",
                seq,
                baseline.applied
            );
            return DiffEvent::Empty;
        }
        baseline.applied = seq;

        let event = baseline.engine.diff(snapshot);
        if event.is_data() {
            let delivered = hub.push(event.clone());
            log::trace!("[Mirror] Diff delivered to {} subscriber(s)", delivered);
        }
        event
    }

    /// The baseline as a full snapshot, if there is one.
    fn current_full(baseline: &Baseline) -> Option<PlaybackSnapshot> {
        baseline.engine.baseline().cloned().map(PlaybackSnapshot::into_full)
    }

    /// Runs one poll cycle and broadcasts the resulting diff.
    ///
    /// Returns the computed event; [`DiffEvent::Empty`] when nothing changed
    /// or no snapshot could be built.
    pub async fn tick(&self) -> DiffEvent {
        let Some((seq, snapshot)) = self.build(None).await else {
            return DiffEvent::Empty;
        };
        let mut baseline = self.baseline.lock();
        Self::apply(&mut baseline, &self.hub, seq, snapshot)
    }

    /// Serves an on-demand poll.
    ///
    /// `full = false` behaves exactly like a tick and returns the diff. With
    /// `full = true` the caller gets the complete snapshot, while existing
    /// subscribers still receive only the diff against their baseline.
    pub async fn poll(&self, full: bool) -> DiffEvent {
        if !full {
            return self.tick().await;
        }

        let Some((seq, snapshot)) = self.build(Some(true)).await else {
            return DiffEvent::Empty;
        };
        let mut baseline = self.baseline.lock();
        Self::apply(&mut baseline, &self.hub, seq, snapshot.clone());
        DiffEvent::Data(Self::current_full(&baseline).unwrap_or_else(|| snapshot.into_full()))
    }

    /// Registers a new subscriber whose first event is a full snapshot.
    ///
    /// Existing subscribers are brought up to date with the same snapshot
    /// before the newcomer joins, so nobody misses a change. When nothing is
    /// playing the first event is a heartbeat instead.
    pub async fn subscribe(&self) -> Subscription {
        let Some((seq, snapshot)) = self.build(Some(true)).await else {
            return self.hub.register(Some(DiffEvent::Heartbeat));
        };

        let mut baseline = self.baseline.lock();
        Self::apply(&mut baseline, &self.hub, seq, snapshot.clone());
        let initial = Self::current_full(&baseline).unwrap_or_else(|| snapshot.into_full());
        self.hub.register(Some(DiffEvent::Data(initial)))
    }

    /// Pushes a keep-alive to every subscriber.
    pub fn heartbeat(&self) -> usize {
        self.hub.push(DiffEvent::Heartbeat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{mirror, track_playback, MockPlaybackApi};
    use std::time::Duration;

    #[tokio::test]
    async fn first_tick_publishes_full_snapshot() {
        let api = MockPlaybackApi::new(Some(track_playback("t1", 1_000)));
        let mirror = mirror(api);
        let mut sub = mirror.hub().register(None);

        let event = mirror.tick().await;

        assert!(event.snapshot().is_some_and(|s| s.full));
        assert_eq!(sub.try_recv().as_deref(), Some(&event));
    }

    #[tokio::test]
    async fn unchanged_state_pushes_nothing() {
        let api = MockPlaybackApi::new(Some(track_playback("t1", 1_000)));
        let mirror = mirror(api);
        mirror.tick().await;
        let mut sub = mirror.hub().register(None);

        assert_eq!(mirror.tick().await, DiffEvent::Empty);
        assert!(sub.try_recv().is_none());
    }

    #[tokio::test]
    async fn track_change_pushes_sparse_diff() {
        let api = MockPlaybackApi::new(Some(track_playback("t1", 1_000)));
        let mirror = mirror(api.clone());
        mirror.tick().await;
        let mut sub = mirror.hub().register(None);

        api.set_playing(Some(track_playback("t2", 0)));
        let event = mirror.tick().await;

        let diff = event.snapshot().unwrap();
        assert!(!diff.full);
        assert_eq!(diff.id.as_deref(), Some("t2"));
        assert_eq!(diff.listing_index, Some(1));
        assert!(diff.context_name.is_none());
        assert_eq!(sub.try_recv().as_deref(), Some(&event));
    }

    #[tokio::test]
    async fn subscriber_starts_with_full_snapshot() {
        let api = MockPlaybackApi::new(Some(track_playback("t1", 1_000)));
        let mirror = mirror(api);
        mirror.tick().await;

        let mut sub = mirror.subscribe().await;

        let first = sub.try_recv().unwrap();
        let snapshot = first.snapshot().unwrap();
        assert!(snapshot.full);
        assert_eq!(snapshot.id.as_deref(), Some("t1"));
        assert!(snapshot.listing.is_some());
        assert!(sub.try_recv().is_none());
    }

    #[tokio::test]
    async fn subscribe_brings_existing_subscribers_up_to_date() {
        let api = MockPlaybackApi::new(Some(track_playback("t1", 1_000)));
        let mirror = mirror(api.clone());
        mirror.tick().await;
        let mut existing = mirror.subscribe().await;
        existing.try_recv();

        api.set_playing(Some(track_playback("t2", 0)));
        let _newcomer = mirror.subscribe().await;

        let update = existing.try_recv().unwrap();
        assert_eq!(update.snapshot().unwrap().id.as_deref(), Some("t2"));
        // The newcomer's snapshot is now the baseline.
        assert_eq!(mirror.tick().await, DiffEvent::Empty);
    }

    #[tokio::test]
    async fn subscribe_while_idle_starts_with_heartbeat() {
        let mirror = mirror(MockPlaybackApi::new(None));
        let mut sub = mirror.subscribe().await;
        assert_eq!(sub.try_recv().as_deref(), Some(&DiffEvent::Heartbeat));
    }

    #[tokio::test]
    async fn full_poll_returns_snapshot_but_pushes_diff() {
        let api = MockPlaybackApi::new(Some(track_playback("t1", 1_000)));
        let mirror = mirror(api.clone());
        mirror.tick().await;
        let mut sub = mirror.hub().register(None);

        let polled = mirror.poll(true).await;

        assert!(polled.snapshot().is_some_and(|s| s.full && s.title.is_some()));
        // Nothing changed for the subscriber.
        assert!(sub.try_recv().is_none());
        assert_eq!(api.playback_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn incremental_poll_is_a_tick() {
        let api = MockPlaybackApi::new(Some(track_playback("t1", 1_000)));
        let mirror = mirror(api);
        assert!(mirror.poll(false).await.snapshot().is_some_and(|s| s.full));
        assert_eq!(mirror.poll(false).await, DiffEvent::Empty);
    }

    #[tokio::test]
    async fn idle_poll_is_empty() {
        let mirror = mirror(MockPlaybackApi::new(None));
        assert_eq!(mirror.poll(true).await, DiffEvent::Empty);
        assert_eq!(mirror.tick().await, DiffEvent::Empty);
    }

    #[tokio::test]
    async fn heartbeat_reaches_every_subscriber() {
        let mirror = mirror(MockPlaybackApi::new(None));
        let mut a = mirror.hub().register(None);
        let mut b = mirror.hub().register(None);

        assert_eq!(mirror.heartbeat(), 2);
        assert_eq!(a.try_recv().as_deref(), Some(&DiffEvent::Heartbeat));
        assert_eq!(b.try_recv().as_deref(), Some(&DiffEvent::Heartbeat));
    }

    /// Fails the next playback fetch and spawns a tick that stays in
    /// backoff until the clock moves past the generic retry delay.
    async fn tick_in_backoff(
        mirror: &Arc<PlaybackMirror>,
        api: &Arc<MockPlaybackApi>,
    ) -> tokio::task::JoinHandle<DiffEvent> {
        api.fail_playback.store(true, Ordering::SeqCst);
        let stuck = tokio::spawn({
            let mirror = Arc::clone(mirror);
            async move { mirror.tick().await }
        });
        tokio::time::sleep(Duration::from_millis(100)).await;
        api.fail_playback.store(false, Ordering::SeqCst);
        stuck
    }

    #[tokio::test(start_paused = true)]
    async fn subscribe_does_not_wait_for_a_tick_in_backoff() {
        let api = MockPlaybackApi::new(Some(track_playback("t1", 1_000)));
        let mirror = mirror(api.clone());
        mirror.tick().await;

        let stuck = tick_in_backoff(&mirror, &api).await;
        api.set_playing(Some(track_playback("t2", 0)));

        let mut sub = tokio::time::timeout(Duration::from_secs(5), mirror.subscribe())
            .await
            .unwrap();
        let first = sub.try_recv().unwrap();
        let snapshot = first.snapshot().unwrap();
        assert!(snapshot.full);
        assert_eq!(snapshot.id.as_deref(), Some("t2"));
        assert!(!stuck.is_finished());

        // The overtaken tick publishes nothing once its backoff ends.
        assert_eq!(stuck.await.unwrap(), DiffEvent::Empty);
        assert!(sub.try_recv().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn poll_does_not_wait_for_a_tick_in_backoff() {
        let api = MockPlaybackApi::new(Some(track_playback("t1", 1_000)));
        let mirror = mirror(api.clone());
        mirror.tick().await;

        let stuck = tick_in_backoff(&mirror, &api).await;

        let polled = tokio::time::timeout(Duration::from_secs(5), mirror.poll(true))
            .await
            .unwrap();
        assert!(polled.snapshot().is_some_and(|s| s.full));
        let diff = tokio::time::timeout(Duration::from_secs(5), mirror.poll(false))
            .await
            .unwrap();
        assert_eq!(diff, DiffEvent::Empty);

        assert_eq!(stuck.await.unwrap(), DiffEvent::Empty);
    }
}
