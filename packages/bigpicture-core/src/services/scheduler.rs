//! Periodic poll and heartbeat timers.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::playback_mirror::PlaybackMirror;

/// Drives a [`PlaybackMirror`] with two independent timers.
///
/// Both timers idle while nobody is subscribed; a new subscriber always
/// receives a fresh full snapshot, so nothing is lost by skipping those ticks.
pub struct Scheduler {
    mirror: Arc<PlaybackMirror>,
    poll_interval: Duration,
    heartbeat_interval: Duration,
    cancel_token: CancellationToken,
}

impl Scheduler {
    pub fn new(
        mirror: Arc<PlaybackMirror>,
        poll_interval: Duration,
        heartbeat_interval: Duration,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            mirror,
            poll_interval,
            heartbeat_interval,
            cancel_token,
        }
    }

    /// Spawns the poll and heartbeat loops.
    ///
    /// Both stop when the cancellation token fires; an in-flight tick
    /// (including its backoff sleeps) is abandoned at that point.
    pub fn start(&self) -> Vec<JoinHandle<()>> {
        log::info!(
            "[Scheduler] Starting (poll every {:?}, heartbeat every {:?})",
            self.poll_interval,
            self.heartbeat_interval
        );
        vec![self.spawn_poll_loop(), self.spawn_heartbeat_loop()]
    }

    fn spawn_poll_loop(&self) -> JoinHandle<()> {
        let mirror = Arc::clone(&self.mirror);
        let cancel_token = self.cancel_token.clone();
        let period = self.poll_interval;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = cancel_token.cancelled() => break,
                    _ = interval.tick() => {}
                }
                if mirror.hub().is_empty() {
                    continue;
                }
                tokio::select! {
                    _ = cancel_token.cancelled() => break,
                    _ = mirror.tick() => {}
                }
            }
            log::info!("[Scheduler] Poll loop stopped");
        })
    }

    fn spawn_heartbeat_loop(&self) -> JoinHandle<()> {
        let mirror = Arc::clone(&self.mirror);
        let cancel_token = self.cancel_token.clone();
        let period = self.heartbeat_interval;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = cancel_token.cancelled() => break,
                    _ = interval.tick() => {
                        if !mirror.hub().is_empty() {
                            let delivered = mirror.heartbeat();
                            log::trace!("[Scheduler] Heartbeat sent to {} subscriber(s)", delivered);
                        }
                    }
                }
            }
            log::info!("[Scheduler] Heartbeat loop stopped");
        })
    }
}
