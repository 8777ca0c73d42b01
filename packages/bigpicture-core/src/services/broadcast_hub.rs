//! Subscriber tracking and event fan-out.
//!
//! - `BroadcastHub`: the live subscriber set, with force-close capability
//! - `Subscription`: RAII handle for one subscriber, unregistered on drop

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};
use tokio_util::sync::CancellationToken;

use crate::events::DiffEvent;

/// Holds every live subscriber channel and pushes events to all of them.
///
/// Safe to register and unregister concurrently with an in-flight push.
/// A subscriber whose channel is closed or full is pruned on the spot.
pub struct BroadcastHub {
    /// Active subscribers: id -> outgoing queue
    subscribers: DashMap<u64, mpsc::Sender<Arc<DiffEvent>>>,
    next_id: AtomicU64,
    /// Per-subscriber queue capacity.
    buffer: usize,
    /// Parent of every subscription's token. Replaced after close_all().
    global_cancel: RwLock<CancellationToken>,
}

impl BroadcastHub {
    pub fn new(buffer: usize) -> Self {
        Self {
            subscribers: DashMap::new(),
            next_id: AtomicU64::new(1),
            buffer: buffer.max(1),
            global_cancel: RwLock::new(CancellationToken::new()),
        }
    }

    /// Registers a subscriber.
    ///
    /// `initial` is queued before the subscriber joins the broadcast set, so
    /// it is always the first event the subscriber receives.
    pub fn register(self: &Arc<Self>, initial: Option<DiffEvent>) -> Subscription {
        let (tx, receiver) = mpsc::channel(self.buffer);
        if let Some(event) = initial {
            // A fresh channel has room for at least one event.
            let _ = tx.try_send(Arc::new(event));
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let cancel_token = self.global_cancel.read().child_token();
        self.subscribers.insert(id, tx);
        log::info!(
            "[Hub] Subscriber registered: {} (total: {})",
            id,
            self.subscribers.len()
        );

        Subscription {
            id,
            receiver,
            cancel_token,
            hub: Arc::clone(self),
        }
    }

    /// Unregisters a subscriber by ID.
    pub fn unregister(&self, id: u64) {
        if self.subscribers.remove(&id).is_some() {
            log::debug!(
                "[Hub] Subscriber unregistered: {} (remaining: {})",
                id,
                self.subscribers.len()
            );
        }
    }

    /// Sends `event` to every subscriber and returns how many received it.
    ///
    /// [`DiffEvent::Empty`] is never sent.
    pub fn push(&self, event: DiffEvent) -> usize {
        if event.is_empty() {
            return 0;
        }
        let event = Arc::new(event);

        let mut delivered = 0;
        let mut failed = Vec::new();
        for entry in self.subscribers.iter() {
            match entry.value().try_send(Arc::clone(&event)) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Closed(_)) => failed.push(*entry.key()),
                Err(TrySendError::Full(_)) => {
                    log::debug!("[Hub] Subscriber {} is not keeping up", entry.key());
                    failed.push(*entry.key());
                }
            }
        }

        // Removing while iterating would deadlock on the shard lock.
        for id in failed {
            self.unregister(id);
        }
        delivered
    }

    /// Returns the number of live subscribers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Signals every subscription to end.
    ///
    /// A fresh token is installed so new subscribers can still register.
    /// Returns the number of subscribers that were signaled.
    pub fn close_all(&self) -> usize {
        let count = self.subscribers.len();
        log::info!("[Hub] Closing {} subscriber(s)", count);
        let mut guard = self.global_cancel.write();
        guard.cancel();
        *guard = CancellationToken::new();
        count
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new(crate::protocol_constants::DEFAULT_SUBSCRIBER_BUFFER)
    }
}

/// One subscriber's end of the hub.
///
/// Dropping it unregisters the subscriber, even if the handler exits early.
pub struct Subscription {
    id: u64,
    receiver: mpsc::Receiver<Arc<DiffEvent>>,
    cancel_token: CancellationToken,
    hub: Arc<BroadcastHub>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Cancelled when the hub is shutting down.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel_token
    }

    /// Waits for the next event. Returns `None` once the hub dropped this subscriber.
    pub async fn recv(&mut self) -> Option<Arc<DiffEvent>> {
        self.receiver.recv().await
    }

    /// Returns the next queued event without waiting.
    pub fn try_recv(&mut self) -> Option<Arc<DiffEvent>> {
        match self.receiver.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Stops accepting events; the next push to this subscriber fails and prunes it.
    pub fn close(&mut self) {
        self.receiver.close();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.hub.unregister(self.id);
    }
}
