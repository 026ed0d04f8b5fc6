//! Route progress sources.
//!
//! Providers never own the progress feed; they are handed a [`ProgressSource`]
//! when attached and subscribe to it when a host starts consuming
//! notifications.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::stream::{self, BoxStream, StreamExt};
use log::{debug, warn};
use tokio::sync::broadcast::{self, error::RecvError};

use crate::RouteProgress;

/// Anything that publishes route progress snapshots.
pub trait ProgressSource: Send + Sync {
    /// Start receiving snapshots, beginning with the most recent one if the
    /// source has published before.
    ///
    /// The stream ends when the source shuts down.
    fn subscribe(&self) -> BoxStream<'static, Arc<RouteProgress>>;
}

/// In-process progress feed fanning snapshots out to every subscriber.
///
/// A new subscriber first receives the latest published snapshot. Slow
/// subscribers skip ahead to the most recent snapshots instead of blocking the
/// publisher.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use driver_notification::{ProgressFeed, ProgressSource, Route, RouteProgress};
///
/// let feed = ProgressFeed::new();
/// let _updates = feed.subscribe();
///
/// let progress = RouteProgress::new(Arc::new(Route::default()), 0, 0);
/// assert_eq!(feed.publish(progress), 1);
/// ```
#[derive(Debug)]
pub struct ProgressFeed {
    sender: broadcast::Sender<Arc<RouteProgress>>,
    latest: Mutex<Option<Arc<RouteProgress>>>,
}

impl ProgressFeed {
    /// Snapshots kept for a subscriber that has fallen behind.
    pub const DEFAULT_CAPACITY: usize = 64;

    /// Largest backlog a feed keeps; larger capacities are clamped to it.
    pub const MAX_CAPACITY: usize = 4096;

    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    /// Capacity is clamped to `1..=MAX_CAPACITY`.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.clamp(1, Self::MAX_CAPACITY));
        Self {
            sender,
            latest: Mutex::new(None),
        }
    }

    /// Publish a snapshot, returning how many subscribers will see it.
    pub fn publish(&self, progress: RouteProgress) -> usize {
        let progress = Arc::new(progress);
        // The lock spans the send so a new subscriber sees each snapshot once
        let mut latest = self.latest();
        *latest = Some(Arc::clone(&progress));

        match self.sender.send(progress) {
            Ok(receivers) => receivers,
            Err(_) => {
                debug!("[ProgressFeed] No subscribers, snapshot dropped");
                0
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    fn latest(&self) -> MutexGuard<'_, Option<Arc<RouteProgress>>> {
        self.latest.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ProgressFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSource for ProgressFeed {
    fn subscribe(&self) -> BoxStream<'static, Arc<RouteProgress>> {
        let (latest, receiver) = {
            let latest = self.latest();
            (latest.clone(), self.sender.subscribe())
        };

        let updates = stream::unfold(receiver, |mut receiver| async move {
            loop {
                match receiver.recv().await {
                    Ok(progress) => return Some((progress, receiver)),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("[ProgressFeed] Subscriber lagged, skipped {} snapshots", skipped);
                    }
                    Err(RecvError::Closed) => return None,
                }
            }
        });

        stream::iter(latest).chain(updates).boxed()
    }
}
