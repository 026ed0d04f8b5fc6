//! # Notification Providers
//!
//! A provider is attached to a route progress source, and turns the progress it
//! publishes into driver notifications. Hosts can run several providers side by
//! side (see [`crate::NotificationHub`]); they all share the same three
//! operations.
//!
//! [`SlowTrafficProvider`] is the slow-traffic provider:
//!
//! ```text
//! progress ──► Sampler (drop or pass) ──► scanner (notify or not) ──► notification
//! ```
//!
//! Every call to [`NotificationProvider::track_notifications`] gets its own
//! [`NotificationSubscription`] with its own sampling gate, so subscribers never
//! throttle each other. Detaching the source cancels every subscription made
//! from it.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use futures::stream::{self, BoxStream, StreamExt};
use log::{debug, info, trace};
use tokio::sync::watch;

use crate::sampler::{Clock, MonotonicClock, Sampler};
use crate::{
    scan_for_slow_traffic, DetectionOptions, DriverNotification, ProgressSource, RouteProgress,
    SlowTrafficNotification,
};

/// Common shape of every driver notification provider.
pub trait NotificationProvider: Send + Sync {
    /// Remember the progress source. Nothing is subscribed yet.
    fn on_attached(&self, source: Arc<dyn ProgressSource>);

    /// Release the progress source and stop every stream derived from it.
    fn on_detached(&self, source: &dyn ProgressSource);

    /// Stream of notifications from the attached source.
    ///
    /// The source is looked up and subscribed when the stream is first polled,
    /// so a stream obtained before attaching still sees the source. Empty when
    /// nothing is attached by then. Each call starts a fresh subscription.
    fn track_notifications(&self) -> BoxStream<'static, DriverNotification>;
}

/// Attached source plus the token cancelling its subscriptions.
struct Attachment {
    source: Arc<dyn ProgressSource>,
    detached: watch::Sender<bool>,
}

impl Attachment {
    fn cancel(&self) {
        self.detached.send_replace(true);
    }
}

/// Provider emitting [`SlowTrafficNotification`]s.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use driver_notification::{
///     DetectionOptions, NotificationProvider, ProgressFeed, SlowTrafficProvider,
/// };
///
/// let provider = SlowTrafficProvider::new(DetectionOptions::default());
/// assert!(provider.subscription().is_none());
///
/// let feed = Arc::new(ProgressFeed::new());
/// provider.on_attached(feed.clone());
/// assert!(provider.is_attached());
///
/// provider.on_detached(&*feed);
/// assert!(!provider.is_attached());
/// ```
pub struct SlowTrafficProvider {
    options: watch::Sender<DetectionOptions>,
    clock: Arc<dyn Clock>,
    attachment: Arc<Mutex<Option<Attachment>>>,
}

impl SlowTrafficProvider {
    pub fn new(options: DetectionOptions) -> Self {
        Self::with_clock(options, Arc::new(MonotonicClock))
    }

    /// Use a custom time source for the sampling gate.
    pub fn with_clock(options: DetectionOptions, clock: Arc<dyn Clock>) -> Self {
        let (options, _) = watch::channel(options);
        Self {
            options,
            clock,
            attachment: Arc::new(Mutex::new(None)),
        }
    }

    /// Options used by the next scan.
    pub fn options(&self) -> DetectionOptions {
        *self.options.borrow()
    }

    /// Replace the options. Running subscriptions use them from their next scan.
    pub fn set_options(&self, options: DetectionOptions) {
        debug!("[SlowTraffic] Options updated: {:?}", options);
        self.options.send_replace(options);
    }

    pub fn is_attached(&self) -> bool {
        self.attachment().is_some()
    }

    /// Open a subscription on the attached source, for hosts that push
    /// progress themselves.
    ///
    /// Returns `None` when no source is attached.
    pub fn subscription(&self) -> Option<NotificationSubscription> {
        let attachment = self.attachment();
        let attachment = attachment.as_ref()?;
        Some(NotificationSubscription::new(
            self.options.subscribe(),
            Arc::clone(&self.clock),
            attachment,
        ))
    }

    fn attachment(&self) -> MutexGuard<'_, Option<Attachment>> {
        lock_attachment(&self.attachment)
    }
}

fn lock_attachment(slot: &Mutex<Option<Attachment>>) -> MutexGuard<'_, Option<Attachment>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Default for SlowTrafficProvider {
    fn default() -> Self {
        Self::new(DetectionOptions::default())
    }
}

impl NotificationProvider for SlowTrafficProvider {
    fn on_attached(&self, source: Arc<dyn ProgressSource>) {
        let (detached, _) = watch::channel(false);
        let previous = self.attachment().replace(Attachment { source, detached });

        if let Some(previous) = previous {
            debug!("[SlowTraffic] Replacing attached progress source");
            previous.cancel();
        }
        info!("[SlowTraffic] Attached to progress source");
    }

    fn on_detached(&self, source: &dyn ProgressSource) {
        let mut attachment = self.attachment();
        let is_current = attachment.as_ref().is_some_and(|current| {
            std::ptr::addr_eq(Arc::as_ptr(&current.source), source)
        });

        if !is_current {
            debug!("[SlowTraffic] Detach from a source that is not attached, ignoring");
            return;
        }

        if let Some(previous) = attachment.take() {
            previous.cancel();
            info!("[SlowTraffic] Detached from progress source");
        }
    }

    fn track_notifications(&self) -> BoxStream<'static, DriverNotification> {
        let slot = Arc::clone(&self.attachment);
        let options = self.options.subscribe();
        let clock = Arc::clone(&self.clock);

        // Nothing is looked up until the stream is first polled
        stream::once(async move {
            let opened = lock_attachment(&slot).as_ref().map(|attachment| {
                let subscription = NotificationSubscription::new(options, clock, attachment);
                (subscription, attachment.source.subscribe())
            });

            match opened {
                Some((subscription, updates)) => notifications(subscription, updates),
                None => {
                    debug!("[SlowTraffic] No progress source attached, nothing to track");
                    stream::empty().boxed()
                }
            }
        })
        .flatten()
        .boxed()
    }
}

/// Gate and scan every update until the source ends or is detached.
fn notifications(
    subscription: NotificationSubscription,
    updates: BoxStream<'static, Arc<RouteProgress>>,
) -> BoxStream<'static, DriverNotification> {
    stream::unfold(
        (subscription, updates),
        |(mut subscription, mut updates)| async move {
            loop {
                let progress = tokio::select! {
                    biased;
                    _ = subscription.wait_detached() => return None,
                    next = updates.next() => match next {
                        Some(progress) => progress,
                        None => return None,
                    },
                };

                if let Some(notification) = subscription.process(&progress) {
                    return Some((
                        DriverNotification::SlowTraffic(notification),
                        (subscription, updates),
                    ));
                }
            }
        },
    )
    .boxed()
}

/// One subscriber's sampling gate and cancellation token.
///
/// Feed it progress with [`NotificationSubscription::process`]. Once the source
/// it was opened on is detached, it never emits again.
pub struct NotificationSubscription {
    sampler: Sampler,
    options: watch::Receiver<DetectionOptions>,
    clock: Arc<dyn Clock>,
    detached: watch::Receiver<bool>,
}

impl NotificationSubscription {
    fn new(
        options: watch::Receiver<DetectionOptions>,
        clock: Arc<dyn Clock>,
        attachment: &Attachment,
    ) -> Self {
        Self {
            sampler: Sampler::new(),
            options,
            clock,
            detached: attachment.detached.subscribe(),
        }
    }

    /// Run one progress snapshot through the gate and the scanner.
    pub fn process(&mut self, progress: &RouteProgress) -> Option<SlowTrafficNotification> {
        if self.is_cancelled() {
            return None;
        }

        // Copy the options once so the whole cycle sees a single snapshot
        let options = *self.options.borrow();
        if !self.sampler.admit(self.clock.now(), options.sampling_period()) {
            trace!(
                "[SlowTraffic] Progress at index {} dropped by sampler",
                progress.geometry_index
            );
            return None;
        }

        let notification = scan_for_slow_traffic(progress, &options)?;
        if self.is_cancelled() {
            return None;
        }
        Some(notification)
    }

    /// True once the source this subscription was opened on is detached.
    pub fn is_cancelled(&self) -> bool {
        *self.detached.borrow() || self.detached.has_changed().is_err()
    }

    pub fn last_sample_at(&self) -> Option<Instant> {
        self.sampler.last_sample_at()
    }

    async fn wait_detached(&mut self) {
        // Errors only when the attachment is gone, which also means detached
        let _ = self.detached.wait_for(|detached| *detached).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        CongestionRange, GeometryRange, LegAnnotation, ManualClock, ProgressFeed, Route, RouteLeg,
    };
    use futures::FutureExt;
    use std::time::Duration;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_millis(100);

    fn congested_route() -> Arc<Route> {
        // Congested from index 0 to 5, free flowing at 6
        Arc::new(Route::new(vec![RouteLeg::new(LegAnnotation::new(
            vec![100.0; 7],
            vec![30.0, 30.0, 30.0, 30.0, 30.0, 30.0, 10.0],
            vec![Some(36.0); 7],
            vec![Some(90), Some(90), Some(90), Some(90), Some(90), Some(90), Some(10)],
        ))]))
    }

    fn options(sampling_ms: u64) -> DetectionOptions {
        DetectionOptions::builder()
            .congestion_range(CongestionRange::new(60, 100))
            .sampling_period(Duration::from_millis(sampling_ms))
            .min_delay(Duration::from_secs(15))
            .build()
            .unwrap()
    }

    fn at(geometry_index: u32) -> RouteProgress {
        RouteProgress::new(congested_route(), 0, geometry_index)
    }

    fn start_index(notification: &DriverNotification) -> u32 {
        notification.as_slow_traffic().unwrap().geometry_range().start
    }

    /// Poll once so the stream is subscribed before anything is published.
    fn start_tracking(notifications: &mut BoxStream<'static, DriverNotification>) {
        assert!(notifications.next().now_or_never().is_none());
    }

    fn attached_provider(
        sampling_ms: u64,
    ) -> (SlowTrafficProvider, Arc<ProgressFeed>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        let provider = SlowTrafficProvider::with_clock(options(sampling_ms), clock.clone());
        let feed = Arc::new(ProgressFeed::new());
        provider.on_attached(feed.clone());
        (provider, feed, clock)
    }

    #[tokio::test]
    async fn test_unattached_stream_is_empty() {
        let provider = SlowTrafficProvider::default();
        let collected: Vec<_> = provider.track_notifications().collect().await;
        assert!(collected.is_empty());
    }

    #[tokio::test]
    async fn test_emits_notification_for_congestion() {
        let (provider, feed, _clock) = attached_provider(0);
        let mut notifications = provider.track_notifications();
        start_tracking(&mut notifications);

        feed.publish(at(0));
        let notification = timeout(WAIT, notifications.next()).await.unwrap().unwrap();
        let slow = notification.as_slow_traffic().unwrap();

        assert_eq!(slow.geometry_range(), GeometryRange::new(0, 6));
        assert_eq!(slow.delay(), Duration::from_secs(120));
    }

    #[tokio::test]
    async fn test_filters_out_cycles_without_notification() {
        let (provider, feed, _clock) = attached_provider(0);
        let mut notifications = provider.track_notifications();
        start_tracking(&mut notifications);

        // Index 6 is free flowing, index 4 has two congested samples (40s delay)
        feed.publish(at(6));
        feed.publish(at(4));

        let notification = timeout(WAIT, notifications.next()).await.unwrap().unwrap();
        assert_eq!(start_index(&notification), 4);
    }

    #[tokio::test]
    async fn test_sampling_gate_drops_early_updates() {
        let (provider, feed, clock) = attached_provider(800);
        let mut notifications = provider.track_notifications();
        start_tracking(&mut notifications);

        feed.publish(at(0));
        assert_eq!(start_index(&timeout(WAIT, notifications.next()).await.unwrap().unwrap()), 0);

        clock.advance(Duration::from_millis(1000));
        feed.publish(at(1));
        assert_eq!(start_index(&timeout(WAIT, notifications.next()).await.unwrap().unwrap()), 1);

        clock.advance(Duration::from_millis(400));
        feed.publish(at(2));
        assert!(timeout(WAIT, notifications.next()).await.is_err());

        clock.advance(Duration::from_millis(600));
        feed.publish(at(3));
        assert_eq!(start_index(&timeout(WAIT, notifications.next()).await.unwrap().unwrap()), 3);
    }

    #[tokio::test]
    async fn test_detach_ends_stream() {
        let (provider, feed, _clock) = attached_provider(0);
        let mut notifications = provider.track_notifications();
        start_tracking(&mut notifications);

        provider.on_detached(&*feed);
        assert!(timeout(WAIT, notifications.next()).await.unwrap().is_none());
        assert!(!provider.is_attached());
    }

    #[tokio::test]
    async fn test_detach_other_source_is_ignored() {
        let (provider, _feed, _clock) = attached_provider(0);
        let other = ProgressFeed::new();

        provider.on_detached(&other);
        assert!(provider.is_attached());
    }

    #[tokio::test]
    async fn test_reattach_cancels_previous_streams() {
        let (provider, _feed, _clock) = attached_provider(0);
        let mut old = provider.track_notifications();
        start_tracking(&mut old);

        let replacement = Arc::new(ProgressFeed::new());
        provider.on_attached(replacement.clone());
        assert!(timeout(WAIT, old.next()).await.unwrap().is_none());

        let mut fresh = provider.track_notifications();
        replacement.publish(at(0));
        assert!(timeout(WAIT, fresh.next()).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_subscriptions_do_not_share_gate() {
        let (provider, feed, _clock) = attached_provider(10_000);
        let mut first = provider.track_notifications();
        start_tracking(&mut first);

        feed.publish(at(0));
        assert!(timeout(WAIT, first.next()).await.unwrap().is_some());

        // The first gate is closed for 10s; a new subscriber starts open
        let mut second = provider.track_notifications();
        feed.publish(at(1));
        assert_eq!(start_index(&timeout(WAIT, second.next()).await.unwrap().unwrap()), 1);
        assert!(timeout(WAIT, first.next()).await.is_err());
    }

    #[tokio::test]
    async fn test_stream_obtained_before_attach_tracks_source() {
        let clock = Arc::new(ManualClock::default());
        let provider = SlowTrafficProvider::with_clock(options(0), clock);
        let mut notifications = provider.track_notifications();

        let feed = Arc::new(ProgressFeed::new());
        provider.on_attached(feed.clone());
        feed.publish(at(0));

        let notification = timeout(WAIT, notifications.next()).await.unwrap().unwrap();
        assert_eq!(start_index(&notification), 0);
        assert_eq!(feed.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn test_stream_subscribes_to_source_attached_at_first_poll() {
        let (provider, first_feed, _clock) = attached_provider(0);
        let mut notifications = provider.track_notifications();

        let second_feed = Arc::new(ProgressFeed::new());
        provider.on_attached(second_feed.clone());
        start_tracking(&mut notifications);
        assert_eq!(first_feed.subscriber_count(), 0);
        assert_eq!(second_feed.subscriber_count(), 1);

        second_feed.publish(at(4));
        let notification = timeout(WAIT, notifications.next()).await.unwrap().unwrap();
        assert_eq!(start_index(&notification), 4);
    }

    #[tokio::test]
    async fn test_stream_detached_before_first_poll_is_empty() {
        let (provider, feed, _clock) = attached_provider(0);
        let notifications = provider.track_notifications();

        provider.on_detached(&*feed);
        feed.publish(at(0));

        let collected: Vec<_> = timeout(WAIT, notifications.collect::<Vec<_>>()).await.unwrap();
        assert!(collected.is_empty());
        assert_eq!(feed.subscriber_count(), 0);
    }

    #[test]
    fn test_subscription_requires_attachment() {
        let provider = SlowTrafficProvider::default();
        assert!(provider.subscription().is_none());
    }

    #[test]
    fn test_subscription_process_applies_gate_then_scan() {
        let (provider, _feed, clock) = attached_provider(800);
        let mut subscription = provider.subscription().unwrap();

        let mut emitted = Vec::new();
        for (advance_ms, index) in [(0, 0), (1000, 1), (400, 2), (600, 3)] {
            clock.advance(Duration::from_millis(advance_ms));
            if let Some(n) = subscription.process(&at(index)) {
                emitted.push(n.geometry_range().start);
            }
        }
        assert_eq!(emitted, vec![0, 1, 3]);
    }

    #[test]
    fn test_subscription_silent_after_detach() {
        let (provider, feed, _clock) = attached_provider(0);
        let mut subscription = provider.subscription().unwrap();
        assert!(!subscription.is_cancelled());

        provider.on_detached(&*feed);
        assert!(subscription.is_cancelled());
        assert!(subscription.process(&at(0)).is_none());
    }

    #[test]
    fn test_reattach_starts_fresh_gate() {
        let (provider, feed, _clock) = attached_provider(10_000);
        let mut subscription = provider.subscription().unwrap();
        assert!(subscription.process(&at(0)).is_some());
        assert!(subscription.process(&at(0)).is_none());

        provider.on_detached(&*feed);
        provider.on_attached(feed.clone());

        let mut subscription = provider.subscription().unwrap();
        assert!(subscription.last_sample_at().is_none());
        assert!(subscription.process(&at(0)).is_some());
    }

    #[test]
    fn test_options_swap_applies_to_next_cycle() {
        let (provider, _feed, _clock) = attached_provider(0);
        let mut subscription = provider.subscription().unwrap();

        // Index 4: two congested samples, 40s delay
        assert!(subscription.process(&at(4)).is_some());

        let stricter = options(0)
            .to_builder()
            .min_delay(Duration::from_secs(60))
            .build()
            .unwrap();
        provider.set_options(stricter);
        assert!(subscription.process(&at(4)).is_none());
        assert!(subscription.process(&at(3)).is_some());
        assert_eq!(provider.options().min_delay(), Duration::from_secs(60));
    }

    #[test]
    fn test_identical_options_swap_keeps_gate_state() {
        let (provider, _feed, clock) = attached_provider(800);
        let mut subscription = provider.subscription().unwrap();

        assert!(subscription.process(&at(0)).is_some());
        let sampled_at = subscription.last_sample_at();

        provider.set_options(provider.options());
        clock.advance(Duration::from_millis(400));
        assert!(subscription.process(&at(1)).is_none());
        assert_eq!(subscription.last_sample_at(), sampled_at);

        clock.advance(Duration::from_millis(400));
        assert!(subscription.process(&at(1)).is_some());
    }
}
