//! End-to-end flow: a host feed, two providers behind a hub, merged stream.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::BoxStream;
use futures::{FutureExt, StreamExt};
use tokio::time::timeout;

use driver_notification::{
    CongestionRange, DetectionOptions, DriverNotification, GeometryRange, LegAnnotation,
    NotificationHub, ProgressFeed, Route, RouteLeg, RouteProgress, SlowTrafficProvider,
};

const WAIT: Duration = Duration::from_millis(200);

fn route() -> Arc<Route> {
    // Heavy traffic at 0..=1, severe traffic at 2..=3, free flow at 4
    Arc::new(Route::new(vec![RouteLeg::new(LegAnnotation::new(
        vec![100.0; 5],
        vec![40.0, 40.0, 60.0, 60.0, 10.0],
        vec![Some(36.0); 5],
        vec![Some(65), Some(65), Some(95), Some(95), Some(5)],
    ))]))
}

fn provider(range: CongestionRange) -> Arc<SlowTrafficProvider> {
    let options = DetectionOptions::builder()
        .congestion_range(range)
        .sampling_period(Duration::ZERO)
        .min_delay(Duration::from_secs(30))
        .build()
        .unwrap();
    Arc::new(SlowTrafficProvider::new(options))
}

/// Poll once so every provider subscribes before anything is published.
fn start_tracking(notifications: &mut BoxStream<'static, DriverNotification>) {
    assert!(notifications.next().now_or_never().is_none());
}

fn start(notification: &DriverNotification) -> u32 {
    notification.as_slow_traffic().unwrap().geometry_range().start
}

#[tokio::test]
async fn test_hub_merges_notifications_of_all_providers() {
    let hub = NotificationHub::new()
        .with_provider(provider(CongestionRange::HEAVY))
        .with_provider(provider(CongestionRange::new(60, 100)));
    let feed = Arc::new(ProgressFeed::new());

    hub.attach(feed.clone());
    let mut notifications = hub.observe();
    start_tracking(&mut notifications);
    assert_eq!(feed.publish(RouteProgress::new(route(), 0, 0)), 2);

    let mut ranges = Vec::new();
    for _ in 0..2 {
        let notification = timeout(WAIT, notifications.next()).await.unwrap().unwrap();
        ranges.push(notification.as_slow_traffic().unwrap().geometry_range());
    }
    ranges.sort_by_key(|range| range.end);

    // Heavy-only run stops at the severe sample, the wide range runs to free flow
    assert_eq!(ranges, vec![GeometryRange::new(0, 2), GeometryRange::new(0, 4)]);
}

#[tokio::test]
async fn test_provider_below_threshold_stays_silent() {
    let hub = NotificationHub::new()
        .with_provider(provider(CongestionRange::HEAVY))
        .with_provider(provider(CongestionRange::SEVERE));
    let feed = Arc::new(ProgressFeed::new());

    hub.attach(feed.clone());
    let mut notifications = hub.observe();
    start_tracking(&mut notifications);

    // From index 2 only severe traffic is ahead: 120s actual, 20s free flow
    feed.publish(RouteProgress::new(route(), 0, 2));
    let notification = timeout(WAIT, notifications.next()).await.unwrap().unwrap();
    assert_eq!(start(&notification), 2);
    assert_eq!(
        notification.as_slow_traffic().unwrap().delay(),
        Duration::from_secs(100)
    );

    assert!(timeout(WAIT, notifications.next()).await.is_err());
}

#[tokio::test]
async fn test_hub_observed_before_attach_tracks_source() {
    let hub = NotificationHub::new().with_provider(provider(CongestionRange::SEVERE));
    let mut notifications = hub.observe();

    let feed = Arc::new(ProgressFeed::new());
    hub.attach(feed.clone());
    feed.publish(RouteProgress::new(route(), 0, 2));

    let notification = timeout(WAIT, notifications.next()).await.unwrap().unwrap();
    assert_eq!(start(&notification), 2);
}

#[tokio::test]
async fn test_detach_ends_merged_stream() {
    let hub = NotificationHub::new()
        .with_provider(provider(CongestionRange::HEAVY))
        .with_provider(provider(CongestionRange::SEVERE));
    let feed = Arc::new(ProgressFeed::new());

    hub.attach(feed.clone());
    let mut notifications = hub.observe();
    hub.detach(&*feed);

    let end = timeout(WAIT, notifications.next()).await.unwrap();
    assert!(end.is_none());
}
