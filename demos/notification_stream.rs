//! Drive a provider from a simulated progress feed and print its notifications.
//!
//! Run with: cargo run --example notification_stream

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;

use driver_notification::{
    DetectionOptions, LegAnnotation, NotificationHub, ProgressFeed, Route, RouteLeg,
    RouteProgress, SlowTrafficProvider,
};

#[tokio::main]
async fn main() {
    let route = Arc::new(Route::new(vec![RouteLeg::new(LegAnnotation::new(
        vec![100.0; 8],
        vec![10.0, 45.0, 45.0, 45.0, 45.0, 45.0, 10.0, 10.0],
        vec![Some(36.0); 8],
        vec![Some(20), Some(80), Some(85), Some(90), Some(90), Some(70), Some(30), Some(20)],
    ))]));

    let options = DetectionOptions::builder()
        .sampling_period(Duration::from_millis(50))
        .min_delay(Duration::from_secs(60))
        .build()
        .unwrap();

    let hub = NotificationHub::new().with_provider(Arc::new(SlowTrafficProvider::new(options)));
    let feed = Arc::new(ProgressFeed::new());
    hub.attach(feed.clone());

    let mut notifications = hub.observe();
    let printer = tokio::spawn(async move {
        while let Some(notification) = notifications.next().await {
            if let Some(slow) = notification.as_slow_traffic() {
                println!(
                    "Slow traffic ahead: indices {}..={}, {:.0}m, delay {:?}",
                    slow.geometry_range().start,
                    slow.geometry_range().end,
                    slow.distance_meters(),
                    slow.delay()
                );
            }
        }
        println!("Notification stream ended");
    });

    // Progress arrives faster than the sampling period; most updates are dropped
    for geometry_index in 0..8 {
        for _ in 0..3 {
            feed.publish(RouteProgress::new(route.clone(), 0, geometry_index));
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    hub.detach(&*feed);
    let _ = printer.await;
}
