//! Scan a two-leg route for slow traffic.
//!
//! Run with: cargo run --example slow_traffic_scan

use std::sync::Arc;
use std::time::Duration;

use driver_notification::{
    find_and_summarize_slow_traffic_segments, find_slow_traffic_segments, scan_for_slow_traffic,
    CongestionRange, DetectionOptions, LegAnnotation, Route, RouteLeg, RouteProgress,
    SegmentSearchLimits,
};

fn main() {
    let route = Arc::new(Route::new(vec![
        RouteLeg::new(LegAnnotation::new(
            vec![120.0, 80.0, 150.0, 200.0, 90.0, 110.0],
            vec![8.0, 35.0, 70.0, 95.0, 30.0, 7.0],
            vec![Some(54.0), Some(50.0), Some(50.0), Some(48.0), None, Some(54.0)],
            vec![Some(15), Some(70), Some(85), Some(90), Some(65), Some(10)],
        )),
        RouteLeg::new(LegAnnotation::new(
            vec![300.0, 250.0, 180.0],
            vec![20.0, 90.0, 12.0],
            vec![Some(54.0), Some(45.0), Some(54.0)],
            vec![Some(20), Some(95), Some(25)],
        )),
    ]));

    let options = DetectionOptions::builder()
        .min_delay(Duration::from_secs(60))
        .build()
        .unwrap();

    println!("Slow Traffic Scan\n");
    println!(
        "Options: congestion {}..={}, min delay {:?}\n",
        options.congestion_range().min,
        options.congestion_range().max,
        options.min_delay()
    );

    // Single scan from a few positions on the first leg
    for geometry_index in [0, 1, 3] {
        let progress = RouteProgress::new(route.clone(), 0, geometry_index);
        print!("At index {}: ", geometry_index);
        match scan_for_slow_traffic(&progress, &options) {
            Some(notification) => println!(
                "slow traffic over indices {}..={}, {:.0}m, delay {:.0}s",
                notification.geometry_range().start,
                notification.geometry_range().end,
                notification.distance_meters(),
                notification.delay_seconds()
            ),
            None => println!("nothing to report"),
        }
    }

    // Every slow segment left on the route
    let progress = RouteProgress::new(route, 0, 0);
    let targets = [
        CongestionRange::HEAVY,
        CongestionRange::SEVERE,
    ];
    let limits = SegmentSearchLimits::default();

    println!("\nSegments ahead:");
    for segment in find_slow_traffic_segments(&progress, &targets, &limits) {
        println!(
            "  leg {} indices {}..={} ({}..={}): {:.0}m in {:.0}s, {:.0}m ahead",
            segment.leg_index,
            segment.geometry_range.start,
            segment.geometry_range.end,
            segment.congestion_range().min,
            segment.congestion_range().max,
            segment.distance_meters(),
            segment.duration().as_secs_f64(),
            segment.distance_to_segment_meters
        );
    }

    println!("\nSummaries:");
    for summary in find_and_summarize_slow_traffic_segments(&progress, &targets, &limits) {
        println!(
            "  leg {} indices {}..={}: {:.0}m, {:.0}s vs {:.0}s free flow, {} traits",
            summary.leg_index,
            summary.geometry_range.start,
            summary.geometry_range.end,
            summary.distance_meters(),
            summary.duration().as_secs_f64(),
            summary.free_flow_duration().as_secs_f64(),
            summary.traits.len()
        );
    }
}
