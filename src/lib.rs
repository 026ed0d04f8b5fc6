//! # Driver Notification
//!
//! Slow-traffic detection for vehicles following an active route.
//!
//! This library provides:
//! - A throttled scan of live route progress for congested stretches ahead
//! - Notification providers that attach to a progress feed and stream results
//! - A multi-leg search for every slow segment left on the route
//!
//! ## Features
//!
//! - **`parallel`** - Scan route legs in parallel with rayon
//! - **`serde`** - Serialize notifications for hosts
//! - **`ffi`** - Enable FFI bindings for mobile platforms (iOS/Android)
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use driver_notification::{
//!     scan_for_slow_traffic, DetectionOptions, LegAnnotation, Route, RouteLeg, RouteProgress,
//! };
//!
//! let annotation = LegAnnotation::new(
//!     vec![100.0, 100.0, 100.0, 100.0],
//!     vec![20.0, 20.0, 20.0, 10.0],
//!     vec![Some(36.0); 4],
//!     vec![Some(80), Some(80), Some(80), Some(40)],
//! );
//! let route = Arc::new(Route::new(vec![RouteLeg::new(annotation)]));
//! let progress = RouteProgress::new(route, 0, 0);
//!
//! let options = DetectionOptions::builder()
//!     .min_delay(Duration::from_secs(15))
//!     .build()
//!     .unwrap();
//!
//! let notification = scan_for_slow_traffic(&progress, &options).unwrap();
//! assert_eq!(notification.delay(), Duration::from_secs(30));
//! assert_eq!(notification.distance_meters(), 300.0);
//! ```

use std::sync::Arc;

pub mod units;

pub mod options;
pub use options::{CongestionRange, DetectionOptions, DetectionOptionsBuilder, OptionsError};

pub mod notification;
pub use notification::{DriverNotification, GeometryRange, SlowTrafficNotification};

// Segment Scanner: single congested run from the vehicle position
pub mod scanner;
pub use scanner::scan_for_slow_traffic;

// Sampler/Gate: throttles progress updates before scanning
pub mod sampler;
pub use sampler::{Clock, ManualClock, MonotonicClock, Sampler};

pub mod feed;
pub use feed::{ProgressFeed, ProgressSource};

pub mod provider;
pub use provider::{NotificationProvider, NotificationSubscription, SlowTrafficProvider};

pub mod hub;
pub use hub::NotificationHub;

// Multi-leg slow segment search
pub mod segments;
pub use segments::{
    SegmentSearchLimits, SlowTrafficSegment, SlowTrafficSegmentSummary, SlowTrafficSegmentTraits,
    find_and_summarize_slow_traffic_segments, find_slow_traffic_segments,
};

#[cfg(feature = "ffi")]
uniffi::setup_scaffolding!();

/// Initialize logging for Android (only used in FFI)
#[cfg(all(feature = "ffi", target_os = "android"))]
fn init_logging() {
    use android_logger::Config;
    use log::LevelFilter;

    android_logger::init_once(
        Config::default()
            .with_max_level(LevelFilter::Debug)
            .with_tag("DriverNotificationRust")
    );
}

#[cfg(all(feature = "ffi", not(target_os = "android")))]
fn init_logging() {
    // No-op on non-Android platforms
}

// ============================================================================
// Core Types
// ============================================================================

/// Per-segment annotations of one route leg.
///
/// All arrays are indexed by geometry index. Any of them can be missing when the
/// route was requested without that annotation; individual free-flow speeds and
/// congestion values can be unknown.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct LegAnnotation {
    /// Segment lengths in meters
    pub distance: Option<Vec<f64>>,
    /// Segment traversal times in current traffic, in seconds
    pub duration: Option<Vec<f64>>,
    /// Free-flow speeds in km/h
    pub freeflow_speed: Option<Vec<Option<f64>>>,
    /// Congestion on the 0-100 scale
    pub congestion_numeric: Option<Vec<Option<u32>>>,
}

impl LegAnnotation {
    /// Create an annotation with all four arrays present.
    pub fn new(
        distance: Vec<f64>,
        duration: Vec<f64>,
        freeflow_speed: Vec<Option<f64>>,
        congestion_numeric: Vec<Option<u32>>,
    ) -> Self {
        Self {
            distance: Some(distance),
            duration: Some(duration),
            freeflow_speed: Some(freeflow_speed),
            congestion_numeric: Some(congestion_numeric),
        }
    }
}

/// One waypoint-to-waypoint portion of a route.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct RouteLeg {
    pub annotation: Option<LegAnnotation>,
}

impl RouteLeg {
    pub fn new(annotation: LegAnnotation) -> Self {
        Self {
            annotation: Some(annotation),
        }
    }
}

/// The route being followed.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct Route {
    pub legs: Vec<RouteLeg>,
}

impl Route {
    pub fn new(legs: Vec<RouteLeg>) -> Self {
        Self { legs }
    }
}

/// Snapshot of the vehicle's progress along a route.
///
/// Cheap to clone: the route itself is shared.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteProgress {
    pub route: Arc<Route>,
    /// Leg the vehicle is currently on
    pub leg_index: u32,
    /// Position within the current leg's annotation arrays
    pub geometry_index: u32,
}

impl RouteProgress {
    pub fn new(route: Arc<Route>, leg_index: u32, geometry_index: u32) -> Self {
        Self {
            route,
            leg_index,
            geometry_index,
        }
    }

    /// The leg the vehicle is on, if the leg index is valid.
    pub fn current_leg(&self) -> Option<&RouteLeg> {
        self.route.legs.get(self.leg_index as usize)
    }

    /// Annotations of the current leg, if any.
    pub fn current_annotation(&self) -> Option<&LegAnnotation> {
        self.current_leg()?.annotation.as_ref()
    }
}

// ============================================================================
// FFI Exports (only when feature enabled)
// ============================================================================

#[cfg(feature = "ffi")]
mod ffi {
    use super::*;
    use log::{debug, info};

    /// Get default detection options.
    #[uniffi::export]
    pub fn default_detection_options() -> DetectionOptions {
        init_logging();
        info!("[DriverNotificationRust] default_detection_options called - Rust is active!");
        DetectionOptions::default()
    }

    /// Scan the current leg once for slow traffic ahead of the vehicle.
    #[uniffi::export]
    pub fn ffi_scan_for_slow_traffic(
        legs: Vec<RouteLeg>,
        leg_index: u32,
        geometry_index: u32,
        options: DetectionOptions,
    ) -> Option<SlowTrafficNotification> {
        init_logging();
        debug!(
            "[DriverNotificationRust] scan_for_slow_traffic leg={} index={}",
            leg_index, geometry_index
        );
        let progress = RouteProgress::new(Arc::new(Route::new(legs)), leg_index, geometry_index);
        scan_for_slow_traffic(&progress, &options)
    }

    /// Find every slow segment ahead of the vehicle.
    #[uniffi::export]
    pub fn ffi_find_slow_traffic_segments(
        legs: Vec<RouteLeg>,
        leg_index: u32,
        geometry_index: u32,
        target_ranges: Vec<CongestionRange>,
        limits: SegmentSearchLimits,
    ) -> Vec<SlowTrafficSegment> {
        init_logging();

        let start = std::time::Instant::now();
        let progress = RouteProgress::new(Arc::new(Route::new(legs)), leg_index, geometry_index);
        let segments = find_slow_traffic_segments(&progress, &target_ranges, &limits);

        info!(
            "[DriverNotificationRust] Found {} slow segments in {:?}",
            segments.len(),
            start.elapsed()
        );
        segments
    }

    /// Find slow segments ahead and merge adjacent ones into summaries.
    #[uniffi::export]
    pub fn ffi_find_and_summarize_slow_traffic_segments(
        legs: Vec<RouteLeg>,
        leg_index: u32,
        geometry_index: u32,
        target_ranges: Vec<CongestionRange>,
        limits: SegmentSearchLimits,
    ) -> Vec<SlowTrafficSegmentSummary> {
        init_logging();
        let progress = RouteProgress::new(Arc::new(Route::new(legs)), leg_index, geometry_index);
        find_and_summarize_slow_traffic_segments(&progress, &target_ranges, &limits)
    }
}

// ============================================================================
// Tests
// ============================================================================
