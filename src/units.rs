//! # Speed and Duration Units
//!
//! Numeric helpers shared by the slow-traffic scanner and the segment finder.
//!
//! ## Overview
//!
//! | Function | Description |
//! |----------|-------------|
//! | [`kmh_to_mps`] | Convert a speed from km/h to m/s |
//! | [`free_flow_seconds`] | Seconds to cover a distance at a free-flow speed |
//! | [`seconds_to_duration`] | Saturating conversion of signed seconds to [`Duration`] |
//!
//! ## Example
//!
//! ```rust
//! use driver_notification::units;
//!
//! // 36 km/h is 10 m/s, so 100m takes 10s
//! assert_eq!(units::free_flow_seconds(100.0, 36.0), Some(10.0));
//! assert_eq!(units::free_flow_seconds(100.0, 0.0), None);
//! ```

use std::time::Duration;

/// Meters per second in one kilometer per hour.
pub const KMH_TO_MPS: f64 = 1000.0 / 3600.0;

/// Convert a speed in km/h to m/s.
#[inline]
pub fn kmh_to_mps(kmh: f64) -> f64 {
    kmh * KMH_TO_MPS
}

/// Seconds needed to travel `distance_meters` at `speed_kmh`.
///
/// Computed as `distance * 3.6 / speed`, which is the same as dividing the
/// distance by the speed in m/s but keeps round inputs exact.
///
/// Returns `None` when the speed is zero, negative or not finite. Callers treat
/// that the same as a missing free-flow speed.
#[inline]
pub fn free_flow_seconds(distance_meters: f64, speed_kmh: f64) -> Option<f64> {
    if !speed_kmh.is_finite() || speed_kmh <= 0.0 {
        return None;
    }
    Some(distance_meters * 3.6 / speed_kmh)
}

/// Convert seconds to a [`Duration`], saturating instead of panicking.
///
/// Negative and NaN inputs become [`Duration::ZERO`], values too large to
/// represent become [`Duration::MAX`].
pub fn seconds_to_duration(seconds: f64) -> Duration {
    if seconds.is_nan() || seconds <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(seconds).unwrap_or(Duration::MAX)
}
