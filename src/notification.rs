//! Notification value objects emitted by the providers.

use std::hash::{Hash, Hasher};
use std::time::Duration;

/// Closed interval of geometry indices within a leg's annotation arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GeometryRange {
    /// First index of the range
    pub start: u32,
    /// Last index of the range (inclusive)
    pub end: u32,
}

impl GeometryRange {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, index: u32) -> bool {
        self.start <= index && index <= self.end
    }

    /// Number of indices covered by the range.
    pub fn count(&self) -> u32 {
        self.end.saturating_sub(self.start) + 1
    }
}

/// The vehicle is approaching, or is inside, a stretch of slow traffic.
///
/// Only the scanner creates these. Durations are never negative; the
/// difference between them can be, when free-flow time had to be estimated
/// for samples without a known free-flow speed.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SlowTrafficNotification {
    leg_index: u32,
    geometry_range: GeometryRange,
    free_flow_duration: Duration,
    actual_duration: Duration,
    distance_meters: f64,
}

impl SlowTrafficNotification {
    pub(crate) fn new(
        leg_index: u32,
        geometry_range: GeometryRange,
        free_flow_duration: Duration,
        actual_duration: Duration,
        distance_meters: f64,
    ) -> Self {
        Self {
            leg_index,
            geometry_range,
            free_flow_duration,
            actual_duration,
            distance_meters,
        }
    }

    /// Leg the slow stretch belongs to.
    pub fn leg_index(&self) -> u32 {
        self.leg_index
    }

    /// Annotation indices of the slow stretch.
    pub fn geometry_range(&self) -> GeometryRange {
        self.geometry_range
    }

    /// Time needed to cover the stretch without traffic.
    pub fn free_flow_duration(&self) -> Duration {
        self.free_flow_duration
    }

    /// Time needed to cover the stretch in current traffic.
    pub fn actual_duration(&self) -> Duration {
        self.actual_duration
    }

    /// Length of the stretch in meters.
    pub fn distance_meters(&self) -> f64 {
        self.distance_meters
    }

    /// Extra time caused by traffic, clamped at zero.
    pub fn delay(&self) -> Duration {
        self.actual_duration.saturating_sub(self.free_flow_duration)
    }

    /// Extra time caused by traffic in seconds. May be negative.
    pub fn delay_seconds(&self) -> f64 {
        self.actual_duration.as_secs_f64() - self.free_flow_duration.as_secs_f64()
    }
}

// Equality and hashing compare the distance bit-for-bit so both stay consistent.
impl PartialEq for SlowTrafficNotification {
    fn eq(&self, other: &Self) -> bool {
        self.leg_index == other.leg_index
            && self.geometry_range == other.geometry_range
            && self.free_flow_duration == other.free_flow_duration
            && self.actual_duration == other.actual_duration
            && self.distance_meters.to_bits() == other.distance_meters.to_bits()
    }
}

impl Eq for SlowTrafficNotification {}

impl Hash for SlowTrafficNotification {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.leg_index.hash(state);
        self.geometry_range.hash(state);
        self.free_flow_duration.hash(state);
        self.actual_duration.hash(state);
        self.distance_meters.to_bits().hash(state);
    }
}

/// Any notification a provider can emit to the driver.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[non_exhaustive]
pub enum DriverNotification {
    SlowTraffic(SlowTrafficNotification),
}

impl DriverNotification {
    pub fn as_slow_traffic(&self) -> Option<&SlowTrafficNotification> {
        match self {
            DriverNotification::SlowTraffic(notification) => Some(notification),
        }
    }
}

impl From<SlowTrafficNotification> for DriverNotification {
    fn from(notification: SlowTrafficNotification) -> Self {
        DriverNotification::SlowTraffic(notification)
    }
}
