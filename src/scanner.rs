//! # Slow-Traffic Scanner
//!
//! Looks ahead from the vehicle's position for a contiguous run of congested
//! annotation samples and decides whether the time lost in it is worth a
//! notification.
//!
//! ## Algorithm
//! 1. Start at the current geometry index of the current leg
//! 2. Walk forward while the sample's congestion is inside the configured range
//! 3. Sum distance, actual duration and free-flow duration over the run
//! 4. Notify when `actual - free_flow >= min_delay`
//!
//! The walk never leaves the current leg. Samples without a free-flow speed
//! borrow the average free-flow time of the samples already in the run.

use log::{debug, info, trace};

use crate::units::{free_flow_seconds, seconds_to_duration};
use crate::{DetectionOptions, GeometryRange, LegAnnotation, RouteProgress, SlowTrafficNotification};

// ============================================================================
// Annotation Access
// ============================================================================

/// Borrowed view of a leg's four annotation arrays, cut to a common length.
#[derive(Debug, Clone, Copy)]
pub(crate) struct AnnotationArrays<'a> {
    pub(crate) distance: &'a [f64],
    pub(crate) duration: &'a [f64],
    pub(crate) freeflow_speed: &'a [Option<f64>],
    pub(crate) congestion: &'a [Option<u32>],
    len: usize,
}

impl<'a> AnnotationArrays<'a> {
    /// Returns `None` when any of the arrays is missing.
    pub(crate) fn from_annotation(annotation: &'a LegAnnotation) -> Option<Self> {
        let distance = annotation.distance.as_deref()?;
        let duration = annotation.duration.as_deref()?;
        let freeflow_speed = annotation.freeflow_speed.as_deref()?;
        let congestion = annotation.congestion_numeric.as_deref()?;

        let len = distance
            .len()
            .min(duration.len())
            .min(freeflow_speed.len())
            .min(congestion.len());

        Some(Self {
            distance,
            duration,
            freeflow_speed,
            congestion,
            len,
        })
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }
}

// ============================================================================
// Run Accumulation
// ============================================================================

/// Running totals over a contiguous run of samples.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(crate) struct RunTotals {
    pub(crate) samples: u32,
    pub(crate) distance_meters: f64,
    pub(crate) actual_seconds: f64,
    pub(crate) free_flow_seconds: f64,
}

impl RunTotals {
    /// Add the sample at `index`.
    ///
    /// Without a usable free-flow speed the sample contributes the average
    /// free-flow time of the samples added so far (zero for the first one).
    pub(crate) fn add_sample(&mut self, arrays: &AnnotationArrays<'_>, index: usize) {
        let distance = arrays.distance[index];
        let free_flow = arrays.freeflow_speed[index]
            .and_then(|speed| free_flow_seconds(distance, speed))
            .unwrap_or_else(|| self.average_free_flow_seconds());

        self.distance_meters += distance;
        self.actual_seconds += arrays.duration[index];
        self.free_flow_seconds += free_flow;
        self.samples += 1;
    }

    fn average_free_flow_seconds(&self) -> f64 {
        if self.samples == 0 {
            return 0.0;
        }
        self.free_flow_seconds / self.samples as f64
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.samples == 0
    }

    pub(crate) fn delay_seconds(&self) -> f64 {
        self.actual_seconds - self.free_flow_seconds
    }
}

// ============================================================================
// Scan
// ============================================================================

/// Scan the current leg ahead of the vehicle for slow traffic.
///
/// Returns `None` when the leg has no annotations, the sample under the vehicle
/// is not congested, or the delay of the congested run is below
/// [`DetectionOptions::min_delay`].
///
/// The reported geometry range starts at the vehicle's geometry index and ends
/// at the first sample that stopped the walk, or at the last sample of the leg
/// when the congestion runs to its end.
pub fn scan_for_slow_traffic(
    progress: &RouteProgress,
    options: &DetectionOptions,
) -> Option<SlowTrafficNotification> {
    let Some(arrays) = progress
        .current_annotation()
        .and_then(AnnotationArrays::from_annotation)
    else {
        debug!(
            "[SlowTraffic] Leg {} has incomplete annotations, skipping scan",
            progress.leg_index
        );
        return None;
    };

    let range = options.congestion_range();
    let start = progress.geometry_index as usize;
    let mut totals = RunTotals::default();
    let mut index = start;

    while index < arrays.len() && arrays.congestion[index].is_some_and(|c| range.contains(c)) {
        totals.add_sample(&arrays, index);
        index += 1;
    }

    if totals.is_empty() {
        trace!(
            "[SlowTraffic] No congestion at leg {} index {}",
            progress.leg_index,
            start
        );
        return None;
    }

    let delay = totals.delay_seconds();
    if delay < options.min_delay().as_secs_f64() {
        debug!(
            "[SlowTraffic] Run of {} samples delays {:.1}s, below {:?}",
            totals.samples,
            delay,
            options.min_delay()
        );
        return None;
    }

    // A run reaching the end of the leg stops at its last sample
    let end = index.min(arrays.len() - 1);
    let notification = SlowTrafficNotification::new(
        progress.leg_index,
        GeometryRange::new(progress.geometry_index, end as u32),
        seconds_to_duration(totals.free_flow_seconds),
        seconds_to_duration(totals.actual_seconds),
        totals.distance_meters,
    );

    info!(
        "[SlowTraffic] Leg {} indices {}..={}: {:.0}m, delay {:.1}s",
        notification.leg_index(),
        notification.geometry_range().start,
        notification.geometry_range().end,
        notification.distance_meters(),
        delay
    );

    Some(notification)
}
