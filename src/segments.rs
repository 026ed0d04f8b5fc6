//! # Slow Segment Search
//!
//! Finds every slow stretch left on the route, not just the one under the
//! vehicle.
//!
//! ## Algorithm
//! 1. Walk the current leg from the vehicle's geometry index, then each later
//!    leg from its first index, up to a leg limit
//! 2. Classify every sample by the first target congestion range containing it
//! 3. Consecutive samples in the same leg and the same range form one segment
//! 4. Track the distance travelled so far to report how far ahead each segment is
//!
//! Segments never span a leg boundary. Adjacent segments with different ranges
//! can be merged into summaries with one trait per congestion range.
//!
//! With the `parallel` feature the legs are scanned concurrently; the result
//! is identical to the sequential scan.

use std::time::Duration;

use log::debug;

use crate::scanner::{AnnotationArrays, RunTotals};
use crate::units::seconds_to_duration;
use crate::{CongestionRange, GeometryRange, RouteProgress};

/// Bounds for a segment search. `None` means unlimited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct SegmentSearchLimits {
    /// Number of legs to search, starting with the current one
    pub legs_limit: Option<u32>,
    /// Number of segments (or summaries) to return
    pub segments_limit: Option<u32>,
}

/// Traffic figures for the part of a segment in one congestion range.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SlowTrafficSegmentTraits {
    pub congestion_range: CongestionRange,
    pub distance_meters: f64,
    /// Time to traverse in current traffic
    pub duration: Duration,
    /// Time to traverse without traffic
    pub free_flow_duration: Duration,
}

impl SlowTrafficSegmentTraits {
    fn from_totals(congestion_range: CongestionRange, totals: &RunTotals) -> Self {
        Self {
            congestion_range,
            distance_meters: totals.distance_meters,
            duration: seconds_to_duration(totals.actual_seconds),
            free_flow_duration: seconds_to_duration(totals.free_flow_seconds),
        }
    }

    fn absorb(&mut self, other: &SlowTrafficSegmentTraits) {
        self.distance_meters += other.distance_meters;
        self.duration += other.duration;
        self.free_flow_duration += other.free_flow_duration;
    }
}

/// A run of samples in one leg sharing a target congestion range.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SlowTrafficSegment {
    pub leg_index: u32,
    pub geometry_range: GeometryRange,
    /// Distance from the vehicle to the start of the segment in meters
    pub distance_to_segment_meters: f64,
    pub traits: SlowTrafficSegmentTraits,
}

impl SlowTrafficSegment {
    pub fn congestion_range(&self) -> CongestionRange {
        self.traits.congestion_range
    }

    pub fn distance_meters(&self) -> f64 {
        self.traits.distance_meters
    }

    pub fn duration(&self) -> Duration {
        self.traits.duration
    }

    pub fn free_flow_duration(&self) -> Duration {
        self.traits.free_flow_duration
    }
}

/// Adjacent segments of one leg merged into a single slow stretch.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SlowTrafficSegmentSummary {
    pub leg_index: u32,
    pub geometry_range: GeometryRange,
    pub distance_to_segment_meters: f64,
    /// One entry per congestion range, in order of first appearance
    pub traits: Vec<SlowTrafficSegmentTraits>,
}

impl SlowTrafficSegmentSummary {
    fn absorb(&mut self, segment: SlowTrafficSegment) {
        self.geometry_range.end = segment.geometry_range.end;
        match self
            .traits
            .iter_mut()
            .find(|t| t.congestion_range == segment.traits.congestion_range)
        {
            Some(existing) => existing.absorb(&segment.traits),
            None => self.traits.push(segment.traits),
        }
    }

    pub fn distance_meters(&self) -> f64 {
        self.traits.iter().map(|t| t.distance_meters).sum()
    }

    pub fn duration(&self) -> Duration {
        self.traits.iter().map(|t| t.duration).sum()
    }

    pub fn free_flow_duration(&self) -> Duration {
        self.traits.iter().map(|t| t.free_flow_duration).sum()
    }
}

impl From<SlowTrafficSegment> for SlowTrafficSegmentSummary {
    fn from(segment: SlowTrafficSegment) -> Self {
        Self {
            leg_index: segment.leg_index,
            geometry_range: segment.geometry_range,
            distance_to_segment_meters: segment.distance_to_segment_meters,
            traits: vec![segment.traits],
        }
    }
}

// ============================================================================
// Per-leg Scan
// ============================================================================

/// Segment being accumulated.
struct OpenRun {
    range: CongestionRange,
    start: usize,
    distance_before: f64,
    totals: RunTotals,
}

impl OpenRun {
    fn finish(self, leg_index: u32, end: usize) -> SlowTrafficSegment {
        SlowTrafficSegment {
            leg_index,
            geometry_range: GeometryRange::new(self.start as u32, end as u32),
            distance_to_segment_meters: self.distance_before,
            traits: SlowTrafficSegmentTraits::from_totals(self.range, &self.totals),
        }
    }
}

/// Segments of one leg, with distances measured from the scan start.
struct LegScan {
    segments: Vec<SlowTrafficSegment>,
    scanned_distance: f64,
}

fn scan_leg(
    leg_index: u32,
    arrays: &AnnotationArrays<'_>,
    start: usize,
    targets: &[CongestionRange],
) -> LegScan {
    let mut segments = Vec::new();
    let mut travelled = 0.0;
    let mut open: Option<OpenRun> = None;

    for index in start..arrays.len() {
        let matched = arrays.congestion[index]
            .and_then(|congestion| targets.iter().copied().find(|r| r.contains(congestion)));

        if open.as_ref().is_some_and(|run| Some(run.range) != matched) {
            if let Some(run) = open.take() {
                segments.push(run.finish(leg_index, index - 1));
            }
        }

        if let Some(range) = matched {
            let run = open.get_or_insert_with(|| OpenRun {
                range,
                start: index,
                distance_before: travelled,
                totals: RunTotals::default(),
            });
            run.totals.add_sample(arrays, index);
        }

        travelled += arrays.distance[index];
    }

    if let Some(run) = open {
        segments.push(run.finish(leg_index, arrays.len() - 1));
    }

    LegScan {
        segments,
        scanned_distance: travelled,
    }
}

// ============================================================================
// Search
// ============================================================================

/// Find slow segments ahead of the vehicle.
///
/// Segments are returned in route order. A leg with incomplete annotations
/// ends the search, since distances beyond it are unknown.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use driver_notification::{
///     find_slow_traffic_segments, CongestionRange, GeometryRange, LegAnnotation, Route,
///     RouteLeg, RouteProgress, SegmentSearchLimits,
/// };
///
/// let annotation = LegAnnotation::new(
///     vec![50.0, 60.0, 70.0, 80.0],
///     vec![5.0, 6.0, 15.0, 18.0],
///     vec![Some(36.0), Some(36.0), Some(17.0), Some(16.0)],
///     vec![Some(10), Some(10), Some(90), Some(90)],
/// );
/// let route = Arc::new(Route::new(vec![RouteLeg::new(annotation)]));
/// let progress = RouteProgress::new(route, 0, 0);
///
/// let segments = find_slow_traffic_segments(
///     &progress,
///     &[CongestionRange::SEVERE],
///     &SegmentSearchLimits::default(),
/// );
///
/// assert_eq!(segments.len(), 1);
/// assert_eq!(segments[0].geometry_range, GeometryRange::new(2, 3));
/// assert_eq!(segments[0].distance_to_segment_meters, 110.0);
/// ```
pub fn find_slow_traffic_segments(
    progress: &RouteProgress,
    target_ranges: &[CongestionRange],
    limits: &SegmentSearchLimits,
) -> Vec<SlowTrafficSegment> {
    let segments_limit = limits.segments_limit.map_or(usize::MAX, |l| l as usize);
    if target_ranges.is_empty() || segments_limit == 0 {
        return vec![];
    }

    let first_leg = progress.leg_index as usize;
    let legs_limit = limits.legs_limit.map_or(usize::MAX, |l| l as usize);

    let mut inputs = Vec::new();
    let remaining_legs = progress
        .route
        .legs
        .iter()
        .enumerate()
        .skip(first_leg)
        .take(legs_limit);
    for (leg_index, leg) in remaining_legs {
        let Some(arrays) = leg
            .annotation
            .as_ref()
            .and_then(AnnotationArrays::from_annotation)
        else {
            debug!("[SegmentFinder] Leg {} has incomplete annotations, stopping", leg_index);
            break;
        };
        let start = if leg_index == first_leg {
            progress.geometry_index as usize
        } else {
            0
        };
        inputs.push((leg_index as u32, arrays, start));
    }

    #[cfg(feature = "parallel")]
    let scans: Vec<LegScan> = {
        use rayon::prelude::*;
        inputs
            .par_iter()
            .map(|(leg_index, arrays, start)| scan_leg(*leg_index, arrays, *start, target_ranges))
            .collect()
    };

    #[cfg(not(feature = "parallel"))]
    let scans: Vec<LegScan> = inputs
        .iter()
        .map(|(leg_index, arrays, start)| scan_leg(*leg_index, arrays, *start, target_ranges))
        .collect();

    let mut segments = Vec::new();
    let mut offset = 0.0;
    for scan in scans {
        for mut segment in scan.segments {
            if segments.len() >= segments_limit {
                return segments;
            }
            segment.distance_to_segment_meters += offset;
            segments.push(segment);
        }
        offset += scan.scanned_distance;
    }

    debug!(
        "[SegmentFinder] {} slow segments across {} legs",
        segments.len(),
        inputs.len()
    );
    segments
}

/// Find slow segments ahead and merge the adjacent ones of each leg.
///
/// `segments_limit` bounds the number of summaries.
pub fn find_and_summarize_slow_traffic_segments(
    progress: &RouteProgress,
    target_ranges: &[CongestionRange],
    limits: &SegmentSearchLimits,
) -> Vec<SlowTrafficSegmentSummary> {
    let unlimited = SegmentSearchLimits {
        segments_limit: None,
        ..*limits
    };

    let mut summaries: Vec<SlowTrafficSegmentSummary> = Vec::new();
    for segment in find_slow_traffic_segments(progress, target_ranges, &unlimited) {
        match summaries.last_mut() {
            Some(summary)
                if summary.leg_index == segment.leg_index
                    && summary.geometry_range.end + 1 == segment.geometry_range.start =>
            {
                summary.absorb(segment)
            }
            _ => summaries.push(segment.into()),
        }
    }

    if let Some(limit) = limits.segments_limit {
        summaries.truncate(limit as usize);
    }
    summaries
}
