//! Configuration for slow-traffic detection.

use std::time::Duration;
use thiserror::Error;

/// Upper bound of the numeric congestion scale (0 = free flowing, 100 = standstill).
pub const MAX_CONGESTION: u32 = 100;

/// Inclusive range on the numeric congestion scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CongestionRange {
    /// Lowest congestion value in the range
    pub min: u32,
    /// Highest congestion value in the range (inclusive)
    pub max: u32,
}

impl CongestionRange {
    pub const LOW: Self = Self::new(0, 39);
    pub const MODERATE: Self = Self::new(40, 59);
    pub const HEAVY: Self = Self::new(60, 79);
    pub const SEVERE: Self = Self::new(80, MAX_CONGESTION);

    pub const fn new(min: u32, max: u32) -> Self {
        Self { min, max }
    }

    /// Check whether a congestion value falls inside this range.
    #[inline]
    pub fn contains(&self, congestion: u32) -> bool {
        self.min <= congestion && congestion <= self.max
    }

    /// Value halfway through the range, rounded down.
    pub fn middle(&self) -> u32 {
        self.min + (self.max.saturating_sub(self.min)) / 2
    }

    fn validate(&self) -> Result<(), OptionsError> {
        if self.min > self.max {
            return Err(OptionsError::InvertedCongestionRange {
                min: self.min,
                max: self.max,
            });
        }
        if self.max > MAX_CONGESTION {
            return Err(OptionsError::CongestionOutOfDomain { max: self.max });
        }
        Ok(())
    }
}

/// Rejected [`DetectionOptions`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OptionsError {
    #[error("congestion range {min}..={max} is inverted")]
    InvertedCongestionRange { min: u32, max: u32 },

    #[error("congestion range upper bound {max} is outside the 0..=100 congestion scale")]
    CongestionOutOfDomain { max: u32 },
}

/// Tuning for the slow-traffic provider.
///
/// Values are immutable; change them by building a new set with
/// [`DetectionOptions::to_builder`] and handing it to the provider.
///
/// # Example
/// ```
/// use std::time::Duration;
/// use driver_notification::{CongestionRange, DetectionOptions};
///
/// let options = DetectionOptions::builder()
///     .congestion_range(CongestionRange::SEVERE)
///     .min_delay(Duration::from_secs(60))
///     .build()
///     .unwrap();
///
/// assert_eq!(options.sampling_period(), Duration::from_secs(10));
/// assert!(DetectionOptions::builder()
///     .congestion_range(CongestionRange::new(90, 40))
///     .build()
///     .is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct DetectionOptions {
    /// Congestion values treated as slow traffic.
    /// Default: 60..=100 (heavy and severe)
    congestion_range: CongestionRange,

    /// Minimum time between two scans of the route progress.
    /// Default: 10 seconds
    sampling_period: Duration,

    /// Minimum delay over free-flow time needed to notify.
    /// Default: 2 minutes
    min_delay: Duration,
}

impl Default for DetectionOptions {
    fn default() -> Self {
        Self {
            congestion_range: CongestionRange::new(60, 100),
            sampling_period: Duration::from_secs(10),
            min_delay: Duration::from_secs(120),
        }
    }
}

impl DetectionOptions {
    /// Start from the defaults.
    pub fn builder() -> DetectionOptionsBuilder {
        DetectionOptions::default().to_builder()
    }

    /// Start from a copy of these options.
    pub fn to_builder(&self) -> DetectionOptionsBuilder {
        DetectionOptionsBuilder {
            congestion_range: self.congestion_range,
            sampling_period: self.sampling_period,
            min_delay: self.min_delay,
        }
    }

    pub fn congestion_range(&self) -> CongestionRange {
        self.congestion_range
    }

    pub fn sampling_period(&self) -> Duration {
        self.sampling_period
    }

    pub fn min_delay(&self) -> Duration {
        self.min_delay
    }
}

/// Builder for [`DetectionOptions`].
#[derive(Debug, Clone, Copy)]
pub struct DetectionOptionsBuilder {
    congestion_range: CongestionRange,
    sampling_period: Duration,
    min_delay: Duration,
}

impl DetectionOptionsBuilder {
    pub fn congestion_range(mut self, range: CongestionRange) -> Self {
        self.congestion_range = range;
        self
    }

    pub fn sampling_period(mut self, period: Duration) -> Self {
        self.sampling_period = period;
        self
    }

    pub fn min_delay(mut self, delay: Duration) -> Self {
        self.min_delay = delay;
        self
    }

    /// Validate and freeze the options.
    pub fn build(self) -> Result<DetectionOptions, OptionsError> {
        self.congestion_range.validate()?;
        Ok(DetectionOptions {
            congestion_range: self.congestion_range,
            sampling_period: self.sampling_period,
            min_delay: self.min_delay,
        })
    }
}
