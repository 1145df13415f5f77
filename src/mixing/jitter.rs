//! Random per-item delay applied before each backend call

use rand::Rng;
use std::time::Duration;

use super::types::{DEFAULT_JITTER_MAX_MS, DEFAULT_JITTER_MIN_MS};

/// Uniform delay in `[min, max]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Jitter {
    min: Duration,
    max: Duration,
}

impl Jitter {
    /// Jitter between `min` and `max`; bounds are swapped if given reversed
    #[must_use]
    pub fn new(min: Duration, max: Duration) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    #[must_use]
    pub fn from_millis(min_ms: u64, max_ms: u64) -> Self {
        Self::new(Duration::from_millis(min_ms), Duration::from_millis(max_ms))
    }

    /// No delay at all
    #[must_use]
    pub const fn none() -> Self {
        Self {
            min: Duration::ZERO,
            max: Duration::ZERO,
        }
    }

    #[must_use]
    pub const fn min(&self) -> Duration {
        self.min
    }

    #[must_use]
    pub const fn max(&self) -> Duration {
        self.max
    }

    /// Draw one delay
    ///
    /// Spans wider than `u64::MAX` microseconds are drawn from the first
    /// `u64::MAX` of the range.
    #[must_use]
    pub fn sample(&self) -> Duration {
        if self.min == self.max {
            return self.min;
        }
        let span = u64::try_from((self.max - self.min).as_micros()).unwrap_or(u64::MAX);
        let offset = Duration::from_micros(rand::rng().random_range(0..=span));
        self.min.saturating_add(offset).min(self.max)
    }
}

impl Default for Jitter {
    fn default() -> Self {
        Self::from_millis(DEFAULT_JITTER_MIN_MS, DEFAULT_JITTER_MAX_MS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_samples_stay_in_range() {
        let jitter = Jitter::from_millis(100, 2000);
        for _ in 0..1000 {
            let d = jitter.sample();
            assert!(d >= Duration::from_millis(100) && d <= Duration::from_millis(2000));
        }
    }

    #[test]
    fn test_samples_are_spread() {
        let jitter = Jitter::from_millis(0, 1000);
        let samples: std::collections::HashSet<_> = (0..100).map(|_| jitter.sample()).collect();
        assert!(samples.len() > 50, "jitter should not collapse to a few values");
    }

    #[test]
    fn test_huge_bounds_do_not_wrap() {
        let min = Duration::from_secs(u64::MAX / 2);
        let jitter = Jitter::new(min, Duration::MAX);
        for _ in 0..100 {
            let d = jitter.sample();
            assert!(d >= min, "{d:?}");
        }
    }

    #[test]
    fn test_none_is_zero() {
        assert_eq!(Jitter::none().sample(), Duration::ZERO);
    }

    #[test]
    fn test_reversed_bounds_are_normalized() {
        let jitter = Jitter::from_millis(50, 10);
        assert_eq!(jitter.min(), Duration::from_millis(10));
        assert_eq!(jitter.max(), Duration::from_millis(50));
    }
}
