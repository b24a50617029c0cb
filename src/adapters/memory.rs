//! Process memory sampling.
//!
//! Resident set size comes from the `memory-stats` crate, which asks the
//! operating system directly. Where it cannot answer every sample reads
//! zero, which keeps thresholds silent rather than failing generation.

use crate::domain::export::{MemoryStats, MemoryThresholds};

/// Current resident set size in bytes, or 0 when it cannot be read.
pub fn resident_bytes() -> u64 {
    memory_stats::memory_stats()
        .map(|usage| usage.physical_mem as u64)
        .unwrap_or(0)
}

/// Severity of a memory sample relative to the configured thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MemoryLevel {
    Normal,
    Warning,
    Critical,
}

/// Tracks the high and low water marks across a run of samples.
#[derive(Debug, Clone)]
pub struct MemoryTracker {
    thresholds: MemoryThresholds,
    initial: u64,
    peak: u64,
    low: u64,
    level: MemoryLevel,
}

impl MemoryTracker {
    /// Starts tracking with an initial sample.
    pub fn new(thresholds: MemoryThresholds) -> Self {
        let mut tracker = Self {
            thresholds,
            initial: 0,
            peak: 0,
            low: u64::MAX,
            level: MemoryLevel::Normal,
        };
        let initial = resident_bytes();
        tracker.initial = initial;
        tracker.record(initial);
        tracker
    }

    /// Takes a sample. See [`MemoryTracker::record`].
    pub fn sample(&mut self) -> Option<(u64, MemoryLevel)> {
        self.record(resident_bytes())
    }

    /// Records a reading. Returns the reading and level the first time a
    /// higher threshold is crossed; later readings at the same level are quiet.
    pub fn record(&mut self, bytes: u64) -> Option<(u64, MemoryLevel)> {
        self.peak = self.peak.max(bytes);
        self.low = self.low.min(bytes);

        let level = if bytes >= self.thresholds.critical_bytes {
            MemoryLevel::Critical
        } else if bytes >= self.thresholds.warning_bytes {
            MemoryLevel::Warning
        } else {
            MemoryLevel::Normal
        };

        if level > self.level {
            self.level = level;
            match level {
                MemoryLevel::Critical => tracing::error!(bytes, "Memory usage crossed critical threshold"),
                _ => tracing::warn!(bytes, "Memory usage crossed warning threshold"),
            }
            return Some((bytes, level));
        }
        None
    }

    pub fn peak_bytes(&self) -> u64 {
        self.peak
    }

    /// Takes a final sample and returns the collected figures.
    pub fn finish(mut self) -> MemoryStats {
        let final_bytes = resident_bytes();
        self.record(final_bytes);
        MemoryStats {
            initial_bytes: self.initial,
            peak_bytes: self.peak,
            final_bytes,
            low_bytes: if self.low == u64::MAX { 0 } else { self.low },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thresholds() -> MemoryThresholds {
        MemoryThresholds {
            warning_bytes: 100,
            critical_bytes: 200,
        }
    }

    #[test]
    fn resident_size_is_readable_on_supported_platforms() {
        if cfg!(any(target_os = "linux", target_os = "macos", target_os = "windows")) {
            assert!(resident_bytes() > 0);
        }
    }

    #[test]
    fn crossing_reported_once_per_level() {
        let mut tracker = MemoryTracker {
            thresholds: thresholds(),
            initial: 0,
            peak: 0,
            low: u64::MAX,
            level: MemoryLevel::Normal,
        };
        assert_eq!(tracker.record(50), None);
        assert_eq!(tracker.record(120), Some((120, MemoryLevel::Warning)));
        assert_eq!(tracker.record(130), None);
        assert_eq!(tracker.record(250), Some((250, MemoryLevel::Critical)));
        assert_eq!(tracker.record(90), None);
        assert_eq!(tracker.peak_bytes(), 250);
        assert_eq!(tracker.low, 50);
    }

    #[test]
    fn finish_reports_peak_at_least_initial() {
        let stats = MemoryTracker::new(MemoryThresholds::default()).finish();
        assert!(stats.peak_bytes >= stats.initial_bytes);
        assert!(stats.low_bytes <= stats.peak_bytes);
    }
}
