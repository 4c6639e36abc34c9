//! Resolution statistics

use std::sync::atomic::{AtomicUsize, Ordering};

/// Internal counters
#[derive(Debug, Default)]
pub(crate) struct ResolutionStats {
    resolve_calls: AtomicUsize,
    discovery_attempts: AtomicUsize,
    discovery_failures: AtomicUsize,
    singleton_hits: AtomicUsize,
    prototype_rebuilds: AtomicUsize,
    artifact_builds: AtomicUsize,
}

impl ResolutionStats {
    pub(crate) fn record_call(&self) {
        self.resolve_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_discovery(&self) {
        self.discovery_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_discovery_failure(&self) {
        self.discovery_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_singleton_hit(&self) {
        self.singleton_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rebuild(&self) {
        self.prototype_rebuilds.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_build(&self) {
        self.artifact_builds.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> ResolutionStatsSnapshot {
        ResolutionStatsSnapshot {
            resolve_calls: self.resolve_calls.load(Ordering::Relaxed),
            discovery_attempts: self.discovery_attempts.load(Ordering::Relaxed),
            discovery_failures: self.discovery_failures.load(Ordering::Relaxed),
            singleton_hits: self.singleton_hits.load(Ordering::Relaxed),
            prototype_rebuilds: self.prototype_rebuilds.load(Ordering::Relaxed),
            artifact_builds: self.artifact_builds.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the resolution counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolutionStatsSnapshot {
    /// Calls to `resolve_all`, including failed ones
    pub resolve_calls: usize,
    /// Discovery passes started, successful or not
    pub discovery_attempts: usize,
    pub discovery_failures: usize,
    /// Cached-path lookups served from the singleton artifact cache
    pub singleton_hits: usize,
    /// Cached-path lookups rebuilt through an instance factory
    pub prototype_rebuilds: usize,
    /// Artifact factory invocations
    pub artifact_builds: usize,
}

impl ResolutionStatsSnapshot {
    /// Share of cached-path lookups served without rebuilding
    pub fn hit_rate(&self) -> f64 {
        let lookups = self.singleton_hits + self.prototype_rebuilds;
        if lookups == 0 {
            0.0
        } else {
            self.singleton_hits as f64 / lookups as f64
        }
    }
}
