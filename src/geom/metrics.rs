//! Opt-in timing hooks for the meshing pipeline.
//!
//! Timing is only collected when the `mesh_metrics` feature is enabled and the
//! target is not WASM (`std::time::Instant` is unavailable there). Otherwise
//! every call compiles down to running the closure.
//!
//! ```ignore
//! let mut metrics = MeshMetrics::default();
//! metrics.begin();
//! let mesh = metrics.time(TimingBucket::Triangulation, || engine.triangulate(&graph, None));
//! if let Some(report) = metrics.end() {
//!     println!("triangulation: {} ns", report.triangulation_ns);
//! }
//! ```

/// Pipeline phases that accumulate time separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimingBucket {
    /// Ring deduplication and planar graph assembly.
    Deduplication,
    /// Calls into the triangulation engine.
    Triangulation,
    /// Edge-length measurement inside the refinement loop.
    Refinement,
    /// Vertex relaxation passes.
    Smoothing,
    /// Boundary loop reconstruction.
    BoundaryExtraction,
}

/// Cumulative nanoseconds per phase.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MeshTimingReport {
    pub deduplication_ns: u64,
    pub triangulation_ns: u64,
    pub refinement_ns: u64,
    pub smoothing_ns: u64,
    pub boundary_extraction_ns: u64,
}

impl MeshTimingReport {
    /// Total across buckets.
    #[must_use]
    pub fn total_ns(&self) -> u64 {
        self.deduplication_ns
            .saturating_add(self.triangulation_ns)
            .saturating_add(self.refinement_ns)
            .saturating_add(self.smoothing_ns)
            .saturating_add(self.boundary_extraction_ns)
    }

    #[must_use]
    pub fn total_ms(&self) -> f64 {
        self.total_ns() as f64 / 1_000_000.0
    }

    #[cfg_attr(
        not(all(feature = "mesh_metrics", not(target_arch = "wasm32"))),
        allow(dead_code)
    )]
    fn bucket_mut(&mut self, bucket: TimingBucket) -> &mut u64 {
        match bucket {
            TimingBucket::Deduplication => &mut self.deduplication_ns,
            TimingBucket::Triangulation => &mut self.triangulation_ns,
            TimingBucket::Refinement => &mut self.refinement_ns,
            TimingBucket::Smoothing => &mut self.smoothing_ns,
            TimingBucket::BoundaryExtraction => &mut self.boundary_extraction_ns,
        }
    }
}

/// Accumulator for timing pipeline phases.
///
/// When the `mesh_metrics` feature is disabled (or on WASM), all methods are
/// no-ops and [`end`](Self::end) returns `None`.
#[derive(Debug, Default)]
pub struct MeshMetrics {
    #[cfg(all(feature = "mesh_metrics", not(target_arch = "wasm32")))]
    report: MeshTimingReport,
}

impl MeshMetrics {
    /// Resets all counters.
    pub fn begin(&mut self) {
        #[cfg(all(feature = "mesh_metrics", not(target_arch = "wasm32")))]
        {
            self.report = MeshTimingReport::default();
        }
    }

    /// Returns the accumulated report, or `None` if metrics are disabled.
    #[must_use]
    pub fn end(&self) -> Option<MeshTimingReport> {
        #[cfg(all(feature = "mesh_metrics", not(target_arch = "wasm32")))]
        {
            Some(self.report.clone())
        }
        #[cfg(not(all(feature = "mesh_metrics", not(target_arch = "wasm32"))))]
        {
            None
        }
    }

    /// Runs `f` and adds its wall time to `bucket`.
    pub fn time<R>(&mut self, bucket: TimingBucket, f: impl FnOnce() -> R) -> R {
        #[cfg(all(feature = "mesh_metrics", not(target_arch = "wasm32")))]
        {
            let start = std::time::Instant::now();
            let result = f();
            let nanos = start.elapsed().as_nanos().min(u128::from(u64::MAX)) as u64;
            self.add(bucket, nanos);
            result
        }

        #[cfg(not(all(feature = "mesh_metrics", not(target_arch = "wasm32"))))]
        {
            let _ = bucket;
            f()
        }
    }

    #[cfg(all(feature = "mesh_metrics", not(target_arch = "wasm32")))]
    fn add(&mut self, bucket: TimingBucket, nanos: u64) {
        let slot = self.report.bucket_mut(bucket);
        *slot = slot.saturating_add(nanos);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_total_sums_buckets() {
        let mut report = MeshTimingReport::default();
        *report.bucket_mut(TimingBucket::Triangulation) = 1000;
        *report.bucket_mut(TimingBucket::Smoothing) = 2000;
        report.boundary_extraction_ns = 3000;
        assert_eq!(report.total_ns(), 6000);
        assert!((report.total_ms() - 0.006).abs() < 1e-9);
    }

    #[test]
    fn time_returns_closure_result() {
        let mut metrics = MeshMetrics::default();
        metrics.begin();
        assert_eq!(metrics.time(TimingBucket::Refinement, || 42), 42);
        let report = metrics.end();
        if cfg!(all(feature = "mesh_metrics", not(target_arch = "wasm32"))) {
            assert!(report.is_some());
        } else {
            assert!(report.is_none());
        }
    }
}
