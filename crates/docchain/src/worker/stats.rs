use serde::Serialize;

/// Snapshot returned by `WorkerPool::stats`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolStats {
    pub active_count: usize,
    pub completed_count: usize,
    pub queue_depth: usize,
    pub worker_count: usize,
    pub total_processed: u64,
    pub total_failed: u64,
    pub total_validation_failed: u64,
    pub average_processing_time_secs: f64,
}

/// Running totals kept by the pool.
#[derive(Debug, Clone, Default)]
pub(crate) struct Counters {
    pub processed: u64,
    pub failed: u64,
    pub validation_failed: u64,
    /// Mean over completed tasks only.
    pub average_secs: f64,
}

impl Counters {
    pub fn record_completed(&mut self, secs: f64) {
        self.processed += 1;
        let n = self.processed as f64;
        self.average_secs = (self.average_secs * (n - 1.0) + secs) / n;
    }

    pub fn record_failed(&mut self) {
        self.failed += 1;
    }

    pub fn record_validation_failed(&mut self) {
        self.validation_failed += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_mean_over_completed_only() {
        let mut counters = Counters::default();
        counters.record_completed(2.0);
        counters.record_failed();
        counters.record_completed(4.0);
        counters.record_validation_failed();
        counters.record_completed(6.0);

        assert_eq!(counters.processed, 3);
        assert_eq!(counters.failed, 1);
        assert_eq!(counters.validation_failed, 1);
        assert!((counters.average_secs - 4.0).abs() < 1e-9);
    }
}
