use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

/// Counters owned by one engine instance
#[derive(Debug, Default)]
pub struct EngineMetrics {
    analysis_count: AtomicUsize,
    analysis_micros: AtomicU64,
    update_count: AtomicUsize,
    update_micros: AtomicU64,
    query_count: AtomicUsize,
    files_parsed: AtomicUsize,
    parse_failures: AtomicUsize,
    slow_updates: AtomicUsize,
}

impl EngineMetrics {
    pub fn record_analysis(&self, elapsed: Duration) {
        self.analysis_count.fetch_add(1, Ordering::Relaxed);
        self.analysis_micros
            .fetch_add(duration_micros(elapsed), Ordering::Relaxed);
    }

    pub fn record_update(&self, elapsed: Duration) {
        self.update_count.fetch_add(1, Ordering::Relaxed);
        self.update_micros
            .fetch_add(duration_micros(elapsed), Ordering::Relaxed);
    }

    pub fn record_query(&self) {
        self.query_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_parsed(&self) {
        self.files_parsed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_parse_failure(&self) {
        self.parse_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_slow_update(&self) {
        self.slow_updates.fetch_add(1, Ordering::Relaxed);
    }

    /// Counter values; cache-derived fields are left at zero for the caller
    pub fn snapshot(&self) -> MetricsSnapshot {
        let analysis_count = self.analysis_count.load(Ordering::Relaxed);
        let update_count = self.update_count.load(Ordering::Relaxed);
        MetricsSnapshot {
            avg_analysis_time_ms: average_ms(
                self.analysis_micros.load(Ordering::Relaxed),
                analysis_count,
            ),
            avg_update_time_ms: average_ms(self.update_micros.load(Ordering::Relaxed), update_count),
            analysis_count,
            update_count,
            query_count: self.query_count.load(Ordering::Relaxed),
            files_parsed: self.files_parsed.load(Ordering::Relaxed),
            parse_failures: self.parse_failures.load(Ordering::Relaxed),
            slow_updates: self.slow_updates.load(Ordering::Relaxed),
            cache_size: 0,
            project_count: 0,
            memory_usage_bytes: 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub avg_analysis_time_ms: f64,
    pub avg_update_time_ms: f64,
    pub analysis_count: usize,
    pub update_count: usize,
    pub query_count: usize,
    pub files_parsed: usize,
    pub parse_failures: usize,
    pub slow_updates: usize,
    /// Cached syntax trees
    pub cache_size: usize,
    /// Cached project contexts
    pub project_count: usize,
    /// Estimated size of the cached trees
    pub memory_usage_bytes: usize,
}

#[allow(clippy::cast_possible_truncation)]
fn duration_micros(elapsed: Duration) -> u64 {
    elapsed.as_micros().min(u128::from(u64::MAX)) as u64
}

#[allow(clippy::cast_precision_loss)]
fn average_ms(total_micros: u64, count: usize) -> f64 {
    if count == 0 {
        return 0.0;
    }
    total_micros as f64 / 1000.0 / count as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn averages_over_recorded_durations() {
        let metrics = EngineMetrics::default();
        assert_eq!(metrics.snapshot().avg_update_time_ms, 0.0);

        metrics.record_update(Duration::from_millis(10));
        metrics.record_update(Duration::from_millis(30));
        metrics.record_slow_update();
        metrics.record_query();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.update_count, 2);
        assert_eq!(snapshot.avg_update_time_ms, 20.0);
        assert_eq!(snapshot.slow_updates, 1);
        assert_eq!(snapshot.query_count, 1);
        assert_eq!(snapshot.analysis_count, 0);
    }
}
