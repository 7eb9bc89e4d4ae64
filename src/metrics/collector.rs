use crate::metrics::snapshot::MetricsSnapshot;
use crate::probe::ProbeOutcome;
use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};
use std::time::Instant;

#[derive(Clone)]
pub struct MetricsCollector {
    probes_planned: Arc<AtomicU64>,
    probes_success: Arc<AtomicU64>,
    probes_failed: Arc<AtomicU64>,
    sites_completed: Arc<AtomicU64>,
    total_response_time_ms: Arc<AtomicU64>,
    start_time: Arc<Instant>,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self {
            probes_planned: Arc::new(AtomicU64::new(0)),
            probes_success: Arc::new(AtomicU64::new(0)),
            probes_failed: Arc::new(AtomicU64::new(0)),
            sites_completed: Arc::new(AtomicU64::new(0)),
            total_response_time_ms: Arc::new(AtomicU64::new(0)),
            start_time: Arc::new(Instant::now()),
        }
    }
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_planned(&self, probes: u64) {
        self.probes_planned.fetch_add(probes, Ordering::SeqCst);
    }

    pub fn record(&self, outcome: &ProbeOutcome) {
        if outcome.is_success() {
            self.probes_success.fetch_add(1, Ordering::SeqCst);
        } else {
            self.probes_failed.fetch_add(1, Ordering::SeqCst);
        }
        self.total_response_time_ms
            .fetch_add(outcome.duration_ms, Ordering::SeqCst);
    }

    pub fn increment_sites_completed(&self) {
        self.sites_completed.fetch_add(1, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let success = self.probes_success.load(Ordering::SeqCst);
        let failed = self.probes_failed.load(Ordering::SeqCst);
        let completed = success + failed;
        let total_time = self.total_response_time_ms.load(Ordering::SeqCst);

        let success_rate = if completed > 0 {
            (success as f64 / completed as f64) * 100.0
        } else {
            0.0
        };

        let avg_response_time_ms = if completed > 0 {
            total_time / completed
        } else {
            0
        };

        MetricsSnapshot {
            probes_planned: self.probes_planned.load(Ordering::SeqCst),
            probes_completed: completed,
            probes_success: success,
            probes_failed: failed,
            sites_completed: self.sites_completed.load(Ordering::SeqCst),
            success_rate,
            avg_response_time_ms,
            elapsed_seconds: self.start_time.elapsed().as_secs_f64(),
        }
    }
}
