use serde::{Deserialize, Serialize};

/// Live view of the current run, for the progress display.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub probes_planned: u64,
    pub probes_completed: u64,
    pub probes_success: u64,
    pub probes_failed: u64,
    pub sites_completed: u64,
    pub success_rate: f64,
    pub avg_response_time_ms: u64,
    pub elapsed_seconds: f64,
}
