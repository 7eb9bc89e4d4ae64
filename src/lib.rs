pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod output;
pub mod probe;
pub mod runner;
pub mod stats;

pub use config::{ConfigLoader, GlobalSettings, KeepAliveConfig, Site};
pub use error::{Error, Result};
pub use metrics::collector::MetricsCollector;
pub use metrics::snapshot::MetricsSnapshot;
pub use probe::{Executor, HttpExecutor, ProbeOutcome, ProbeResult, ProbeSequencer, ProbeSettings};
pub use runner::{RunOrchestrator, RunResult, SiteRunResult, Summary};
pub use stats::{Counters, PersistedStats, StatsStore};
