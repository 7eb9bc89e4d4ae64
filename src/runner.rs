use crate::config::Site;
use crate::error::Result;
use crate::metrics::collector::MetricsCollector;
use crate::metrics::snapshot::MetricsSnapshot;
use crate::output::{ReportSink, write_report};
use crate::probe::{ProbeOutcome, ProbeSequencer};
use crate::stats::StatsStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Every outcome of one site in one run, in request order.
#[derive(Debug, Clone, Serialize)]
pub struct SiteRunResult {
    pub site: String,
    pub url: String,
    pub outcomes: Vec<ProbeOutcome>,
}

impl SiteRunResult {
    pub fn successful(&self) -> u64 {
        self.outcomes.iter().filter(|o| o.is_success()).count() as u64
    }

    pub fn failed(&self) -> u64 {
        self.outcomes.len() as u64 - self.successful()
    }

    pub fn summary(&self) -> Summary {
        Summary::from_outcomes(self.outcomes.iter())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub sites: Vec<SiteRunResult>,
}

impl RunResult {
    pub fn outcomes(&self) -> impl Iterator<Item = &ProbeOutcome> {
        self.sites.iter().flat_map(|s| s.outcomes.iter())
    }

    pub fn summary(&self) -> Summary {
        Summary::from_outcomes(self.outcomes())
    }

    /// `false` as soon as one probe failed; drives the process exit code.
    pub fn all_succeeded(&self) -> bool {
        self.outcomes().all(|o| o.is_success())
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &ProbeOutcome)> {
        self.sites.iter().flat_map(|s| {
            s.outcomes
                .iter()
                .filter(|o| !o.is_success())
                .map(move |o| (s.site.as_str(), o))
        })
    }
}

/// Derived figures for reporting. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total: u64,
    pub successful: u64,
    pub failed: u64,
    pub success_rate: f64,
    pub avg_duration_ms: u64,
}

impl Summary {
    pub fn from_outcomes<'a>(outcomes: impl Iterator<Item = &'a ProbeOutcome>) -> Self {
        let mut summary = Summary::default();
        let mut total_ms = 0u64;

        for outcome in outcomes {
            summary.total += 1;
            total_ms += outcome.duration_ms;
            if outcome.is_success() {
                summary.successful += 1;
            } else {
                summary.failed += 1;
            }
        }

        if summary.total > 0 {
            summary.success_rate = summary.successful as f64 / summary.total as f64 * 100.0;
            summary.avg_duration_ms = total_ms / summary.total;
        }
        summary
    }
}

/// Probes the configured sites one at a time. Nothing a probe does can
/// abort the run.
pub struct RunOrchestrator {
    sequencer: ProbeSequencer,
    metrics: Arc<MetricsCollector>,
}

impl RunOrchestrator {
    pub fn new(sequencer: ProbeSequencer, metrics: Option<Arc<MetricsCollector>>) -> Self {
        Self {
            sequencer,
            metrics: metrics.unwrap_or_else(|| Arc::new(MetricsCollector::new())),
        }
    }

    pub async fn run(&self, sites: &[Site]) -> RunResult {
        let started_at = Utc::now();
        self.metrics.add_planned(sites.len() as u64 * 3);
        let mut results = Vec::with_capacity(sites.len());

        for site in sites {
            log::info!("Checking site: {} ({})", site.label(), site.url);

            let result = self.sequencer.probe(site).await;
            for outcome in &result.outcomes {
                self.metrics.record(outcome);
            }
            self.metrics.increment_sites_completed();

            let summary = result.summary();
            log::info!(
                "{}: {}/{} succeeded, avg {}ms",
                result.site,
                summary.successful,
                summary.total,
                summary.avg_duration_ms
            );
            results.push(result);
        }

        let run = RunResult {
            started_at,
            finished_at: Utc::now(),
            sites: results,
        };
        Self::log_summary(&run);
        run
    }

    fn log_summary(run: &RunResult) {
        let summary = run.summary();
        log::info!(
            "Run finished: {} sites, {} probes, {} succeeded, {} failed ({:.1}%), avg {}ms",
            run.sites.len(),
            summary.total,
            summary.successful,
            summary.failed,
            summary.success_rate,
            summary.avg_duration_ms
        );

        if run.all_succeeded() {
            log::info!("All probes of all sites succeeded");
            return;
        }
        for (site, outcome) in run.failures() {
            log::warn!(
                "{}: {} failed: {}",
                site,
                outcome.url,
                outcome.error().unwrap_or("unknown error")
            );
        }
    }

    pub fn get_metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn watch_metrics(&self) -> watch::Receiver<MetricsSnapshot> {
        let (tx, rx) = watch::channel(self.metrics.snapshot());
        let metrics = self.metrics.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_millis(250));
            loop {
                interval.tick().await;
                if tx.send(metrics.snapshot()).is_err() {
                    break;
                }
            }
        });
        rx
    }
}

/// Merges `run` into the stats file, then writes the report. Stats come
/// first; a report that cannot be written is logged and does not fail the run.
pub async fn finish_run(run: &RunResult, store: Option<&StatsStore>, sink: &mut dyn ReportSink) -> Result<()> {
    if let Some(store) = store {
        store.record(run)?;
    }
    if let Err(e) = write_report(sink, run).await {
        log::error!("Failed to write report: {}", e);
    }
    Ok(())
}
