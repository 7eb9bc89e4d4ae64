use crate::error::Result;
use crate::runner::{RunResult, SiteRunResult};
use async_trait::async_trait;

pub mod console;
pub mod csv;
pub mod json;

/// Destination for run reports. Fed one site at a time, closed with the
/// whole run.
#[async_trait]
pub trait ReportSink: Send + Sync {
    async fn write(&mut self, site: &SiteRunResult) -> Result<()>;
    async fn close(&mut self, _run: &RunResult) -> Result<()> {
        Ok(())
    }
}

/// Writes every site of `run` to `sink`, then closes it.
pub async fn write_report(sink: &mut dyn ReportSink, run: &RunResult) -> Result<()> {
    for site in &run.sites {
        sink.write(site).await?;
    }
    sink.close(run).await
}
