use super::ReportSink;
use crate::error::{Error, Result};
use crate::runner::SiteRunResult;
use async_trait::async_trait;
use indicatif::MultiProgress;
use std::sync::Arc;

pub struct ConsoleOutput {
    multi: Option<Arc<MultiProgress>>,
}

impl ConsoleOutput {
    pub fn new(multi: Option<Arc<MultiProgress>>) -> Self {
        Self { multi }
    }

    fn print(&self, line: &str) -> Result<()> {
        if let Some(multi) = &self.multi {
            multi.println(line).map_err(|e| Error::Internal(e.to_string()))?;
        } else {
            println!("{}", line);
        }
        Ok(())
    }
}

impl Default for ConsoleOutput {
    fn default() -> Self {
        Self::new(None)
    }
}

#[async_trait]
impl ReportSink for ConsoleOutput {
    async fn write(&mut self, site: &SiteRunResult) -> Result<()> {
        let summary = site.summary();
        self.print(&format!(
            "🌐 {} ({}/{} ok, avg {}ms)",
            site.site, summary.successful, summary.total, summary.avg_duration_ms
        ))?;

        for outcome in &site.outcomes {
            let line = if outcome.is_success() {
                format!(
                    "   ✅ {} status {} in {}ms, {} bytes",
                    outcome.url,
                    outcome.status().unwrap_or_default(),
                    outcome.duration_ms,
                    outcome.response_length().unwrap_or_default()
                )
            } else {
                format!(
                    "   ❌ {} {} after {} attempt(s), {}ms",
                    outcome.url,
                    outcome.error().unwrap_or("unknown error"),
                    outcome.attempts,
                    outcome.duration_ms
                )
            };
            self.print(&line)?;
        }
        Ok(())
    }
}
