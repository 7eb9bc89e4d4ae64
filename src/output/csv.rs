use super::ReportSink;
use crate::error::Result;
use crate::runner::{RunResult, SiteRunResult};
use async_trait::async_trait;
use std::fs;
use std::path::PathBuf;

const HEADERS: [&str; 9] = [
    "site",
    "url",
    "success",
    "status",
    "duration_ms",
    "attempts",
    "response_length",
    "error",
    "timestamp",
];

/// One row per probe outcome.
pub struct CsvOutput {
    writer: csv::Writer<std::fs::File>,
}

impl CsvOutput {
    pub fn new(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(HEADERS)?;
        Ok(Self { writer })
    }
}

#[async_trait]
impl ReportSink for CsvOutput {
    async fn write(&mut self, site: &SiteRunResult) -> Result<()> {
        for outcome in &site.outcomes {
            let status = outcome.status().map(|s| s.to_string()).unwrap_or_default();
            let length = outcome
                .response_length()
                .map(|l| l.to_string())
                .unwrap_or_default();

            self.writer.write_record([
                site.site.as_str(),
                outcome.url.as_str(),
                if outcome.is_success() { "true" } else { "false" },
                status.as_str(),
                outcome.duration_ms.to_string().as_str(),
                outcome.attempts.to_string().as_str(),
                length.as_str(),
                outcome.error().unwrap_or_default(),
                outcome.timestamp.to_rfc3339().as_str(),
            ])?;
        }
        Ok(())
    }

    async fn close(&mut self, _run: &RunResult) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}
