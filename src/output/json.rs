use super::ReportSink;
use crate::error::Result;
use crate::runner::{RunResult, SiteRunResult, Summary};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::{self, File};
use std::path::PathBuf;

/// Writes one JSON document per run; the file is replaced on close.
pub struct JsonOutput {
    path: PathBuf,
    sites: Vec<SiteRunResult>,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    timestamp: DateTime<Utc>,
    sites: &'a [SiteRunResult],
    summary: Summary,
}

impl JsonOutput {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            sites: Vec::new(),
        }
    }
}

#[async_trait]
impl ReportSink for JsonOutput {
    async fn write(&mut self, site: &SiteRunResult) -> Result<()> {
        self.sites.push(site.clone());
        Ok(())
    }

    async fn close(&mut self, run: &RunResult) -> Result<()> {
        let report = JsonReport {
            timestamp: run.finished_at,
            sites: &self.sites,
            summary: run.summary(),
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(&self.path)?;
        serde_json::to_writer_pretty(file, &report)?;
        log::info!("Report written to {}", self.path.display());
        self.sites.clear();
        Ok(())
    }
}
