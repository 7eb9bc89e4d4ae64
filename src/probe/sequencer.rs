use super::Executor;
use crate::config::{GlobalSettings, Site};
use crate::runner::SiteRunResult;
use std::sync::Arc;

/// The three URLs every site is probed on, in request order.
pub fn derive_urls(base: &str) -> [String; 3] {
    let trimmed = base.trim_end_matches('/');
    [
        base.to_string(),
        format!("{}/start.html", trimmed),
        format!("{}/index.html", trimmed),
    ]
}

pub struct ProbeSequencer {
    executor: Arc<dyn Executor>,
    global: GlobalSettings,
}

impl ProbeSequencer {
    pub fn new(executor: Arc<dyn Executor>, global: GlobalSettings) -> Self {
        Self { executor, global }
    }

    /// Probes every derived URL of `site` one after the other. A failed URL
    /// does not stop the sequence.
    pub async fn probe(&self, site: &Site) -> SiteRunResult {
        let settings = site.settings(&self.global);
        let mut outcomes = Vec::with_capacity(3);

        for url in derive_urls(&site.url) {
            log::info!("Visiting: {}", url);
            let outcome = self.executor.execute(&url, &settings).await;

            if outcome.is_success() {
                log::info!(
                    "OK {} (status {}, {}ms)",
                    url,
                    outcome.status().unwrap_or_default(),
                    outcome.duration_ms
                );
            } else {
                log::error!(
                    "FAILED {} ({}, {}ms)",
                    url,
                    outcome.error().unwrap_or("unknown error"),
                    outcome.duration_ms
                );
            }
            outcomes.push(outcome);
        }

        SiteRunResult {
            site: site.label().to_string(),
            url: site.url.clone(),
            outcomes,
        }
    }
}
