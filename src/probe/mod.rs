pub mod executor;
pub mod sequencer;

pub use executor::{BACKOFF_UNIT, HttpExecutor, backoff_delay};
pub use sequencer::{ProbeSequencer, derive_urls};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Effective request settings for one site.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeSettings {
    pub timeout: Duration,
    pub max_retries: u32,
    pub user_agent: String,
}

/// Issues one probe (a request plus its retries) and reports how it went.
/// Implementations never fail: every failure mode ends up in the outcome.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(&self, url: &str, settings: &ProbeSettings) -> ProbeOutcome;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum ProbeResult {
    Success {
        status: u16,
        response_length: usize,
    },
    Failure {
        /// Absent when no response arrived (transport error or timeout).
        status: Option<u16>,
        error: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeOutcome {
    pub url: String,
    pub timestamp: DateTime<Utc>,
    /// Time spent in requests, summed over attempts. Backoff sleeps excluded.
    pub duration_ms: u64,
    pub attempts: u32,
    #[serde(flatten)]
    pub result: ProbeResult,
}

impl ProbeOutcome {
    /// Outcome for a response that arrived; only 2xx counts as success.
    pub fn completed(
        url: &str,
        status: u16,
        response_length: usize,
        duration: Duration,
        attempts: u32,
    ) -> Self {
        let result = if (200..300).contains(&status) {
            ProbeResult::Success {
                status,
                response_length,
            }
        } else {
            let reason = StatusCode::from_u16(status)
                .ok()
                .and_then(|s| s.canonical_reason());
            let error = match reason {
                Some(reason) => format!("HTTP {} {}", status, reason),
                None => format!("HTTP {}", status),
            };
            ProbeResult::Failure {
                status: Some(status),
                error,
            }
        };
        Self::new(url, duration, attempts, result)
    }

    /// Outcome for a probe that never got a response.
    pub fn unreachable(url: &str, error: impl Into<String>, duration: Duration, attempts: u32) -> Self {
        Self::new(
            url,
            duration,
            attempts,
            ProbeResult::Failure {
                status: None,
                error: error.into(),
            },
        )
    }

    fn new(url: &str, duration: Duration, attempts: u32, result: ProbeResult) -> Self {
        Self {
            url: url.to_string(),
            timestamp: Utc::now(),
            duration_ms: duration.as_millis() as u64,
            attempts,
            result,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.result, ProbeResult::Success { .. })
    }

    pub fn status(&self) -> Option<u16> {
        match &self.result {
            ProbeResult::Success { status, .. } => Some(*status),
            ProbeResult::Failure { status, .. } => *status,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.result {
            ProbeResult::Success { .. } => None,
            ProbeResult::Failure { error, .. } => Some(error),
        }
    }

    pub fn response_length(&self) -> Option<usize> {
        match &self.result {
            ProbeResult::Success {
                response_length, ..
            } => Some(*response_length),
            ProbeResult::Failure { .. } => None,
        }
    }
}
