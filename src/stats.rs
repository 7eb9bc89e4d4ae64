use crate::error::Result;
use crate::runner::RunResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Success/failure counters of one scope (global or one site).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Counters {
    pub total_runs: u64,
    pub total_success: u64,
    pub total_failed: u64,
}

impl Counters {
    /// Reads whatever counters are present and numeric; the rest stay zero.
    fn from_json(value: &Value) -> Self {
        Self {
            total_runs: count(value, "totalRuns"),
            total_success: count(value, "totalSuccess"),
            total_failed: count(value, "totalFailed"),
        }
    }

    fn add(&mut self, success: u64, failed: u64) {
        self.total_runs += 1;
        self.total_success += success;
        self.total_failed += failed;
    }

    /// Share of successful probes, in percent.
    pub fn success_rate(&self) -> f64 {
        let probes = self.total_success + self.total_failed;
        if probes == 0 {
            return 0.0;
        }
        self.total_success as f64 / probes as f64 * 100.0
    }
}

/// Historical counters kept across runs. Missing fields default to zero so
/// older or partial files still load with their per-site map intact.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PersistedStats {
    pub last_run: Option<DateTime<Utc>>,
    pub total_runs: u64,
    pub total_success: u64,
    pub total_failed: u64,
    pub websites: BTreeMap<String, Counters>,
}

impl PersistedStats {
    /// Field-by-field read of a stats document. A field of the wrong shape is
    /// reset on its own, so one bad value never wipes the other counters.
    pub fn from_json(value: &Value) -> Self {
        let last_run = match value.get("lastRun") {
            None | Some(Value::Null) => None,
            Some(raw) => {
                let parsed = raw
                    .as_str()
                    .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                    .map(|t| t.with_timezone(&Utc));
                if parsed.is_none() {
                    log::warn!("Ignoring unreadable lastRun {} in stats file", raw);
                }
                parsed
            }
        };

        let websites = value
            .get("websites")
            .and_then(Value::as_object)
            .map(|sites| {
                sites
                    .iter()
                    .filter(|(_, counters)| counters.is_object())
                    .map(|(site, counters)| (site.clone(), Counters::from_json(counters)))
                    .collect()
            })
            .unwrap_or_default();

        let totals = Counters::from_json(value);
        Self {
            last_run,
            total_runs: totals.total_runs,
            total_success: totals.total_success,
            total_failed: totals.total_failed,
            websites,
        }
    }

    pub fn totals(&self) -> Counters {
        Counters {
            total_runs: self.total_runs,
            total_success: self.total_success,
            total_failed: self.total_failed,
        }
    }

    /// Folds one run into the counters. Counters only ever grow.
    pub fn merge(mut self, run: &RunResult, now: DateTime<Utc>) -> Self {
        let mut totals = self.totals();
        let (mut success, mut failed) = (0, 0);

        for site in &run.sites {
            let (site_success, site_failed) = (site.successful(), site.failed());
            self.websites
                .entry(site.site.clone())
                .or_default()
                .add(site_success, site_failed);
            success += site_success;
            failed += site_failed;
        }

        totals.add(success, failed);
        self.total_runs = totals.total_runs;
        self.total_success = totals.total_success;
        self.total_failed = totals.total_failed;
        self.last_run = Some(now);
        self
    }
}

fn count(value: &Value, key: &str) -> u64 {
    value.get(key).and_then(Value::as_u64).unwrap_or_default()
}

/// JSON file holding [`PersistedStats`]. Writes replace the whole file; there
/// is no locking, runs are expected to be serialized by whoever schedules them.
pub struct StatsStore {
    path: PathBuf,
}

impl StatsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Never fails: an absent or unreadable file means starting from zero.
    pub fn load(&self) -> PersistedStats {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::debug!("No stats file at {}, starting fresh", self.path.display());
                return PersistedStats::default();
            }
            Err(e) => {
                log::warn!("Cannot read stats file {}: {}, starting fresh", self.path.display(), e);
                return PersistedStats::default();
            }
        };

        match serde_json::from_str::<Value>(&content) {
            Ok(value) if value.is_object() => PersistedStats::from_json(&value),
            Ok(_) => {
                log::warn!("Stats file {} is not a JSON object, starting fresh", self.path.display());
                PersistedStats::default()
            }
            Err(e) => {
                log::warn!("Stats file {} is corrupt: {}, starting fresh", self.path.display(), e);
                PersistedStats::default()
            }
        }
    }

    /// Writes to a sibling temp file then renames it over the target.
    pub fn save(&self, stats: &PersistedStats) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut tmp_name = self.path.file_name().unwrap_or_default().to_os_string();
        tmp_name.push(".tmp");
        let tmp = self.path.with_file_name(tmp_name);

        fs::write(&tmp, serde_json::to_string_pretty(stats)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Load, merge `run`, save. Returns what was written.
    pub fn record(&self, run: &RunResult) -> Result<PersistedStats> {
        let stats = self.load().merge(run, Utc::now());
        self.save(&stats)?;
        log::info!(
            "Stats: {} runs, {} succeeded, {} failed ({:.1}%)",
            stats.total_runs,
            stats.total_success,
            stats.total_failed,
            stats.totals().success_rate()
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::ProbeOutcome;
    use crate::runner::SiteRunResult;
    use std::time::Duration;
    use tempfile::TempDir;

    fn site(name: &str, statuses: &[u16]) -> SiteRunResult {
        SiteRunResult {
            site: name.to_string(),
            url: format!("https://{}.example.com", name),
            outcomes: statuses
                .iter()
                .map(|s| ProbeOutcome::completed("u", *s, 0, Duration::from_millis(5), 1))
                .collect(),
        }
    }

    fn run(sites: Vec<SiteRunResult>) -> RunResult {
        let now = Utc::now();
        RunResult {
            started_at: now,
            finished_at: now,
            sites,
        }
    }

    #[test]
    fn merge_adds_run_to_existing_totals() {
        let existing: PersistedStats =
            serde_json::from_str(r#"{"totalRuns": 5, "totalSuccess": 10, "totalFailed": 5}"#).unwrap();

        let merged = existing.merge(&run(vec![site("a", &[200, 200, 200])]), Utc::now());

        assert_eq!(merged.total_runs, 6);
        assert_eq!(merged.total_success, 13);
        assert_eq!(merged.total_failed, 5);
        assert_eq!(merged.websites["a"], Counters { total_runs: 1, total_success: 3, total_failed: 0 });
        assert!(merged.last_run.is_some());
    }

    #[test]
    fn partial_failure_counts_per_site() {
        let merged = PersistedStats::default().merge(
            &run(vec![site("a", &[200, 200, 500]), site("b", &[503, 503, 503])]),
            Utc::now(),
        );

        assert_eq!(merged.totals(), Counters { total_runs: 1, total_success: 2, total_failed: 4 });
        assert_eq!(merged.websites["a"], Counters { total_runs: 1, total_success: 2, total_failed: 1 });
        assert_eq!(merged.websites["b"], Counters { total_runs: 1, total_success: 0, total_failed: 3 });
    }

    #[test]
    fn merge_order_does_not_matter() {
        let now = Utc::now();
        let first = run(vec![site("a", &[200, 500, 200])]);
        let second = run(vec![site("a", &[200, 200, 200]), site("b", &[404, 200, 200])]);

        let ab = PersistedStats::default().merge(&first, now).merge(&second, now);
        let ba = PersistedStats::default().merge(&second, now).merge(&first, now);

        assert_eq!(ab, ba);
        assert_eq!(ab.total_runs, 2);
        assert_eq!(ab.websites["a"].total_runs, 2);
        assert_eq!(ab.websites["b"].total_runs, 1);
    }

    #[test]
    fn missing_file_loads_as_zeroed() {
        let dir = TempDir::new().unwrap();
        let store = StatsStore::new(dir.path().join("stats.json"));

        assert_eq!(store.load(), PersistedStats::default());
    }

    #[test]
    fn corrupt_file_loads_as_zeroed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("stats.json");
        fs::write(&path, "{ not json").unwrap();

        assert_eq!(StatsStore::new(&path).load(), PersistedStats::default());
    }

    #[test]
    fn partial_file_keeps_site_map() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("stats.json");
        fs::write(
            &path,
            r#"{"totalRuns": 2, "websites": {"blog": {"totalRuns": 2, "totalSuccess": 6}}}"#,
        )
        .unwrap();

        let stats = StatsStore::new(&path).load();
        assert_eq!(stats.total_runs, 2);
        assert_eq!(stats.total_success, 0);
        assert_eq!(stats.last_run, None);
        assert_eq!(stats.websites["blog"], Counters { total_runs: 2, total_success: 6, total_failed: 0 });
    }

    #[test]
    fn bad_last_run_keeps_counters() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("stats.json");
        fs::write(
            &path,
            r#"{"lastRun": "yesterday", "totalRuns": 500, "totalSuccess": 1400, "totalFailed": 100,
                "websites": {"a": {"totalRuns": 500, "totalSuccess": 1400, "totalFailed": 100}}}"#,
        )
        .unwrap();

        let stats = StatsStore::new(&path).load();
        assert_eq!(stats.last_run, None);
        assert_eq!(stats.totals(), Counters { total_runs: 500, total_success: 1400, total_failed: 100 });
        assert_eq!(stats.websites["a"], stats.totals());
    }

    #[test]
    fn mistyped_fields_reset_alone() {
        let value = serde_json::json!({
            "lastRun": "2024-03-01T08:00:00.000Z",
            "totalRuns": "many",
            "totalSuccess": 9,
            "websites": {"a": {"totalRuns": -1, "totalSuccess": 4}, "b": 7}
        });

        let stats = PersistedStats::from_json(&value);
        assert!(stats.last_run.is_some());
        assert_eq!(stats.total_runs, 0);
        assert_eq!(stats.total_success, 9);
        assert_eq!(stats.websites.len(), 1);
        assert_eq!(stats.websites["a"], Counters { total_runs: 0, total_success: 4, total_failed: 0 });
    }

    #[test]
    fn reads_timestamps_written_by_other_tools() {
        let stats: PersistedStats =
            serde_json::from_str(r#"{"lastRun": "2024-03-01T08:00:00.000Z", "totalRuns": 1}"#).unwrap();
        assert!(stats.last_run.is_some());
    }

    #[test]
    fn record_creates_directory_and_accumulates() {
        let dir = TempDir::new().unwrap();
        let store = StatsStore::new(dir.path().join("logs").join("stats.json"));

        store.record(&run(vec![site("a", &[200, 200, 500])])).unwrap();
        let stats = store.record(&run(vec![site("a", &[200, 200, 200])])).unwrap();

        assert_eq!(stats.totals(), Counters { total_runs: 2, total_success: 5, total_failed: 1 });
        assert_eq!(store.load(), stats);
        assert!(!dir.path().join("logs").join("stats.json.tmp").exists());

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(raw["totalRuns"], 2);
        assert_eq!(raw["websites"]["a"]["totalSuccess"], 5);
    }

    #[test]
    fn success_rate_is_over_probes() {
        let counters = Counters { total_runs: 2, total_success: 3, total_failed: 1 };
        assert_eq!(counters.success_rate(), 75.0);
        assert_eq!(Counters::default().success_rate(), 0.0);
    }
}
