use crate::config::schema::{KeepAliveConfig, LegacyConfig, OutputConfig};
use crate::error::{Error, Result};
use crate::output::{ReportSink, console::ConsoleOutput, csv::CsvOutput, json::JsonOutput};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads, migrates and validates a config file. Any error here is fatal:
    /// nothing gets probed with a config that did not pass.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<KeepAliveConfig> {
        let path = path.as_ref();
        let raw = Self::load_file(path)?;
        let config = Self::from_value(raw)?;

        config.validate_all()?;
        Ok(config)
    }

    fn load_file(path: &Path) -> Result<Value> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Ok(serde_json::from_str(&content)?),
            Some("yaml") | Some("yml") => Ok(serde_yaml::from_str(&content)?),
            Some("toml") => Ok(toml::from_str(&content)?),
            _ => Err(Error::Config(format!(
                "Unsupported file extension: {}",
                path.display()
            ))),
        }
    }

    /// Accepts both the multi-site shape and the legacy `websiteUrl` shape.
    pub fn from_value(raw: Value) -> Result<KeepAliveConfig> {
        if raw.get("websiteUrl").is_some() && raw.get("websites").is_none() {
            log::warn!("Legacy single-site config detected, migrating to the multi-site format");
            let legacy: LegacyConfig = serde_json::from_value(raw)?;
            return Ok(legacy.into());
        }

        Ok(serde_json::from_value(raw)?)
    }

    pub fn create_sink(
        config: &KeepAliveConfig,
        multi: Option<Arc<indicatif::MultiProgress>>,
    ) -> Result<Box<dyn ReportSink>> {
        let sink: Box<dyn ReportSink> = match &config.output {
            Some(OutputConfig::Json { path }) => Box::new(JsonOutput::new(PathBuf::from(path))),
            Some(OutputConfig::Csv { path }) => Box::new(CsvOutput::new(PathBuf::from(path))?),
            Some(OutputConfig::Console) | None => Box::new(ConsoleOutput::new(multi)),
        };
        Ok(sink)
    }
}
