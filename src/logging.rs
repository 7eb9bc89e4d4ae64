use crate::error::{Error, Result};
use chrono::{SecondsFormat, Utc};
use env_logger::{Builder, Env, Logger, Target};
use indicatif::MultiProgress;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

/// Day log file shared with the logger. Empty until [`LogFile::attach`], so
/// logging can start before the config naming the log directory is read.
#[derive(Clone, Default)]
pub struct LogFile {
    file: Arc<Mutex<Option<File>>>,
}

impl LogFile {
    /// Opens `<dir>/<YYYY-MM-DD>.log` for appending, creating `dir`, and sends
    /// every following log line there too.
    pub fn attach(&self, dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = daily_log_path(dir);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        *self.lock() = Some(file);
        Ok(path)
    }

    fn lock(&self) -> MutexGuard<'_, Option<File>> {
        self.file.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Sends every log line to stderr and, once attached, to the day's log file.
struct Tee {
    file: LogFile,
}

impl Write for Tee {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stderr().write_all(buf)?;
        if let Some(file) = self.file.lock().as_mut() {
            file.write_all(buf)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()?;
        if let Some(file) = self.file.lock().as_mut() {
            file.flush()?;
        }
        Ok(())
    }
}

/// `<dir>/<YYYY-MM-DD>.log`, UTC date.
pub fn daily_log_path(dir: &Path) -> PathBuf {
    dir.join(format!("{}.log", Utc::now().format("%Y-%m-%d")))
}

/// Logger with `info` as default filter (`RUST_LOG` overrides) and lines
/// shaped `[timestamp] [LEVEL] message`, written to stderr and `file`.
pub fn build_logger(file: LogFile) -> Logger {
    Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] [{}] {}",
                Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
                record.level(),
                record.args()
            )
        })
        .target(Target::Pipe(Box::new(Tee { file })))
        .build()
}

/// Installs `logger` globally. With a progress display, log lines are
/// routed through it so bars are redrawn below them.
pub fn init(logger: Logger, multi: Option<MultiProgress>) -> Result<()> {
    let max_level = logger.filter();

    match multi {
        Some(multi) => indicatif_log_bridge::LogWrapper::new(multi, logger)
            .try_init()
            .map_err(|e| Error::Internal(e.to_string()))?,
        None => log::set_boxed_logger(Box::new(logger))
            .map_err(|e| Error::Internal(e.to_string()))?,
    }

    log::set_max_level(max_level);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn log_file_is_named_after_the_day() {
        let path = daily_log_path(Path::new("logs"));
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.ends_with(".log"));
        assert_eq!(name.len(), "2024-01-01.log".len());
        assert!(path.starts_with("logs"));
    }

    #[test]
    fn tee_writes_to_file_only_after_attach() {
        let dir = TempDir::new().unwrap();
        let log_dir = dir.path().join("logs");
        let file = LogFile::default();
        let mut tee = Tee { file: file.clone() };

        tee.write_all(b"[t] [WARN] before\n").unwrap();
        let path = file.attach(&log_dir).unwrap();
        tee.write_all(b"[t] [INFO] after\n").unwrap();
        tee.flush().unwrap();

        assert_eq!(path, daily_log_path(&log_dir));
        assert_eq!(fs::read_to_string(&path).unwrap(), "[t] [INFO] after\n");
    }

    #[test]
    fn attach_appends_to_existing_day_file() {
        let dir = TempDir::new().unwrap();
        let path = daily_log_path(dir.path());
        fs::write(&path, "old\n").unwrap();

        let file = LogFile::default();
        let mut tee = Tee { file: file.clone() };
        file.attach(dir.path()).unwrap();
        tee.write_all(b"new\n").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "old\nnew\n");
    }
}
