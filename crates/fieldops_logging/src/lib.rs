//! Shared logging utilities for Field Ops binaries.
//!
//! Each run appends to a day file, `<app>-YYYY-MM-DD.log`, under
//! `~/.fieldops/logs`. Only the newest [`KEEP_DAYS`] day files are kept.
//! Stderr only shows warnings unless `verbose` is set.

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_LOG_FILTER: &str =
    "fieldops=info,fieldops_core=info,fieldops_backend=info,fieldops_session=info";

/// Day files kept per app.
pub const KEEP_DAYS: usize = 7;

/// Logging configuration shared by Field Ops binaries.
pub struct LogConfig<'a> {
    pub app_name: &'a str,
    pub verbose: bool,
    /// Overrides `~/.fieldops/logs`.
    pub log_dir: Option<PathBuf>,
}

/// Install the tracing subscriber: day file plus stderr.
pub fn init_logging(config: LogConfig<'_>) -> Result<()> {
    let log_dir = match config.log_dir {
        Some(dir) => dir,
        None => ensure_logs_dir()?,
    };
    let app = sanitize_name(config.app_name);
    let today = Local::now().date_naive();

    let file = open_day_file(&log_dir, &app, today)
        .with_context(|| format!("Failed to open log file in {}", log_dir.display()))?;
    let removed = prune_day_files(&log_dir, &app, KEEP_DAYS).unwrap_or(0);

    let file_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let console_filter = if config.verbose {
        file_filter.clone()
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(DayFileWriter::new(file))
                .with_ansi(false)
                .with_filter(file_filter),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(console_filter),
        )
        .try_init()
        .context("Failed to install tracing subscriber")?;

    if removed > 0 {
        tracing::debug!(removed, "Pruned old log files");
    }
    Ok(())
}

/// Get the Field Ops home directory: ~/.fieldops
///
/// Priority:
/// 1) FIELDOPS_HOME
/// 2) the user's home directory
/// 3) ./.fieldops
pub fn fieldops_home() -> PathBuf {
    if let Ok(override_path) = std::env::var("FIELDOPS_HOME") {
        return PathBuf::from(override_path);
    }
    dirs::home_dir()
        .map(|home| home.join(".fieldops"))
        .unwrap_or_else(|| PathBuf::from(".").join(".fieldops"))
}

/// Get the logs directory: ~/.fieldops/logs
pub fn logs_dir() -> PathBuf {
    fieldops_home().join("logs")
}

/// Ensure the logs directory exists.
pub fn ensure_logs_dir() -> Result<PathBuf> {
    let logs = logs_dir();
    fs::create_dir_all(&logs)
        .with_context(|| format!("Failed to create logs directory: {}", logs.display()))?;
    Ok(logs)
}

fn day_file_name(app: &str, day: NaiveDate) -> String {
    format!("{}-{}.log", app, day.format("%Y-%m-%d"))
}

/// Day encoded in a file name produced by [`day_file_name`].
fn parse_day_file(app: &str, file_name: &str) -> Option<NaiveDate> {
    let day = file_name
        .strip_prefix(app)?
        .strip_prefix('-')?
        .strip_suffix(".log")?;
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

fn open_day_file(dir: &Path, app: &str, day: NaiveDate) -> io::Result<File> {
    fs::create_dir_all(dir)?;
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join(day_file_name(app, day)))
}

/// Delete all but the newest `keep` day files of `app`. Returns how many went.
fn prune_day_files(dir: &Path, app: &str, keep: usize) -> io::Result<usize> {
    let mut days: Vec<(NaiveDate, PathBuf)> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let name = entry.file_name();
            let day = parse_day_file(app, name.to_str()?)?;
            Some((day, entry.path()))
        })
        .collect();
    if days.len() <= keep {
        return Ok(0);
    }

    days.sort_by(|a, b| b.0.cmp(&a.0));
    let mut removed = 0;
    for (_, path) in days.into_iter().skip(keep) {
        fs::remove_file(&path)?;
        removed += 1;
    }
    Ok(removed)
}

/// Shares one open day file between tracing's writers.
#[derive(Clone)]
struct DayFileWriter {
    file: Arc<Mutex<File>>,
}

impl DayFileWriter {
    fn new(file: File) -> Self {
        Self {
            file: Arc::new(Mutex::new(file)),
        }
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for DayFileWriter {
    type Writer = DayFileWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

impl Write for DayFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log file lock poisoned"))?
            .write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log file lock poisoned"))?
            .flush()
    }
}

fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|ch| if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' { ch } else { '_' })
        .collect()
}
