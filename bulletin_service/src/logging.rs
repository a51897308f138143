/// Structured logging for the bulletin service
///
/// Provides context-rich logging with source identifiers, timestamps, and
/// severity levels. Console and log file have independent thresholds so a
/// cron run stays quiet on the terminal while still leaving warnings in
/// the file.

use crate::model::{ReportError, SourceKind};
use chrono::Utc;
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::Mutex;

// ---------------------------------------------------------------------------
// Log Levels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warning => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

// ---------------------------------------------------------------------------
// Data Source Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    Usgs,
    Wunderground,
    Output,
    Config,
    System,
}

impl From<SourceKind> for DataSource {
    fn from(kind: SourceKind) -> Self {
        match kind {
            SourceKind::Gauge => DataSource::Usgs,
            SourceKind::Station => DataSource::Wunderground,
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::Usgs => write!(f, "USGS"),
            DataSource::Wunderground => write!(f, "WXU"),
            DataSource::Output => write!(f, "OUT"),
            DataSource::Config => write!(f, "CFG"),
            DataSource::System => write!(f, "SYS"),
        }
    }
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureType {
    /// Expected failure - sensor offline, iced over, or seasonal
    Expected,
    /// Unexpected failure - network trouble or a format change upstream
    Unexpected,
    /// Unknown - the API refused us; usually configuration, sometimes outage
    Unknown,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureType::Expected => write!(f, "EXPECTED"),
            FailureType::Unexpected => write!(f, "UNEXPECTED"),
            FailureType::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

// ---------------------------------------------------------------------------
// Logger Configuration
// ---------------------------------------------------------------------------

/// Global logger instance
static LOGGER: Mutex<Option<Logger>> = Mutex::new(None);

pub struct Logger {
    /// Minimum level written to the console
    console_level: LogLevel,
    /// Minimum level appended to the log file
    file_level: LogLevel,
    /// Optional file path for logging
    log_file: Option<String>,
}

impl Logger {
    pub fn init(console_level: LogLevel, file_level: LogLevel, log_file: Option<String>) {
        let logger = Logger {
            console_level,
            file_level,
            log_file,
        };

        if let Ok(mut slot) = LOGGER.lock() {
            *slot = Some(logger);
        }
    }

    fn log(&self, level: LogLevel, source: DataSource, site_id: Option<&str>, message: &str) {
        let site_part = site_id.map(|s| format!(" [{}]", s)).unwrap_or_default();

        if level >= self.console_level {
            match level {
                LogLevel::Error => eprintln!("   ✗ {}{}: {}", source, site_part, message),
                LogLevel::Warning => eprintln!("   ⚠ {}{}: {}", source, site_part, message),
                LogLevel::Info => println!("   {}{}: {}", source, site_part, message),
                LogLevel::Debug => println!("   [DEBUG] {}{}: {}", source, site_part, message),
            }
        }

        if level >= self.file_level {
            if let Some(ref path) = self.log_file {
                let entry = format_entry(level, source, site_id, message);
                if let Err(e) = Self::append_to_file(path, &entry) {
                    eprintln!("Failed to write to log file {}: {}", path, e);
                }
            }
        }
    }

    fn append_to_file(path: &str, entry: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", entry)?;
        Ok(())
    }
}

/// One log-file line: `2024-05-01 12:00:00 UTC WARN USGS [12150800]: message`
fn format_entry(
    level: LogLevel,
    source: DataSource,
    site_id: Option<&str>,
    message: &str,
) -> String {
    let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
    let site_part = site_id.map(|s| format!(" [{}]", s)).unwrap_or_default();
    format!("{} {} {}{}: {}", timestamp, level, source, site_part, message)
}

// ---------------------------------------------------------------------------
// Public Logging Functions
// ---------------------------------------------------------------------------

/// Initialize the global logger
pub fn init_logger(console_level: LogLevel, file_level: LogLevel, log_file: Option<&str>) {
    Logger::init(console_level, file_level, log_file.map(String::from));
}

fn emit(level: LogLevel, source: DataSource, site_id: Option<&str>, message: &str) {
    if let Ok(guard) = LOGGER.lock() {
        if let Some(logger) = guard.as_ref() {
            logger.log(level, source, site_id, message);
        }
    }
}

pub fn info(source: DataSource, site_id: Option<&str>, message: &str) {
    emit(LogLevel::Info, source, site_id, message);
}

pub fn warn(source: DataSource, site_id: Option<&str>, message: &str) {
    emit(LogLevel::Warning, source, site_id, message);
}

pub fn error(source: DataSource, site_id: Option<&str>, message: &str) {
    emit(LogLevel::Error, source, site_id, message);
}

pub fn debug(source: DataSource, site_id: Option<&str>, message: &str) {
    emit(LogLevel::Debug, source, site_id, message);
}

// ---------------------------------------------------------------------------
// Failure Classification Helpers
// ---------------------------------------------------------------------------

/// Classify a per-source failure by what kind of error stopped it
pub fn classify_failure(err: &ReportError) -> FailureType {
    match err {
        // Blank cells and empty tables are how USGS reports an offline sensor
        ReportError::MissingData(_) => FailureType::Expected,
        ReportError::UpstreamApi { .. } => FailureType::Unknown,
        _ => FailureType::Unexpected,
    }
}

/// Log a source failure with automatic classification
pub fn log_source_failure(kind: SourceKind, source_id: &str, operation: &str, err: &ReportError) {
    let failure_type = classify_failure(err);
    let message = format!("{} failed [{}]: {}", operation, failure_type, err);

    match failure_type {
        FailureType::Expected => warn(kind.into(), Some(source_id), &message),
        FailureType::Unexpected => error(kind.into(), Some(source_id), &message),
        FailureType::Unknown => warn(kind.into(), Some(source_id), &message),
    }
}

// ---------------------------------------------------------------------------
// Run Summary Logging
// ---------------------------------------------------------------------------

/// Log a summary of one dispatch run
pub fn log_run_summary(total: usize, real: usize, fallbacks: usize) {
    let message = format!(
        "Run complete: {}/{} reports with live data, {} fallbacks",
        real, total, fallbacks
    );

    if fallbacks == 0 {
        info(DataSource::System, None, &message);
    } else if real == 0 {
        error(DataSource::System, None, &message);
    } else {
        warn(DataSource::System, None, &message);
    }
}
