use std::fmt;
use std::io;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;
use tracing::Dispatch;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{prelude::*, EnvFilter, Layer, Registry};

use crate::config::LoggingSettings;
use crate::utils::rotate::{RotatingFile, RotatingWriter, DEFAULT_MAX_SIZE};

/// Name of the active log file inside `logging.path`
pub const LOG_FILE_NAME: &str = "entry.log";

#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("unsupported log formatter: {0}")]
    UnsupportedFormatter(String),

    #[error("unsupported log handler type {0}")]
    UnsupportedHandler(String),

    #[error("failed to open log file {}: {source}", path.display())]
    Sink {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("a global logger is already installed")]
    AlreadyInstalled(#[from] tracing::dispatcher::SetGlobalDefaultError),
}

#[derive(Debug, Error)]
#[error("not a valid log level: {0:?}")]
pub struct ParseSeverityError(String);

/// Log verbosity, ordered from most to least verbose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
    Panic,
}

impl Severity {
    /// Parse a configured level, falling back to `Info` for anything unrecognised.
    pub fn resolve(level: &str) -> Self {
        level.parse().unwrap_or(Self::Info)
    }

    /// Most verbose level that still gets recorded.
    ///
    /// `tracing` has nothing above ERROR, so fatal and panic filter as errors.
    pub fn level_filter(self) -> LevelFilter {
        match self {
            Self::Trace => LevelFilter::TRACE,
            Self::Debug => LevelFilter::DEBUG,
            Self::Info => LevelFilter::INFO,
            Self::Warn => LevelFilter::WARN,
            Self::Error | Self::Fatal | Self::Panic => LevelFilter::ERROR,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
            Self::Fatal => "fatal",
            Self::Panic => "panic",
        }
    }
}

impl FromStr for Severity {
    type Err = ParseSeverityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            "fatal" => Ok(Self::Fatal),
            "panic" => Ok(Self::Panic),
            _ => Err(ParseSeverityError(s.to_string())),
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shape of each emitted record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Formatter {
    /// Human-readable line with full timestamp, no colors
    Text,
    /// One JSON object per line
    Json,
}

impl FromStr for Formatter {
    type Err = LoggerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(LoggerError::UnsupportedFormatter(other.to_string())),
        }
    }
}

/// Where records are written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handler {
    File,
    Console,
}

impl FromStr for Handler {
    type Err = LoggerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "file" => Ok(Self::File),
            "console" => Ok(Self::Console),
            other => Err(LoggerError::UnsupportedHandler(other.to_string())),
        }
    }
}

/// A fully configured logging context.
///
/// Building a `Logger` touches no global state; it only becomes the
/// process-wide default through [`Logger::install`]. Clones share the same
/// subscriber and sink.
#[derive(Debug, Clone)]
pub struct Logger {
    severity: Severity,
    formatter: Formatter,
    handler: Handler,
    file: Option<RotatingWriter>,
    dispatch: Dispatch,
}

impl Logger {
    /// Build a logger from the `logging` section of the config.
    ///
    /// An unknown level quietly becomes `info`; an unknown formatter or
    /// handler is an error.
    pub fn from_settings(settings: &LoggingSettings) -> Result<Self, LoggerError> {
        let severity = Severity::resolve(&settings.level);
        let formatter: Formatter = settings.formatter.parse()?;
        let handler: Handler = settings.handler.parse()?;

        match handler {
            Handler::Console => Ok(Self::build(
                severity,
                formatter,
                handler,
                BoxMakeWriter::new(io::stdout),
                None,
            )),
            Handler::File => {
                let path = settings.path.join(LOG_FILE_NAME);
                let file = RotatingFile::open(&path, DEFAULT_MAX_SIZE)
                    .map_err(|source| LoggerError::Sink { path, source })?;
                let writer = RotatingWriter::new(file);

                Ok(Self::build(
                    severity,
                    formatter,
                    handler,
                    BoxMakeWriter::new(writer.clone()),
                    Some(writer),
                ))
            }
        }
    }

    fn build(
        severity: Severity,
        formatter: Formatter,
        handler: Handler,
        writer: BoxMakeWriter,
        file: Option<RotatingWriter>,
    ) -> Self {
        let report_caller = report_caller(severity);

        let layer: Box<dyn Layer<Registry> + Send + Sync> = match formatter {
            Formatter::Text => tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_file(report_caller)
                .with_line_number(report_caller)
                .boxed(),
            Formatter::Json => tracing_subscriber::fmt::layer()
                .json()
                .with_writer(writer)
                .with_file(report_caller)
                .with_line_number(report_caller)
                .boxed(),
        };

        let subscriber = tracing_subscriber::registry()
            .with(layer)
            .with(severity.level_filter());

        Self {
            severity,
            formatter,
            handler,
            file,
            dispatch: Dispatch::new(subscriber),
        }
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn formatter(&self) -> Formatter {
        self.formatter
    }

    pub fn handler(&self) -> Handler {
        self.handler
    }

    /// Whether records carry the file and line of the logging call
    pub fn reports_caller(&self) -> bool {
        report_caller(self.severity)
    }

    /// Path of the active log file, when logging to a file
    pub fn log_file(&self) -> Option<PathBuf> {
        self.file
            .as_ref()
            .map(|w| w.with_file(|f| f.path().to_path_buf()))
    }

    /// Rotation threshold of the log file, when logging to a file
    #[cfg(test)]
    pub(crate) fn max_file_size(&self) -> Option<u64> {
        self.file.as_ref().map(|w| w.with_file(|f| f.max_size()))
    }

    /// Run `f` with this logger as the current default.
    #[cfg(test)]
    pub(crate) fn in_scope<T>(&self, f: impl FnOnce() -> T) -> T {
        tracing::dispatcher::with_default(&self.dispatch, f)
    }

    /// Make this logger the process-wide default. Only the first call succeeds.
    pub fn install(&self) -> Result<(), LoggerError> {
        tracing::dispatcher::set_global_default(self.dispatch.clone())?;
        Ok(())
    }
}

fn report_caller(severity: Severity) -> bool {
    severity != Severity::Info
}

/// Logger used before the config file has been read.
///
/// Writes compact lines to stderr, filtered by `RUST_LOG` or `info`.
pub fn bootstrap() -> Dispatch {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = tracing_subscriber::registry().with(filter).with(
        tracing_subscriber::fmt::layer()
            .with_writer(io::stderr)
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .compact(),
    );

    Dispatch::new(subscriber)
}
