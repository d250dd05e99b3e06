//! Process logger bootstrap.
//!
//! # Responsibility
//! - Start one logger per process: size-rotated `catalog*.log` files when a
//!   log directory is configured, stderr otherwise.
//! - Log panics as a single metadata line before the default hook runs.
//!
//! # Invariants
//! - Repeating `init_logging` with the active level and destination is a
//!   no-op; any other combination is rejected, never silently applied.
//! - Initialization returns errors instead of panicking.

use flexi_logger::{
    detailed_format, Cleanup, Criterion, FileSpec, FlexiLoggerError, Logger, LoggerHandle, Naming,
    WriteMode,
};
use log::{error, info};
use once_cell::sync::OnceCell;
use std::any::Any;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

const LOG_FILE_BASENAME: &str = "catalog";
const ROTATE_AT_BYTES: u64 = 10 * 1024 * 1024;
const KEEP_LOG_FILES: usize = 5;
const PANIC_SUMMARY_CHARS: usize = 160;
const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

static ACTIVE: OnceCell<ActiveLogger> = OnceCell::new();

struct ActiveLogger {
    level: &'static str,
    destination: Destination,
    _handle: LoggerHandle,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Destination {
    Stderr,
    Dir(PathBuf),
}

impl Display for Destination {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stderr => write!(f, "stderr"),
            Self::Dir(dir) => write!(f, "{}", dir.display()),
        }
    }
}

#[derive(Debug)]
pub enum LoggingError {
    UnsupportedLevel(String),
    /// Log directories must be absolute so every entry point agrees on them.
    RelativeLogDir(PathBuf),
    CreateLogDir {
        dir: PathBuf,
        source: std::io::Error,
    },
    Backend(FlexiLoggerError),
    /// A logger is already running with a different configuration.
    AlreadyActive { active: String, requested: String },
}

impl Display for LoggingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnsupportedLevel(level) => write!(
                f,
                "unsupported log level `{level}`; expected {}",
                LEVELS.join("|")
            ),
            Self::RelativeLogDir(dir) => {
                write!(f, "log directory must be absolute, got `{}`", dir.display())
            }
            Self::CreateLogDir { dir, source } => {
                write!(f, "cannot create log directory `{}`: {source}", dir.display())
            }
            Self::Backend(err) => write!(f, "logger backend failed: {err}"),
            Self::AlreadyActive { active, requested } => write!(
                f,
                "logging already active as `{active}`; refusing to switch to `{requested}`"
            ),
        }
    }
}

impl Error for LoggingError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::CreateLogDir { source, .. } => Some(source),
            Self::Backend(err) => Some(err),
            _ => None,
        }
    }
}

/// Starts the process logger.
///
/// `log_dir = None` logs to stderr; `Some(dir)` requires an absolute path.
pub fn init_logging(level: &str, log_dir: Option<&Path>) -> Result<(), LoggingError> {
    let level = normalize_level(level)
        .ok_or_else(|| LoggingError::UnsupportedLevel(level.trim().to_string()))?;
    let destination = match log_dir {
        None => Destination::Stderr,
        Some(dir) if dir.is_absolute() => Destination::Dir(dir.to_path_buf()),
        Some(dir) => return Err(LoggingError::RelativeLogDir(dir.to_path_buf())),
    };

    let active = ACTIVE.get_or_try_init(|| start(level, destination.clone()))?;
    if active.level != level || active.destination != destination {
        return Err(LoggingError::AlreadyActive {
            active: format!("{} @ {}", active.level, active.destination),
            requested: format!("{level} @ {destination}"),
        });
    }
    Ok(())
}

/// Returns `(level, log_dir)` of the running logger, or `None` before init.
pub fn logging_status() -> Option<(&'static str, Option<PathBuf>)> {
    ACTIVE.get().map(|active| {
        let dir = match &active.destination {
            Destination::Stderr => None,
            Destination::Dir(dir) => Some(dir.clone()),
        };
        (active.level, dir)
    })
}

/// `debug` in debug builds, `info` in release builds.
pub fn default_log_level() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    }
}

pub(crate) fn normalize_level(level: &str) -> Option<&'static str> {
    let wanted = level.trim().to_ascii_lowercase();
    if wanted == "warning" {
        return Some("warn");
    }
    LEVELS.into_iter().find(|known| *known == wanted)
}

fn start(level: &'static str, destination: Destination) -> Result<ActiveLogger, LoggingError> {
    let logger = Logger::try_with_str(level).map_err(LoggingError::Backend)?;
    let logger = match &destination {
        Destination::Stderr => logger.log_to_stderr().format_for_stderr(detailed_format),
        Destination::Dir(dir) => {
            std::fs::create_dir_all(dir).map_err(|source| LoggingError::CreateLogDir {
                dir: dir.clone(),
                source,
            })?;
            logger
                .log_to_file(FileSpec::default().directory(dir).basename(LOG_FILE_BASENAME))
                .rotate(
                    Criterion::Size(ROTATE_AT_BYTES),
                    Naming::Numbers,
                    Cleanup::KeepLogFiles(KEEP_LOG_FILES),
                )
                .write_mode(WriteMode::BufferAndFlush)
                .append()
                .format_for_files(detailed_format)
        }
    };
    let handle = logger.start().map_err(LoggingError::Backend)?;
    install_panic_hook();

    info!(
        "event=logging_init module=core status=ok level={level} destination={destination} os={} version={}",
        std::env::consts::OS,
        env!("CARGO_PKG_VERSION")
    );
    Ok(ActiveLogger {
        level,
        destination,
        _handle: handle,
    })
}

// Called once, from the successful branch of `ACTIVE` initialization.
fn install_panic_hook() {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let location = info.location().map_or_else(
            || "unknown".to_string(),
            |loc| format!("{}:{}", loc.file(), loc.line()),
        );
        error!(
            "event=panic module=core status=error location={location} payload={}",
            panic_summary(info.payload())
        );
        previous(info);
    }));
}

/// One-line, length-capped rendering of a panic payload.
fn panic_summary(payload: &(dyn Any + Send)) -> String {
    let text = payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string payload");

    let mut summary: String = text
        .chars()
        .take(PANIC_SUMMARY_CHARS)
        .map(|ch| if matches!(ch, '\n' | '\r') { ' ' } else { ch })
        .collect();
    if text.chars().count() > PANIC_SUMMARY_CHARS {
        summary.push_str("...");
    }
    summary
}
