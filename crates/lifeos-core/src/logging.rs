//! Per-day file logging.
//!
//! Log lines go to `<dir>/<YYYY-MM-DD>.log` (append) and to stderr. The file
//! sink is a `tracing-appender` [`RollingFileAppender`] held behind a
//! `tracing-subscriber` reload layer. The scheduler calls
//! [`LogHandle::rotate`] when the local date changes, which swaps in the
//! appender for the new day, so each day's decisions end up in that day's
//! file.
//!
//! # Invariants
//! - Initialization never panics.
//! - A second initialization in the same process is rejected.

use std::io;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::{self, format};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{reload, EnvFilter, Registry};

use crate::error::CoreError;

/// Formatting layer that writes to one day's file.
pub type FileLayer = fmt::Layer<Registry, format::DefaultFields, format::Format, RollingFileAppender>;

/// [`FileLayer`] whose writer can be swapped through a [`LogHandle`].
pub type DayFileLayer = reload::Layer<FileLayer, Registry>;

/// Handle to the installed day-file layer; clone freely.
#[derive(Clone)]
pub struct LogHandle {
    dir: PathBuf,
    layer: reload::Handle<FileLayer, Registry>,
}

impl LogHandle {
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Switch subsequent writes to the file for `date`.
    ///
    /// Fails once the subscriber owning the layer has been dropped.
    pub fn rotate(&self, date: NaiveDate) -> Result<(), CoreError> {
        let appender = day_appender(&self.dir, date)?;
        self.layer
            .modify(|layer| *layer.writer_mut() = appender)
            .map_err(|e| CoreError::Logging(format!("cannot rotate log file: {e}")))
    }
}

/// Build the layer writing to `dir`'s file for `date`, plus its handle.
///
/// The layer must be added to a subscriber directly over [`Registry`].
pub fn day_file_layer(dir: &Path, date: NaiveDate) -> Result<(DayFileLayer, LogHandle), CoreError> {
    let appender = day_appender(dir, date)?;
    let (layer, handle) = reload::Layer::new(fmt::layer().with_ansi(false).with_writer(appender));
    Ok((
        layer,
        LogHandle {
            dir: dir.to_path_buf(),
            layer: handle,
        },
    ))
}

/// Path of the log file for `date`.
pub fn day_file_path(dir: &Path, date: NaiveDate) -> PathBuf {
    dir.join(format!("{}.log", date.format("%Y-%m-%d")))
}

fn day_appender(dir: &Path, date: NaiveDate) -> Result<RollingFileAppender, CoreError> {
    std::fs::create_dir_all(dir)?;
    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(date.format("%Y-%m-%d").to_string())
        .filename_suffix("log")
        .build(dir)
        .map_err(|e| CoreError::Logging(format!("cannot open log file in {}: {e}", dir.display())))
}

/// Install the global subscriber writing to today's file and stderr.
///
/// `RUST_LOG` takes precedence over `level`.
///
/// # Errors
/// - The log directory or file cannot be created.
/// - `level` is not a valid filter directive.
/// - A global subscriber is already installed.
pub fn init_logging(dir: &Path, level: &str, today: NaiveDate) -> Result<LogHandle, CoreError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level)
            .map_err(|e| CoreError::Logging(format!("invalid log level `{level}`: {e}")))?,
    };
    let (file_layer, handle) = day_file_layer(dir, today)?;

    tracing_subscriber::registry()
        .with(file_layer)
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .try_init()
        .map_err(|e| CoreError::Logging(e.to_string()))?;

    Ok(handle)
}
