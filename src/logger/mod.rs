//! Tagged console logging with an optional plain-text file mirror.
//!
//! Every line carries a [`LogTag`] naming the subsystem. DEBUG output is
//! switched on per tag (`--debug scanner,rpc` or `--debug all`), VERBOSE by
//! `--verbose`, and `--quiet` leaves only errors.
//!
//! ```rust,ignore
//! use migtrack::logger::{self, LogTag, LoggerConfig};
//!
//! logger::init(LoggerConfig::from_flags(&["scanner".into()], false, false));
//! logger::info(LogTag::Sync, "3 projects queued");
//! logger::debug(LogTag::Scanner, "page 2: 1000 signatures");
//! ```

mod config;
mod file;
mod format;
mod levels;
mod tags;

pub use config::{set_logger_config, DebugTags, LoggerConfig};
pub use levels::LogLevel;
pub use tags::LogTag;

/// Install `config` process-wide and open its log file, if any. Later calls replace earlier ones.
pub fn init(config: LoggerConfig) {
    if let Some(path) = &config.file_path {
        file::init_file_logging(path);
    }
    set_logger_config(config);
}

pub fn log(tag: LogTag, level: LogLevel, message: &str) {
    if config::allows(&tag, level) {
        format::emit(&tag, level, message);
    }
}

pub fn error(tag: LogTag, message: &str) {
    log(tag, LogLevel::Error, message);
}

pub fn warning(tag: LogTag, message: &str) {
    log(tag, LogLevel::Warning, message);
}

pub fn info(tag: LogTag, message: &str) {
    log(tag, LogLevel::Info, message);
}

/// Printed only when DEBUG is enabled for `tag`
pub fn debug(tag: LogTag, message: &str) {
    log(tag, LogLevel::Debug, message);
}

pub fn verbose(tag: LogTag, message: &str) {
    log(tag, LogLevel::Verbose, message);
}

/// Push buffered file output to disk
pub fn flush() {
    file::flush_file_logging();
}
