//! Configuration loading and validation
//!
//! The loaded `Config` is handed to constructors by value or reference;
//! nothing here keeps a process-wide copy.
use super::schemas::Config;
use crate::errors::{SyncError, SyncResult};
use crate::logger::{self, LogTag};
use crate::ohlcv::Interval;
use std::path::Path;

/// Default configuration file path
pub const CONFIG_FILE_PATH: &str = "data/config.toml";

/// Load configuration from a TOML file
///
/// A missing file yields defaults (with a warning). A file that exists but
/// cannot be read or parsed is a configuration error. Unknown top-level
/// sections are reported and ignored.
pub fn load_config_from_path(path: impl AsRef<Path>) -> SyncResult<Config> {
    let path = path.as_ref();

    if !path.exists() {
        logger::warning(
            LogTag::Config,
            &format!("{} not found, running with defaults", path.display()),
        );
        let config = Config::default();
        config.validate()?;
        return Ok(config);
    }

    let contents = std::fs::read_to_string(path)
        .map_err(|e| SyncError::configuration(format!("cannot read {}: {}", path.display(), e)))?;
    let config = parse_config(&contents)
        .map_err(|e| SyncError::configuration(format!("{}: {}", path.display(), e)))?;
    config.validate()?;

    logger::debug(LogTag::Config, &format!("Loaded {}", path.display()));
    Ok(config)
}

/// Parse TOML text into a `Config`, warning about sections nothing reads
pub fn parse_config(contents: &str) -> Result<Config, String> {
    let raw: toml::Table = contents.parse().map_err(|e: toml::de::Error| e.to_string())?;
    for section in unknown_sections(&raw) {
        logger::warning(
            LogTag::Config,
            &format!("Ignoring unknown config section [{}]", section),
        );
    }
    toml::Value::Table(raw)
        .try_into::<Config>()
        .map_err(|e| e.to_string())
}

fn unknown_sections(raw: &toml::Table) -> Vec<&str> {
    raw.keys()
        .map(String::as_str)
        .filter(|key| !Config::FIELDS.contains(key))
        .collect()
}

/// Serialize a configuration back to TOML
pub fn save_config(config: &Config, path: impl AsRef<Path>) -> SyncResult<()> {
    let path = path.as_ref();
    let contents = toml::to_string_pretty(config)
        .map_err(|e| SyncError::configuration(format!("Failed to serialize config: {}", e)))?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, contents)?;
    Ok(())
}

impl Config {
    /// Reject values that would make the pipeline misbehave
    pub fn validate(&self) -> SyncResult<()> {
        if self.rpc.url.trim().is_empty() {
            return Err(SyncError::configuration("rpc.url must not be empty"));
        }

        for (name, limits) in self.apis.named() {
            if limits.max_requests_per_minute == 0 {
                return Err(SyncError::configuration(format!(
                    "apis.{}.max_requests_per_minute must be greater than zero",
                    name
                )));
            }
        }

        if self.scanner.page_limit == 0 || self.scanner.page_limit > 1000 {
            return Err(SyncError::configuration(
                "scanner.page_limit must be between 1 and 1000",
            ));
        }
        if self.scanner.transaction_concurrency == 0 {
            return Err(SyncError::configuration(
                "scanner.transaction_concurrency must be greater than zero",
            ));
        }

        let disc_len = self.metadata.migration_discriminator.len();
        if disc_len != 0 && disc_len != 8 {
            return Err(SyncError::configuration(format!(
                "metadata.migration_discriminator must be empty or 8 bytes, got {}",
                disc_len
            )));
        }

        let source = Interval::parse(&self.ohlcv.source_interval).ok_or_else(|| {
            SyncError::configuration(format!(
                "ohlcv.source_interval '{}' is not a known interval",
                self.ohlcv.source_interval
            ))
        })?;
        for target in &self.ohlcv.target_intervals {
            let interval = Interval::parse(target).ok_or_else(|| {
                SyncError::configuration(format!(
                    "ohlcv.target_intervals entry '{}' is not a known interval",
                    target
                ))
            })?;
            if interval.seconds() % source.seconds() != 0 {
                return Err(SyncError::configuration(format!(
                    "ohlcv target {} is not a multiple of source {}",
                    interval, source
                )));
            }
        }

        if self.sync.max_run_seconds == 0 || self.sync.max_concurrent_projects == 0 {
            return Err(SyncError::configuration(
                "sync.max_run_seconds and sync.max_concurrent_projects must be greater than zero",
            ));
        }

        if self.database.path.trim().is_empty() {
            return Err(SyncError::configuration("database.path must not be empty"));
        }

        Ok(())
    }
}
