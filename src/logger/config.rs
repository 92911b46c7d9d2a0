//! Logger settings and the filter that decides which lines print
use super::levels::LogLevel;
use super::tags::LogTag;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Which tags have DEBUG output switched on
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DebugTags {
    #[default]
    None,
    All,
    Only(BTreeSet<String>),
}

impl DebugTags {
    fn covers(&self, tag: &LogTag) -> bool {
        match self {
            DebugTags::None => false,
            DebugTags::All => true,
            DebugTags::Only(keys) => keys.contains(&tag.to_debug_key()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// Least severe level that may print. `Debug` still needs the tag in `debug_tags`.
    pub threshold: LogLevel,
    pub debug_tags: DebugTags,
    pub file_path: Option<PathBuf>,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            threshold: LogLevel::Debug,
            debug_tags: DebugTags::None,
            file_path: None,
        }
    }
}

impl LoggerConfig {
    /// Settings from the global `--debug`, `--verbose` and `--quiet` switches
    pub fn from_flags(debug: &[String], verbose: bool, quiet: bool) -> Self {
        let keys: BTreeSet<String> = debug
            .iter()
            .flat_map(|entry| entry.split(','))
            .map(|key| key.trim().to_lowercase())
            .filter(|key| !key.is_empty())
            .collect();

        let debug_tags = if keys.contains("all") {
            DebugTags::All
        } else if keys.is_empty() {
            DebugTags::None
        } else {
            DebugTags::Only(keys)
        };

        let threshold = match (quiet, verbose) {
            (true, _) => LogLevel::Error,
            (false, true) => LogLevel::Verbose,
            (false, false) => LogLevel::Debug,
        };

        Self {
            threshold,
            debug_tags,
            file_path: None,
        }
    }

    pub fn allows(&self, tag: &LogTag, level: LogLevel) -> bool {
        match level {
            LogLevel::Error => true,
            _ if level > self.threshold => false,
            LogLevel::Debug => self.debug_tags.covers(tag),
            _ => true,
        }
    }
}

static ACTIVE: Lazy<RwLock<LoggerConfig>> = Lazy::new(|| RwLock::new(LoggerConfig::default()));

pub fn set_logger_config(config: LoggerConfig) {
    *ACTIVE.write() = config;
}

pub(super) fn allows(tag: &LogTag, level: LogLevel) -> bool {
    ACTIVE.read().allows(tag, level)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_split_comma_lists() {
        let config = LoggerConfig::from_flags(&["scanner, rpc".to_string()], false, false);
        assert_eq!(
            config.debug_tags,
            DebugTags::Only(["rpc".to_string(), "scanner".to_string()].into_iter().collect())
        );
        assert_eq!(config.threshold, LogLevel::Debug);
    }

    #[test]
    fn test_quiet_wins_over_verbose() {
        let config = LoggerConfig::from_flags(&[], true, true);
        assert_eq!(config.threshold, LogLevel::Error);
        assert!(config.allows(&LogTag::Sync, LogLevel::Error));
        assert!(!config.allows(&LogTag::Sync, LogLevel::Warning));
    }

    #[test]
    fn test_debug_is_gated_per_tag() {
        let config = LoggerConfig::from_flags(&["scanner".to_string()], false, false);
        assert!(config.allows(&LogTag::Scanner, LogLevel::Debug));
        assert!(!config.allows(&LogTag::Rpc, LogLevel::Debug));
        assert!(config.allows(&LogTag::Rpc, LogLevel::Info));
        assert!(!config.allows(&LogTag::Scanner, LogLevel::Verbose));

        let everything = LoggerConfig::from_flags(&["all".to_string()], true, false);
        assert!(everything.allows(&LogTag::Holders, LogLevel::Debug));
        assert!(everything.allows(&LogTag::Holders, LogLevel::Verbose));
    }
}
