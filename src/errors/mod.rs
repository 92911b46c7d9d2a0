//! Error taxonomy for the ingestion pipeline
//!
//! Binary layout failures are carried as `DecodeError` so callers can skip
//! one bad account without aborting a run.
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("buffer truncated reading {field} at offset {offset}: need {needed} bytes, have {available}")]
    Truncated {
        field: &'static str,
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("field {field} is not valid UTF-8")]
    InvalidUtf8 { field: &'static str },

    #[error("field {field} declares length {length}, limit is {max}")]
    LengthOutOfRange {
        field: &'static str,
        length: usize,
        max: usize,
    },

    #[error("account discriminator mismatch: expected {expected}, found {found}")]
    DiscriminatorMismatch { expected: String, found: String },

    #[error("invalid account: {reason}")]
    InvalidAccount { reason: String },

    #[error("malformed response: {reason}")]
    MalformedResponse { reason: String },
}

/// Crate-wide error. [`SyncError::is_fatal`] separates run-ending failures
/// from ones that only cost a single item or project.
#[derive(Debug, Clone, Error)]
pub enum SyncError {
    /// Upstream said slow down (HTTP 429 or a rate-limit message)
    #[error("throttled by {api}: {message}")]
    Throttled { api: String, message: String },

    /// Throttling persisted past the configured retry budget
    #[error("{api} unavailable after {attempts} attempts: {message}")]
    UpstreamUnavailable {
        api: String,
        attempts: u32,
        message: String,
    },

    #[error("{api} request failed{}: {message}", http_status(.status))]
    Upstream {
        api: String,
        status: Option<u16>,
        message: String,
    },

    #[error("decode: {0}")]
    Decode(#[from] DecodeError),

    #[error("{what} not found")]
    NotFound { what: String },

    #[error("invalid {field}: {message}")]
    Validation { field: String, message: String },

    /// Duplicate natural key on insert
    #[error("already stored: {key}")]
    PersistenceConflict { key: String },

    #[error("database: {message}")]
    Persistence { message: String },

    #[error("configuration: {message}")]
    Configuration { message: String },

    #[error("cancelled: {reason}")]
    Cancelled { reason: String },

    #[error("internal: {message}")]
    Internal { message: String },
}

fn http_status(status: &Option<u16>) -> String {
    status.map(|code| format!(" (HTTP {})", code)).unwrap_or_default()
}

pub type SyncResult<T> = Result<T, SyncError>;

impl SyncError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        SyncError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        SyncError::NotFound { what: what.into() }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        SyncError::Configuration {
            message: message.into(),
        }
    }

    pub fn persistence(message: impl Into<String>) -> Self {
        SyncError::Persistence {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        SyncError::Internal {
            message: message.into(),
        }
    }

    /// Eligible for scheduler backoff
    pub fn is_throttling(&self) -> bool {
        matches!(self, SyncError::Throttled { .. })
    }

    /// Aborts the whole run rather than one item/project
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SyncError::Configuration { .. } | SyncError::Persistence { .. }
        )
    }

    /// Short stable label for reports
    pub fn kind(&self) -> &'static str {
        match self {
            SyncError::Throttled { .. } => "throttled",
            SyncError::UpstreamUnavailable { .. } => "upstream_unavailable",
            SyncError::Upstream { .. } => "upstream",
            SyncError::Decode(_) => "decode",
            SyncError::NotFound { .. } => "not_found",
            SyncError::Validation { .. } => "validation",
            SyncError::PersistenceConflict { .. } => "conflict",
            SyncError::Persistence { .. } => "persistence",
            SyncError::Configuration { .. } => "configuration",
            SyncError::Cancelled { .. } => "cancelled",
            SyncError::Internal { .. } => "internal",
        }
    }
}

/// Message-based throttling detection shared by every upstream client
pub fn is_rate_limit_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("rate limit")
        || lower.contains("too many requests")
        || lower.contains("429")
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        let status = err.status().map(|s| s.as_u16());
        if status == Some(429) {
            return SyncError::Throttled {
                api: "http".to_string(),
                message: err.to_string(),
            };
        }
        SyncError::Upstream {
            api: "http".to_string(),
            status,
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Decode(DecodeError::MalformedResponse {
            reason: err.to_string(),
        })
    }
}

impl From<rusqlite::Error> for SyncError {
    fn from(err: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(ref code, _) = err {
            if code.code == rusqlite::ErrorCode::ConstraintViolation {
                return SyncError::PersistenceConflict {
                    key: err.to_string(),
                };
            }
        }
        SyncError::Persistence {
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::Configuration {
            message: format!("invalid TOML: {}", err),
        }
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::Internal {
            message: format!("I/O error: {}", err),
        }
    }
}
