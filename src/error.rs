//! Error taxonomy for the monitor.
//!
//! Only `FareSourceUnavailable` and `ConfigCorrupt` abort a pass. Everything
//! else is contained to the date, shape, or notification that produced it.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AlertError {
    /// Nothing stored at `path` yet. For the ledger this means "first run".
    #[error("not found: {}", path.display())]
    ConfigMissing { path: PathBuf },

    #[error("unreadable state in {}: {reason}", path.display())]
    ConfigCorrupt { path: PathBuf, reason: String },

    #[error("invalid session config: {}", problems.join("; "))]
    ConfigInvalid { problems: Vec<String> },

    #[error("fare source unavailable: {0}")]
    FareSourceUnavailable(String),

    #[error("fare source returned partial data: {0}")]
    FareSourcePartial(String),

    #[error("notification delivery failed: {0}")]
    NotifierFailure(String),

    #[error("failed to persist ledger to {}: {source}", path.display())]
    LedgerWriteFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl AlertError {
    pub fn corrupt(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::ConfigCorrupt {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn invalid(problems: Vec<String>) -> Self {
        Self::ConfigInvalid { problems }
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::FareSourceUnavailable(msg.into())
    }

    pub fn notifier(msg: impl Into<String>) -> Self {
        Self::NotifierFailure(msg.into())
    }

    /// Errors that end a pass (and, in single-pass mode, the process).
    pub fn is_fatal_for_pass(&self) -> bool {
        matches!(
            self,
            Self::FareSourceUnavailable(_) | Self::ConfigCorrupt { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, AlertError>;
