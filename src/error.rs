//! Error taxonomy.
//!
//! `SourceError` never escapes a single source: the collector turns it into
//! an empty result plus a status line. `PipelineError` aborts the run before
//! the ledger is written.

use thiserror::Error;

/// Failure of one configured source
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SourceError {
    /// Token acquisition failed
    #[error("auth failed for {source_name} (status {status:?}): {message}")]
    Auth {
        source_name: String,
        status: Option<u16>,
        message: String,
    },

    /// Non-2xx response or network failure on the data call
    #[error("fetch failed for {source_name} (status {status:?}): {message}")]
    Fetch {
        source_name: String,
        status: Option<u16>,
        message: String,
    },

    /// Fetch did not complete inside the per-source timeout
    #[error("fetch for {source_name} timed out after {secs}s")]
    Timeout { source_name: String, secs: u64 },

    /// Payload does not have the expected shape
    #[error("could not parse payload from {source_name}: {message}")]
    Parse {
        source_name: String,
        message: String,
    },

    /// Expected flat file is absent or unreadable
    #[error("file for {source_name} is missing or not readable: {path}")]
    MissingFile { source_name: String, path: String },
}

impl SourceError {
    pub fn parse(source_name: &str, message: impl Into<String>) -> Self {
        SourceError::Parse {
            source_name: source_name.to_string(),
            message: message.into(),
        }
    }

    /// Short label used in status lines
    pub fn kind(&self) -> &'static str {
        match self {
            SourceError::Auth { .. } => "auth",
            SourceError::Fetch { .. } => "fetch",
            SourceError::Timeout { .. } => "timeout",
            SourceError::Parse { .. } => "parse",
            SourceError::MissingFile { .. } => "missing_file",
        }
    }

    /// HTTP-like status, when the failure carried one
    pub fn status(&self) -> Option<u16> {
        match self {
            SourceError::Auth { status, .. } | SourceError::Fetch { status, .. } => *status,
            _ => None,
        }
    }
}

/// Run-level failure: nothing is written to the ledger
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("every source failed, refusing to update the ledger")]
    NoSourceData,

    #[error("reference table {table} could not be loaded: {message}")]
    Reference { table: String, message: String },

    #[error("stock ledger {0} is empty, refusing to continue")]
    EmptyLedger(String),

    #[error("stock ledger {0} changed since it was read, refusing to overwrite")]
    LedgerChanged(String),
}
