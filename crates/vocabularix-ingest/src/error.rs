//! Error types for n-gram ingestion
//!
//! Configuration and connection failures stop the whole run. Every other
//! variant is scoped to the source being processed: the sequencer records it
//! and moves on to the next source.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for ingestion operations
pub type Result<T> = std::result::Result<T, IngestError>;

/// Errors raised while ingesting n-gram sources
#[derive(Debug, Error)]
pub enum IngestError {
    /// Missing or invalid settings; the run never starts
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The sink is unreachable or no connection is open
    #[error("Connection error: {0}")]
    Connection(String),

    /// A different adapter was requested while the current one is connected
    #[error("Cannot switch to the '{requested}' adapter while '{active}' is connected; disconnect first")]
    AdapterInUse { active: String, requested: String },

    /// Dropping or creating a destination table failed
    #[error("Schema error on table '{table}': {message}")]
    Schema { table: String, message: String },

    /// The HTTP request or the response body stream failed
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The compressed stream is corrupt
    #[error("Decode error: {0}")]
    Decode(String),

    /// A line could not be turned into a record
    #[error("Parse error at line {line}: {message}")]
    Parse { line: u64, message: String },

    /// A batch insert failed
    #[error("Write error on table '{table}': {message}")]
    Write { table: String, message: String },

    /// Writing or removing the local mirror file failed
    #[error("Mirror file error for {}: {source}", path.display())]
    Mirror {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A pipeline stage hung up before its upstream finished
    #[error("Pipeline stage '{0}' stopped accepting input")]
    StageClosed(&'static str),
}

impl IngestError {
    /// Whether the error ends the whole run rather than a single source
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            IngestError::Configuration(_)
                | IngestError::Connection(_)
                | IngestError::AdapterInUse { .. }
        )
    }

    /// Short label used in run reports and structured log fields
    pub fn kind(&self) -> &'static str {
        match self {
            IngestError::Configuration(_) => "configuration",
            IngestError::Connection(_) => "connection",
            IngestError::AdapterInUse { .. } => "adapter_in_use",
            IngestError::Schema { .. } => "schema",
            IngestError::Transport(_) => "transport",
            IngestError::Decode(_) => "decode",
            IngestError::Parse { .. } => "parse",
            IngestError::Write { .. } => "write",
            IngestError::Mirror { .. } => "mirror",
            IngestError::StageClosed(_) => "stage_closed",
        }
    }

    pub(crate) fn mirror(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        IngestError::Mirror {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(IngestError::Configuration("missing host".into()).is_fatal());
        assert!(IngestError::Connection("refused".into()).is_fatal());
        assert!(!IngestError::Decode("bad header".into()).is_fatal());
        assert!(!IngestError::Parse {
            line: 3,
            message: "expected 4 fields".into()
        }
        .is_fatal());
    }

    #[test]
    fn test_display_includes_context() {
        let err = IngestError::Write {
            table: "eng-1gram-a".into(),
            message: "duplicate key".into(),
        };
        assert_eq!(
            err.to_string(),
            "Write error on table 'eng-1gram-a': duplicate key"
        );
        assert_eq!(err.kind(), "write");
    }
}
