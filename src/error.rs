//! Error taxonomy for the ETL core
//!
//! Every failure mode is typed and catchable; the pipeline decides whether
//! to abort (default) or skip the offending file (`--keep-going`).

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EtlError {
    /// The input file could not be opened or read.
    #[error("failed to read {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A line in the input file is not a valid record.
    #[error("malformed record at {path}:{line}: {source}")]
    Parse {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    /// The batched song/artist lookup query failed.
    #[error("song/artist lookup failed: {source}")]
    Resolve {
        #[source]
        source: rusqlite::Error,
    },

    /// Staging, bulk-copy, or merge into a target table failed.
    #[error("bulk load into '{table}' failed: {source}")]
    Load {
        table: &'static str,
        #[source]
        source: rusqlite::Error,
    },
}
