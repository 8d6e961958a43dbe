use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read rules file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write rules file {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("rules file {} is not valid JSON: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize rules: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("timed out after {waited_ms}ms waiting for lock {}", path.display())]
    LockTimeout { path: PathBuf, waited_ms: u64 },

    #[error("rule store unavailable: {0}")]
    Unavailable(String),
}
