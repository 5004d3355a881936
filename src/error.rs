use reqwest::StatusCode;
use thiserror::Error;

/// Failure of a single service poll. The banner treats every variant the
/// same way: the instance is skipped.
#[derive(Error, Debug)]
pub enum PollError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP {0}")]
    Status(StatusCode),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed response: {0}")]
    Malformed(String),
}

#[derive(Error, Debug)]
pub enum UpdateError {
    #[error("update request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: StatusCode },

    #[error("filesystem error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no release found for {0}")]
    NoRelease(String),

    #[error("unsupported platform: {os}/{arch}")]
    UnsupportedPlatform { os: String, arch: String },

    #[error("release {version} has no asset named {asset}")]
    AssetMissing { version: String, asset: String },

    #[error("checksum manifest has no entry for {0}")]
    ChecksumMissing(String),

    #[error("checksum mismatch for {asset}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        asset: String,
        expected: String,
        actual: String,
    },

    #[error("installing the new binary failed, previous version restored: {0}")]
    RolledBack(#[source] std::io::Error),

    #[error(
        "installing the new binary failed ({install}) and restoring {backup} also failed ({rollback}); \
         restore it manually"
    )]
    RollbackFailed {
        install: std::io::Error,
        rollback: std::io::Error,
        backup: String,
    },
}

pub type Result<T> = std::result::Result<T, UpdateError>;
