use std::path::PathBuf;

use thiserror::Error;

use crate::config::MAX_TIMEOUT_SECS;
use crate::models::JobId;

/// Rejected submission. Raised before any stage runs.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("URL is required")]
    EmptyUrl,
    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("Unsupported URL scheme '{0}' (expected http or https)")]
    UnsupportedScheme(String),
    #[error("Timeout must be between 1 and {} seconds, got {0}", MAX_TIMEOUT_SECS)]
    InvalidTimeout(i64),
    #[error("Resize dimensions must be positive, got {width}x{height}")]
    InvalidDimensions { width: i64, height: i64 },
    #[error("Path {} is outside the download directory {}", path.display(), base.display())]
    OutsideBase { path: PathBuf, base: PathBuf },
}

/// The pipeline task ended without producing a report.
#[derive(Debug, Error)]
pub enum JobJoinError {
    #[error("Job {0} panicked")]
    Panicked(JobId),
    #[error("Job {0} was cancelled")]
    Cancelled(JobId),
}
