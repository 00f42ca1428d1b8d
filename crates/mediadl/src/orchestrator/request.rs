//! Download requests and their resolution against settings.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use super::RequestError;
use crate::config::{Settings, MAX_TIMEOUT_SECS};
use crate::models::{JobOptions, DEFAULT_RESIZE_HEIGHT, DEFAULT_RESIZE_WIDTH};
use crate::utils::{
    ensure_within_base, guess_filename_from_url, resolve_symlinks, sanitize_filename,
};

/// One download submission as received from the caller.
///
/// Numeric fields are signed so out-of-range input reaches validation
/// instead of failing deserialization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadRequest {
    pub url: String,
    #[serde(default)]
    pub destination_subdir: Option<String>,
    #[serde(default)]
    pub destination_filename: Option<String>,
    #[serde(default)]
    pub overwrite: Option<bool>,
    #[serde(default)]
    pub timeout_seconds: Option<i64>,
    #[serde(default)]
    pub resize_enabled: bool,
    #[serde(default)]
    pub resize_width: Option<i64>,
    #[serde(default)]
    pub resize_height: Option<i64>,
}

impl DownloadRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn subdir(mut self, subdir: impl Into<String>) -> Self {
        self.destination_subdir = Some(subdir.into());
        self
    }

    pub fn filename(mut self, filename: impl Into<String>) -> Self {
        self.destination_filename = Some(filename.into());
        self
    }

    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = Some(overwrite);
        self
    }

    pub fn timeout_seconds(mut self, secs: i64) -> Self {
        self.timeout_seconds = Some(secs);
        self
    }

    pub fn resize(mut self, width: i64, height: i64) -> Self {
        self.resize_enabled = true;
        self.resize_width = Some(width);
        self.resize_height = Some(height);
        self
    }

    /// Validate the request and resolve it into job parameters.
    pub fn resolve(&self, settings: &Settings) -> Result<ResolvedRequest, RequestError> {
        let url = validate_url(&self.url)?;

        let timeout = match self.timeout_seconds {
            Some(secs) if secs <= 0 || secs.unsigned_abs() > MAX_TIMEOUT_SECS => {
                return Err(RequestError::InvalidTimeout(secs))
            }
            Some(secs) => Duration::from_secs(secs.unsigned_abs()),
            None => settings.default_timeout,
        };

        let options = self.options()?;
        let destination = self.destination(&url, &settings.download_dir)?;

        Ok(ResolvedRequest {
            url,
            destination,
            overwrite: self.overwrite.unwrap_or(settings.overwrite),
            timeout,
            options,
        })
    }

    fn options(&self) -> Result<JobOptions, RequestError> {
        let width = self.resize_width.unwrap_or(i64::from(DEFAULT_RESIZE_WIDTH));
        let height = self.resize_height.unwrap_or(i64::from(DEFAULT_RESIZE_HEIGHT));

        let checked = u32::try_from(width)
            .ok()
            .zip(u32::try_from(height).ok())
            .filter(|(w, h)| *w > 0 && *h > 0);

        match checked {
            Some((resize_width, resize_height)) => Ok(JobOptions {
                resize_enabled: self.resize_enabled,
                resize_width,
                resize_height,
            }),
            None if self.resize_enabled => {
                Err(RequestError::InvalidDimensions { width, height })
            }
            // Dimensions are irrelevant while resizing is off.
            None => Ok(JobOptions::default()),
        }
    }

    /// Containment is checked after resolving symlinks in the existing part
    /// of each path.
    fn destination(&self, url: &str, base: &Path) -> Result<PathBuf, RequestError> {
        let base = resolve_symlinks(&absolute(base));

        let dir = match self.destination_subdir.as_deref().map(str::trim) {
            Some(subdir) if !subdir.is_empty() => base.join(sanitize_filename(subdir)),
            _ => base.clone(),
        };
        let filename = match self.destination_filename.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => sanitize_filename(name),
            _ => guess_filename_from_url(url),
        };

        let outside = |path: PathBuf| RequestError::OutsideBase {
            path,
            base: base.clone(),
        };
        let dir = ensure_within_base(&base, &resolve_symlinks(&dir))
            .ok_or_else(|| outside(dir.clone()))?;
        let destination = resolve_symlinks(&dir.join(filename));
        // "." or ".." would name a directory rather than a file in it.
        match ensure_within_base(&base, &destination) {
            Some(path) if path != base && path != dir => Ok(path),
            _ => Err(outside(destination)),
        }
    }
}

/// Validated job parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRequest {
    pub url: String,
    pub destination: PathBuf,
    pub overwrite: bool,
    pub timeout: Duration,
    pub options: JobOptions,
}

fn validate_url(raw: &str) -> Result<String, RequestError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(RequestError::EmptyUrl);
    }
    let parsed = Url::parse(raw).map_err(|e| RequestError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    match parsed.scheme() {
        "http" | "https" => Ok(raw.to_string()),
        other => Err(RequestError::UnsupportedScheme(other.to_string())),
    }
}

/// Make `path` absolute against the working directory.
pub(crate) fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}
