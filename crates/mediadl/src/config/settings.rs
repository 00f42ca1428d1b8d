//! Resolved runtime settings handed to the core.

use std::path::PathBuf;
use std::time::Duration;

use tracing::debug;

/// Built-in end-to-end job timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Upper bound for any job timeout (one week).
pub const MAX_TIMEOUT_SECS: u64 = 7 * 24 * 60 * 60;

/// Positive timeout capped at [`MAX_TIMEOUT_SECS`]; `None` for zero.
pub fn clamp_timeout(secs: u64) -> Option<Duration> {
    if secs == 0 {
        return None;
    }
    if secs > MAX_TIMEOUT_SECS {
        debug!("Capping timeout of {}s to {}s", secs, MAX_TIMEOUT_SECS);
    }
    Some(Duration::from_secs(secs.min(MAX_TIMEOUT_SECS)))
}

/// Default download subdirectory name.
const DOWNLOADS_SUBDIR: &str = "mediadl";

/// Application settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Base directory every destination and delete path must stay inside.
    pub download_dir: PathBuf,
    /// Default overwrite policy for requests that do not specify one.
    pub overwrite: bool,
    /// Default target for `delete_file`.
    pub delete_file_path: Option<PathBuf>,
    /// Default target for `delete_files_in_directory`.
    pub delete_dir_path: Option<PathBuf>,
    /// Timeout for requests that do not specify one.
    pub default_timeout: Duration,
    /// ffmpeg executable.
    pub ffmpeg: PathBuf,
    /// ffprobe executable.
    pub ffprobe: PathBuf,
    /// User agent for HTTP requests.
    pub user_agent: String,
}

impl Default for Settings {
    fn default() -> Self {
        // Downloads dir -> Home dir -> Current dir
        let download_dir = dirs::download_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join(DOWNLOADS_SUBDIR);

        Self {
            download_dir,
            overwrite: false,
            delete_file_path: None,
            delete_dir_path: None,
            default_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            ffmpeg: find_tool("ffmpeg"),
            ffprobe: find_tool("ffprobe"),
            user_agent: format!("mediadl/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Settings {
    /// Create settings with a custom download directory.
    pub fn with_download_dir(download_dir: PathBuf) -> Self {
        Self {
            download_dir,
            ..Default::default()
        }
    }

    /// Apply `MEDIADL_*` environment overrides.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(dir) = std::env::var("MEDIADL_DOWNLOAD_DIR") {
            if !dir.is_empty() {
                self.download_dir = PathBuf::from(shellexpand::tilde(&dir).as_ref());
            }
        }
        if let Ok(value) = std::env::var("MEDIADL_OVERWRITE") {
            if let Some(flag) = parse_bool(&value) {
                self.overwrite = flag;
            }
        }
        if let Ok(value) = std::env::var("MEDIADL_TIMEOUT") {
            match value.trim().parse::<u64>().ok().and_then(clamp_timeout) {
                Some(timeout) => self.default_timeout = timeout,
                None => debug!("Ignoring invalid MEDIADL_TIMEOUT: {}", value),
            }
        }
        self
    }
}

/// Locate an executable on PATH, falling back to the bare name.
pub fn find_tool(name: &str) -> PathBuf {
    which::which(name).unwrap_or_else(|_| PathBuf::from(name))
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
