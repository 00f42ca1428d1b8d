//! Configuration management for mediadl using the prefer crate.
//!
//! `Config` is the on-disk file model; every field is optional. It is merged
//! onto [`Settings`] defaults to produce the value set the core works with.

mod settings;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub use settings::{clamp_timeout, find_tool, Settings, DEFAULT_TIMEOUT_SECS, MAX_TIMEOUT_SECS};

/// Name used for config file discovery (`mediadl.toml`, `mediadl.json`, ...).
pub const CONFIG_NAME: &str = "mediadl";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse {format} config {path}: {message}")]
    Parse {
        path: PathBuf,
        format: &'static str,
        message: String,
    },
}

/// Configuration file contents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Base download directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_dir: Option<String>,
    /// Default overwrite policy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overwrite: Option<bool>,
    /// Default file for `delete_file`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete_file_path: Option<String>,
    /// Default directory for `delete_files_in_directory`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete_dir_path: Option<String>,
    /// Default job timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
    /// ffmpeg executable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ffmpeg: Option<String>,
    /// ffprobe executable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ffprobe: Option<String>,
    /// User agent for HTTP requests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// File this config was loaded from.
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration using prefer for discovery.
    /// Falls back to defaults when no config file is found or it fails to parse.
    pub async fn load() -> Self {
        match prefer::load(CONFIG_NAME).await {
            Ok(pref_config) => match pref_config.source_path() {
                Some(path) => match Self::load_from_path(path).await {
                    Ok(config) => config,
                    Err(e) => {
                        tracing::warn!("{}", e);
                        Self::default()
                    }
                },
                None => Self::default(),
            },
            Err(_) => {
                debug!("No {} config file found, using defaults", CONFIG_NAME);
                Self::default()
            }
        }
    }

    /// Load configuration from a specific file path.
    /// TOML, YAML and JSON are chosen by file extension.
    pub async fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|source| ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;

        let mut config = Self::parse(&contents, path)?;
        config.source_path = Some(path.to_path_buf());
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    fn parse(contents: &str, path: &Path) -> Result<Self, ConfigError> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");
        let parse_error = |format: &'static str, message: String| ConfigError::Parse {
            path: path.to_path_buf(),
            format,
            message,
        };

        match ext {
            "toml" => toml::from_str(contents).map_err(|e| parse_error("TOML", e.to_string())),
            "yaml" | "yml" => {
                serde_yaml::from_str(contents).map_err(|e| parse_error("YAML", e.to_string()))
            }
            _ => serde_json::from_str(contents).map_err(|e| parse_error("JSON", e.to_string())),
        }
    }

    /// Directory of the config file, used to resolve relative paths.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Resolve a path that may be relative to the config file.
    /// - Absolute paths are returned as-is
    /// - Paths starting with ~ are expanded
    /// - Relative paths are joined onto `base_dir`
    pub fn resolve_path(&self, path_str: &str, base_dir: &Path) -> PathBuf {
        let expanded = shellexpand::tilde(path_str);
        let path = Path::new(expanded.as_ref());

        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    }

    /// Apply configuration to settings.
    pub fn apply_to_settings(&self, settings: &mut Settings, base_dir: &Path) {
        if let Some(ref dir) = self.download_dir {
            settings.download_dir = self.resolve_path(dir, base_dir);
        }
        if let Some(overwrite) = self.overwrite {
            settings.overwrite = overwrite;
        }
        if let Some(ref path) = self.delete_file_path {
            settings.delete_file_path = Some(self.resolve_path(path, base_dir));
        }
        if let Some(ref path) = self.delete_dir_path {
            settings.delete_dir_path = Some(self.resolve_path(path, base_dir));
        }
        if let Some(timeout) = self.timeout_seconds.and_then(clamp_timeout) {
            settings.default_timeout = timeout;
        }
        if let Some(ref ffmpeg) = self.ffmpeg {
            settings.ffmpeg = find_tool(&shellexpand::tilde(ffmpeg));
        }
        if let Some(ref ffprobe) = self.ffprobe {
            settings.ffprobe = find_tool(&shellexpand::tilde(ffprobe));
        }
        if let Some(ref user_agent) = self.user_agent {
            settings.user_agent = user_agent.clone();
        }
    }
}

/// Load settings: explicit config path first, then prefer discovery,
/// then environment overrides.
pub async fn load_settings(config_path: Option<&Path>) -> Result<(Settings, Config), ConfigError> {
    let config = match config_path {
        Some(path) => Config::load_from_path(path).await?,
        None => Config::load().await,
    };

    let base_dir = config
        .base_dir()
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    let mut settings = Settings::default();
    config.apply_to_settings(&mut settings, &base_dir);
    Ok((settings.with_env_overrides(), config))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_parse_toml() {
        let config = Config::parse(
            "download_dir = \"media\"\noverwrite = true\ntimeout_seconds = 60\n",
            Path::new("/etc/mediadl.toml"),
        )
        .unwrap();
        assert_eq!(config.download_dir.as_deref(), Some("media"));
        assert_eq!(config.overwrite, Some(true));
        assert_eq!(config.timeout_seconds, Some(60));
    }

    #[test]
    fn test_parse_yaml_and_json() {
        let yaml = Config::parse("overwrite: false\n", Path::new("c.yaml")).unwrap();
        assert_eq!(yaml.overwrite, Some(false));

        let json = Config::parse("{\"delete_dir_path\": \"/m/old\"}", Path::new("c.json")).unwrap();
        assert_eq!(json.delete_dir_path.as_deref(), Some("/m/old"));
    }

    #[test]
    fn test_parse_error_names_format() {
        let err = Config::parse("not = [valid", Path::new("bad.toml")).unwrap_err();
        assert!(err.to_string().contains("TOML"));
    }

    #[test]
    fn test_apply_resolves_relative_paths() {
        let config = Config {
            download_dir: Some("media".to_string()),
            delete_file_path: Some("/abs/file.mp4".to_string()),
            timeout_seconds: Some(30),
            ..Default::default()
        };
        let mut settings = Settings::default();
        config.apply_to_settings(&mut settings, Path::new("/etc/mediadl"));

        assert_eq!(settings.download_dir, PathBuf::from("/etc/mediadl/media"));
        assert_eq!(
            settings.delete_file_path,
            Some(PathBuf::from("/abs/file.mp4"))
        );
        assert_eq!(settings.default_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_zero_timeout_is_ignored() {
        let config = Config {
            timeout_seconds: Some(0),
            ..Default::default()
        };
        let mut settings = Settings::default();
        config.apply_to_settings(&mut settings, Path::new("/"));
        assert_eq!(
            settings.default_timeout,
            Duration::from_secs(DEFAULT_TIMEOUT_SECS)
        );
    }

    #[test]
    fn test_huge_timeout_is_capped() {
        let config = Config {
            timeout_seconds: Some(u64::MAX),
            ..Default::default()
        };
        let mut settings = Settings::default();
        config.apply_to_settings(&mut settings, Path::new("/"));
        assert_eq!(
            settings.default_timeout,
            Duration::from_secs(MAX_TIMEOUT_SECS)
        );
    }

    #[tokio::test]
    async fn test_load_from_path() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("mediadl.toml");
        tokio::fs::write(&path, "download_dir = \"out\"\n").await.unwrap();

        let config = Config::load_from_path(&path).await.unwrap();
        assert_eq!(config.base_dir(), Some(dir.path().to_path_buf()));

        let (settings, _) = load_settings(Some(&path)).await.unwrap();
        assert_eq!(settings.download_dir, dir.path().join("out"));
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let err = Config::load_from_path(Path::new("/nonexistent/mediadl.toml"))
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
