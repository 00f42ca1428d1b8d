//! File and directory cleanup inside the download directory.
//!
//! Both operations run under their own status stage so the shared status
//! reports `working` while they touch the filesystem.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use crate::config::Settings;
use crate::models::Stage;
use crate::orchestrator::request::absolute;
use crate::status::StatusAggregate;
use crate::utils::{ensure_within_base, resolve_symlinks};

#[derive(Debug, Error)]
pub enum DeleteError {
    #[error("No {0} path provided or configured")]
    NoPath(&'static str),
    #[error("Path {} is outside the download directory {}", path.display(), base.display())]
    OutsideBase { path: PathBuf, base: PathBuf },
    #[error("Failed to delete {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Delete one regular file. Falls back to the configured default path.
///
/// Returns the number of files removed (0 when nothing regular is there).
pub async fn delete_file(
    settings: &Settings,
    status: &Arc<StatusAggregate>,
    path: Option<&Path>,
) -> Result<usize, DeleteError> {
    let path = resolve(settings, path, settings.delete_file_path.as_deref(), "file")?;

    let _guard = status.enter(Stage::FileDeleting);
    if !is_regular_file(&path).await {
        debug!("{} is not a regular file, nothing to delete", path.display());
        return Ok(0);
    }
    tokio::fs::remove_file(&path)
        .await
        .map_err(|source| DeleteError::Io {
            path: path.clone(),
            source,
        })?;
    info!("Deleted {}", path.display());
    Ok(1)
}

/// Delete every regular file directly inside a directory. Subdirectories
/// and their contents are left alone.
pub async fn delete_files_in_directory(
    settings: &Settings,
    status: &Arc<StatusAggregate>,
    path: Option<&Path>,
) -> Result<usize, DeleteError> {
    let dir = resolve(settings, path, settings.delete_dir_path.as_deref(), "directory")?;

    let _guard = status.enter(Stage::DirDeleting);
    let io_err = |path: &Path, source| DeleteError::Io {
        path: path.to_path_buf(),
        source,
    };

    if !tokio::fs::metadata(&dir)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false)
    {
        debug!("{} is not a directory, nothing to delete", dir.display());
        return Ok(0);
    }

    let mut entries = tokio::fs::read_dir(&dir).await.map_err(|e| io_err(&dir, e))?;
    let mut removed = 0;
    while let Some(entry) = entries.next_entry().await.map_err(|e| io_err(&dir, e))? {
        let file = entry.path();
        if !is_regular_file(&file).await {
            continue;
        }
        tokio::fs::remove_file(&file)
            .await
            .map_err(|e| io_err(&file, e))?;
        removed += 1;
    }

    info!("Deleted {} file(s) in {}", removed, dir.display());
    Ok(removed)
}

fn resolve(
    settings: &Settings,
    explicit: Option<&Path>,
    configured: Option<&Path>,
    kind: &'static str,
) -> Result<PathBuf, DeleteError> {
    let raw = explicit
        .filter(|p| !p.as_os_str().is_empty())
        .or(configured)
        .ok_or(DeleteError::NoPath(kind))?;

    // Links are resolved so a link inside the base cannot reach outside it.
    let base = resolve_symlinks(&absolute(&settings.download_dir));
    let path = resolve_symlinks(&absolute(raw));
    ensure_within_base(&base, &path).ok_or(DeleteError::OutsideBase { path, base })
}

/// Symlinks are not followed.
async fn is_regular_file(path: &Path) -> bool {
    tokio::fs::symlink_metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}
