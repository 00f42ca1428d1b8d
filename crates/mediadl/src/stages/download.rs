//! HTTP fetch into a `.part` file, renamed over the destination when complete.

use std::path::Path;

use reqwest::StatusCode;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::{StageOutcome, StageOutput};
use crate::utils::paths::with_appended_suffix;

pub(crate) async fn fetch(
    client: &reqwest::Client,
    url: &str,
    destination: &Path,
    overwrite: bool,
    deadline: Instant,
) -> StageOutcome {
    match tokio::time::timeout_at(deadline, fetch_inner(client, url, destination, overwrite)).await
    {
        Ok(Ok(bytes)) => StageOutcome::Succeeded(StageOutput::Downloaded {
            path: destination.to_path_buf(),
            bytes,
        }),
        Ok(Err(message)) => {
            let _ = fs::remove_file(with_appended_suffix(destination, ".part")).await;
            warn!("Download failed: {}", message);
            StageOutcome::Failed(message)
        }
        Err(_) => {
            warn!("Download of {} exceeded its deadline", url);
            StageOutcome::TimedOut
        }
    }
}

async fn fetch_inner(
    client: &reqwest::Client,
    url: &str,
    destination: &Path,
    overwrite: bool,
) -> Result<u64, String> {
    let part = with_appended_suffix(destination, ".part");

    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| format!("Failed to create {}: {}", parent.display(), e))?;
    }

    // A previous interrupted attempt may have left this behind.
    if fs::try_exists(&part).await.unwrap_or(false) {
        debug!("Removing stale partial file {}", part.display());
        let _ = fs::remove_file(&part).await;
    }

    let mut response = client
        .get(url)
        .send()
        .await
        .map_err(|e| format!("Request failed for {}: {}", url, e))?;

    let status = response.status();
    if status != StatusCode::OK {
        return Err(format!("HTTP error {}: {}", status.as_u16(), url));
    }

    let mut file = fs::File::create(&part)
        .await
        .map_err(|e| format!("Failed to create {}: {}", part.display(), e))?;

    let mut bytes: u64 = 0;
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| format!("Failed to read body of {}: {}", url, e))?
    {
        file.write_all(&chunk)
            .await
            .map_err(|e| format!("Failed to write {}: {}", part.display(), e))?;
        bytes += chunk.len() as u64;
    }
    file.flush()
        .await
        .map_err(|e| format!("Failed to write {}: {}", part.display(), e))?;
    drop(file);

    if !overwrite && fs::try_exists(destination).await.unwrap_or(false) {
        return Err(format!(
            "File exists and overwrite is disabled: {}",
            destination.display()
        ));
    }

    fs::rename(&part, destination)
        .await
        .map_err(|e| format!("Failed to move download to {}: {}", destination.display(), e))?;

    info!("Downloaded {} ({} bytes) to {}", url, bytes, destination.display());
    Ok(bytes)
}
