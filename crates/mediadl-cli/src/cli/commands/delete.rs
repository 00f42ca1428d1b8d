//! Delete commands.

use std::path::Path;
use std::sync::Arc;

use crate::cli::icons::{dim_arrow, success};
use mediadl::delete::{delete_file, delete_files_in_directory};
use mediadl::{Settings, StatusAggregate};

pub async fn cmd_delete_file(settings: &Settings, path: Option<&Path>) -> anyhow::Result<()> {
    let status = Arc::new(StatusAggregate::new());
    let removed = delete_file(settings, &status, path).await?;

    if removed == 0 {
        eprintln!("{} Nothing to delete", dim_arrow());
    } else {
        eprintln!("{} Deleted 1 file", success());
    }
    Ok(())
}

pub async fn cmd_delete_dir(settings: &Settings, path: Option<&Path>) -> anyhow::Result<()> {
    let status = Arc::new(StatusAggregate::new());
    let removed = delete_files_in_directory(settings, &status, path).await?;

    eprintln!("{} Deleted {} file(s)", success(), removed);
    Ok(())
}
