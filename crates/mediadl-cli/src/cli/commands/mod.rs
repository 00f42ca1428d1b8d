//! CLI parser and command dispatch.

mod config_cmd;
mod delete;
mod download;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use mediadl::config::load_settings;
use mediadl::DownloadRequest;

#[derive(Parser)]
#[command(name = "mediadl")]
#[command(about = "Download media files and post-process videos with ffmpeg")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Download a URL and post-process it if it is a video
    Download {
        /// URL to fetch (http or https)
        url: String,
        /// Subdirectory inside the download directory
        #[arg(short, long)]
        subdir: Option<String>,
        /// Output filename (default: guessed from the URL)
        #[arg(short, long)]
        filename: Option<String>,
        /// Replace an existing file
        #[arg(long, conflicts_with = "no_overwrite")]
        overwrite: bool,
        /// Never replace an existing file
        #[arg(long)]
        no_overwrite: bool,
        /// End-to-end timeout in seconds
        #[arg(short, long, allow_negative_numbers = true)]
        timeout: Option<i64>,
        /// Resize the video after normalization
        #[arg(long)]
        resize: bool,
        /// Resize target width
        #[arg(long, requires = "resize", allow_negative_numbers = true)]
        width: Option<i64>,
        /// Resize target height
        #[arg(long, requires = "resize", allow_negative_numbers = true)]
        height: Option<i64>,
        /// Do not print lifecycle events as they happen
        #[arg(short, long)]
        quiet_events: bool,
        /// Print the final report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete a single file inside the download directory
    DeleteFile {
        /// File to delete (default: configured delete_file_path)
        path: Option<PathBuf>,
    },

    /// Delete all files directly inside a directory (not recursive)
    DeleteDir {
        /// Directory to clear (default: configured delete_dir_path)
        path: Option<PathBuf>,
    },

    /// Show the resolved configuration
    Config {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let (settings, config) = load_settings(cli.config.as_deref()).await?;
    match &config.source_path {
        Some(path) => tracing::debug!("Using config file {}", path.display()),
        None => tracing::debug!("No config file, using defaults"),
    }

    match cli.command {
        Commands::Download {
            url,
            subdir,
            filename,
            overwrite,
            no_overwrite,
            timeout,
            resize,
            width,
            height,
            quiet_events,
            json,
        } => {
            let request = DownloadRequest {
                url,
                destination_subdir: subdir,
                destination_filename: filename,
                overwrite: match (overwrite, no_overwrite) {
                    (true, _) => Some(true),
                    (_, true) => Some(false),
                    _ => None,
                },
                timeout_seconds: timeout,
                resize_enabled: resize,
                resize_width: width,
                resize_height: height,
            };
            download::cmd_download(settings, &request, quiet_events, json).await
        }
        Commands::DeleteFile { path } => delete::cmd_delete_file(&settings, path.as_deref()).await,
        Commands::DeleteDir { path } => delete::cmd_delete_dir(&settings, path.as_deref()).await,
        Commands::Config { json } => config_cmd::cmd_config_show(&settings, &config, json),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_download() {
        let cli = Cli::try_parse_from([
            "mediadl",
            "download",
            "http://x/a.mp4",
            "--resize",
            "--width",
            "1280",
            "--timeout",
            "30",
        ])
        .unwrap();
        match cli.command {
            Commands::Download {
                url,
                resize,
                width,
                height,
                timeout,
                ..
            } => {
                assert_eq!(url, "http://x/a.mp4");
                assert!(resize);
                assert_eq!(width, Some(1280));
                assert_eq!(height, None);
                assert_eq!(timeout, Some(30));
            }
            _ => panic!("expected download command"),
        }
    }

    #[test]
    fn test_overwrite_flags_conflict() {
        assert!(Cli::try_parse_from([
            "mediadl",
            "download",
            "http://x/a.mp4",
            "--overwrite",
            "--no-overwrite",
        ])
        .is_err());
    }
}
