//! Video dimension probing.
//!
//! ffprobe JSON output is tried first; when it yields nothing usable the
//! `ffmpeg -i` banner on stderr is scanned for a `WxH` token.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::command::{run_command, stderr_tail, CommandOutcome};
use super::{CommandSpec, StageOutcome, StageOutput};
use crate::models::Dimensions;

static BANNER_DIMENSIONS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",\s*(\d{2,5})x(\d{2,5})").unwrap());

/// Primary and fallback probe commands for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbePlan {
    pub primary: CommandSpec,
    pub fallback: CommandSpec,
}

impl ProbePlan {
    pub fn new(ffprobe: &Path, ffmpeg: &Path, path: &Path) -> Self {
        let primary = CommandSpec::new(ffprobe)
            .args([
                "-v",
                "error",
                "-select_streams",
                "v:0",
                "-show_entries",
                "stream=width,height",
                "-of",
                "json",
            ])
            .path_arg(path);
        let fallback = CommandSpec::new(ffmpeg).arg("-i").path_arg(path);
        Self { primary, fallback }
    }
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    #[serde(default)]
    width: Option<i64>,
    #[serde(default)]
    height: Option<i64>,
}

/// First stream in ffprobe JSON output with positive width and height.
pub fn parse_ffprobe_json(stdout: &str) -> Option<Dimensions> {
    let output: ProbeOutput = serde_json::from_str(stdout).ok()?;
    output.streams.iter().find_map(|s| {
        let width = u32::try_from(s.width?).ok()?;
        let height = u32::try_from(s.height?).ok()?;
        let dims = Dimensions::new(width, height);
        dims.is_valid().then_some(dims)
    })
}

/// Dimensions from the stream description `ffmpeg -i` prints on stderr.
pub fn parse_ffmpeg_banner(stderr: &str) -> Option<Dimensions> {
    let caps = BANNER_DIMENSIONS.captures(stderr)?;
    let width = caps.get(1)?.as_str().parse().ok()?;
    let height = caps.get(2)?.as_str().parse().ok()?;
    let dims = Dimensions::new(width, height);
    dims.is_valid().then_some(dims)
}

pub(crate) async fn run_probe(plan: &ProbePlan, deadline: Instant) -> StageOutcome {
    match run_command(&plan.primary, deadline).await {
        CommandOutcome::Exited(output) if output.status.success() => {
            let stdout = String::from_utf8_lossy(&output.stdout);
            if let Some(dims) = parse_ffprobe_json(&stdout) {
                return StageOutcome::Succeeded(StageOutput::Dimensions(dims));
            }
            debug!("ffprobe reported no usable video stream, trying ffmpeg");
        }
        CommandOutcome::Exited(output) => {
            warn!("ffprobe failed: {}", stderr_tail(&output));
        }
        CommandOutcome::TimedOut => return StageOutcome::TimedOut,
        CommandOutcome::Io(e) => warn!("Failed to execute ffprobe: {}", e),
    }

    // ffmpeg exits non-zero without an output file; only stderr matters.
    match run_command(&plan.fallback, deadline).await {
        CommandOutcome::Exited(output) => {
            let stderr = String::from_utf8_lossy(&output.stderr);
            match parse_ffmpeg_banner(&stderr) {
                Some(dims) => StageOutcome::Succeeded(StageOutput::Dimensions(dims)),
                None => StageOutcome::Failed("Could not determine video dimensions".to_string()),
            }
        }
        CommandOutcome::TimedOut => StageOutcome::TimedOut,
        CommandOutcome::Io(e) => StageOutcome::Failed(format!(
            "Could not determine video dimensions: failed to execute ffmpeg: {}",
            e
        )),
    }
}
