//! Stage execution: one external operation per call, bounded by a deadline.
//!
//! A [`StageRunner`] only touches the filesystem and the process table. It
//! never updates the status aggregate or emits events; the pipeline does that
//! around each call.

mod command;
mod download;
mod ffmpeg;
pub mod probe;

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::debug;

use crate::config::Settings;
use crate::models::{Dimensions, Stage};

pub use command::{run_command, CommandOutcome};
pub use probe::ProbePlan;

/// External command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn path_arg(self, path: &Path) -> Self {
        self.arg(path.to_string_lossy().into_owned())
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Short program name for messages.
    pub fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.program.to_string_lossy().into_owned())
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Sequence of commands that writes `output`, which then atomically
/// replaces `target`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscodePlan {
    pub steps: Vec<CommandSpec>,
    pub output: PathBuf,
    pub target: PathBuf,
    /// Intermediate files removed once the plan finishes.
    pub scratch: Vec<PathBuf>,
}

/// What a stage should do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageSpec {
    Download {
        url: String,
        destination: PathBuf,
        overwrite: bool,
    },
    Probe(ProbePlan),
    Transcode(TranscodePlan),
}

/// Structured data produced by a successful stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutput {
    None,
    Downloaded { path: PathBuf, bytes: u64 },
    Dimensions(Dimensions),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    Succeeded(StageOutput),
    Failed(String),
    /// The working deadline elapsed; any subprocess was killed.
    TimedOut,
}

/// Result of one [`StageRunner::run`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageResult {
    pub stage: Stage,
    pub outcome: StageOutcome,
    pub elapsed: Duration,
}

impl StageResult {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, StageOutcome::Succeeded(_))
    }

    pub fn dimensions(&self) -> Option<Dimensions> {
        match self.outcome {
            StageOutcome::Succeeded(StageOutput::Dimensions(d)) => Some(d),
            _ => None,
        }
    }
}

/// Executes a single stage against a working deadline.
#[async_trait]
pub trait StageRunner: Send + Sync {
    async fn run(&self, stage: Stage, spec: &StageSpec, deadline: Instant) -> StageResult;
}

/// Tool locations used to build stage specs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaTools {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
}

impl MediaTools {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            ffmpeg: settings.ffmpeg.clone(),
            ffprobe: settings.ffprobe.clone(),
        }
    }
}

impl Default for MediaTools {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
        }
    }
}

/// Runs stages as real HTTP fetches and ffmpeg/ffprobe subprocesses.
#[derive(Debug, Clone)]
pub struct ProcessStageRunner {
    client: reqwest::Client,
}

impl ProcessStageRunner {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Build a runner with an HTTP client configured from settings.
    pub fn from_settings(settings: &Settings) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(&settings.user_agent)
            .gzip(true)
            .brotli(true)
            .build()?;
        Ok(Self::new(client))
    }
}

#[async_trait]
impl StageRunner for ProcessStageRunner {
    async fn run(&self, stage: Stage, spec: &StageSpec, deadline: Instant) -> StageResult {
        let started = Instant::now();
        debug!("Running stage {}", stage);

        let outcome = match spec {
            StageSpec::Download {
                url,
                destination,
                overwrite,
            } => download::fetch(&self.client, url, destination, *overwrite, deadline).await,
            StageSpec::Probe(plan) => probe::run_probe(plan, deadline).await,
            StageSpec::Transcode(plan) => command::run_plan(plan, deadline).await,
        };

        StageResult {
            stage,
            outcome,
            elapsed: started.elapsed(),
        }
    }
}
