//! Job model: one submitted download and its post-processing record.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use uuid::Uuid;

use super::Stage;
use crate::config::MAX_TIMEOUT_SECS;

/// Default resize target width.
pub const DEFAULT_RESIZE_WIDTH: u32 = 640;
/// Default resize target height.
pub const DEFAULT_RESIZE_HEIGHT: u32 = 360;

/// Opaque job identifier assigned at submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Pixel dimensions of a video stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Both sides positive.
    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Post-processing options carried by a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobOptions {
    pub resize_enabled: bool,
    pub resize_width: u32,
    pub resize_height: u32,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            resize_enabled: false,
            resize_width: DEFAULT_RESIZE_WIDTH,
            resize_height: DEFAULT_RESIZE_HEIGHT,
        }
    }
}

impl JobOptions {
    pub fn resize_target(&self) -> Dimensions {
        Dimensions::new(self.resize_width, self.resize_height)
    }

    /// Whether a video probed at `probed` needs the resize stage.
    pub fn needs_resize(&self, probed: Dimensions) -> bool {
        self.resize_enabled && probed != self.resize_target()
    }
}

/// Outcome of a job. Moves from `Pending` to exactly one terminal value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobOutcome {
    Pending,
    Completed,
    Failed,
    Interrupted,
}

impl JobOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Interrupted => "interrupted",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Recorded result of one stage within a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageRecord {
    pub stage: Stage,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// A single download job.
///
/// Owned and mutated only by its own pipeline.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: JobId,
    /// URL to fetch.
    pub source: String,
    /// Resolved absolute destination path.
    pub destination: PathBuf,
    /// Whether an existing destination may be replaced.
    pub overwrite: bool,
    pub submitted_at: DateTime<Utc>,
    /// Effective end-to-end budget.
    pub timeout: Duration,
    /// Absolute deadline fixed at creation.
    pub deadline: Instant,
    pub options: JobOptions,
    stage_results: Vec<StageRecord>,
    outcome: JobOutcome,
}

impl Job {
    pub fn new(
        source: String,
        destination: PathBuf,
        overwrite: bool,
        timeout: Duration,
        options: JobOptions,
    ) -> Self {
        let now = Instant::now();
        let deadline = now
            .checked_add(timeout)
            .unwrap_or_else(|| now + Duration::from_secs(MAX_TIMEOUT_SECS));
        Self {
            id: JobId::new(),
            source,
            destination,
            overwrite,
            submitted_at: Utc::now(),
            timeout,
            deadline,
            options,
            stage_results: Vec::new(),
            outcome: JobOutcome::Pending,
        }
    }

    pub fn outcome(&self) -> JobOutcome {
        self.outcome
    }

    /// Stage results in completion order.
    pub fn stage_results(&self) -> &[StageRecord] {
        &self.stage_results
    }

    pub fn stage_result(&self, stage: Stage) -> Option<&StageRecord> {
        self.stage_results.iter().find(|r| r.stage == stage)
    }

    /// Record a stage result, replacing an earlier record for the same stage.
    pub fn record_stage(&mut self, stage: Stage, success: bool, detail: Option<String>) {
        let record = StageRecord {
            stage,
            success,
            detail,
        };
        match self.stage_results.iter_mut().find(|r| r.stage == stage) {
            Some(existing) => *existing = record,
            None => self.stage_results.push(record),
        }
    }

    /// Set the terminal outcome. Returns false (and changes nothing) when
    /// the job already reached a terminal outcome.
    pub fn finish(&mut self, outcome: JobOutcome) -> bool {
        if self.outcome.is_terminal() || !outcome.is_terminal() {
            return false;
        }
        self.outcome = outcome;
        true
    }

    /// Whether the deadline has passed.
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    pub fn summary(&self) -> JobSummary {
        JobSummary {
            id: self.id,
            url: self.source.clone(),
            path: self.destination.clone(),
            timeout_seconds: self.timeout.as_secs(),
        }
    }
}

/// Compact job description carried by `job_interrupted`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSummary {
    pub id: JobId,
    pub url: String,
    pub path: PathBuf,
    pub timeout_seconds: u64,
}

/// Final, read-only view of a job returned once its pipeline terminates.
#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub id: JobId,
    pub url: String,
    pub path: PathBuf,
    pub outcome: JobOutcome,
    pub stage_results: Vec<StageRecord>,
    /// Stage that was running when the deadline expired.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interrupted_during: Option<Stage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub elapsed_ms: u64,
}
