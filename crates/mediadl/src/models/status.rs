//! Status read model exposed to the entity framework.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Stage;

/// Aggregate mode across all running jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Idle,
    Working,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Working => "working",
        }
    }
}

/// Outcome of the most recently terminated job.
///
/// `None` serializes as `null`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LastJob {
    Done,
    Interrupted,
    Failed,
}

impl LastJob {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Done => "done",
            Self::Interrupted => "interrupted",
            Self::Failed => "failed",
        }
    }
}

/// Point-in-time copy of the status aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub mode: Mode,
    /// Most recently started stage that is still active.
    pub subprocess: Option<Stage>,
    /// One entry per active occurrence.
    pub active_processes: Vec<Stage>,
    pub last_changed: DateTime<Utc>,
    pub last_job: Option<LastJob>,
}

impl StatusSnapshot {
    pub fn active_count(&self) -> usize {
        self.active_processes.len()
    }

    pub fn is_working(&self) -> bool {
        self.mode == Mode::Working
    }
}
