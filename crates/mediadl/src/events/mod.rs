//! Lifecycle events emitted to the external bus.
//!
//! Each variant carries a fixed payload. Events are wrapped in an
//! [`EventEnvelope`] that identifies the job they belong to.

mod sink;

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{JobId, JobSummary};

pub use sink::{ChannelSink, EventSink, FanoutSink, LogSink};

/// Prefix applied to event names on the platform bus.
pub const BUS_PREFIX: &str = "media_downloader_";

/// Lifecycle event with its payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MediaEvent {
    DownloadCompleted {
        url: String,
        path: PathBuf,
    },
    DownloadFailed {
        url: String,
        error: String,
    },
    AspectNormalized {
        path: PathBuf,
    },
    ThumbnailEmbedded {
        path: PathBuf,
    },
    ResizeCompleted {
        path: PathBuf,
        width: u32,
        height: u32,
    },
    ResizeFailed {
        path: PathBuf,
    },
    JobCompleted {
        url: String,
        path: PathBuf,
    },
    JobFailed {
        url: String,
        error: String,
    },
    JobInterrupted {
        job: JobSummary,
    },
}

impl MediaEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::DownloadCompleted { .. } => "download_completed",
            Self::DownloadFailed { .. } => "download_failed",
            Self::AspectNormalized { .. } => "aspect_normalized",
            Self::ThumbnailEmbedded { .. } => "thumbnail_embedded",
            Self::ResizeCompleted { .. } => "resize_completed",
            Self::ResizeFailed { .. } => "resize_failed",
            Self::JobCompleted { .. } => "job_completed",
            Self::JobFailed { .. } => "job_failed",
            Self::JobInterrupted { .. } => "job_interrupted",
        }
    }

    /// Event name on the platform bus.
    pub fn bus_name(&self) -> String {
        format!("{}{}", BUS_PREFIX, self.event_type())
    }

    /// Whether this event ends a job's event stream.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::JobCompleted { .. } | Self::JobFailed { .. } | Self::JobInterrupted { .. }
        )
    }

    /// Payload fields without the type tag.
    pub fn payload(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or_default();
        if let Some(obj) = value.as_object_mut() {
            obj.remove("type");
        }
        value
    }
}

/// An event together with the job that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventEnvelope {
    pub job_id: JobId,
    pub emitted_at: DateTime<Utc>,
    pub event: MediaEvent,
}

impl EventEnvelope {
    pub fn new(job_id: JobId, event: MediaEvent) -> Self {
        Self {
            job_id,
            emitted_at: Utc::now(),
            event,
        }
    }
}
