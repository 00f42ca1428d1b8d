//! mediadl - media download and post-processing job engine.
//!
//! Fetches a remote file, runs video content through a fixed ffmpeg pipeline
//! (aspect normalization, thumbnail embedding, optional resize), and reports
//! progress through a shared status aggregate and a lifecycle event stream.

// Stage::from_str returns Option<Self>, not Result as std::str::FromStr requires.
#![allow(clippy::should_implement_trait)]

pub mod config;
pub mod delete;
pub mod events;
pub mod models;
pub mod orchestrator;
pub mod pipeline;
pub mod stages;
pub mod status;
pub mod utils;

pub use config::{load_settings, Config, ConfigError, Settings};
pub use delete::DeleteError;
pub use events::{ChannelSink, EventEnvelope, EventSink, FanoutSink, LogSink, MediaEvent};
pub use models::{
    Dimensions, Job, JobId, JobOptions, JobOutcome, JobReport, JobSummary, LastJob, Mode, Stage,
    StatusSnapshot,
};
pub use orchestrator::{
    DownloadRequest, JobHandle, JobJoinError, Orchestrator, RequestError, SubmitError,
};
pub use pipeline::{JobPipeline, PipelineState};
pub use stages::{
    CommandSpec, MediaTools, ProcessStageRunner, StageOutcome, StageOutput, StageResult,
    StageRunner, StageSpec,
};
pub use status::{StageGuard, StatusAggregate};
