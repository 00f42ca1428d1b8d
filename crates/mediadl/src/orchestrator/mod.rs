//! Job submission.
//!
//! The orchestrator validates a request, builds a [`Job`] and spawns an
//! independent [`JobPipeline`] task for it. Jobs share only the status
//! aggregate and the event sink.

mod error;
pub mod request;

use std::path::Path;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::info;

use crate::config::Settings;
use crate::delete::{self, DeleteError};
use crate::events::EventSink;
use crate::models::{Job, JobId, JobReport, JobSummary};
use crate::pipeline::JobPipeline;
use crate::stages::{MediaTools, ProcessStageRunner, StageRunner};
use crate::status::StatusAggregate;

pub use error::{JobJoinError, RequestError};
pub use request::{DownloadRequest, ResolvedRequest};

pub struct Orchestrator {
    settings: Settings,
    runner: Arc<dyn StageRunner>,
    status: Arc<StatusAggregate>,
    sink: Arc<dyn EventSink>,
    tools: MediaTools,
}

impl Orchestrator {
    pub fn new(
        settings: Settings,
        runner: Arc<dyn StageRunner>,
        status: Arc<StatusAggregate>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        let tools = MediaTools::from_settings(&settings);
        Self {
            settings,
            runner,
            status,
            sink,
            tools,
        }
    }

    /// Orchestrator backed by real HTTP and ffmpeg stages.
    pub fn with_process_runner(
        settings: Settings,
        sink: Arc<dyn EventSink>,
    ) -> Result<Self, reqwest::Error> {
        let runner = Arc::new(ProcessStageRunner::from_settings(&settings)?);
        Ok(Self::new(
            settings,
            runner,
            Arc::new(StatusAggregate::new()),
            sink,
        ))
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn status(&self) -> &Arc<StatusAggregate> {
        &self.status
    }

    pub fn sink(&self) -> &Arc<dyn EventSink> {
        &self.sink
    }

    /// Validate `request` and start its pipeline.
    ///
    /// Must be called within a tokio runtime. Invalid requests are rejected
    /// here, before any stage runs.
    pub fn submit(&self, request: &DownloadRequest) -> Result<JobHandle, RequestError> {
        let resolved = request.resolve(&self.settings)?;
        let job = Job::new(
            resolved.url,
            resolved.destination,
            resolved.overwrite,
            resolved.timeout,
            resolved.options,
        );
        let summary = job.summary();
        info!(
            "Submitted job {} for {} (timeout {}s)",
            summary.id, summary.url, summary.timeout_seconds
        );

        let pipeline = JobPipeline::new(
            job,
            Arc::clone(&self.runner),
            Arc::clone(&self.status),
            Arc::clone(&self.sink),
            self.tools.clone(),
        );
        let join = tokio::spawn(pipeline.run());

        Ok(JobHandle { summary, join })
    }

    /// Submit and wait for the terminal report.
    pub async fn run(&self, request: &DownloadRequest) -> Result<JobReport, SubmitError> {
        let handle = self.submit(request)?;
        Ok(handle.wait().await?)
    }

    pub async fn delete_file(&self, path: Option<&Path>) -> Result<usize, DeleteError> {
        delete::delete_file(&self.settings, &self.status, path).await
    }

    pub async fn delete_files_in_directory(
        &self,
        path: Option<&Path>,
    ) -> Result<usize, DeleteError> {
        delete::delete_files_in_directory(&self.settings, &self.status, path).await
    }
}

/// Either half of [`Orchestrator::run`] failing.
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error(transparent)]
    Request(#[from] RequestError),
    #[error(transparent)]
    Join(#[from] JobJoinError),
}

/// A running job.
#[derive(Debug)]
pub struct JobHandle {
    summary: JobSummary,
    join: JoinHandle<JobReport>,
}

impl JobHandle {
    pub fn id(&self) -> JobId {
        self.summary.id
    }

    pub fn summary(&self) -> &JobSummary {
        &self.summary
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the pipeline to reach a terminal state.
    pub async fn wait(self) -> Result<JobReport, JobJoinError> {
        let id = self.summary.id;
        self.join.await.map_err(|e| {
            if e.is_panic() {
                JobJoinError::Panicked(id)
            } else {
                JobJoinError::Cancelled(id)
            }
        })
    }
}
