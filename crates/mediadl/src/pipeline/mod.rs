//! Per-job state machine.
//!
//! A [`JobPipeline`] owns one [`Job`] and drives its stages strictly in
//! order: download, then for video content probe, normalize, thumbnail and
//! an optional resize. Every stage is bracketed by a status guard, every
//! stage result is recorded on the job, and exactly one terminal event is
//! emitted when the pipeline stops.
//!
//! A stage's guard is held until the next stage has begun, so the shared
//! status never reads `idle` between two stages of a running job. The last
//! guard is released once the job has its terminal outcome.

mod state;

use std::path::PathBuf;
use std::sync::Arc;

use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::events::{EventEnvelope, EventSink, MediaEvent};
use crate::models::{Dimensions, Job, JobOutcome, JobReport, LastJob, Stage};
use crate::stages::{MediaTools, StageOutcome, StageOutput, StageRunner, StageSpec};
use crate::status::{StageGuard, StatusAggregate};
use crate::utils::Container;

pub use state::PipelineState;

/// Why the pipeline stopped before completing.
#[derive(Debug)]
enum Halt {
    Failed(String),
    Interrupted(Stage),
}

pub struct JobPipeline {
    job: Job,
    runner: Arc<dyn StageRunner>,
    status: Arc<StatusAggregate>,
    sink: Arc<dyn EventSink>,
    tools: MediaTools,
    state: PipelineState,
    /// Guard of the most recently started stage.
    held: Option<StageGuard>,
}

impl JobPipeline {
    pub fn new(
        job: Job,
        runner: Arc<dyn StageRunner>,
        status: Arc<StatusAggregate>,
        sink: Arc<dyn EventSink>,
        tools: MediaTools,
    ) -> Self {
        Self {
            job,
            runner,
            status,
            sink,
            tools,
            state: PipelineState::Queued,
            held: None,
        }
    }

    pub fn job(&self) -> &Job {
        &self.job
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Drive the job to a terminal state and report the result.
    pub async fn run(mut self) -> JobReport {
        let started = Instant::now();
        info!(
            "Job {} started: {} -> {}",
            self.job.id,
            self.job.source,
            self.job.destination.display()
        );

        let (error, interrupted_during) = match self.drive().await {
            Ok(()) => {
                self.terminate(PipelineState::Completed);
                (None, None)
            }
            Err(Halt::Failed(message)) => {
                error!("Job {} failed: {}", self.job.id, message);
                self.terminate_with_error(message.clone());
                (Some(message), None)
            }
            Err(Halt::Interrupted(stage)) => {
                warn!(
                    "Job {} interrupted during {} after {}s",
                    self.job.id,
                    stage,
                    self.job.timeout.as_secs()
                );
                self.terminate(PipelineState::Interrupted);
                (None, Some(stage))
            }
        };

        JobReport {
            id: self.job.id,
            url: self.job.source.clone(),
            path: self.job.destination.clone(),
            outcome: self.job.outcome(),
            stage_results: self.job.stage_results().to_vec(),
            interrupted_during,
            error,
            elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        }
    }

    async fn drive(&mut self) -> Result<(), Halt> {
        let url = self.job.source.clone();
        let path = self.job.destination.clone();

        let download = StageSpec::Download {
            url: url.clone(),
            destination: path.clone(),
            overwrite: self.job.overwrite,
        };
        match self.execute(Stage::Downloading, &download).await {
            StageOutcome::Succeeded(_) => self.emit(MediaEvent::DownloadCompleted {
                url: url.clone(),
                path: path.clone(),
            }),
            StageOutcome::Failed(message) => {
                self.emit(MediaEvent::DownloadFailed {
                    url,
                    error: message.clone(),
                });
                return Err(Halt::Failed(message));
            }
            StageOutcome::TimedOut => return Err(self.timed_out(Stage::Downloading)),
        }

        let Some(container) = Container::detect(&path) else {
            info!("{} is not a video, skipping post-processing", path.display());
            self.transition(PipelineState::Completed);
            return Ok(());
        };

        let probe = self.tools.probe(&path);
        let dims = match self.execute(Stage::Probing, &probe).await {
            StageOutcome::Succeeded(StageOutput::Dimensions(dims)) => dims,
            StageOutcome::Succeeded(_) => {
                return Err(Halt::Failed(
                    "Could not determine video dimensions".to_string(),
                ))
            }
            StageOutcome::Failed(message) => return Err(Halt::Failed(message)),
            StageOutcome::TimedOut => return Err(self.timed_out(Stage::Probing)),
        };
        debug!("Probed {} at {}", path.display(), dims);

        let normalize = self.tools.normalize(&path, container, dims);
        self.run_required(Stage::Normalizing, &normalize).await?;
        self.emit(MediaEvent::AspectNormalized { path: path.clone() });

        let thumbnail = self.tools.thumbnail(&path, container);
        self.run_required(Stage::Thumbnail, &thumbnail).await?;
        self.emit(MediaEvent::ThumbnailEmbedded { path: path.clone() });

        if self.job.options.needs_resize(dims) {
            let target = self.job.options.resize_target();
            self.resize(path, container, target).await?;
        } else {
            debug!("Resize not needed for {}", self.job.destination.display());
        }

        self.transition(PipelineState::Completed);
        Ok(())
    }

    /// Resize failure is recorded and reported but does not fail the job.
    async fn resize(
        &mut self,
        path: PathBuf,
        container: Container,
        target: Dimensions,
    ) -> Result<(), Halt> {
        let spec = self.tools.resize(&path, container, target);
        match self.execute(Stage::Resizing, &spec).await {
            StageOutcome::Succeeded(_) => self.emit(MediaEvent::ResizeCompleted {
                path,
                width: target.width,
                height: target.height,
            }),
            StageOutcome::Failed(message) => {
                warn!("Resize of {} failed, keeping original size: {}", path.display(), message);
                self.emit(MediaEvent::ResizeFailed { path });
            }
            StageOutcome::TimedOut => return Err(self.timed_out(Stage::Resizing)),
        }
        Ok(())
    }

    async fn run_required(&mut self, stage: Stage, spec: &StageSpec) -> Result<(), Halt> {
        match self.execute(stage, spec).await {
            StageOutcome::Succeeded(_) => Ok(()),
            StageOutcome::Failed(message) => Err(Halt::Failed(message)),
            StageOutcome::TimedOut => Err(self.timed_out(stage)),
        }
    }

    /// Run one stage under a status guard and the job deadline, recording
    /// its result on the job.
    async fn execute(&mut self, stage: Stage, spec: &StageSpec) -> StageOutcome {
        if let Some(state) = PipelineState::for_stage(stage) {
            self.transition(state);
        }

        let deadline = self.job.deadline;
        // Begin before the previous guard drops.
        self.held = Some(self.status.enter(stage));
        let outcome =
            match tokio::time::timeout_at(deadline, self.runner.run(stage, spec, deadline)).await {
                Ok(result) => result.outcome,
                Err(_) => StageOutcome::TimedOut,
            };

        match &outcome {
            StageOutcome::Succeeded(_) => self.job.record_stage(stage, true, None),
            StageOutcome::Failed(message) => {
                self.job.record_stage(stage, false, Some(message.clone()))
            }
            StageOutcome::TimedOut => {
                self.job
                    .record_stage(stage, false, Some("deadline exceeded".to_string()))
            }
        }
        outcome
    }

    /// A timeout is an interruption once the job deadline has passed.
    /// Anything earlier is a runner-level timeout and counts as a failure.
    fn timed_out(&self, stage: Stage) -> Halt {
        if self.job.is_expired() {
            Halt::Interrupted(stage)
        } else {
            Halt::Failed(format!("{} timed out", stage))
        }
    }

    fn transition(&mut self, next: PipelineState) {
        if !self.state.can_transition_to(next) {
            warn!(
                "Job {}: unexpected transition {} -> {}",
                self.job.id, self.state, next
            );
        }
        debug!("Job {}: {} -> {}", self.job.id, self.state, next);
        self.state = next;
    }

    fn terminate_with_error(&mut self, message: String) {
        self.transition(PipelineState::Failed);
        let event = MediaEvent::JobFailed {
            url: self.job.source.clone(),
            error: message,
        };
        self.finish(JobOutcome::Failed, LastJob::Failed, event);
    }

    fn terminate(&mut self, state: PipelineState) {
        if self.state != state {
            self.transition(state);
        }
        match state {
            PipelineState::Interrupted => {
                let event = MediaEvent::JobInterrupted {
                    job: self.job.summary(),
                };
                self.finish(JobOutcome::Interrupted, LastJob::Interrupted, event);
            }
            _ => {
                let event = MediaEvent::JobCompleted {
                    url: self.job.source.clone(),
                    path: self.job.destination.clone(),
                };
                self.finish(JobOutcome::Completed, LastJob::Done, event);
            }
        }
    }

    /// Set the terminal outcome once, release the last stage, then publish
    /// `last_job` and the terminal event.
    fn finish(&mut self, outcome: JobOutcome, last_job: LastJob, event: MediaEvent) {
        if !self.job.finish(outcome) {
            warn!("Job {} already terminated", self.job.id);
            return;
        }
        self.held = None;
        self.status.set_last_job(last_job);
        info!("Job {} {}", self.job.id, outcome.as_str());
        self.emit(event);
    }

    fn emit(&self, event: MediaEvent) {
        self.sink.emit(EventEnvelope::new(self.job.id, event));
    }
}
