//! Domain models.

mod job;
mod stage;
mod status;

pub use job::{
    Dimensions, Job, JobId, JobOptions, JobOutcome, JobReport, JobSummary, StageRecord,
    DEFAULT_RESIZE_HEIGHT, DEFAULT_RESIZE_WIDTH,
};
pub use stage::Stage;
pub use status::{LastJob, Mode, StatusSnapshot};
