//! Terminal markers for job outcomes and lifecycle events.

use console::{style, StyledObject};

use mediadl::{JobOutcome, MediaEvent};

type Icon = StyledObject<&'static str>;

pub fn success() -> Icon {
    style("✓").green()
}

pub fn info() -> Icon {
    style("→").cyan()
}

pub fn warn() -> Icon {
    style("!").yellow()
}

pub fn error() -> Icon {
    style("✗").red()
}

/// Indent marker for per-stage report lines.
pub fn dim_arrow() -> Icon {
    style("→").dim()
}

/// Completed is a success, an interrupted job only a warning.
pub fn for_outcome(outcome: JobOutcome) -> Icon {
    match outcome {
        JobOutcome::Completed => success(),
        JobOutcome::Interrupted => warn(),
        JobOutcome::Failed => error(),
        JobOutcome::Pending => info(),
    }
}

/// A failed resize leaves a usable file, so it only warns.
pub fn for_event(event: &MediaEvent) -> Icon {
    match event {
        MediaEvent::DownloadFailed { .. } | MediaEvent::JobFailed { .. } => error(),
        MediaEvent::ResizeFailed { .. } | MediaEvent::JobInterrupted { .. } => warn(),
        _ => success(),
    }
}
