//! Download command: submit one job and follow it to completion.

use std::sync::Arc;

use console::style;

use crate::cli::icons::{self, dim_arrow, info};
use mediadl::{
    ChannelSink, DownloadRequest, EventEnvelope, EventSink, FanoutSink, JobOutcome, JobReport,
    LogSink, MediaEvent, Orchestrator, Settings,
};

pub async fn cmd_download(
    settings: Settings,
    request: &DownloadRequest,
    quiet_events: bool,
    json: bool,
) -> anyhow::Result<()> {
    let (channel, mut rx) = ChannelSink::channel();
    let sink: Arc<dyn EventSink> = Arc::new(
        FanoutSink::new()
            .with(Arc::new(channel))
            .with(Arc::new(LogSink)),
    );

    let orchestrator = Orchestrator::with_process_runner(settings, sink)?;
    let handle = orchestrator.submit(request)?;

    if !json {
        eprintln!(
            "{} Job {} {} {}",
            info(),
            style(handle.id()).dim(),
            handle.summary().url,
            style(handle.summary().path.display()).dim()
        );
    }

    let printer = tokio::spawn(async move {
        while let Some(envelope) = rx.recv().await {
            if !quiet_events && !json {
                print_event(&envelope);
            }
        }
    });

    let result = handle.wait().await;
    let status = Arc::clone(orchestrator.status());
    // Dropping the last sink closes the channel and ends the printer.
    drop(orchestrator);
    let _ = printer.await;
    let report = result?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
        let snapshot = status.snapshot();
        eprintln!(
            "  {} Status: {} (last job: {})",
            dim_arrow(),
            snapshot.mode.as_str(),
            snapshot.last_job.map(|j| j.as_str()).unwrap_or("none")
        );
    }

    if report.outcome != JobOutcome::Completed {
        anyhow::bail!("Job {} {}", report.id, report.outcome.as_str());
    }
    Ok(())
}

fn print_event(envelope: &EventEnvelope) {
    let message = match &envelope.event {
        MediaEvent::DownloadCompleted { path, .. } => format!("Downloaded {}", path.display()),
        MediaEvent::DownloadFailed { error, .. } => format!("Download failed: {}", error),
        MediaEvent::AspectNormalized { .. } => "Aspect ratio normalized".to_string(),
        MediaEvent::ThumbnailEmbedded { .. } => "Thumbnail embedded".to_string(),
        MediaEvent::ResizeCompleted { width, height, .. } => {
            format!("Resized to {}x{}", width, height)
        }
        MediaEvent::ResizeFailed { .. } => "Resize failed, keeping original size".to_string(),
        MediaEvent::JobCompleted { .. } => "Job completed".to_string(),
        MediaEvent::JobFailed { error, .. } => format!("Job failed: {}", error),
        MediaEvent::JobInterrupted { job } => {
            format!("Job interrupted after {}s timeout", job.timeout_seconds)
        }
    };
    eprintln!("{} {}", icons::for_event(&envelope.event), message);
}

fn print_report(report: &JobReport) {
    eprintln!(
        "{} {} in {:.1}s: {}",
        icons::for_outcome(report.outcome),
        style(report.outcome.as_str()).bold(),
        report.elapsed_ms as f64 / 1000.0,
        report.path.display()
    );
    for record in &report.stage_results {
        let mark = if record.success {
            style("ok").green()
        } else {
            style("failed").red()
        };
        let stage = record.stage.as_str();
        match &record.detail {
            Some(detail) => eprintln!("  {} {:<12} {} ({})", dim_arrow(), stage, mark, detail),
            None => eprintln!("  {} {:<12} {}", dim_arrow(), stage, mark),
        }
    }
    if let Some(stage) = report.interrupted_during {
        eprintln!("  {} Interrupted during {}", dim_arrow(), stage);
    }
}
