//! Subprocess execution with a hard deadline.

use std::process::{Output, Stdio};

use tokio::process::Command;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::{CommandSpec, StageOutcome, StageOutput, TranscodePlan};

/// How a single command ended.
#[derive(Debug)]
pub enum CommandOutcome {
    Exited(Output),
    /// Killed because the deadline elapsed.
    TimedOut,
    /// Could not be spawned or awaited.
    Io(std::io::Error),
}

/// Run `spec` to completion or until `deadline`, whichever comes first.
///
/// The child is spawned with `kill_on_drop`, so abandoning the wait at the
/// deadline kills it.
pub async fn run_command(spec: &CommandSpec, deadline: Instant) -> CommandOutcome {
    debug!("Running command: {}", spec);

    let child = Command::new(&spec.program)
        .args(&spec.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn();

    let child = match child {
        Ok(child) => child,
        Err(e) => return CommandOutcome::Io(e),
    };

    match tokio::time::timeout_at(deadline, child.wait_with_output()).await {
        Ok(Ok(output)) => CommandOutcome::Exited(output),
        Ok(Err(e)) => CommandOutcome::Io(e),
        Err(_) => {
            warn!("{} exceeded its deadline and was killed", spec.program_name());
            CommandOutcome::TimedOut
        }
    }
}

/// Last non-empty stderr line, for failure messages.
pub(crate) fn stderr_tail(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr)
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .unwrap_or_default()
        .trim()
        .to_string()
}

/// Execute every step of a transcode plan, then move the output over the target.
///
/// Failures remove the partial output and scratch files. A timeout leaves
/// everything on disk as it was.
pub(crate) async fn run_plan(plan: &TranscodePlan, deadline: Instant) -> StageOutcome {
    for step in &plan.steps {
        match run_command(step, deadline).await {
            CommandOutcome::Exited(output) if output.status.success() => {}
            CommandOutcome::Exited(output) => {
                let message = format!(
                    "{} exited with {}: {}",
                    step.program_name(),
                    output.status,
                    stderr_tail(&output)
                );
                cleanup(plan).await;
                return StageOutcome::Failed(message);
            }
            CommandOutcome::TimedOut => return StageOutcome::TimedOut,
            CommandOutcome::Io(e) => {
                cleanup(plan).await;
                return StageOutcome::Failed(format!(
                    "Failed to execute {}: {}",
                    step.program_name(),
                    e
                ));
            }
        }
    }

    if plan.output != plan.target {
        if let Err(e) = tokio::fs::rename(&plan.output, &plan.target).await {
            cleanup(plan).await;
            return StageOutcome::Failed(format!(
                "Failed to replace {}: {}",
                plan.target.display(),
                e
            ));
        }
    }
    remove_scratch(plan).await;

    StageOutcome::Succeeded(StageOutput::None)
}

async fn cleanup(plan: &TranscodePlan) {
    if plan.output != plan.target {
        let _ = tokio::fs::remove_file(&plan.output).await;
    }
    remove_scratch(plan).await;
}

async fn remove_scratch(plan: &TranscodePlan) {
    for path in &plan.scratch {
        let _ = tokio::fs::remove_file(path).await;
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::time::Duration;

    use super::*;

    fn sh(script: &str) -> CommandSpec {
        CommandSpec::new("sh").arg("-c").arg(script)
    }

    fn soon() -> Instant {
        Instant::now() + Duration::from_secs(10)
    }

    #[tokio::test]
    async fn test_run_command_success() {
        match run_command(&sh("echo hello"), soon()).await {
            CommandOutcome::Exited(output) => {
                assert!(output.status.success());
                assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "hello");
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_run_command_times_out() {
        let deadline = Instant::now() + Duration::from_millis(100);
        let started = std::time::Instant::now();
        let outcome = run_command(&sh("sleep 5"), deadline).await;
        assert!(matches!(outcome, CommandOutcome::TimedOut));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_run_command_missing_program() {
        let spec = CommandSpec::new("/nonexistent/definitely-not-a-tool");
        assert!(matches!(
            run_command(&spec, soon()).await,
            CommandOutcome::Io(_)
        ));
    }

    #[tokio::test]
    async fn test_run_plan_replaces_target() {
        let dir = tempfile::TempDir::new().unwrap();
        let target = dir.path().join("clip.mp4");
        let output = dir.path().join("clip.normalized.mp4");
        let scratch = dir.path().join("clip.mp4.thumb.jpg");
        std::fs::write(&target, b"old").unwrap();
        std::fs::write(&scratch, b"frame").unwrap();

        let plan = TranscodePlan {
            steps: vec![sh(&format!("printf new > '{}'", output.display()))],
            output: output.clone(),
            target: target.clone(),
            scratch: vec![scratch.clone()],
        };

        let outcome = run_plan(&plan, soon()).await;
        assert_eq!(outcome, StageOutcome::Succeeded(StageOutput::None));
        assert_eq!(std::fs::read(&target).unwrap(), b"new");
        assert!(!output.exists());
        assert!(!scratch.exists());
    }

    #[tokio::test]
    async fn test_run_plan_failure_cleans_output() {
        let dir = tempfile::TempDir::new().unwrap();
        let target = dir.path().join("clip.mp4");
        let output = dir.path().join("clip.resized.mp4");
        std::fs::write(&target, b"keep").unwrap();

        let plan = TranscodePlan {
            steps: vec![sh(&format!(
                "printf partial > '{}'; echo 'bad filter' >&2; exit 3",
                output.display()
            ))],
            output: output.clone(),
            target: target.clone(),
            scratch: Vec::new(),
        };

        match run_plan(&plan, soon()).await {
            StageOutcome::Failed(message) => {
                assert!(message.contains("sh exited"));
                assert!(message.contains("bad filter"));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert!(!output.exists());
        assert_eq!(std::fs::read(&target).unwrap(), b"keep");
    }

    #[tokio::test]
    async fn test_run_plan_timeout_leaves_files() {
        let dir = tempfile::TempDir::new().unwrap();
        let target = dir.path().join("clip.mp4");
        let output = dir.path().join("clip.thumb.mp4");
        std::fs::write(&target, b"keep").unwrap();

        let plan = TranscodePlan {
            steps: vec![sh(&format!(
                "printf partial > '{}'; sleep 5",
                output.display()
            ))],
            output: output.clone(),
            target: target.clone(),
            scratch: Vec::new(),
        };

        let deadline = Instant::now() + Duration::from_millis(300);
        assert_eq!(run_plan(&plan, deadline).await, StageOutcome::TimedOut);
        assert_eq!(std::fs::read(&target).unwrap(), b"keep");
    }
}
