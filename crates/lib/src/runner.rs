//! Invocation runner.
//!
//! Performs the side effects a [`BuildPlan`] describes, strictly in order:
//! verify prerequisites, then remove/create the build directory and run the
//! configure and compile invocations. The first failure stops the run.

use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::plan::{BuildPlan, Invocation, Phase, Step};
use crate::probe::{Capability, ProbeStatus, toolchain_version};

/// Errors that stop a build.
#[derive(Debug, Error)]
pub enum RunError {
  /// A required program was not found on `PATH`.
  #[error("missing prerequisite: {0}")]
  PrerequisiteMissing(Capability),

  /// The external build system exited unsuccessfully.
  #[error("{phase} step failed with {}: {command}", describe_exit(.code))]
  ExternalStepFailed {
    phase: Phase,
    command: String,
    code: Option<i32>,
  },

  /// The external build system could not be started.
  #[error("failed to start {program} for the {phase} step: {source}")]
  Spawn {
    phase: Phase,
    program: String,
    #[source]
    source: io::Error,
  },

  /// The build directory could not be prepared.
  #[error("failed to {action} {}: {source}", .path.display())]
  Io {
    action: &'static str,
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

/// Options for a single run.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
  /// Check prerequisites but perform no step.
  pub dry_run: bool,

  /// Capture the external build's output instead of passing it through.
  pub quiet: bool,
}

/// Summary of a finished run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
  pub artifact: PathBuf,
  /// Whether the expected artifact exists. A missing artifact is a warning, not a failure.
  pub artifact_found: bool,
  pub toolchain_version: Option<String>,
  pub steps_run: usize,
  pub dry_run: bool,
  #[serde(serialize_with = "serialize_millis", rename = "elapsed_ms")]
  pub elapsed: Duration,
}

/// Execute `plan`.
pub async fn run(plan: &BuildPlan, options: &RunOptions) -> Result<RunReport, RunError> {
  let started = Instant::now();

  let toolchain = verify_prerequisites(plan)?;
  let version = match toolchain {
    Some(path) if !options.dry_run => toolchain_version(path).await,
    _ => None,
  };
  match &version {
    Some(version) => info!(version = %version, "using toolchain"),
    None => debug!("toolchain version unknown"),
  }

  let mut steps_run = 0;
  if options.dry_run {
    info!(steps = plan.steps.len(), "dry run, skipping build steps");
  } else {
    for step in &plan.steps {
      run_step(step, options).await?;
      steps_run += 1;
    }
  }

  let artifact_found = plan.expected_artifact_path.exists();
  if !options.dry_run && !artifact_found {
    warn!(artifact = %plan.expected_artifact_path.display(), "expected artifact not found");
  }

  Ok(RunReport {
    artifact: plan.expected_artifact_path.clone(),
    artifact_found,
    toolchain_version: version,
    steps_run,
    dry_run: options.dry_run,
    elapsed: started.elapsed(),
  })
}

/// Fail on the first missing prerequisite. Returns the toolchain path, if any.
fn verify_prerequisites(plan: &BuildPlan) -> Result<Option<&Path>, RunError> {
  let mut toolchain = None;

  for prerequisite in &plan.prerequisites {
    match &prerequisite.status {
      ProbeStatus::Found(path) => {
        debug!(capability = %prerequisite.capability, path = %path.display(), "found");
        if matches!(prerequisite.capability, Capability::Toolchain(_)) {
          toolchain = Some(path.as_path());
        }
      }
      ProbeStatus::Missing(_) => return Err(RunError::PrerequisiteMissing(prerequisite.capability.clone())),
    }
  }

  Ok(toolchain)
}

async fn run_step(step: &Step, options: &RunOptions) -> Result<(), RunError> {
  match step {
    Step::RemoveDir { path } => {
      info!(path = %path.display(), "removing build directory");
      match tokio::fs::remove_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(RunError::Io {
          action: "remove",
          path: path.clone(),
          source,
        }),
      }
    }
    Step::CreateDir { path } => {
      info!(path = %path.display(), "creating build directory");
      tokio::fs::create_dir_all(path).await.map_err(|source| RunError::Io {
        action: "create",
        path: path.clone(),
        source,
      })
    }
    Step::Exec(invocation) => execute(invocation, options).await,
  }
}

async fn execute(invocation: &Invocation, options: &RunOptions) -> Result<(), RunError> {
  info!(phase = %invocation.phase, "running {}", invocation.program);
  debug!(cmd = %invocation.command_line(), cwd = %invocation.cwd.display(), "spawning process");

  let mut command = Command::new(&invocation.program);
  command.args(&invocation.args).current_dir(&invocation.cwd);
  if options.quiet {
    command.stdout(Stdio::piped()).stderr(Stdio::piped());
  } else {
    command.stdout(Stdio::inherit()).stderr(Stdio::inherit());
  }

  let output = command.output().await.map_err(|source| RunError::Spawn {
    phase: invocation.phase,
    program: invocation.program.clone(),
    source,
  })?;

  if !output.status.success() {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim_end();
    if !stderr.is_empty() {
      warn!(phase = %invocation.phase, "{} output:\n{}", invocation.program, stderr);
    }

    return Err(RunError::ExternalStepFailed {
      phase: invocation.phase,
      command: invocation.command_line(),
      code: output.status.code(),
    });
  }

  Ok(())
}

fn describe_exit(code: &Option<i32>) -> String {
  match code {
    Some(code) => format!("exit code {}", code),
    None => "no exit code (terminated by a signal)".to_string(),
  }
}

fn serialize_millis<S: serde::Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
  serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
}
