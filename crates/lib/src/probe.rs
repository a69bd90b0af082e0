//! Capability checks for the external programs a build depends on.
//!
//! Presence is decided by a `PATH` lookup only; nothing is spawned while
//! probing, so the environment can be detected before argument parsing
//! without side effects. The probe results are carried in the
//! [`BuildPlan`](crate::plan::BuildPlan) and verified by the runner.

use std::fmt;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::process::Command;
use tracing::debug;

use crate::config::ProjectConfig;

/// An external program the build needs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum Capability {
  /// Package manager used to install the other tools.
  PackageManager(String),
  /// Command-line tool invoked by the build.
  Tool(String),
  /// Native compiler.
  Toolchain(String),
}

impl Capability {
  /// Program name looked up on `PATH`.
  pub fn name(&self) -> &str {
    match self {
      Capability::PackageManager(name) | Capability::Tool(name) | Capability::Toolchain(name) => name,
    }
  }

  /// Human-readable category.
  pub fn kind(&self) -> &'static str {
    match self {
      Capability::PackageManager(_) => "package manager",
      Capability::Tool(_) => "tool",
      Capability::Toolchain(_) => "toolchain",
    }
  }
}

impl fmt::Display for Capability {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} `{}`", self.kind(), self.name())
  }
}

/// Outcome of probing a single capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeStatus {
  Found(PathBuf),
  Missing(String),
}

impl ProbeStatus {
  pub fn is_found(&self) -> bool {
    matches!(self, ProbeStatus::Found(_))
  }

  pub fn path(&self) -> Option<&Path> {
    match self {
      ProbeStatus::Found(path) => Some(path),
      ProbeStatus::Missing(_) => None,
    }
  }
}

/// A capability paired with its probe result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Prerequisite {
  pub capability: Capability,
  pub status: ProbeStatus,
}

/// Looks up programs by name.
pub trait ToolProbe {
  fn probe(&self, name: &str) -> ProbeStatus;
}

/// Probe backed by a `PATH` search.
#[derive(Debug, Clone, Copy, Default)]
pub struct PathProbe;

impl ToolProbe for PathProbe {
  fn probe(&self, name: &str) -> ProbeStatus {
    match which::which(name) {
      Ok(path) => ProbeStatus::Found(path),
      Err(e) => {
        debug!(tool = %name, error = %e, "tool not found");
        ProbeStatus::Missing(name.to_string())
      }
    }
  }
}

/// Facts about the machine the resolver needs.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Environment {
  /// Number of cores available to the build. `None` if it could not be determined.
  pub detected_cores: Option<NonZeroUsize>,

  /// Probe results, in the order the capabilities were enumerated.
  pub prerequisites: Vec<Prerequisite>,
}

impl Environment {
  /// Probe the current machine for everything `config` requires.
  pub fn detect(config: &ProjectConfig) -> Self {
    Self::detect_with(config, &PathProbe)
  }

  /// Same as [`Environment::detect`] with an explicit probe.
  pub fn detect_with(config: &ProjectConfig, probe: &impl ToolProbe) -> Self {
    let prerequisites = config
      .capabilities()
      .into_iter()
      .map(|capability| {
        let status = probe.probe(capability.name());
        Prerequisite { capability, status }
      })
      .collect();

    Self {
      detected_cores: std::thread::available_parallelism().ok(),
      prerequisites,
    }
  }
}

/// Query `<toolchain> --version` and return the first line of its output.
///
/// Best effort: any failure yields `None`.
pub async fn toolchain_version(path: &Path) -> Option<String> {
  let output = match Command::new(path).arg("--version").output().await {
    Ok(output) => output,
    Err(e) => {
      debug!(toolchain = %path.display(), error = %e, "failed to query toolchain version");
      return None;
    }
  };

  if !output.status.success() {
    debug!(toolchain = %path.display(), code = ?output.status.code(), "toolchain version query failed");
    return None;
  }

  String::from_utf8_lossy(&output.stdout)
    .lines()
    .map(str::trim)
    .find(|line| !line.is_empty())
    .map(str::to_string)
}
