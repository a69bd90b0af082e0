//! Types describing a resolved build.
//!
//! A [`BuildPlan`] is the immutable result of argument resolution: everything
//! the runner needs to perform one build, with no reference back to the
//! command line it came from.

use std::fmt;
use std::num::NonZeroUsize;
use std::path::PathBuf;

use clap::ValueEnum;
use serde::Serialize;
use thiserror::Error;

use crate::platform::Arch;
use crate::probe::Prerequisite;

/// Errors produced while parsing the command line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
  /// A token that is not a recognized flag.
  #[error("unknown option: {token}")]
  UnknownOption { token: String },

  /// A flag that takes a value was the last token.
  #[error("option {flag} requires a value")]
  MissingArgument { flag: String },

  /// A flag's value could not be interpreted.
  #[error("invalid value {value:?} for {flag}: {reason}")]
  InvalidValue {
    flag: String,
    value: String,
    reason: String,
  },
}

/// Compiler optimization profile requested from the external build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildMode {
  #[default]
  Release,
  Debug,
}

impl BuildMode {
  /// Lowercase identifier, embedded in the executable name.
  pub fn as_str(&self) -> &'static str {
    match self {
      BuildMode::Release => "release",
      BuildMode::Debug => "debug",
    }
  }

  /// Value for `CMAKE_BUILD_TYPE` and `--config`.
  pub fn cmake_build_type(&self) -> &'static str {
    match self {
      BuildMode::Release => "Release",
      BuildMode::Debug => "Debug",
    }
  }
}

impl fmt::Display for BuildMode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

/// Requested number of compile jobs, before resolution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Parallelism {
  /// Use every detected core.
  #[default]
  Auto,
  /// Explicit `--jobs` value.
  Jobs(NonZeroUsize),
}

impl Parallelism {
  /// Concrete job count. `Auto` falls back to 1 when the core count is unknown.
  pub fn resolve(self, detected_cores: Option<NonZeroUsize>) -> NonZeroUsize {
    match self {
      Parallelism::Jobs(n) => n,
      Parallelism::Auto => detected_cores.unwrap_or(NonZeroUsize::MIN),
    }
  }
}

/// Phase of the external build system invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
  Configure,
  Compile,
}

impl fmt::Display for Phase {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Phase::Configure => write!(f, "configure"),
      Phase::Compile => write!(f, "compile"),
    }
  }
}

/// One external command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Invocation {
  pub phase: Phase,
  pub program: String,
  pub args: Vec<String>,
  pub cwd: PathBuf,
}

impl Invocation {
  /// Command line as it would be typed in a shell, for display only.
  pub fn command_line(&self) -> String {
    std::iter::once(self.program.as_str())
      .chain(self.args.iter().map(String::as_str))
      .collect::<Vec<_>>()
      .join(" ")
  }
}

/// A single side effect the runner performs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Step {
  RemoveDir { path: PathBuf },
  CreateDir { path: PathBuf },
  Exec(Invocation),
}

/// Fully resolved parameters for one build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildPlan {
  pub mode: BuildMode,
  pub clean_before_build: bool,
  pub create_bundle: bool,
  pub parallelism: NonZeroUsize,
  pub arch: Arch,
  pub source_dir: PathBuf,
  pub build_dir: PathBuf,
  pub expected_artifact_path: PathBuf,
  pub prerequisites: Vec<Prerequisite>,
  pub steps: Vec<Step>,
}

impl BuildPlan {
  /// Invocations of the external build system, in order.
  pub fn invocations(&self) -> impl Iterator<Item = &Invocation> {
    self.steps.iter().filter_map(|step| match step {
      Step::Exec(invocation) => Some(invocation),
      _ => None,
    })
  }
}

/// How the CLI renders plans and reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
  #[default]
  Text,
  Json,
}

impl OutputFormat {
  pub fn is_json(self) -> bool {
    matches!(self, OutputFormat::Json)
  }
}

/// Presentation flags that don't affect the build itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutputOptions {
  /// Print the plan without touching the filesystem or spawning the build.
  pub dry_run: bool,
  /// Debug-level logging.
  pub verbose: bool,
  pub format: OutputFormat,
}

/// A plan plus the options controlling how it is reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
  pub plan: BuildPlan,
  pub output: OutputOptions,
}

/// Successful outcome of resolving a command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
  /// `--help` or `-h` was given; print usage and exit successfully.
  Help,
  Build(BuildRequest),
}

/// Validated command-line flags, before any project or environment facts are
/// applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildFlags {
  pub mode: BuildMode,
  pub clean: bool,
  pub bundle: bool,
  pub jobs: Parallelism,
  pub output: OutputOptions,
}

/// Outcome of parsing the command line on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParsedArgs {
  Help,
  Build(BuildFlags),
}
