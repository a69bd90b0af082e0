//! Command-line resolution.
//!
//! Resolution happens in two stages. [`parse_args`] reads the tokens in a
//! single left-to-right pass into a [`RawFlags`] record and validates it once,
//! without looking at anything but the arguments. [`derive_plan`] then combines
//! the validated flags with the environment facts and project configuration.
//! Nothing here touches the filesystem or spawns processes.

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use clap::ValueEnum;

use crate::config::ProjectConfig;
use crate::consts::{ARTIFACT_DIR, BUILD_DIR_PREFIX, BUNDLE_EXTENSION};
use crate::probe::Environment;

use super::types::{
  BuildFlags, BuildMode, BuildPlan, BuildRequest, Invocation, OutputFormat, OutputOptions, ParseError, Parallelism,
  ParsedArgs, Phase, Resolution, Step,
};

const JOBS_FLAGS: [&str; 2] = ["--jobs", "-j"];
const FORMAT_FLAG: &str = "--format";

/// Parse a command line on its own.
///
/// `args` excludes the program name. A help flag anywhere in `args` wins over
/// every other token, valid or not.
pub fn parse_args<S: AsRef<str>>(args: &[S]) -> Result<ParsedArgs, ParseError> {
  if args.iter().any(|arg| matches!(arg.as_ref(), "--help" | "-h")) {
    return Ok(ParsedArgs::Help);
  }

  let flags = RawFlags::collect(args.iter().map(AsRef::as_ref))?.validate()?;
  Ok(ParsedArgs::Build(flags))
}

/// Resolve a command line into a build request in one call.
///
/// `source_dir` should be absolute; the build directory and artifact path are
/// derived from it.
pub fn resolve<S: AsRef<str>>(
  args: &[S],
  source_dir: &Path,
  environment: &Environment,
  config: &ProjectConfig,
) -> Result<Resolution, ParseError> {
  match parse_args(args)? {
    ParsedArgs::Help => Ok(Resolution::Help),
    ParsedArgs::Build(flags) => Ok(Resolution::Build(BuildRequest {
      plan: derive_plan(&flags, source_dir, environment, config),
      output: flags.output,
    })),
  }
}

/// A flag value exactly as it appeared, kept until validation.
#[derive(Debug, Clone, PartialEq, Eq)]
struct RawValue {
  flag: String,
  value: String,
}

/// Accumulator for the token pass. Later occurrences overwrite earlier ones.
#[derive(Debug, Default)]
struct RawFlags {
  mode: BuildMode,
  clean: bool,
  bundle: bool,
  dry_run: bool,
  verbose: bool,
  jobs: Option<RawValue>,
  format: Option<RawValue>,
}

impl RawFlags {
  fn collect<'a>(tokens: impl IntoIterator<Item = &'a str>) -> Result<Self, ParseError> {
    let mut tokens = tokens.into_iter();
    let mut flags = RawFlags::default();

    while let Some(token) = tokens.next() {
      match token {
        "--release" => flags.mode = BuildMode::Release,
        "--debug" => flags.mode = BuildMode::Debug,
        "--clean" => flags.clean = true,
        "--bundle" => flags.bundle = true,
        "--dry-run" => flags.dry_run = true,
        "--verbose" | "-v" => flags.verbose = true,
        flag if JOBS_FLAGS.contains(&flag) => flags.jobs = Some(take_value(flag, &mut tokens)?),
        FORMAT_FLAG => flags.format = Some(take_value(FORMAT_FLAG, &mut tokens)?),
        _ => {
          if let Some(value) = token.strip_prefix("--jobs=") {
            flags.jobs = Some(RawValue::inline("--jobs", value));
          } else if let Some(value) = token.strip_prefix("--format=") {
            flags.format = Some(RawValue::inline(FORMAT_FLAG, value));
          } else {
            return Err(ParseError::UnknownOption {
              token: token.to_string(),
            });
          }
        }
      }
    }

    Ok(flags)
  }

  fn validate(self) -> Result<BuildFlags, ParseError> {
    let jobs = match self.jobs {
      Some(raw) => Parallelism::Jobs(parse_jobs(raw)?),
      None => Parallelism::Auto,
    };

    let format = match self.format {
      Some(raw) => parse_format(raw)?,
      None => OutputFormat::default(),
    };

    Ok(BuildFlags {
      mode: self.mode,
      clean: self.clean,
      bundle: self.bundle,
      jobs,
      output: OutputOptions {
        dry_run: self.dry_run,
        verbose: self.verbose,
        format,
      },
    })
  }
}

impl RawValue {
  fn inline(flag: &str, value: &str) -> Self {
    Self {
      flag: flag.to_string(),
      value: value.to_string(),
    }
  }
}

/// Consume the token after `flag` as its value, whatever it looks like.
fn take_value<'a>(flag: &str, tokens: &mut impl Iterator<Item = &'a str>) -> Result<RawValue, ParseError> {
  match tokens.next() {
    Some(value) => Ok(RawValue::inline(flag, value)),
    None => Err(ParseError::MissingArgument { flag: flag.to_string() }),
  }
}

fn parse_jobs(raw: RawValue) -> Result<NonZeroUsize, ParseError> {
  raw.value.parse::<NonZeroUsize>().map_err(|e| ParseError::InvalidValue {
    reason: format!("expected a positive integer ({})", e),
    flag: raw.flag,
    value: raw.value,
  })
}

fn parse_format(raw: RawValue) -> Result<OutputFormat, ParseError> {
  OutputFormat::from_str(&raw.value, true).map_err(|_| ParseError::InvalidValue {
    reason: "expected one of: text, json".to_string(),
    flag: raw.flag,
    value: raw.value,
  })
}

/// Derive the build plan for already-parsed `flags`.
pub fn derive_plan(
  flags: &BuildFlags,
  source_dir: &Path,
  environment: &Environment,
  config: &ProjectConfig,
) -> BuildPlan {
  let build_dir = source_dir.join(format!("{}{}", BUILD_DIR_PREFIX, config.arch));
  let parallelism = flags.jobs.resolve(environment.detected_cores);
  let expected_artifact_path = artifact_path(&build_dir, &config.app_name(source_dir), flags.mode, flags.bundle);

  let mut steps = Vec::with_capacity(4);
  if flags.clean {
    steps.push(Step::RemoveDir {
      path: build_dir.clone(),
    });
  }
  steps.push(Step::CreateDir {
    path: build_dir.clone(),
  });
  steps.push(Step::Exec(configure_invocation(flags, source_dir, &build_dir, config)));
  steps.push(Step::Exec(compile_invocation(
    flags.mode,
    parallelism,
    source_dir,
    &build_dir,
    config,
  )));

  BuildPlan {
    mode: flags.mode,
    clean_before_build: flags.clean,
    create_bundle: flags.bundle,
    parallelism,
    arch: config.arch,
    source_dir: source_dir.to_path_buf(),
    build_dir,
    expected_artifact_path,
    prerequisites: environment.prerequisites.clone(),
    steps,
  }
}

fn artifact_path(build_dir: &Path, app_name: &str, mode: BuildMode, bundle: bool) -> PathBuf {
  let bin = build_dir.join(ARTIFACT_DIR);
  if bundle {
    bin.join(format!("{}.{}", app_name, BUNDLE_EXTENSION))
  } else {
    bin.join(format!("{}-{}", app_name, mode))
  }
}

fn configure_invocation(flags: &BuildFlags, source_dir: &Path, build_dir: &Path, config: &ProjectConfig) -> Invocation {
  let mut args = vec![
    "-S".to_string(),
    path_arg(source_dir),
    "-B".to_string(),
    path_arg(build_dir),
  ];
  if let Some(generator) = &config.generator {
    args.push("-G".to_string());
    args.push(generator.clone());
  }
  args.push(format!("-DCMAKE_BUILD_TYPE={}", flags.mode.cmake_build_type()));
  args.push(format!("-DCMAKE_OSX_ARCHITECTURES={}", config.arch));
  args.push(format!(
    "-D{}={}",
    config.bundle_option,
    if flags.bundle { "ON" } else { "OFF" }
  ));
  args.extend(config.configure_args.iter().cloned());

  Invocation {
    phase: Phase::Configure,
    program: config.cmake.clone(),
    args,
    cwd: source_dir.to_path_buf(),
  }
}

fn compile_invocation(
  mode: BuildMode,
  parallelism: NonZeroUsize,
  source_dir: &Path,
  build_dir: &Path,
  config: &ProjectConfig,
) -> Invocation {
  Invocation {
    phase: Phase::Compile,
    program: config.cmake.clone(),
    args: vec![
      "--build".to_string(),
      path_arg(build_dir),
      "--config".to_string(),
      mode.cmake_build_type().to_string(),
      "--parallel".to_string(),
      parallelism.to_string(),
    ],
    cwd: source_dir.to_path_buf(),
  }
}

fn path_arg(path: &Path) -> String {
  path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::platform::Arch;
  use crate::probe::{Capability, Prerequisite, ProbeStatus};

  fn env_with_cores(cores: usize) -> Environment {
    Environment {
      detected_cores: NonZeroUsize::new(cores),
      prerequisites: vec![Prerequisite {
        capability: Capability::Tool("cmake".to_string()),
        status: ProbeStatus::Found(PathBuf::from("/usr/bin/cmake")),
      }],
    }
  }

  fn source_dir() -> PathBuf {
    PathBuf::from("/work/Viewer")
  }

  fn resolve_plan(args: &[&str]) -> BuildPlan {
    match resolve(args, &source_dir(), &env_with_cores(4), &ProjectConfig::default()).unwrap() {
      Resolution::Build(request) => request.plan,
      Resolution::Help => panic!("expected a plan for {:?}", args),
    }
  }

  fn resolve_err(args: &[&str]) -> ParseError {
    resolve(args, &source_dir(), &env_with_cores(4), &ProjectConfig::default()).unwrap_err()
  }

  #[test]
  fn empty_args_use_defaults() {
    let plan = resolve_plan(&[]);

    assert_eq!(plan.mode, BuildMode::Release);
    assert_eq!(plan.parallelism.get(), 4);
    assert!(!plan.clean_before_build);
    assert!(!plan.create_bundle);
    assert_eq!(plan.arch, Arch::Arm64);
    assert_eq!(plan.build_dir, PathBuf::from("/work/Viewer/build_arm64"));
    assert_eq!(
      plan.expected_artifact_path,
      PathBuf::from("/work/Viewer/build_arm64/bin/Viewer-release")
    );
  }

  #[test]
  fn single_mode_flag_selects_mode() {
    assert_eq!(resolve_plan(&["--release"]).mode, BuildMode::Release);
    assert_eq!(resolve_plan(&["--debug"]).mode, BuildMode::Debug);
    assert_eq!(resolve_plan(&["--clean", "--debug", "--bundle"]).mode, BuildMode::Debug);
  }

  #[test]
  fn last_mode_flag_wins() {
    assert_eq!(resolve_plan(&["--debug", "--release"]).mode, BuildMode::Release);
    assert_eq!(resolve_plan(&["--release", "--debug"]).mode, BuildMode::Debug);
    assert_eq!(
      resolve_plan(&["--debug", "--release", "--clean", "--debug"]).mode,
      BuildMode::Debug
    );
  }

  #[test]
  fn boolean_flags_may_repeat() {
    let plan = resolve_plan(&["--clean", "--bundle", "--clean"]);

    assert!(plan.clean_before_build);
    assert!(plan.create_bundle);
  }

  #[test]
  fn jobs_sets_parallelism() {
    assert_eq!(resolve_plan(&["--jobs", "8"]).parallelism.get(), 8);
    assert_eq!(resolve_plan(&["-j", "2"]).parallelism.get(), 2);
    assert_eq!(resolve_plan(&["--jobs=12"]).parallelism.get(), 12);
    assert_eq!(resolve_plan(&["--jobs", "3", "--jobs", "5"]).parallelism.get(), 5);
  }

  #[test]
  fn trailing_jobs_is_missing_argument() {
    assert_eq!(
      resolve_err(&["--jobs"]),
      ParseError::MissingArgument {
        flag: "--jobs".to_string()
      }
    );
    assert!(matches!(resolve_err(&["--debug", "-j"]), ParseError::MissingArgument { flag } if flag == "-j"));
  }

  #[test]
  fn non_numeric_jobs_is_invalid_value() {
    assert!(matches!(
      resolve_err(&["--jobs", "abc"]),
      ParseError::InvalidValue { flag, value, .. } if flag == "--jobs" && value == "abc"
    ));
  }

  #[test]
  fn zero_or_negative_jobs_is_invalid_value() {
    assert!(matches!(resolve_err(&["--jobs", "0"]), ParseError::InvalidValue { .. }));
    assert!(matches!(resolve_err(&["--jobs", "-4"]), ParseError::InvalidValue { .. }));
    assert!(matches!(resolve_err(&["--jobs="]), ParseError::InvalidValue { .. }));
  }

  #[test]
  fn jobs_consumes_next_token_even_if_it_looks_like_a_flag() {
    assert!(matches!(
      resolve_err(&["--jobs", "--clean"]),
      ParseError::InvalidValue { value, .. } if value == "--clean"
    ));
  }

  #[test]
  fn unknown_token_is_rejected() {
    assert_eq!(
      resolve_err(&["--bogus"]),
      ParseError::UnknownOption {
        token: "--bogus".to_string()
      }
    );
    assert!(matches!(resolve_err(&["--release=yes"]), ParseError::UnknownOption { token } if token == "--release=yes"));
    assert!(matches!(resolve_err(&["build"]), ParseError::UnknownOption { .. }));
  }

  #[test]
  fn detected_cores_drive_auto_parallelism() {
    let config = ProjectConfig::default();
    let no_cores = Environment {
      detected_cores: None,
      prerequisites: Vec::new(),
    };

    let Resolution::Build(request) = resolve::<&str>(&[], &source_dir(), &no_cores, &config).unwrap() else {
      panic!("expected a plan");
    };
    assert_eq!(request.plan.parallelism.get(), 1);

    let Resolution::Build(request) = resolve::<&str>(&[], &source_dir(), &env_with_cores(10), &config).unwrap() else {
      panic!("expected a plan");
    };
    assert_eq!(request.plan.parallelism.get(), 10);
  }

  #[test]
  fn bundle_changes_artifact_path() {
    let plain = resolve_plan(&[]);
    let bundled = resolve_plan(&["--bundle"]);

    assert!(bundled.create_bundle);
    assert_ne!(plain.expected_artifact_path, bundled.expected_artifact_path);
    assert_eq!(
      bundled.expected_artifact_path,
      PathBuf::from("/work/Viewer/build_arm64/bin/Viewer.app")
    );
  }

  #[test]
  fn debug_artifact_name_embeds_mode() {
    let plan = resolve_plan(&["--debug"]);

    assert_eq!(
      plan.expected_artifact_path,
      PathBuf::from("/work/Viewer/build_arm64/bin/Viewer-debug")
    );
  }

  #[test]
  fn resolve_is_idempotent() {
    let args = ["--debug", "--clean", "--jobs", "6"];

    let first = resolve(&args, &source_dir(), &env_with_cores(4), &ProjectConfig::default());
    let second = resolve(&args, &source_dir(), &env_with_cores(4), &ProjectConfig::default());

    assert_eq!(first, second);
  }

  #[test]
  fn help_wins_over_every_other_token() {
    for args in [
      vec!["--help"],
      vec!["-h"],
      vec!["--debug", "--help"],
      vec!["--bogus", "-h"],
      vec!["--jobs", "-h"],
      vec!["--help", "--jobs"],
    ] {
      let resolution = resolve(&args, &source_dir(), &env_with_cores(4), &ProjectConfig::default());
      assert_eq!(resolution, Ok(Resolution::Help), "args: {:?}", args);
    }
  }

  #[test]
  fn build_dir_stays_inside_source_dir() {
    for arch in [Arch::Arm64, Arch::X86_64] {
      let config = ProjectConfig {
        arch,
        ..Default::default()
      };
      let Resolution::Build(request) = resolve::<&str>(&[], &source_dir(), &env_with_cores(1), &config).unwrap() else {
        panic!("expected a plan");
      };

      assert!(request.plan.build_dir.starts_with(source_dir()));
      assert!(request.plan.expected_artifact_path.starts_with(&request.plan.build_dir));
    }
  }

  #[test]
  fn steps_follow_runner_order() {
    let plan = resolve_plan(&["--clean"]);

    assert!(matches!(plan.steps[0], Step::RemoveDir { ref path } if *path == plan.build_dir));
    assert!(matches!(plan.steps[1], Step::CreateDir { ref path } if *path == plan.build_dir));
    let phases: Vec<_> = plan.invocations().map(|i| i.phase).collect();
    assert_eq!(phases, [Phase::Configure, Phase::Compile]);

    let without_clean = resolve_plan(&[]);
    assert!(!without_clean.steps.iter().any(|s| matches!(s, Step::RemoveDir { .. })));
  }

  #[test]
  fn invocations_carry_plan_parameters() {
    let plan = resolve_plan(&["--debug", "--bundle", "--jobs", "7"]);
    let invocations: Vec<_> = plan.invocations().collect();

    let configure = &invocations[0].args;
    assert!(configure.contains(&"-DCMAKE_BUILD_TYPE=Debug".to_string()));
    assert!(configure.contains(&"-DCMAKE_OSX_ARCHITECTURES=arm64".to_string()));
    assert!(configure.contains(&"-DBUILD_BUNDLE=ON".to_string()));
    assert!(configure.windows(2).any(|w| w == ["-G", "Ninja"]));

    assert_eq!(
      invocations[1].command_line(),
      "cmake --build /work/Viewer/build_arm64 --config Debug --parallel 7"
    );
  }

  #[test]
  fn configure_honors_project_config() {
    let config = ProjectConfig {
      cmake: "/opt/cmake/bin/cmake".to_string(),
      generator: None,
      bundle_option: "MAKE_APP".to_string(),
      configure_args: vec!["-DWITH_TESTS=OFF".to_string()],
      ..Default::default()
    };
    let Resolution::Build(request) = resolve::<&str>(&[], &source_dir(), &env_with_cores(2), &config).unwrap() else {
      panic!("expected a plan");
    };
    let configure = request.plan.invocations().next().unwrap();

    assert_eq!(configure.program, "/opt/cmake/bin/cmake");
    assert!(!configure.args.contains(&"-G".to_string()));
    assert!(configure.args.contains(&"-DMAKE_APP=OFF".to_string()));
    assert_eq!(configure.args.last().map(String::as_str), Some("-DWITH_TESTS=OFF"));
  }

  #[test]
  fn prerequisites_come_from_environment() {
    let plan = resolve_plan(&[]);

    assert_eq!(plan.prerequisites, env_with_cores(4).prerequisites);
  }

  #[test]
  fn presentation_flags_are_collected() {
    let resolution = resolve(
      &["--dry-run", "-v", "--format", "JSON"],
      &source_dir(),
      &env_with_cores(4),
      &ProjectConfig::default(),
    )
    .unwrap();

    let Resolution::Build(request) = resolution else {
      panic!("expected a plan");
    };
    assert_eq!(
      request.output,
      OutputOptions {
        dry_run: true,
        verbose: true,
        format: OutputFormat::Json,
      }
    );
  }

  #[test]
  fn bad_format_is_rejected() {
    assert!(matches!(resolve_err(&["--format", "yaml"]), ParseError::InvalidValue { flag, .. } if flag == "--format"));
    assert!(matches!(resolve_err(&["--format"]), ParseError::MissingArgument { .. }));
    assert!(
      resolve(
        &["--format=json", "--dry-run"],
        &source_dir(),
        &env_with_cores(4),
        &ProjectConfig::default()
      )
      .is_ok()
    );
  }

  #[test]
  fn parse_args_needs_only_the_arguments() {
    assert_eq!(parse_args(&["--bogus", "--help"]), Ok(ParsedArgs::Help));
    assert!(matches!(parse_args(&["--bogus"]), Err(ParseError::UnknownOption { .. })));

    let Ok(ParsedArgs::Build(flags)) = parse_args(&["--debug", "--bundle", "-j", "3", "--dry-run"]) else {
      panic!("expected flags");
    };
    assert_eq!(flags.mode, BuildMode::Debug);
    assert!(flags.bundle);
    assert!(!flags.clean);
    assert_eq!(flags.jobs, Parallelism::Jobs(NonZeroUsize::new(3).unwrap()));
    assert!(flags.output.dry_run);
  }

  #[test]
  fn derive_plan_matches_one_shot_resolve() {
    let args = ["--clean", "--format", "json"];
    let Ok(ParsedArgs::Build(flags)) = parse_args(&args) else {
      panic!("expected flags");
    };

    let plan = derive_plan(&flags, &source_dir(), &env_with_cores(4), &ProjectConfig::default());

    assert_eq!(plan, resolve_plan(&args));
  }
}
