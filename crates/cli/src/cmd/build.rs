//! Implementation of the `armbuild` build command.
//!
//! Parses the command line, derives a build plan from it, prints the plan,
//! and hands it to the runner. Parse errors and `--help` return before the
//! project configuration is read or anything on disk is touched.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use armbuild_lib::config::ProjectConfig;
use armbuild_lib::consts::APP_NAME;
use armbuild_lib::plan::{BuildPlan, BuildRequest, ParsedArgs, Step, derive_plan, parse_args};
use armbuild_lib::probe::{Environment, ProbeStatus};
use armbuild_lib::runner::{RunOptions, RunReport, run};

use crate::output::{
  format_duration, print_error, print_info, print_json, print_stat, print_step, print_success, print_warning, yes_no,
};
use crate::usage;

/// Execute the build command.
///
/// Returns the process exit code for outcomes that were already reported to
/// the user (help, parse errors). Other failures are returned as errors.
pub fn cmd_build(args: &[String]) -> Result<ExitCode> {
  let flags = match parse_args(args) {
    Ok(ParsedArgs::Help) => {
      usage::print_help();
      return Ok(ExitCode::SUCCESS);
    }
    Ok(ParsedArgs::Build(flags)) => flags,
    Err(e) => {
      print_error(&e.to_string());
      eprintln!("Run '{} --help' for usage.", APP_NAME);
      return Ok(ExitCode::FAILURE);
    }
  };

  let source_dir = source_dir()?;
  let config = ProjectConfig::load(&source_dir).context("Failed to load project configuration")?;
  let environment = Environment::detect(&config);
  let request = BuildRequest {
    plan: derive_plan(&flags, &source_dir, &environment, &config),
    output: flags.output,
  };

  init_tracing(request.output.verbose);
  debug!(source = %source_dir.display(), "resolved build plan");

  let plan = &request.plan;
  let json = request.output.format.is_json();
  let options = RunOptions {
    dry_run: request.output.dry_run,
    quiet: json,
  };

  if !json {
    print_plan(plan, options.dry_run);
  }

  let rt = tokio::runtime::Builder::new_current_thread()
    .enable_all()
    .build()
    .context("Failed to create async runtime")?;
  let report = rt.block_on(run(plan, &options)).context("Build failed")?;

  if json {
    print_json(&serde_json::json!({ "plan": plan, "report": report }))?;
  } else {
    print_report(&report);
  }

  Ok(ExitCode::SUCCESS)
}

fn source_dir() -> Result<PathBuf> {
  let cwd = std::env::current_dir().context("Failed to determine current directory")?;
  Ok(dunce::canonicalize(&cwd).unwrap_or(cwd))
}

fn init_tracing(verbose: bool) {
  let filter = if verbose {
    EnvFilter::new("debug")
  } else {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
  };

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();
}

fn print_plan(plan: &BuildPlan, dry_run: bool) {
  print_info(&format!("Building {} for {}", plan.mode, plan.arch));
  print_stat("Source", &plan.source_dir.display().to_string());
  print_stat("Build dir", &plan.build_dir.display().to_string());
  print_stat("Jobs", &plan.parallelism.to_string());
  print_stat("Clean", yes_no(plan.clean_before_build));
  print_stat("Bundle", yes_no(plan.create_bundle));

  println!();
  println!("Prerequisites:");
  for prerequisite in &plan.prerequisites {
    match &prerequisite.status {
      ProbeStatus::Found(path) => print_stat(prerequisite.capability.name(), &path.display().to_string()),
      ProbeStatus::Missing(_) => print_stat(prerequisite.capability.name(), "missing"),
    }
  }

  if dry_run {
    println!();
    println!("Steps:");
    for step in &plan.steps {
      match step {
        Step::RemoveDir { path } => print_step(&format!("remove {}", path.display())),
        Step::CreateDir { path } => print_step(&format!("create {}", path.display())),
        Step::Exec(invocation) => print_step(&invocation.command_line()),
      }
    }
  }
  println!();
}

fn print_report(report: &RunReport) {
  if report.dry_run {
    print_info("Dry run: no changes made");
    print_stat("Artifact", &report.artifact.display().to_string());
    return;
  }

  print_success(&format!("Build complete in {}", format_duration(report.elapsed)));
  if let Some(version) = &report.toolchain_version {
    print_stat("Toolchain", version);
  }
  if report.artifact_found {
    print_stat("Artifact", &report.artifact.display().to_string());
  } else {
    print_warning(&format!("Expected artifact not found: {}", report.artifact.display()));
  }
}
