//! Usage text.
//!
//! Arguments are parsed by `armbuild_lib::plan::parse_args`; this command
//! definition only renders `--help`.

use clap::builder::EnumValueParser;
use clap::{Arg, ArgAction, Command};

use armbuild_lib::consts::{APP_NAME, CONFIG_FILENAME};
use armbuild_lib::plan::OutputFormat;

const AFTER_HELP: &str = "\
Run from the project source directory. The build directory is derived from the
target architecture (build_arm64 by default) and is always created inside the
source directory.";

pub fn command() -> Command {
  Command::new(APP_NAME)
    .about("Configure and build a CMake project for a single target architecture")
    .arg(
      Arg::new("release")
        .long("release")
        .action(ArgAction::SetTrue)
        .help("Build with optimizations (default)"),
    )
    .arg(
      Arg::new("debug")
        .long("debug")
        .action(ArgAction::SetTrue)
        .help("Build with debug symbols; the last of --release/--debug wins"),
    )
    .arg(
      Arg::new("clean")
        .long("clean")
        .action(ArgAction::SetTrue)
        .help("Remove the build directory before configuring"),
    )
    .arg(
      Arg::new("bundle")
        .long("bundle")
        .action(ArgAction::SetTrue)
        .help("Produce an application bundle instead of a bare executable"),
    )
    .arg(
      Arg::new("jobs")
        .short('j')
        .long("jobs")
        .value_name("N")
        .action(ArgAction::Set)
        .help("Number of parallel compile jobs, also written --jobs=N [default: detected cores]"),
    )
    .arg(
      Arg::new("dry-run")
        .long("dry-run")
        .action(ArgAction::SetTrue)
        .help("Print the build plan without running it"),
    )
    .arg(
      Arg::new("verbose")
        .short('v')
        .long("verbose")
        .action(ArgAction::SetTrue)
        .help("Enable debug logging"),
    )
    .arg(
      Arg::new("format")
        .long("format")
        .value_name("FORMAT")
        .value_parser(EnumValueParser::<OutputFormat>::new())
        .ignore_case(true)
        .action(ArgAction::Set)
        .help("Output format, also written --format=FORMAT; case-insensitive"),
    )
    .after_help(format!("{}\n\nProject settings are read from {} if present.", AFTER_HELP, CONFIG_FILENAME))
}

pub fn print_help() {
  println!("{}", command().render_long_help());
}
