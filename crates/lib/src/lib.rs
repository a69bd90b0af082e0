//! armbuild-lib: build plan resolution and execution for armbuild.
//!
//! This crate provides the pieces behind the `armbuild` command:
//! - `plan`: turns command-line flags into an immutable `BuildPlan`
//! - `probe`: capability checks for the external programs a build needs
//! - `config`: the per-project `armbuild.json` file
//! - `runner`: performs the steps of a plan against the external build system

pub mod config;
pub mod consts;
pub mod plan;
pub mod platform;
pub mod probe;
pub mod runner;
pub mod util;
