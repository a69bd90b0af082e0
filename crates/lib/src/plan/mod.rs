//! Build plan resolution.
//!
//! Turns the command line, the detected environment and the project
//! configuration into an immutable [`BuildPlan`].

mod resolve;
mod types;

pub use resolve::{derive_plan, parse_args, resolve};
pub use types::*;
