//! Target platform description.

pub mod arch;

pub use arch::Arch;
