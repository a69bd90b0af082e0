use std::fmt;

use serde::{Deserialize, Serialize};

/// Target CPU architectures a build can be configured for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Arch {
  #[default]
  #[serde(rename = "arm64")]
  Arm64,
  #[serde(rename = "x86_64")]
  X86_64,
}

impl Arch {
  /// Label used for the build directory suffix and `CMAKE_OSX_ARCHITECTURES`.
  ///
  /// Always a single plain path component.
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Arm64 => "arm64",
      Self::X86_64 => "x86_64",
    }
  }
}

impl fmt::Display for Arch {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}
