//! Per-project configuration.
//!
//! The configuration file (`armbuild.json`) lives in the source directory and
//! describes the parts of a build that do not change between invocations: the
//! application name, the target architecture, which programs must be present
//! and how the external build system is called. Every field is optional.
//!
//! # Format
//!
//! ```json
//! {
//!   "app_name": "Viewer",
//!   "arch": "arm64",
//!   "generator": "Ninja",
//!   "configure_args": ["-DWITH_TESTS=OFF"],
//!   "package_manager": "brew",
//!   "tools": ["cmake", "ninja", "pkg-config", "git"],
//!   "toolchain": "clang"
//! }
//! ```

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::{CONFIG_FILENAME, DEFAULT_APP_NAME};
use crate::platform::Arch;
use crate::probe::Capability;

/// Errors that can occur while loading the project configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
  /// The file exists but could not be read.
  #[error("failed to read {}: {source}", .path.display())]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  /// The file is not valid JSON or has unknown fields.
  #[error("failed to parse {}: {source}", .path.display())]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  /// The application name would escape the artifact directory.
  #[error("invalid app_name {0:?}: must be a single path component")]
  InvalidAppName(String),

  /// A required program name is empty.
  #[error("invalid {field}: program name must not be empty")]
  EmptyProgram { field: &'static str },
}

/// Project configuration, loaded from `armbuild.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectConfig {
  /// Name of the produced executable or bundle. Defaults to the source directory name.
  pub app_name: Option<String>,

  /// Architecture the build targets.
  pub arch: Arch,

  /// Program used for both the configure and the compile phase.
  pub cmake: String,

  /// CMake generator passed with `-G`. `null` lets CMake pick.
  pub generator: Option<String>,

  /// Cache variable toggled ON/OFF by `--bundle`.
  pub bundle_option: String,

  /// Extra arguments appended to the configure invocation.
  pub configure_args: Vec<String>,

  /// Package manager whose presence is required. `null` skips the check.
  pub package_manager: Option<String>,

  /// Command-line tools that must be on `PATH`.
  pub tools: Vec<String>,

  /// Native compiler whose presence is required.
  pub toolchain: String,
}

impl Default for ProjectConfig {
  fn default() -> Self {
    Self {
      app_name: None,
      arch: Arch::default(),
      cmake: "cmake".to_string(),
      generator: Some("Ninja".to_string()),
      bundle_option: "BUILD_BUNDLE".to_string(),
      configure_args: Vec::new(),
      package_manager: Some("brew".to_string()),
      tools: ["cmake", "ninja", "pkg-config", "git"].map(String::from).to_vec(),
      toolchain: "clang".to_string(),
    }
  }
}

impl ProjectConfig {
  /// Load the configuration for the project rooted at `source_dir`.
  ///
  /// Returns the defaults if the file doesn't exist.
  pub fn load(source_dir: &Path) -> Result<Self, ConfigError> {
    let path = source_dir.join(CONFIG_FILENAME);
    let content = match fs::read_to_string(&path) {
      Ok(content) => content,
      Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
      Err(source) => return Err(ConfigError::Read { path, source }),
    };

    let config: ProjectConfig = serde_json::from_str(&content).map_err(|source| ConfigError::Parse { path, source })?;
    config.validate()?;
    Ok(config)
  }

  /// Check the values serde cannot express as types.
  pub fn validate(&self) -> Result<(), ConfigError> {
    if let Some(name) = &self.app_name
      && !is_single_component(name)
    {
      return Err(ConfigError::InvalidAppName(name.clone()));
    }

    if self.cmake.is_empty() {
      return Err(ConfigError::EmptyProgram { field: "cmake" });
    }
    if self.toolchain.is_empty() {
      return Err(ConfigError::EmptyProgram { field: "toolchain" });
    }
    if self.package_manager.as_deref() == Some("") {
      return Err(ConfigError::EmptyProgram {
        field: "package_manager",
      });
    }
    if self.tools.iter().any(String::is_empty) {
      return Err(ConfigError::EmptyProgram { field: "tools" });
    }

    Ok(())
  }

  /// Application name, falling back to the source directory's file name.
  pub fn app_name(&self, source_dir: &Path) -> String {
    if let Some(name) = &self.app_name {
      return name.clone();
    }

    source_dir
      .file_name()
      .and_then(|n| n.to_str())
      .filter(|n| is_single_component(n))
      .unwrap_or(DEFAULT_APP_NAME)
      .to_string()
  }

  /// Every external program the build needs, in the order they are checked.
  pub fn capabilities(&self) -> Vec<Capability> {
    let mut capabilities = Vec::with_capacity(self.tools.len() + 2);

    if let Some(pm) = &self.package_manager {
      capabilities.push(Capability::PackageManager(pm.clone()));
    }
    capabilities.extend(self.tools.iter().cloned().map(Capability::Tool));
    capabilities.push(Capability::Toolchain(self.toolchain.clone()));

    capabilities
  }
}

fn is_single_component(name: &str) -> bool {
  let mut components = Path::new(name).components();
  matches!(
    (components.next(), components.next()),
    (Some(Component::Normal(_)), None)
  )
}
