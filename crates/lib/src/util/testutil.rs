//! Test utilities for armbuild-lib.
//!
//! Helpers for tests that need stand-in executables for the external tools a
//! build invokes.

use std::path::{Path, PathBuf};

/// Write an executable `/bin/sh` script named `name` into `dir`.
///
/// The script runs `body` with the caller's arguments available as `$@`.
#[cfg(unix)]
pub fn fake_tool(dir: &Path, name: &str, body: &str) -> PathBuf {
  use std::os::unix::fs::PermissionsExt;

  let path = dir.join(name);
  std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
  std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
  path
}

/// Script body for a fake `cmake` that records its arguments in `log` and,
/// on `--build`, creates `artifact`.
#[cfg(unix)]
pub fn fake_cmake_body(log: &Path, artifact: Option<&Path>) -> String {
  let mut body = format!("echo \"$@\" >> '{}'\n", log.display());
  if let Some(artifact) = artifact {
    body.push_str(&format!(
      "if [ \"$1\" = \"--build\" ]; then mkdir -p '{}' && touch '{}'; fi\n",
      artifact.parent().unwrap_or(artifact).display(),
      artifact.display()
    ));
  }
  body
}
