/// Application name, used in messages and the usage banner.
pub const APP_NAME: &str = "armbuild";

/// Per-project configuration file, looked up in the source directory.
pub const CONFIG_FILENAME: &str = "armbuild.json";

/// Prefix of the build directory; the architecture label is appended.
pub const BUILD_DIR_PREFIX: &str = "build_";

/// Directory inside the build directory where the external build drops artifacts.
pub const ARTIFACT_DIR: &str = "bin";

/// Extension of an application bundle.
pub const BUNDLE_EXTENSION: &str = "app";

/// Fallback application name when the source directory has no usable file name.
pub const DEFAULT_APP_NAME: &str = "app";
