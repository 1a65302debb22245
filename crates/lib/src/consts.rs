/// Name of the project configuration file looked up in the project directory.
pub const CONFIG_FILE: &str = "autotools.toml";

/// Subdirectory of the build directory that holds all autotools output.
pub const AUTOTOOLS_DIR: &str = "autotools";

/// Token replaced by the real install path in libtool archives and pkg-config files.
pub const INSTALLDIR_PLACEHOLDER: &str = "@INSTALLDIR@";

/// Prefix of environment variables that override autotools program names.
pub const TOOL_OVERRIDE_PREFIX: &str = "AUTOTOOLS_";

/// Prefix of artifact classifiers for platform-specific archives.
pub const CLASSIFIER_PREFIX: &str = "native";
