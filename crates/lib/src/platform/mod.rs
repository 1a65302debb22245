//! Build platform description.
//!
//! The [`Environment`] names the operating system and architecture a build
//! targets. It is detected once per invocation (or given explicitly), may be
//! remapped by the user, and is read-only afterwards.

pub mod arch;
pub mod mapping;
pub mod os;

use std::fmt;
use std::path::{Path, PathBuf};

use crate::consts::CLASSIFIER_PREFIX;
use mapping::PlatformMapping;

/// Operating system, architecture, optional cross-compilation host, and name remapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
  os: String,
  arch: String,
  host: Option<String>,
  mapping: PlatformMapping,
}

impl Environment {
  /// Detect the platform this binary runs on.
  pub fn detect() -> Self {
    Self::new(&os::current(), &arch::current())
  }

  /// Create an environment from raw OS and architecture names, normalizing both.
  pub fn new(os: &str, arch: &str) -> Self {
    Self {
      os: os::normalize_os(os),
      arch: arch::normalize_arch(arch),
      host: None,
      mapping: PlatformMapping::default(),
    }
  }

  /// Set an explicit `--host` triple, which marks the build as a cross compilation.
  pub fn with_host(mut self, host: impl Into<String>) -> Self {
    let host = host.into();
    self.host = if host.trim().is_empty() { None } else { Some(host) };
    self
  }

  /// Replace the active platform mapping with one built from the given entries.
  pub fn apply_platform_mapping<I, K, V>(&mut self, entries: I)
  where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
  {
    self.mapping = PlatformMapping::from_entries(entries);
  }

  /// The operating system name after remapping.
  pub fn operating_system(&self) -> String {
    self.mapping.resolve(&self.os, &self.arch).0
  }

  /// The architecture name after remapping.
  pub fn architecture(&self) -> String {
    self.mapping.resolve(&self.os, &self.arch).1
  }

  /// The detected operating system, ignoring any mapping.
  pub fn detected_os(&self) -> &str {
    &self.os
  }

  /// The detected architecture, ignoring any mapping.
  pub fn detected_arch(&self) -> &str {
    &self.arch
  }

  pub fn host(&self) -> Option<&str> {
    self.host.as_deref()
  }

  /// Artifact classifier for platform-specific archives (e.g. `native-linux-x86_64`).
  pub fn classifier(&self) -> String {
    let (os, arch) = self.mapping.resolve(&self.os, &self.arch);
    format!("{CLASSIFIER_PREFIX}-{os}-{arch}")
  }

  pub fn is_cross_compiling(&self) -> bool {
    self.host.is_some()
  }

  /// True if the detected operating system is Windows.
  pub fn is_windows(&self) -> bool {
    self.os == os::WINDOWS
  }

  /// Returns `base/<os>/<arch>`, segregating per-platform output under one path.
  pub fn make_os_arch_directory(&self, base: &Path) -> PathBuf {
    let (os, arch) = self.mapping.resolve(&self.os, &self.arch);
    base.join(os).join(arch)
  }
}

impl Default for Environment {
  fn default() -> Self {
    Self::detect()
  }
}

impl fmt::Display for Environment {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}/{}", self.operating_system(), self.architecture())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn new_normalizes_names() {
    let env = Environment::new("Windows 7", "amd64");
    assert_eq!(env.operating_system(), "windows");
    assert_eq!(env.architecture(), "x86_64");
    assert!(env.is_windows());
  }

  #[test]
  fn os_arch_directory_puts_os_first() {
    let env = Environment::new("Linux", "i386");
    assert_eq!(
      env.make_os_arch_directory(Path::new("/build/install")),
      PathBuf::from("/build/install/linux/x86")
    );
  }

  #[test]
  fn classifier_joins_os_and_arch() {
    let env = Environment::new("Mac OS X", "ppc");
    assert_eq!(env.classifier(), "native-macosx-ppc");
  }

  #[test]
  fn mapping_changes_reported_names_but_not_detection() {
    let mut env = Environment::new("linux", "x86_64");
    env.apply_platform_mapping([("linux.x86_64", "linux.amd64")]);
    assert_eq!(env.architecture(), "amd64");
    assert_eq!(env.detected_arch(), "x86_64");
    assert_eq!(env.to_string(), "linux/amd64");
    assert_eq!(
      env.make_os_arch_directory(Path::new("lib")),
      PathBuf::from("lib").join("linux").join("amd64")
    );
  }

  #[test]
  fn applying_a_mapping_replaces_the_previous_one() {
    let mut env = Environment::new("linux", "x86_64");
    env.apply_platform_mapping([("linux", "gnu")]);
    env.apply_platform_mapping([("x86_64", "x64")]);
    assert_eq!(env.operating_system(), "linux");
    assert_eq!(env.architecture(), "x64");
  }

  #[test]
  fn host_marks_cross_compilation() {
    let env = Environment::new("linux", "x86_64");
    assert!(!env.is_cross_compiling());
    let env = env.with_host("arm-linux-gnueabihf");
    assert!(env.is_cross_compiling());
    assert_eq!(env.host(), Some("arm-linux-gnueabihf"));
    assert!(!Environment::new("linux", "x86_64").with_host("  ").is_cross_compiling());
  }

  #[test]
  fn detect_never_panics() {
    let env = Environment::detect();
    assert!(!env.operating_system().is_empty());
    assert!(!env.architecture().is_empty());
  }
}
