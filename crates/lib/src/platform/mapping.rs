//! User-supplied remapping of platform names.
//!
//! A mapping is given as flat string pairs. A key of the form `<os>.<arch>`
//! names one exact platform and its value must be another `<os>.<arch>` pair;
//! any other key names a single OS or architecture token.

use std::collections::HashMap;

use tracing::warn;

/// Separator between the OS and architecture parts of a combined key or value.
pub const SEPARATOR: char = '.';

/// Typed lookup table for platform name remapping.
///
/// Lookups fall back in two levels: the exact `(os, arch)` pair first, then
/// each axis on its own, then the detected value unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlatformMapping {
  combined: HashMap<(String, String), (String, String)>,
  single: HashMap<String, String>,
}

impl PlatformMapping {
  /// Build a mapping from raw `key = value` pairs.
  ///
  /// Combined entries whose value has no separator cannot name both parts and
  /// are ignored, so the single-axis lookup applies to that platform.
  pub fn from_entries<I, K, V>(entries: I) -> Self
  where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
  {
    let mut mapping = Self::default();
    for (key, value) in entries {
      let key = key.as_ref().trim().to_lowercase();
      let value = value.as_ref().trim();
      match key.split_once(SEPARATOR) {
        Some((os, arch)) => match value.split_once(SEPARATOR) {
          Some((to_os, to_arch)) => {
            mapping.combined.insert(
              (os.to_string(), arch.to_string()),
              (to_os.to_string(), to_arch.to_string()),
            );
          }
          None => warn!(key = %key, value = %value, "ignoring platform mapping without '{}' in value", SEPARATOR),
        },
        None => {
          mapping.single.insert(key, value.to_string());
        }
      }
    }
    mapping
  }

  /// Resolve the effective `(os, arch)` for a detected platform.
  pub fn resolve(&self, os: &str, arch: &str) -> (String, String) {
    if let Some((to_os, to_arch)) = self.combined.get(&(os.to_string(), arch.to_string())) {
      return (to_os.clone(), to_arch.clone());
    }
    let os = self.single.get(os).cloned().unwrap_or_else(|| os.to_string());
    let arch = self.single.get(arch).cloned().unwrap_or_else(|| arch.to_string());
    (os, arch)
  }
}
