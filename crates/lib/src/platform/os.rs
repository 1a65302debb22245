//! Operating system name normalization.

/// Normalized name of Microsoft Windows, whatever version the host reports.
pub const WINDOWS: &str = "windows";

/// Normalized name of Apple macOS.
pub const MACOSX: &str = "macosx";

/// Normalize a host-reported operating system name into a lower-case token.
///
/// Any name starting with "windows" collapses to `windows`, and spaces and
/// slashes are stripped, so "Mac OS X" becomes `macosx` and "OS/2" becomes
/// `os2`. The short names reported by the Rust toolchain (`macos`, `darwin`)
/// map onto the same token as their long forms.
pub fn normalize_os(name: &str) -> String {
  let lower = name.trim().to_lowercase();
  if lower.starts_with(WINDOWS) {
    return WINDOWS.to_string();
  }
  let stripped: String = lower.chars().filter(|c| *c != ' ' && *c != '/').collect();
  match stripped.as_str() {
    "macos" | "darwin" => MACOSX.to_string(),
    _ => stripped,
  }
}

/// Returns the normalized name of the operating system this binary runs on.
pub fn current() -> String {
  normalize_os(std::env::consts::OS)
}
