//! Path arithmetic and freshness checks.

use std::fs;
use std::io;
use std::path::{Component, MAIN_SEPARATOR, Path};
use std::time::SystemTime;

/// Relative path from directory `base` to `target`, with `/` separators.
///
/// Both paths are made absolute first but `..` segments are kept, since
/// resolving them lexically would be wrong in the presence of symlinks.
/// Paths are compared segment by segment, so trailing separators and
/// repeated slashes do not matter. When the two paths share nothing but the
/// root, the absolute target is returned instead (see [`fix_path_for_shell`]).
pub fn relative_path(base: &Path, target: &Path) -> io::Result<String> {
  let base = std::path::absolute(base)?;
  let target = std::path::absolute(target)?;
  let base: Vec<Component<'_>> = base.components().collect();
  let target_parts: Vec<Component<'_>> = target.components().collect();

  let common = base.iter().zip(&target_parts).take_while(|(b, t)| b == t).count();
  let shares_a_segment = base[..common].iter().any(|part| matches!(part, Component::Normal(_)));
  if !shares_a_segment {
    return Ok(fix_path_for_shell(&slashed(&target)));
  }

  let mut parts: Vec<String> = std::iter::repeat_n("..".to_string(), base.len() - common).collect();
  parts.extend(
    target_parts[common..]
      .iter()
      .map(|part| part.as_os_str().to_string_lossy().into_owned()),
  );
  if parts.is_empty() {
    return Ok(".".to_string());
  }
  Ok(parts.join("/"))
}

/// Rewrite a drive-letter path for a Cygwin shell on Windows hosts.
pub fn fix_path_for_shell(path: &str) -> String {
  if cfg!(windows) {
    cygwin_path(path)
  } else {
    path.to_string()
  }
}

/// Convert `X:\dir\file` into `/cygdrive/x/dir/file`.
///
/// Paths without a drive letter are returned unchanged.
pub fn cygwin_path(path: &str) -> String {
  let bytes = path.as_bytes();
  if bytes.len() > 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
    let drive = char::from(bytes[0].to_ascii_lowercase());
    return format!("/cygdrive/{drive}{}", path[2..].replace('\\', "/"));
  }
  path.to_string()
}

/// Whether `directory/name` exists, following one level of symlink.
///
/// A symlink target is interpreted relative to `directory`. Never fails;
/// anything that cannot be inspected counts as absent.
pub fn exists_through_symlink(directory: &Path, name: &str) -> bool {
  let path = directory.join(name);
  match fs::symlink_metadata(&path) {
    Ok(meta) if meta.file_type().is_symlink() => match fs::read_link(&path) {
      Ok(target) => directory.join(target).exists(),
      Err(_) => false,
    },
    Ok(_) => true,
    Err(_) => false,
  }
}

/// Whether `directory/name` is missing or older than any existing `others`
/// in the same directory.
pub fn is_stale(directory: &Path, name: &str, others: &[&str]) -> bool {
  let others: Vec<_> = others.iter().map(|other| directory.join(other)).collect();
  is_older_than_any(&directory.join(name), &others)
}

/// Whether `file` is missing or older than any of the `others` that exist.
pub fn is_older_than_any<P: AsRef<Path>>(file: &Path, others: &[P]) -> bool {
  let Some(modified) = modified_at(file) else {
    return true;
  };
  others
    .iter()
    .filter_map(|other| modified_at(other.as_ref()))
    .any(|other| modified < other)
}

/// Add execute permission for everyone who may read `path`.
#[cfg(unix)]
pub fn set_executable(path: &Path) -> io::Result<()> {
  use std::os::unix::fs::PermissionsExt;

  let mut perms = fs::metadata(path)?.permissions();
  let mode = perms.mode();
  if mode & 0o111 != 0o111 {
    perms.set_mode(mode | 0o111);
    fs::set_permissions(path, perms)?;
  }
  Ok(())
}

/// Execute permission is not tracked by the filesystem on this platform.
#[cfg(not(unix))]
pub fn set_executable(_path: &Path) -> io::Result<()> {
  Ok(())
}

fn modified_at(path: &Path) -> Option<SystemTime> {
  fs::metadata(path).and_then(|meta| meta.modified()).ok()
}

fn slashed(path: &Path) -> String {
  let text = path.to_string_lossy();
  if MAIN_SEPARATOR == '/' {
    text.into_owned()
  } else {
    text.replace(MAIN_SEPARATOR, "/")
  }
}
