//! Fixups applied to the install tree after `make install`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::BuildError;
use crate::consts::INSTALLDIR_PLACEHOLDER;

/// Where `make install` puts things for one build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallDirs {
  /// Root substituted for the install placeholder.
  pub prefix: PathBuf,
  pub bin: PathBuf,
  pub lib: PathBuf,
  pub include: PathBuf,
}

/// Move DLLs that libtool installed next to executables into `lib`.
///
/// Returns the number of files moved.
pub(crate) fn relocate_dlls(dirs: &InstallDirs) -> Result<usize, BuildError> {
  let dlls = files_with_extension(&dirs.bin, "dll")?;
  if dlls.is_empty() {
    return Ok(0);
  }
  fs::create_dir_all(&dirs.lib).map_err(BuildError::io(&dirs.lib))?;
  for dll in &dlls {
    let Some(name) = dll.file_name() else {
      continue;
    };
    let destination = dirs.lib.join(name);
    debug!(from = %dll.display(), to = %destination.display(), "relocating dll");
    fs::rename(dll, &destination).map_err(BuildError::io(dll))?;
  }
  Ok(dlls.len())
}

/// Replace the install placeholder in libtool archives and pkg-config files.
///
/// Returns the number of files rewritten.
pub(crate) fn replace_install_placeholder(dirs: &InstallDirs) -> Result<usize, BuildError> {
  let install_path = dirs.prefix.display().to_string();
  let mut candidates = files_with_extension(&dirs.lib, "la")?;
  candidates.extend(files_with_extension(&dirs.lib.join("pkgconfig"), "pc")?);

  let mut rewritten = 0;
  for path in candidates {
    let text = match fs::read_to_string(&path) {
      Ok(text) => text,
      Err(e) if e.kind() == io::ErrorKind::InvalidData => {
        warn!(path = %path.display(), "skipping file that is not valid UTF-8");
        continue;
      }
      Err(e) => return Err(BuildError::io(&path)(e)),
    };
    if !text.contains(INSTALLDIR_PLACEHOLDER) {
      continue;
    }
    fs::write(&path, text.replace(INSTALLDIR_PLACEHOLDER, &install_path)).map_err(BuildError::io(&path))?;
    debug!(path = %path.display(), "replaced install placeholder");
    rewritten += 1;
  }
  Ok(rewritten)
}

/// Regular files in `dir` whose extension is `extension`, sorted.
fn files_with_extension(dir: &Path, extension: &str) -> Result<Vec<PathBuf>, BuildError> {
  if !dir.is_dir() {
    return Ok(Vec::new());
  }
  let mut found = Vec::new();
  for entry in fs::read_dir(dir).map_err(BuildError::io(dir))? {
    let path = entry.map_err(BuildError::io(dir))?.path();
    let matches = path
      .extension()
      .is_some_and(|ext| ext.eq_ignore_ascii_case(extension));
    if matches && path.is_file() {
      found.push(path);
    }
  }
  found.sort();
  Ok(found)
}

#[cfg(test)]
mod tests {
  use tempfile::TempDir;

  use super::*;

  fn dirs(root: &Path) -> InstallDirs {
    InstallDirs {
      prefix: root.to_path_buf(),
      bin: root.join("bin"),
      lib: root.join("lib"),
      include: root.join("include"),
    }
  }

  #[test]
  fn dlls_move_from_bin_to_lib() {
    let temp = TempDir::new().unwrap();
    let dirs = dirs(temp.path());
    fs::create_dir_all(&dirs.bin).unwrap();
    fs::write(dirs.bin.join("libfoo-1.dll"), "dll").unwrap();
    fs::write(dirs.bin.join("foo.exe"), "exe").unwrap();

    assert_eq!(relocate_dlls(&dirs).unwrap(), 1);

    assert!(dirs.lib.join("libfoo-1.dll").is_file());
    assert!(!dirs.bin.join("libfoo-1.dll").exists());
    assert!(dirs.bin.join("foo.exe").is_file());
  }

  #[test]
  fn no_bin_directory_is_fine() {
    let temp = TempDir::new().unwrap();
    assert_eq!(relocate_dlls(&dirs(temp.path())).unwrap(), 0);
  }

  #[test]
  fn placeholder_is_replaced_in_la_and_pc_files() {
    let temp = TempDir::new().unwrap();
    let dirs = dirs(temp.path());
    fs::create_dir_all(dirs.lib.join("pkgconfig")).unwrap();
    fs::write(dirs.lib.join("libfoo.la"), "libdir='@INSTALLDIR@/lib'\n").unwrap();
    fs::write(dirs.lib.join("pkgconfig/foo.pc"), "prefix=@INSTALLDIR@\n").unwrap();
    fs::write(dirs.lib.join("notes.txt"), "@INSTALLDIR@").unwrap();
    fs::write(dirs.lib.join("libbar.la"), "libdir='/usr/lib'\n").unwrap();

    assert_eq!(replace_install_placeholder(&dirs).unwrap(), 2);

    let root = temp.path().display().to_string();
    assert_eq!(
      fs::read_to_string(dirs.lib.join("libfoo.la")).unwrap(),
      format!("libdir='{root}/lib'\n")
    );
    assert_eq!(
      fs::read_to_string(dirs.lib.join("pkgconfig/foo.pc")).unwrap(),
      format!("prefix={root}\n")
    );
    assert_eq!(fs::read_to_string(dirs.lib.join("notes.txt")).unwrap(), "@INSTALLDIR@");
  }
}
