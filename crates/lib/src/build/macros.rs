//! Assembling `acinclude.m4` from macro archives.

use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::debug;
use zip::ZipArchive;
use zip::result::ZipError;

use super::BuildError;
use crate::fs::exists_through_symlink;

const MACRO_NAME: &str = r"^[A-Z_][A-Z0-9_]*";

/// Append the definition of every macro used in `configure.ac` to
/// `acinclude.m4`.
///
/// Definitions are looked up as `<NAME>.m4` at the root of each archive, then
/// in `fallback_dir`. Nothing happens when `acinclude.m4` already exists or
/// there is no `configure.ac`. Returns the number of macros appended.
pub(crate) fn write_acinclude(
  configure_dir: &Path,
  archives: &[PathBuf],
  fallback_dir: &Path,
) -> Result<usize, BuildError> {
  if exists_through_symlink(configure_dir, "acinclude.m4") || !exists_through_symlink(configure_dir, "configure.ac") {
    return Ok(0);
  }
  let configure_ac = configure_dir.join("configure.ac");
  let text = fs::read_to_string(&configure_ac).map_err(BuildError::io(&configure_ac))?;

  let mut sources = MacroSources::open(archives, fallback_dir)?;
  let pattern = Regex::new(MACRO_NAME)?;
  let target = configure_dir.join("acinclude.m4");
  let mut seen = HashSet::new();
  let mut appended = 0;
  for line in text.lines() {
    let Some(found) = pattern.find(line) else {
      continue;
    };
    let name = found.as_str();
    if !seen.insert(name.to_string()) {
      continue;
    }
    if let Some((origin, definition)) = sources.lookup(name)? {
      debug!(name, origin = %origin.display(), "appending macro to acinclude.m4");
      let mut out = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&target)
        .map_err(BuildError::io(&target))?;
      out.write_all(&definition).map_err(BuildError::io(&target))?;
      appended += 1;
    }
  }
  Ok(appended)
}

struct MacroSources {
  archives: Vec<(PathBuf, ZipArchive<File>)>,
  fallback_dir: PathBuf,
}

impl MacroSources {
  fn open(paths: &[PathBuf], fallback_dir: &Path) -> Result<Self, BuildError> {
    let mut archives = Vec::new();
    for path in paths.iter().filter(|path| path.is_file()) {
      let file = File::open(path).map_err(BuildError::io(path))?;
      let archive = ZipArchive::new(file).map_err(|source| BuildError::Macro {
        archive: path.clone(),
        source,
      })?;
      archives.push((path.clone(), archive));
    }
    Ok(Self {
      archives,
      fallback_dir: fallback_dir.to_path_buf(),
    })
  }

  fn lookup(&mut self, name: &str) -> Result<Option<(PathBuf, Vec<u8>)>, BuildError> {
    let entry_name = format!("{name}.m4");
    for (path, archive) in &mut self.archives {
      let mut entry = match archive.by_name(&entry_name) {
        Ok(entry) => entry,
        Err(ZipError::FileNotFound) => continue,
        Err(source) => {
          return Err(BuildError::Macro {
            archive: path.clone(),
            source,
          });
        }
      };
      let mut definition = Vec::new();
      entry.read_to_end(&mut definition).map_err(BuildError::io(path))?;
      return Ok(Some((path.clone(), definition)));
    }

    let local = self.fallback_dir.join(&entry_name);
    if local.is_file() {
      let definition = fs::read(&local).map_err(BuildError::io(&local))?;
      return Ok(Some((local, definition)));
    }
    Ok(None)
  }
}
