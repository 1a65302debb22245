//! Deciding which autotools programs to run before `configure`.

use std::fs;
use std::io::Write;
use std::path::Path;

use tempfile::TempPath;

use super::BuildError;
use crate::consts::TOOL_OVERRIDE_PREFIX;
use crate::fs::{exists_through_symlink, set_executable};
use crate::process::shell;

const AUTOSCAN_POST: &str = include_str!("../../resources/autoscan-post.sh");
const AUTOSCAN_POST_PREFIX: &str = ".autoscan-post-";
const DEFAULT_PROGRAM: &str = "a.out";

/// Files automake refuses to run without.
pub(crate) const PLACEHOLDER_FILES: &[&str] = &["NEWS", "README", "AUTHORS", "ChangeLog", "COPYING"];

/// The program to run for autotools tool `name`.
///
/// `AUTOTOOLS_<NAME>` in the environment replaces the default, which is
/// needed for instance where libtoolize is installed as `glibtoolize`.
pub fn tool(name: &str) -> String {
  let var = format!("{TOOL_OVERRIDE_PREFIX}{}", name.to_ascii_uppercase());
  match std::env::var(&var) {
    Ok(value) if !value.trim().is_empty() => value,
    _ => name.to_string(),
  }
}

/// What the autogen step has to do for a staged configure directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AutogenPlan {
  /// No autoconf input at all: generate one with autoscan.
  pub autoscan: bool,
  /// Create empty [`PLACEHOLDER_FILES`].
  pub placeholders: bool,
  /// Shell commands to run after autoscan, in order.
  pub commands: Vec<String>,
}

impl AutogenPlan {
  pub fn for_directory(configure_dir: &Path, autoreconf: bool, verbose: bool) -> Self {
    let exists = |name: &str| exists_through_symlink(configure_dir, name);

    let autoscan = !exists("configure.ac") && !exists("configure.in") && !exists("Makefile.in");
    let placeholders = !exists("configure.in") && !exists("Makefile.in");

    let mut commands = Vec::new();
    if placeholders && !autoreconf {
      commands.push(tool("aclocal"));
      commands.push(tool("autoheader"));
      commands.push(format!("{} -c -f{}", tool("libtoolize"), if verbose { "" } else { " --quiet" }));
      commands.push(format!("{} -c -f -a{}", tool("automake"), if verbose { "" } else { " -W none" }));
    }
    if !exists("configure") {
      if autoreconf {
        commands.push(format!("{} --install{}", tool("autoreconf"), if verbose { " --verbose" } else { "" }));
      } else {
        commands.push(tool("autoconf"));
      }
    }

    Self {
      autoscan,
      placeholders,
      commands,
    }
  }

  pub fn is_empty(&self) -> bool {
    !self.autoscan && self.commands.is_empty()
  }
}

/// Create any missing placeholder file in `configure_dir`.
pub(crate) fn create_placeholders(configure_dir: &Path) -> Result<(), BuildError> {
  for name in PLACEHOLDER_FILES {
    let path = configure_dir.join(name);
    if !path.exists() {
      fs::File::create(&path).map_err(BuildError::io(&path))?;
    }
  }
  Ok(())
}

/// Write the autoscan post-processing script into `configure_dir`.
///
/// The script is removed when the returned path is dropped.
pub(crate) fn write_autoscan_post(configure_dir: &Path, native_dir: &Path) -> Result<TempPath, BuildError> {
  let (sources, program) = autoscan_variables(native_dir)?;
  let script = AUTOSCAN_POST
    .replace("${autoscan.program}", &shell::quote(&program))
    .replace("${autoscan.sources}", &shell::quote(&sources));

  let mut file = tempfile::Builder::new()
    .prefix(AUTOSCAN_POST_PREFIX)
    .tempfile_in(configure_dir)
    .map_err(BuildError::io(configure_dir))?;
  file.write_all(script.as_bytes()).map_err(BuildError::io(file.path()))?;
  let path = file.into_temp_path();
  set_executable(&path).map_err(BuildError::io(&path))?;
  Ok(path)
}

/// Space-joined source names and the program name derived from them.
fn autoscan_variables(native_dir: &Path) -> Result<(String, String), BuildError> {
  let mut names = Vec::new();
  if native_dir.is_dir() {
    for entry in fs::read_dir(native_dir).map_err(BuildError::io(native_dir))? {
      let entry = entry.map_err(BuildError::io(native_dir))?;
      let name = entry.file_name().to_string_lossy().into_owned();
      if !name.starts_with('.') && entry.path().is_file() {
        names.push(name);
      }
    }
  }
  names.sort();

  let program = names
    .iter()
    .find_map(|name| name.rsplit_once('.').map(|(stem, _)| stem.to_string()))
    .filter(|stem| !stem.is_empty())
    .unwrap_or_else(|| DEFAULT_PROGRAM.to_string());
  Ok((names.join(" "), program))
}

#[cfg(test)]
mod tests {
  use serial_test::serial;
  use tempfile::TempDir;

  use super::*;

  fn dir_with(files: &[&str]) -> TempDir {
    let temp = TempDir::new().unwrap();
    for name in files {
      fs::write(temp.path().join(name), "").unwrap();
    }
    temp
  }

  #[test]
  #[serial]
  fn empty_directory_needs_everything() {
    let temp = dir_with(&[]);
    let plan = AutogenPlan::for_directory(temp.path(), false, false);
    assert!(plan.autoscan);
    assert!(plan.placeholders);
    assert_eq!(
      plan.commands,
      vec!["aclocal", "autoheader", "libtoolize -c -f --quiet", "automake -c -f -a -W none", "autoconf"]
    );
  }

  #[test]
  #[serial]
  fn makefile_in_skips_automake_chain() {
    let temp = dir_with(&["configure.ac", "Makefile.in"]);
    let plan = AutogenPlan::for_directory(temp.path(), false, false);
    assert!(!plan.autoscan);
    assert!(!plan.placeholders);
    assert_eq!(plan.commands, vec!["autoconf"]);
  }

  #[test]
  #[serial]
  fn existing_configure_needs_nothing() {
    let temp = dir_with(&["configure", "Makefile.in"]);
    let plan = AutogenPlan::for_directory(temp.path(), true, false);
    assert!(plan.is_empty());
  }

  #[test]
  #[serial]
  fn autoreconf_replaces_the_chain() {
    let temp = dir_with(&["configure.ac", "Makefile.am"]);
    assert_eq!(
      AutogenPlan::for_directory(temp.path(), true, false).commands,
      vec!["autoreconf --install"]
    );
    assert_eq!(
      AutogenPlan::for_directory(temp.path(), true, true).commands,
      vec!["autoreconf --install --verbose"]
    );
  }

  #[test]
  #[serial]
  fn verbose_drops_quiet_flags() {
    let temp = dir_with(&["configure.ac"]);
    let plan = AutogenPlan::for_directory(temp.path(), false, true);
    assert_eq!(plan.commands[2], "libtoolize -c -f");
    assert_eq!(plan.commands[3], "automake -c -f -a");
  }

  #[test]
  #[serial]
  fn tool_override_from_environment() {
    temp_env::with_var("AUTOTOOLS_LIBTOOLIZE", Some("glibtoolize"), || {
      assert_eq!(tool("libtoolize"), "glibtoolize");
      assert_eq!(tool("aclocal"), "aclocal");
      let temp = dir_with(&["configure.ac"]);
      let plan = AutogenPlan::for_directory(temp.path(), false, false);
      assert_eq!(plan.commands[2], "glibtoolize -c -f --quiet");
    });
  }

  #[test]
  #[serial]
  fn blank_override_is_ignored() {
    temp_env::with_var("AUTOTOOLS_AUTOCONF", Some("  "), || {
      assert_eq!(tool("autoconf"), "autoconf");
    });
  }

  #[test]
  fn placeholders_are_created_once() {
    let temp = dir_with(&[]);
    fs::write(temp.path().join("README"), "keep me").unwrap();
    create_placeholders(temp.path()).unwrap();
    for name in PLACEHOLDER_FILES {
      assert!(temp.path().join(name).is_file());
    }
    assert_eq!(fs::read_to_string(temp.path().join("README")).unwrap(), "keep me");
  }

  #[test]
  fn autoscan_variables_from_native_sources() {
    let temp = dir_with(&["main.c", "util.c", ".hidden"]);
    let (sources, program) = autoscan_variables(temp.path()).unwrap();
    assert_eq!(sources, "main.c util.c");
    assert_eq!(program, "main");
  }

  #[test]
  fn autoscan_program_defaults_without_extensions() {
    let temp = dir_with(&["Makefile"]);
    let (_, program) = autoscan_variables(temp.path()).unwrap();
    assert_eq!(program, "a.out");
  }

  #[test]
  fn autoscan_post_script_is_hidden_and_temporary() {
    let native = dir_with(&["hello world.c"]);
    let configure = TempDir::new().unwrap();

    let script = write_autoscan_post(configure.path(), native.path()).unwrap();
    let name = script.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with(".autoscan-post-"));
    let content = fs::read_to_string(&script).unwrap();
    assert!(content.contains("program='hello world'"));
    assert!(content.contains("sources='hello world.c'"));
    assert!(!content.contains("${autoscan."));

    let path = script.to_path_buf();
    drop(script);
    assert!(!path.exists());
  }
}
