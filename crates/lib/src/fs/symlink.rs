//! Relocatable symlinks, created and resolved through the shell.
//!
//! Links are always created with a relative target so that a staged build
//! tree keeps working when the project directory moves. Creation and
//! resolution go through `ln` and `readlink` so the same code works with a
//! Cygwin shell on Windows.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, trace};
use walkdir::WalkDir;

use super::paths::relative_path;
use crate::output::log_sinks;
use crate::process::{
  CaptureBuffer, DefaultProcessExecutor, Invocation, ProcessError, ProcessExecutor, inherited_env, shell,
};

/// Errors raised while creating, resolving or deleting symlinks.
#[derive(Debug, Error)]
pub enum SymlinkError {
  #[error("directory {} does not exist", .path.display())]
  MissingDirectory { path: PathBuf },

  #[error("path {} is not a directory", .path.display())]
  NotADirectory { path: PathBuf },

  #[error("{what} {} contains single quotes", .path.display())]
  SingleQuote { what: &'static str, path: PathBuf },

  #[error("path {} is a directory", .path.display())]
  TargetIsDirectory { path: PathBuf },

  #[error("symbolic link not found: {}", .path.display())]
  NotFound { path: PathBuf },

  #[error(transparent)]
  Process(#[from] ProcessError),

  #[error("failed to walk {}: {source}", .path.display())]
  Walk {
    path: PathBuf,
    #[source]
    source: walkdir::Error,
  },

  #[error("io error at {}: {source}", .path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

impl SymlinkError {
  fn io(path: &Path) -> impl FnOnce(io::Error) -> Self + '_ {
    move |source| SymlinkError::Io {
      path: path.to_path_buf(),
      source,
    }
  }
}

/// Create `link` pointing at `target` with a relative path.
///
/// All preconditions are checked before anything touches the filesystem.
/// With `forced`, an existing file at `link` is replaced.
pub async fn create_symlink(link: &Path, target: &Path, forced: bool) -> Result<(), SymlinkError> {
  let directory = link_directory(link)?;
  if !directory.exists() {
    return Err(SymlinkError::MissingDirectory { path: directory });
  }
  if !directory.is_dir() {
    return Err(SymlinkError::NotADirectory { path: directory });
  }
  let absolute_target = std::path::absolute(target).map_err(SymlinkError::io(target))?;
  if absolute_target.to_string_lossy().contains('\'') {
    return Err(SymlinkError::SingleQuote {
      what: "Path name",
      path: target.to_path_buf(),
    });
  }
  if link.to_string_lossy().contains('\'') {
    return Err(SymlinkError::SingleQuote {
      what: "Link name",
      path: link.to_path_buf(),
    });
  }
  if target.is_dir() {
    return Err(SymlinkError::TargetIsDirectory {
      path: target.to_path_buf(),
    });
  }

  let relative = relative_path(&directory, &absolute_target).map_err(SymlinkError::io(target))?;
  let name = link_name(link)?;
  let flags = if forced { "-s -f" } else { "-s" };
  let script = format!("ln {flags} {} {}", shell::quote(&relative), shell::quote(&name));
  trace!(link = %link.display(), target = %relative, "creating symlink");

  let (stdout, stderr) = log_sinks();
  let mut executor = DefaultProcessExecutor::with_sinks(stdout, stderr);
  executor.execute(&Invocation::shell(script, &directory)).await?;
  Ok(())
}

/// Resolve `link` through `readlink` and canonicalize the result.
pub async fn resolve_symlink(link: &Path) -> Result<PathBuf, SymlinkError> {
  let directory = link_directory(link)?;
  if !directory.is_dir() {
    return Err(SymlinkError::NotFound {
      path: link.to_path_buf(),
    });
  }
  if link.to_string_lossy().contains('\'') {
    return Err(SymlinkError::SingleQuote {
      what: "Link name",
      path: link.to_path_buf(),
    });
  }

  let name = link_name(link)?;
  let mut env = inherited_env();
  env.insert("LC_CTYPE".to_string(), format!("C.{}", readlink_encoding()));
  let captured = CaptureBuffer::default();
  let (_, stderr) = log_sinks();
  let mut executor = DefaultProcessExecutor::with_sinks(Box::new(captured.clone()), stderr);
  let invocation = Invocation::shell(format!("readlink {}", shell::quote(&name)), &directory).with_env(env);
  match executor.execute(&invocation).await {
    Ok(()) => {}
    Err(ProcessError::Failed { .. }) => {
      return Err(SymlinkError::NotFound {
        path: link.to_path_buf(),
      });
    }
    Err(e) => return Err(e.into()),
  }

  let output = decode_readlink_output(&captured.contents());
  let resolved = output.trim();
  let path = if resolved.starts_with('/') || Path::new(resolved).is_absolute() {
    PathBuf::from(resolved)
  } else {
    directory.join(resolved)
  };
  dunce::canonicalize(&path).map_err(SymlinkError::io(&path))
}

/// Delete every symlink at or below `root`, leaving real files alone.
///
/// Directories are only entered when their canonical parent is the directory
/// being walked, so a link pointing outward or back up the tree is never
/// followed. A link is only deleted when its parent directory is itself not
/// reached through a link.
pub fn delete_symlinks(root: &Path) -> Result<(), SymlinkError> {
  let is_real_dir = fs::symlink_metadata(root).is_ok_and(|meta| meta.is_dir());
  let root = if is_real_dir {
    dunce::canonicalize(root).map_err(SymlinkError::io(root))?
  } else {
    std::path::absolute(root).map_err(SymlinkError::io(root))?
  };
  delete_below(&root)
}

fn delete_below(path: &Path) -> Result<(), SymlinkError> {
  let canonical = dunce::canonicalize(path).ok();
  if path.is_dir() {
    let Some(canonical) = canonical else {
      return Ok(());
    };
    let entries = fs::read_dir(path).map_err(SymlinkError::io(path))?;
    for entry in entries {
      let child = entry.map_err(SymlinkError::io(path))?.path();
      let descend = match dunce::canonicalize(&child) {
        Ok(child_canonical) => child_canonical.parent() == Some(canonical.as_path()) || !child_canonical.is_dir(),
        // Dangling link.
        Err(_) => true,
      };
      if descend {
        delete_below(&child)?;
      }
    }
  } else if canonical.as_deref() != Some(path) {
    let Some(parent) = path.parent() else {
      return Ok(());
    };
    let parent_is_direct = dunce::canonicalize(parent).is_ok_and(|p| p == parent);
    if parent_is_direct && fs::symlink_metadata(path).is_ok_and(|meta| meta.file_type().is_symlink()) {
      debug!(path = %path.display(), "deleting symlink");
      fs::remove_file(path).map_err(SymlinkError::io(path))?;
    }
  }
  Ok(())
}

/// Mirror the tree under `source` into `destination` as symlinks.
///
/// Directories are recreated, files become links, and entries whose name
/// starts with a dot are skipped. A missing `source` is not an error. Links
/// already pointing at the right file are left alone. Regular files in the way
/// are kept unless `forced`. Directory links are followed, except into one of
/// their own ancestors; dangling links are skipped.
pub async fn make_symlinks(source: &Path, destination: &Path, forced: bool) -> Result<(), SymlinkError> {
  if !source.is_dir() {
    return Ok(());
  }
  fs::create_dir_all(destination).map_err(SymlinkError::io(destination))?;

  let walker = WalkDir::new(source)
    .min_depth(1)
    .follow_links(true)
    .sort_by_file_name()
    .into_iter()
    .filter_entry(|entry| entry.depth() == 0 || !entry.file_name().to_string_lossy().starts_with('.'));

  for entry in walker {
    let entry = match entry {
      Ok(entry) => entry,
      Err(e) if e.loop_ancestor().is_some() => {
        debug!(path = ?e.path(), "skipping directory loop");
        continue;
      }
      Err(e) if e.io_error().is_some_and(|err| err.kind() == io::ErrorKind::NotFound) => {
        debug!(path = ?e.path(), "skipping dangling link");
        continue;
      }
      Err(e) => {
        return Err(SymlinkError::Walk {
          path: e.path().unwrap_or(source).to_path_buf(),
          source: e,
        });
      }
    };
    let Ok(relative) = entry.path().strip_prefix(source) else {
      continue;
    };
    let link = destination.join(relative);
    let file_type = entry.file_type();
    if file_type.is_dir() {
      fs::create_dir_all(&link).map_err(SymlinkError::io(&link))?;
    } else if file_type.is_file() {
      if is_current(&link, entry.path(), forced)? {
        continue;
      }
      create_symlink(&link, entry.path(), true).await?;
    }
  }
  Ok(())
}

/// Whether `link` can stay as it is.
fn is_current(link: &Path, file: &Path, forced: bool) -> Result<bool, SymlinkError> {
  let Ok(meta) = fs::symlink_metadata(link) else {
    return Ok(false);
  };
  if !meta.file_type().is_symlink() {
    if !forced {
      debug!(path = %link.display(), "keeping existing file");
    }
    return Ok(!forced);
  }
  let Some(directory) = link.parent() else {
    return Ok(false);
  };
  let expected = relative_path(directory, file).map_err(SymlinkError::io(file))?;
  Ok(fs::read_link(link).is_ok_and(|current| current == Path::new(&expected)))
}

fn link_directory(link: &Path) -> Result<PathBuf, SymlinkError> {
  let absolute = std::path::absolute(link).map_err(SymlinkError::io(link))?;
  absolute
    .parent()
    .map(Path::to_path_buf)
    .ok_or_else(|| SymlinkError::NotFound {
      path: link.to_path_buf(),
    })
}

fn link_name(link: &Path) -> Result<String, SymlinkError> {
  link
    .file_name()
    .map(|name| name.to_string_lossy().into_owned())
    .ok_or_else(|| SymlinkError::NotFound {
      path: link.to_path_buf(),
    })
}

#[cfg(windows)]
fn readlink_encoding() -> &'static str {
  "CP1252"
}

#[cfg(not(windows))]
fn readlink_encoding() -> &'static str {
  "UTF-8"
}

#[cfg(windows)]
fn decode_readlink_output(bytes: &[u8]) -> String {
  let (text, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
  text.into_owned()
}

#[cfg(not(windows))]
fn decode_readlink_output(bytes: &[u8]) -> String {
  String::from_utf8_lossy(bytes).into_owned()
}

#[cfg(all(test, unix))]
mod tests {
  use tempfile::TempDir;

  use super::*;

  fn create_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    fs::create_dir_all(dir).unwrap();
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
  }

  async fn assert_round_trip(root: &Path, target_dir: &str, link_dir: &str, content: &str) {
    let target = create_file(&root.join(target_dir), "target.txt", content);
    let link_dir = root.join(link_dir);
    fs::create_dir_all(&link_dir).unwrap();
    let link = link_dir.join("link");

    create_symlink(&link, &target, false).await.unwrap();
    let resolved = resolve_symlink(&link).await.unwrap();

    assert_eq!(fs::read_to_string(&resolved).unwrap(), content);
    assert_eq!(resolved, dunce::canonicalize(&target).unwrap());
    assert!(fs::read_link(&link).unwrap().is_relative());
  }

  #[tokio::test]
  async fn simple_symlink_round_trip() {
    let temp = TempDir::new().unwrap();
    assert_round_trip(temp.path(), "a/b1/c1/d1/e1", "a/b2/c2/d2/e2/f2", "Simple").await;
  }

  #[tokio::test]
  async fn nasty_characters_round_trip() {
    let temp = TempDir::new().unwrap();
    assert_round_trip(temp.path(), "a/x[$y]/(z)/-/u v/_", "a/b2/c2/d2/e2/f2/g2", "Nasty").await;
  }

  #[tokio::test]
  async fn unicode_characters_round_trip() {
    let temp = TempDir::new().unwrap();
    assert_round_trip(temp.path(), "a/b/c/\u{00f6}/\u{0153}", "a/b2/c2/d2/e2", "Woowoo").await;
  }

  #[tokio::test]
  async fn dotdot_segments_round_trip() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    fs::create_dir_all(root.join("a/x/y/z")).unwrap();
    let real = create_file(&root.join("a/x/y/_"), "target.txt", "Dotdot");
    let target = root.join("a/x/y/z/../_/target.txt");
    let link_dir = root.join("a/b2/c2/d2/e2/f2/g2");
    fs::create_dir_all(&link_dir).unwrap();
    let link = link_dir.join("link");

    create_symlink(&link, &target, false).await.unwrap();
    let resolved = resolve_symlink(&link).await.unwrap();

    assert_eq!(fs::read_to_string(&resolved).unwrap(), "Dotdot");
    assert_eq!(resolved, dunce::canonicalize(&real).unwrap());
  }

  #[tokio::test]
  async fn single_quote_in_target_is_rejected_without_side_effects() {
    let temp = TempDir::new().unwrap();
    let link_dir = temp.path().join("a/b2/c2/d2");
    fs::create_dir_all(&link_dir).unwrap();
    let link = link_dir.join("link");

    let err = create_symlink(&link, &temp.path().join("a/single'quote.txt"), false)
      .await
      .unwrap_err();

    assert!(err.to_string().contains("contains single quotes"));
    assert!(fs::symlink_metadata(&link).is_err());
  }

  #[tokio::test]
  async fn single_quote_in_link_is_rejected() {
    let temp = TempDir::new().unwrap();
    let target = create_file(temp.path(), "target.txt", "x");

    let err = create_symlink(&temp.path().join("it's"), &target, false)
      .await
      .unwrap_err();

    assert!(matches!(err, SymlinkError::SingleQuote { what: "Link name", .. }));
    assert!(fs::symlink_metadata(temp.path().join("it's")).is_err());
  }

  #[tokio::test]
  async fn directory_target_is_rejected() {
    let temp = TempDir::new().unwrap();
    fs::create_dir(temp.path().join("dir")).unwrap();

    let err = create_symlink(&temp.path().join("link"), &temp.path().join("dir"), false)
      .await
      .unwrap_err();

    assert!(matches!(err, SymlinkError::TargetIsDirectory { .. }));
  }

  #[tokio::test]
  async fn missing_link_directory_is_rejected() {
    let temp = TempDir::new().unwrap();
    let target = create_file(temp.path(), "target.txt", "x");

    let err = create_symlink(&temp.path().join("nope/link"), &target, false)
      .await
      .unwrap_err();

    assert!(matches!(err, SymlinkError::MissingDirectory { .. }));
  }

  #[tokio::test]
  async fn resolving_a_regular_file_fails() {
    let temp = TempDir::new().unwrap();
    let file = create_file(temp.path(), "plain.txt", "x");

    let err = resolve_symlink(&file).await.unwrap_err();

    assert!(matches!(err, SymlinkError::NotFound { .. }));
  }

  #[test]
  fn delete_symlinks_keeps_real_files() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("tree");
    let real = create_file(&root.join("sub"), "real.txt", "keep");
    std::os::unix::fs::symlink("real.txt", root.join("sub/link.txt")).unwrap();
    std::os::unix::fs::symlink("sub/real.txt", root.join("top-link")).unwrap();
    std::os::unix::fs::symlink("missing", root.join("dangling")).unwrap();

    delete_symlinks(&root).unwrap();

    assert!(real.exists());
    assert!(root.join("sub").is_dir());
    assert!(fs::symlink_metadata(root.join("sub/link.txt")).is_err());
    assert!(fs::symlink_metadata(root.join("top-link")).is_err());
    assert!(fs::symlink_metadata(root.join("dangling")).is_err());
  }

  #[test]
  fn delete_symlinks_does_not_follow_outward_links() {
    let temp = TempDir::new().unwrap();
    let outside = temp.path().join("outside");
    let external = create_file(&outside, "external.txt", "precious");
    std::os::unix::fs::symlink("external.txt", outside.join("external-link")).unwrap();
    let root = temp.path().join("tree");
    fs::create_dir_all(&root).unwrap();
    std::os::unix::fs::symlink(&outside, root.join("escape")).unwrap();
    std::os::unix::fs::symlink(&external, root.join("file-link")).unwrap();

    delete_symlinks(&root).unwrap();

    assert!(external.exists());
    assert!(fs::symlink_metadata(outside.join("external-link")).is_ok());
    assert!(fs::symlink_metadata(root.join("file-link")).is_err());
  }

  #[test]
  fn delete_symlinks_survives_cycles() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("tree");
    let real = create_file(&root.join("a"), "f.txt", "x");
    std::os::unix::fs::symlink("..", root.join("a/up")).unwrap();
    std::os::unix::fs::symlink(".", root.join("a/self")).unwrap();

    delete_symlinks(&root).unwrap();

    assert!(real.exists());
  }

  #[tokio::test]
  async fn make_symlinks_mirrors_tree_and_skips_dotfiles() {
    let temp = TempDir::new().unwrap();
    let src = temp.path().join("src");
    create_file(&src, "main.c", "int main(void) { return 0; }\n");
    create_file(&src.join("include"), "util.h", "#pragma once\n");
    create_file(&src, ".hidden", "secret");
    let dst = temp.path().join("stage");

    make_symlinks(&src, &dst, false).await.unwrap();

    for leaf in ["main.c", "include/util.h"] {
      let link = dst.join(leaf);
      assert!(fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
      let resolved = resolve_symlink(&link).await.unwrap();
      assert_eq!(fs::read(&resolved).unwrap(), fs::read(src.join(leaf)).unwrap());
    }
    assert!(!dst.join(".hidden").exists());
  }

  #[tokio::test]
  async fn make_symlinks_twice_is_idempotent() {
    let temp = TempDir::new().unwrap();
    let src = temp.path().join("src");
    create_file(&src, "a.c", "a");
    create_file(&src.join("sub"), "b.c", "b");
    let dst = temp.path().join("stage");

    make_symlinks(&src, &dst, false).await.unwrap();
    let first = (fs::read_link(dst.join("a.c")).unwrap(), fs::read_link(dst.join("sub/b.c")).unwrap());
    make_symlinks(&src, &dst, false).await.unwrap();
    let second = (fs::read_link(dst.join("a.c")).unwrap(), fs::read_link(dst.join("sub/b.c")).unwrap());

    assert_eq!(first, second);
    assert_eq!(fs::read_dir(&dst).unwrap().count(), 2);
  }

  #[tokio::test]
  async fn make_symlinks_keeps_regular_files_unless_forced() {
    let temp = TempDir::new().unwrap();
    let src = temp.path().join("src");
    create_file(&src, "Makefile", "generated");
    let dst = temp.path().join("stage");
    create_file(&dst, "Makefile", "local");

    make_symlinks(&src, &dst, false).await.unwrap();
    assert_eq!(fs::read_to_string(dst.join("Makefile")).unwrap(), "local");

    make_symlinks(&src, &dst, true).await.unwrap();
    assert!(fs::symlink_metadata(dst.join("Makefile")).unwrap().file_type().is_symlink());
    assert_eq!(fs::read_to_string(dst.join("Makefile")).unwrap(), "generated");
  }

  #[tokio::test]
  async fn make_symlinks_ignores_missing_source() {
    let temp = TempDir::new().unwrap();
    make_symlinks(&temp.path().join("absent"), &temp.path().join("stage"), false)
      .await
      .unwrap();
    assert!(!temp.path().join("stage").exists());
  }

  #[tokio::test]
  async fn make_symlinks_does_not_recurse_into_a_link_to_an_ancestor() {
    let temp = TempDir::new().unwrap();
    let src = temp.path().join("src");
    create_file(&src, "a.c", "a");
    std::os::unix::fs::symlink(".", src.join("self")).unwrap();
    let dst = temp.path().join("stage");

    make_symlinks(&src, &dst, false).await.unwrap();

    assert!(fs::symlink_metadata(dst.join("a.c")).unwrap().file_type().is_symlink());
    assert!(!dst.join("self").exists());
  }

  #[tokio::test]
  async fn make_symlinks_follows_directory_links_and_skips_dangling_ones() {
    let temp = TempDir::new().unwrap();
    create_file(&temp.path().join("shared"), "common.h", "#pragma once\n");
    let src = temp.path().join("src");
    create_file(&src, "main.c", "");
    std::os::unix::fs::symlink("../shared", src.join("include")).unwrap();
    std::os::unix::fs::symlink("missing.c", src.join("gone.c")).unwrap();
    let dst = temp.path().join("stage");

    make_symlinks(&src, &dst, false).await.unwrap();

    assert!(dst.join("include").is_dir());
    assert_eq!(fs::read_to_string(dst.join("include/common.h")).unwrap(), "#pragma once\n");
    assert!(fs::symlink_metadata(dst.join("gone.c")).is_err());
    assert!(dst.join("main.c").exists());
  }
}
