//! Filesystem helpers for staging autotools builds.

pub mod paths;
pub mod symlink;

pub use paths::{
  cygwin_path, exists_through_symlink, fix_path_for_shell, is_older_than_any, is_stale, relative_path, set_executable,
};
pub use symlink::{SymlinkError, create_symlink, delete_symlinks, make_symlinks, resolve_symlink};
