//! Types describing a child process invocation and its failure modes.

use std::collections::BTreeMap;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use super::shell;

/// One external command: argument vector, environment, and working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
  /// Program followed by its arguments.
  pub argv: Vec<String>,

  /// Complete child environment, or `None` to inherit the parent's.
  pub env: Option<BTreeMap<String, String>>,

  /// Directory the child starts in. Must exist.
  pub cwd: PathBuf,
}

impl Invocation {
  /// Create an invocation of a plain argument vector.
  pub fn new<I, S>(argv: I, cwd: impl Into<PathBuf>) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self {
      argv: argv.into_iter().map(Into::into).collect(),
      env: None,
      cwd: cwd.into(),
    }
  }

  /// Create an invocation that runs `script` through `sh -c`.
  pub fn shell(script: impl AsRef<str>, cwd: impl Into<PathBuf>) -> Self {
    Self::new(shell::script(script.as_ref()), cwd)
  }

  /// Replace the inherited environment with `env`.
  pub fn with_env(mut self, env: BTreeMap<String, String>) -> Self {
    self.env = Some(env);
    self
  }

  /// The program name (`argv[0]`), or an empty string for an empty command.
  pub fn program(&self) -> &str {
    self.argv.first().map(String::as_str).unwrap_or("")
  }

  /// The command line as it could be pasted into a shell.
  pub fn command_line(&self) -> String {
    shell::join(&self.argv)
  }
}

/// Errors that can occur while running a child process.
#[derive(Debug, Error)]
pub enum ProcessError {
  /// The invocation had no program to run.
  #[error("empty command line (in '{}')", .cwd.display())]
  EmptyCommand { cwd: PathBuf },

  /// The child could not be started.
  #[error("failed to start `{command}` in directory '{}': {source}", .cwd.display())]
  Spawn {
    command: String,
    cwd: PathBuf,
    #[source]
    source: io::Error,
  },

  /// The child ran but exited unsuccessfully.
  #[error(
    "child process \"{program}\" {}: `{command}` in directory '{}'",
    exit_status(.code),
    .cwd.display()
  )]
  Failed {
    program: String,
    command: String,
    cwd: PathBuf,
    code: Option<i32>,
  },

  /// The child outlived its deadline and was killed.
  #[error("child process \"{program}\" timed out after {seconds}s: `{command}` in directory '{}'", .cwd.display())]
  TimedOut {
    program: String,
    command: String,
    cwd: PathBuf,
    seconds: u64,
  },

  /// Waiting on the child or draining its output failed.
  #[error("io error: {0}")]
  Io(#[from] io::Error),
}

fn exit_status(code: &Option<i32>) -> String {
  match code {
    Some(code) => format!("terminated with exit code {code}"),
    None => "was killed by a signal".to_string(),
  }
}
