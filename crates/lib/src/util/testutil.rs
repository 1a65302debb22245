//! Test doubles for autotools-lib.
//!
//! [`RecordingExecutor`] stands in for real processes so tests can assert the
//! exact command sequences a goal produces without autotools installed.

use std::fs;
use std::path::Path;

use crate::process::{Invocation, ProcessError, ProcessExecutor, Sink};

type Hook = Box<dyn FnMut(&Invocation) + Send>;

/// Executor that records invocations instead of running them.
#[derive(Default)]
pub struct RecordingExecutor {
  pub invocations: Vec<Invocation>,
  pub sink_changes: usize,
  fail_on: Option<String>,
  hook: Option<Hook>,
}

impl RecordingExecutor {
  pub fn new() -> Self {
    Self::default()
  }

  /// Fail every invocation whose command line contains `needle`.
  pub fn failing_on(needle: &str) -> Self {
    Self {
      fail_on: Some(needle.to_string()),
      ..Self::default()
    }
  }

  /// Run `hook` for every invocation, e.g. to fake files a tool would write.
  pub fn with_hook(hook: impl FnMut(&Invocation) + Send + 'static) -> Self {
    Self {
      hook: Some(Box::new(hook)),
      ..Self::default()
    }
  }

  /// The recorded argument vectors.
  pub fn argvs(&self) -> Vec<Vec<String>> {
    self.invocations.iter().map(|inv| inv.argv.clone()).collect()
  }

  /// Shell scripts of `sh -c` invocations, plain command lines otherwise.
  pub fn scripts(&self) -> Vec<String> {
    self
      .invocations
      .iter()
      .map(|inv| match inv.argv.as_slice() {
        [sh, flag, script] if sh == "sh" && flag == "-c" => script.clone(),
        argv => argv.join(" "),
      })
      .collect()
  }
}

impl ProcessExecutor for RecordingExecutor {
  async fn execute(&mut self, invocation: &Invocation) -> Result<(), ProcessError> {
    self.invocations.push(invocation.clone());
    if let Some(hook) = &mut self.hook {
      hook(invocation);
    }
    match &self.fail_on {
      Some(needle) if invocation.command_line().contains(needle.as_str()) => Err(ProcessError::Failed {
        program: invocation.program().to_string(),
        command: invocation.command_line(),
        cwd: invocation.cwd.clone(),
        code: Some(2),
      }),
      _ => Ok(()),
    }
  }

  fn set_sinks(&mut self, _stdout: Sink, _stderr: Sink) {
    self.sink_changes += 1;
  }
}

/// Write `content` to `root/relative`, creating parent directories.
pub fn write_file(root: &Path, relative: &str, content: &str) {
  let path = root.join(relative);
  if let Some(parent) = path.parent() {
    fs::create_dir_all(parent).unwrap();
  }
  fs::write(path, content).unwrap();
}
