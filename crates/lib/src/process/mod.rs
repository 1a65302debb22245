//! Child process execution.
//!
//! The build orchestrator never spawns processes directly. It describes each
//! command as an [`Invocation`] and hands it to a [`ProcessExecutor`], which
//! lets tests substitute a recorder for the real thing.

pub mod shell;
mod types;

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::debug;

pub use types::{Invocation, ProcessError};

/// Destination for the bytes a child writes to one of its output streams.
pub type Sink = Box<dyn Write + Send>;

const PUMP_BUFFER_SIZE: usize = 1024;

/// Runs invocations to completion.
#[allow(async_fn_in_trait)]
pub trait ProcessExecutor {
  /// Run `invocation` and wait for it to exit.
  ///
  /// Returns only after the child has exited and both of its output streams
  /// have been fully drained into the current sinks.
  async fn execute(&mut self, invocation: &Invocation) -> Result<(), ProcessError>;

  /// Route the output of subsequent invocations to new sinks.
  fn set_sinks(&mut self, stdout: Sink, stderr: Sink);
}

/// Executor backed by real operating system processes.
pub struct DefaultProcessExecutor {
  stdout: Sink,
  stderr: Sink,
  timeout: Option<Duration>,
}

impl DefaultProcessExecutor {
  /// An executor that forwards child output to this process's own streams.
  pub fn new() -> Self {
    Self::with_sinks(Box::new(io::stdout()), Box::new(io::stderr()))
  }

  /// An executor writing child output to the given sinks.
  pub fn with_sinks(stdout: Sink, stderr: Sink) -> Self {
    Self {
      stdout,
      stderr,
      timeout: None,
    }
  }

  /// An executor capturing child output in memory.
  pub fn capturing() -> (Self, CaptureBuffer, CaptureBuffer) {
    let stdout = CaptureBuffer::default();
    let stderr = CaptureBuffer::default();
    let executor = Self::with_sinks(Box::new(stdout.clone()), Box::new(stderr.clone()));
    (executor, stdout, stderr)
  }

  /// Kill children that run longer than `timeout`.
  pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
    self.timeout = timeout;
    self
  }
}

impl Default for DefaultProcessExecutor {
  fn default() -> Self {
    Self::new()
  }
}

impl ProcessExecutor for DefaultProcessExecutor {
  async fn execute(&mut self, invocation: &Invocation) -> Result<(), ProcessError> {
    let Some((program, args)) = invocation.argv.split_first() else {
      return Err(ProcessError::EmptyCommand {
        cwd: invocation.cwd.clone(),
      });
    };
    let command_line = invocation.command_line();
    debug!(command = %command_line, cwd = %invocation.cwd.display(), "spawning process");

    let mut command = Command::new(program);
    command
      .args(args)
      .current_dir(&invocation.cwd)
      .stdin(Stdio::null())
      .stdout(Stdio::piped())
      .stderr(Stdio::piped())
      .kill_on_drop(true);
    if let Some(env) = &invocation.env {
      command.env_clear().envs(env);
    }

    let mut child = command.spawn().map_err(|source| ProcessError::Spawn {
      command: command_line.clone(),
      cwd: invocation.cwd.clone(),
      source,
    })?;

    let child_stdout = child.stdout.take();
    let child_stderr = child.stderr.take();
    let out_sink = self.stdout.as_mut();
    let err_sink = self.stderr.as_mut();
    let run = async {
      tokio::join!(
        child.wait(),
        pump(child_stdout, out_sink),
        pump(child_stderr, err_sink)
      )
    };

    let (status, out_result, err_result) = match self.timeout {
      None => run.await,
      Some(limit) => match tokio::time::timeout(limit, run).await {
        Ok(result) => result,
        Err(_) => {
          let _ = child.kill().await;
          return Err(ProcessError::TimedOut {
            program: program.clone(),
            command: command_line,
            cwd: invocation.cwd.clone(),
            seconds: limit.as_secs(),
          });
        }
      },
    };

    let status = status?;
    if !status.success() {
      return Err(ProcessError::Failed {
        program: program.clone(),
        command: command_line,
        cwd: invocation.cwd.clone(),
        code: status.code(),
      });
    }
    out_result?;
    err_result?;
    debug!(command = %command_line, "process finished");
    Ok(())
  }

  fn set_sinks(&mut self, stdout: Sink, stderr: Sink) {
    self.stdout = stdout;
    self.stderr = stderr;
  }
}

/// Copy one child stream into a sink until end of stream.
///
/// A failing sink does not stop the drain, otherwise a child blocked on a full
/// pipe would never exit. The first sink error is reported afterwards.
async fn pump<R>(reader: Option<R>, sink: &mut (dyn Write + Send)) -> io::Result<()>
where
  R: AsyncRead + Unpin,
{
  let Some(mut reader) = reader else {
    return Ok(());
  };
  let mut buf = [0u8; PUMP_BUFFER_SIZE];
  let mut failure = None;
  loop {
    let n = reader.read(&mut buf).await?;
    if n == 0 {
      break;
    }
    if failure.is_none() {
      failure = sink.write_all(&buf[..n]).err();
    }
  }
  match failure {
    Some(e) => Err(e),
    None => sink.flush(),
  }
}

/// The current process environment, skipping non-UTF-8 entries.
pub fn inherited_env() -> BTreeMap<String, String> {
  std::env::vars_os()
    .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
    .collect()
}

/// Shared in-memory sink.
#[derive(Debug, Clone, Default)]
pub struct CaptureBuffer(Arc<Mutex<Vec<u8>>>);

impl CaptureBuffer {
  /// Everything written so far.
  pub fn contents(&self) -> Vec<u8> {
    match self.0.lock() {
      Ok(buf) => buf.clone(),
      Err(poisoned) => poisoned.into_inner().clone(),
    }
  }

  /// Everything written so far, decoded lossily as UTF-8.
  pub fn to_string_lossy(&self) -> String {
    String::from_utf8_lossy(&self.contents()).into_owned()
  }
}

impl Write for CaptureBuffer {
  fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
    let mut inner = self
      .0
      .lock()
      .map_err(|_| io::Error::other("capture buffer lock poisoned"))?;
    inner.extend_from_slice(buf);
    Ok(buf.len())
  }

  fn flush(&mut self) -> io::Result<()> {
    Ok(())
  }
}
