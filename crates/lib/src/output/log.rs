//! Forwarding tool output to `tracing`.

use tracing::{info, warn};

use super::{LineBreakingWriter, LineSink};
use crate::process::Sink;

/// Advisory text libtool prints after installing a library.
const BOILERPLATE: &[&str] = &[
  "----------------------------------------------------------------------",
  "If you ever happen to want to link against installed libraries",
  "in a given directory, LIBDIR, you must either use libtool, and",
  "specify the full pathname of the library, or use the `-LLIBDIR'",
  "flag during linking and do at least one of the following:",
  "- add LIBDIR to the `LD_LIBRARY_PATH' environment variable",
  "during execution",
  "- add LIBDIR to the `LD_RUN_PATH' environment variable",
  "during linking",
  "- use the `-Wl,-rpath -Wl,LIBDIR' linker flag",
  "- have your system administrator add LIBDIR to `/etc/ld.so.conf'",
  "See any operating system documentation about shared libraries for",
  "more information, such as the ld(1) and ld.so(8) manual pages.",
  "- add LIBDIR to the `PATH' environment variable",
  "- use the `-LLIBDIR' linker flag",
];

/// Progress noise printed by automake and libtoolize on stderr.
const INSTALLING_MARKER: &str = ": installing ";

/// Which child stream a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
  Stdout,
  Stderr,
}

/// Whether `line` is noise that should not reach the log.
pub fn is_suppressed(stream: Stream, line: &str) -> bool {
  let trimmed = line.trim();
  if BOILERPLATE.contains(&trimmed) {
    return true;
  }
  stream == Stream::Stderr && line.contains(INSTALLING_MARKER)
}

/// Logs stdout lines at `info` and stderr lines at `warn`.
#[derive(Debug, Clone, Copy)]
pub struct StreamLogAdapter {
  stream: Stream,
}

impl StreamLogAdapter {
  pub fn stdout() -> Self {
    Self { stream: Stream::Stdout }
  }

  pub fn stderr() -> Self {
    Self { stream: Stream::Stderr }
  }
}

impl LineSink for StreamLogAdapter {
  fn write_line(&mut self, line: &str) {
    if is_suppressed(self.stream, line) {
      return;
    }
    match self.stream {
      Stream::Stdout => info!(target: "autotools::tool", "{line}"),
      Stream::Stderr => warn!(target: "autotools::tool", "{line}"),
    }
  }
}

/// Executor sinks that route child output into the log.
pub fn log_sinks() -> (Sink, Sink) {
  (
    Box::new(LineBreakingWriter::new(StreamLogAdapter::stdout())),
    Box::new(LineBreakingWriter::new(StreamLogAdapter::stderr())),
  )
}
