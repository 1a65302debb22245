//! Turning raw child output into log lines.
//!
//! [`LineBreakingWriter`] accepts bytes in arbitrary chunks, decodes them as
//! UTF-8 and hands complete lines to a [`LineSink`]. Bytes that do not form
//! valid UTF-8 are rendered as Latin-1 rather than rejected.

mod log;

use std::io;

pub use log::{Stream, StreamLogAdapter, is_suppressed, log_sinks};

/// Longest UTF-8 encoding of a single code point.
const MAX_PENDING: usize = 4;

/// Receiver of complete lines, without their terminators.
pub trait LineSink {
  fn write_line(&mut self, line: &str);
}

impl LineSink for Vec<String> {
  fn write_line(&mut self, line: &str) {
    self.push(line.to_string());
  }
}

/// An [`io::Write`] adapter that splits a byte stream into lines.
///
/// Both `\n` and `\r` terminate a line and empty lines are dropped, so CRLF
/// output yields one line per row. Call [`io::Write::flush`] or
/// [`LineBreakingWriter::into_inner`] to emit a trailing partial line.
#[derive(Debug)]
pub struct LineBreakingWriter<S: LineSink> {
  sink: S,
  pending: [u8; MAX_PENDING],
  pending_len: usize,
  line: String,
}

impl<S: LineSink> LineBreakingWriter<S> {
  pub fn new(sink: S) -> Self {
    Self {
      sink,
      pending: [0; MAX_PENDING],
      pending_len: 0,
      line: String::new(),
    }
  }

  /// Flush any partial line and return the sink.
  pub fn into_inner(mut self) -> S {
    self.finish_line();
    self.sink
  }

  fn push_byte(&mut self, byte: u8) {
    self.pending[self.pending_len] = byte;
    self.pending_len += 1;
    self.decode_pending();
  }

  fn decode_pending(&mut self) {
    while self.pending_len > 0 {
      let pending = self.pending;
      let len = self.pending_len;
      match std::str::from_utf8(&pending[..len]) {
        Ok(text) => {
          self.push_str(text);
          self.pending_len = 0;
        }
        Err(e) => {
          let valid = e.valid_up_to();
          // Prefix is valid by construction of `valid_up_to`.
          if let Ok(text) = std::str::from_utf8(&pending[..valid]) {
            self.push_str(text);
          }
          let consumed = match e.error_len() {
            // Incomplete sequence: keep the tail and wait for more bytes.
            None => valid,
            Some(bad) => {
              for &b in &pending[valid..valid + bad] {
                self.push_char(char::from(b));
              }
              valid + bad
            }
          };
          self.pending.copy_within(consumed..len, 0);
          self.pending_len = len - consumed;
          if e.error_len().is_none() {
            return;
          }
        }
      }
    }
  }

  fn push_str(&mut self, text: &str) {
    for c in text.chars() {
      self.push_char(c);
    }
  }

  fn push_char(&mut self, c: char) {
    if c == '\n' || c == '\r' {
      self.emit_line();
    } else {
      self.line.push(c);
    }
  }

  fn emit_line(&mut self) {
    if !self.line.is_empty() {
      self.sink.write_line(&self.line);
      self.line.clear();
    }
  }

  /// Render leftover undecodable bytes and emit the partial line.
  fn finish_line(&mut self) {
    let pending = self.pending;
    for &b in &pending[..self.pending_len] {
      self.push_char(char::from(b));
    }
    self.pending_len = 0;
    self.emit_line();
  }
}

impl<S: LineSink> io::Write for LineBreakingWriter<S> {
  fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
    for &b in buf {
      self.push_byte(b);
    }
    Ok(buf.len())
  }

  fn flush(&mut self) -> io::Result<()> {
    self.finish_line();
    Ok(())
  }
}
