//! Remembering which steps already ran in this session.

use std::collections::HashSet;
use std::sync::Mutex;

/// Set of step fingerprints executed so far.
///
/// One memo is shared by every goal of a single invocation, so that a step
/// requested twice with identical settings only runs once.
#[derive(Debug, Default)]
pub struct ExecutionMemo {
  seen: Mutex<HashSet<String>>,
}

impl ExecutionMemo {
  pub fn new() -> Self {
    Self::default()
  }

  /// Record the fingerprint made of `parts`.
  ///
  /// Returns `true` if the same fingerprint had been recorded before.
  pub fn already_run<I, S>(&self, parts: I) -> bool
  where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
  {
    let key = parts
      .into_iter()
      .map(|part| part.as_ref().to_string())
      .collect::<Vec<_>>()
      .join(":");
    let mut seen = match self.seen.lock() {
      Ok(guard) => guard,
      Err(poisoned) => poisoned.into_inner(),
    };
    !seen.insert(key)
  }
}
