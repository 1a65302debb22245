//! POSIX shell command composition.
//!
//! Every command string handed to `sh -c` is assembled here, so quoting rules
//! live in one place. Commands that need no shell features are run as plain
//! argument vectors instead.

use std::borrow::Cow;

/// The shell used for commands that rely on `$PATH` lookup or shell syntax.
///
/// This is resolved through `$PATH` so that a Cygwin `sh` is found on Windows.
pub const SHELL: &str = "sh";

/// Quote a single word for a POSIX shell.
///
/// Words made only of characters with no special meaning are returned as is;
/// anything else is wrapped in single quotes, with embedded single quotes
/// written as `'\''`.
pub fn quote(word: &str) -> Cow<'_, str> {
  if !word.is_empty() && word.chars().all(is_plain) {
    return Cow::Borrowed(word);
  }
  let mut quoted = String::with_capacity(word.len() + 2);
  quoted.push('\'');
  for c in word.chars() {
    if c == '\'' {
      quoted.push_str("'\\''");
    } else {
      quoted.push(c);
    }
  }
  quoted.push('\'');
  Cow::Owned(quoted)
}

/// Join words into a shell command line, quoting each as needed.
pub fn join<I, S>(words: I) -> String
where
  I: IntoIterator<Item = S>,
  S: AsRef<str>,
{
  words
    .into_iter()
    .map(|w| quote(w.as_ref()).into_owned())
    .collect::<Vec<_>>()
    .join(" ")
}

/// Returns the argument vector that runs `script` through the shell.
pub fn script(script: &str) -> Vec<String> {
  vec![SHELL.to_string(), "-c".to_string(), script.to_string()]
}

fn is_plain(c: char) -> bool {
  c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '/' | ',' | ':' | '=' | '+' | '@' | '%')
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn plain_words_are_untouched() {
    assert_eq!(quote("--prefix=/opt/x86_64"), "--prefix=/opt/x86_64");
    assert_eq!(quote("../configure/configure"), "../configure/configure");
  }

  #[test]
  fn special_characters_are_single_quoted() {
    assert_eq!(quote("u v"), "'u v'");
    assert_eq!(quote("x[$y]"), "'x[$y]'");
    assert_eq!(quote(""), "''");
  }

  #[test]
  fn embedded_single_quotes_are_escaped() {
    assert_eq!(quote("it's"), "'it'\\''s'");
  }

  #[test]
  fn join_quotes_each_word() {
    assert_eq!(join(["make", "CFLAGS=-O2 -g"]), "make 'CFLAGS=-O2 -g'");
  }

  #[test]
  fn script_wraps_command() {
    assert_eq!(script("autoconf"), vec!["sh", "-c", "autoconf"]);
  }
}
