// This file is part of psh, a POSIX-flavored shell.
// Copyright (C) 2021 WATANABE Yuki

//! `set -x` tracing: prints an expanded `$PS4` followed by each expanded
//! word of the command about to run, to standard error.
//!
//! Words are collected as they are produced rather than re-expanded for
//! tracing, so a command substitution embedded in a traced word only ever
//! runs once.

use psh_env::options::Option as ShellOption;
use psh_env::ShellState;
use std::io::Write as _;

/// Accumulates one command's traced words; call [`XTrace::finish`] once the
/// command is about to run.
pub struct XTrace {
    words: Vec<String>,
}

impl XTrace {
    /// Returns `Some` only when `xtrace` is set — no point collecting
    /// anything otherwise.
    #[must_use]
    pub fn from_options(state: &ShellState) -> Option<XTrace> {
        if state.options.is_set(ShellOption::XTrace) {
            Some(XTrace { words: Vec::new() })
        } else {
            None
        }
    }

    pub fn push_word(&mut self, word: &str) {
        self.words.push(word.to_owned());
    }

    pub fn extend_words<I: IntoIterator<Item = S>, S: Into<String>>(&mut self, words: I) {
        self.words.extend(words.into_iter().map(Into::into));
    }

    /// Writes the trace line: `$PS4` (literal, not re-expanded — a fuller
    /// implementation would expand it through the same pipeline as any
    /// other word) followed by each collected word, `psh_quote`d and
    /// space-joined.
    pub fn finish(self, state: &ShellState) {
        if self.words.is_empty() {
            return;
        }
        let ps4 = state.variables.get_str("PS4").unwrap_or("+ ");
        let mut line = String::from(ps4);
        for (i, word) in self.words.iter().enumerate() {
            if i > 0 {
                line.push(' ');
            }
            line.push_str(&psh_quote::quote(word));
        }
        line.push('\n');
        let _ = std::io::stderr().write_all(line.as_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xtrace_is_none_when_option_unset() {
        let state = ShellState::new("psh", 1);
        assert!(XTrace::from_options(&state).is_none());
    }

    #[test]
    fn xtrace_is_some_when_option_set() {
        let mut state = ShellState::new("psh", 1);
        state.options.set(ShellOption::XTrace, true);
        assert!(XTrace::from_options(&state).is_some());
    }
}
