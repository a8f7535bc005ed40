// This file is part of psh, a POSIX-flavored shell.
// Copyright (C) 2021 WATANABE Yuki

//! Helpers shared by built-in implementations.

use psh_env::semantics::{ExitStatus, Field};
use std::io::Write as _;
use std::ops::ControlFlow::Continue;

/// Result type every built-in's `main` function returns: a plain exit
/// status on the `Continue` side, or a [`psh_env::Divert`] on the `Break`
/// side for `exit`/`return`/`break`/`continue`.
pub type Result = psh_env::semantics::Result<ExitStatus>;

/// Handle to the shell's lex-parse-execute pipeline, passed to every
/// built-in so `eval`/`.`/`source` can run a string as shell code without
/// this crate depending on `psh-semantics`.
pub type Runner<'a> = &'a mut dyn psh_env::semantics::CommandRunner;

/// Writes `s` to the process's current stdout (fd 1).
///
/// Built-ins never open their own file descriptors for output: the executor
/// applies the command's redirections (dup2 onto the real fds) before
/// calling into the built-in and restores them afterward, so writing to
/// [`std::io::stdout`] here already honors any `>file` on the built-in
/// invocation.
pub fn print(s: &str) {
    let _ = write!(std::io::stdout(), "{s}");
}

pub fn eprint(s: &str) {
    let _ = write!(std::io::stderr(), "{s}");
}

/// Reports a usage/runtime error the way POSIX utilities conventionally do
/// (`name: message` on stderr) and returns a failure status.
pub fn error(name: &str, message: impl std::fmt::Display) -> Result {
    eprint(&format!("{name}: {message}\n"));
    Continue(ExitStatus::FAILURE)
}

pub fn success() -> Result {
    Continue(ExitStatus::SUCCESS)
}

pub fn failure() -> Result {
    Continue(ExitStatus::FAILURE)
}

/// Extracts the plain string arguments (argv[1..]) from a built-in's field
/// list (argv[0] is the built-in's own name).
#[must_use]
pub fn operands(args: &[Field]) -> Vec<&str> {
    args.iter().skip(1).map(|f| f.value.as_str()).collect()
}

/// A [`psh_env::semantics::CommandRunner`] that refuses to run anything, for
/// unit tests of built-ins that never call `eval`/`.`/`source`.
#[cfg(test)]
pub struct NoopRunner;

#[cfg(test)]
impl psh_env::semantics::CommandRunner for NoopRunner {
    fn run_source(
        &mut self,
        _state: &mut psh_env::ShellState,
        _source: &str,
    ) -> psh_env::semantics::Result<ExitStatus> {
        panic!("NoopRunner::run_source called in a test that did not expect it")
    }
}
