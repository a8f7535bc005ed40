// This file is part of psh, a POSIX-flavored shell.
// Copyright (C) 2021 WATANABE Yuki

//! Shared vocabulary for command execution results: [`ExitStatus`] and the
//! [`Divert`]/[`Result`] pair modeling control-flow-by-exception
//! (`break`/`continue`/`return`/`exit`) as an explicit sum rather than a
//! thrown exception, per the executor's design (no recursive unwinding
//! hidden behind a `panic` or a host-language exception).
//!
//! This lives in `psh-env`, not `psh-semantics`, because both `psh-builtin`
//! (whose built-ins return a `Result`) and `psh-semantics` (whose AST
//! evaluator produces and consumes one) need it, and `psh-builtin` must not
//! depend on `psh-semantics` (which dispatches to builtins).

use psh_syntax::source::Location;
use std::ops::ControlFlow;

/// One expanded field: its final string value plus the location of the word
/// it came from, so errors raised later (a builtin rejecting its argument,
/// for instance) can still point back into the source.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Field {
    pub value: String,
    pub origin: Location,
}

impl Field {
    #[must_use]
    pub fn dummy(value: impl Into<String>) -> Field {
        let value = value.into();
        let origin = Location::dummy(0..value.len());
        Field { value, origin }
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.value.fmt(f)
    }
}

/// Exit status of a command: `0` is success, nonzero is failure or a
/// specific condition (§6: `126` not executable, `127` not found, `128+N`
/// killed by signal `N`).
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ExitStatus(pub i32);

impl ExitStatus {
    pub const SUCCESS: ExitStatus = ExitStatus(0);
    pub const FAILURE: ExitStatus = ExitStatus(1);
    pub const ERROR: ExitStatus = ExitStatus(2);
    pub const NOT_EXECUTABLE: ExitStatus = ExitStatus(126);
    pub const NOT_FOUND: ExitStatus = ExitStatus(127);

    #[must_use]
    pub const fn is_successful(self) -> bool {
        self.0 == 0
    }

    /// `128 + signal_number`, per §6.
    #[must_use]
    pub const fn from_signal(signal_number: i32) -> Self {
        ExitStatus(128 + signal_number)
    }
}

impl From<i32> for ExitStatus {
    fn from(value: i32) -> Self {
        ExitStatus(value)
    }
}

impl From<ExitStatus> for i32 {
    fn from(status: ExitStatus) -> i32 {
        status.0
    }
}

impl std::fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A control-flow transfer that unwinds out of normal command sequencing:
/// `break`/`continue N`, `return`, or shell exit. Ordered by severity so an
/// inner transfer never gets silently overridden by a less severe one.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Divert {
    /// `continue N`: skip to the next iteration, `count` loop levels out
    /// from the innermost (`0` = this loop).
    Continue { count: usize },
    /// `break N`: exit the loop, `count` levels out from the innermost.
    Break { count: usize },
    /// `return`, from a function or a sourced script.
    Return(Option<ExitStatus>),
    /// `exit`: run the `EXIT` trap, then terminate the shell.
    Exit(Option<ExitStatus>),
}

impl Divert {
    #[must_use]
    pub fn exit_status(&self) -> Option<ExitStatus> {
        use Divert::*;
        match self {
            Continue { .. } | Break { .. } => None,
            Return(s) | Exit(s) => *s,
        }
    }
}

/// Result of executing one AST node: either it ran to completion (`Continue`
/// side, by `ControlFlow` convention — no relation to the shell's
/// `continue`), or it triggered a [`Divert`] that must propagate outward
/// until something (a loop, a function call, the top level) consumes it.
pub type Result<T = ()> = ControlFlow<Divert, T>;

/// Lets `psh-builtin` invoke the shell's lex-parse-execute pipeline (for
/// `eval`, `.`/`source`, and `command -v`-style lookups) without depending
/// on `psh-semantics`, which depends on `psh-builtin` to dispatch built-ins.
/// `psh-semantics` provides the implementation and hands it to built-ins
/// through their call context.
pub trait CommandRunner {
    /// Parses and runs `source` as shell commands in the given state,
    /// exactly as if it had appeared at top level.
    fn run_source(&mut self, state: &mut crate::ShellState, source: &str) -> Result<ExitStatus>;
}
