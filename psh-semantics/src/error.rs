// This file is part of psh, a POSIX-flavored shell.
// Copyright (C) 2021 WATANABE Yuki

//! Errors raised while expanding words or executing commands.
//!
//! These are distinct from [`psh_env::semantics::Divert`]: a `Divert` is a
//! control-flow transfer every evaluator must propagate unconditionally, an
//! [`ExpansionError`] is a recoverable failure of a single command that sets
//! the exit status and, only under `errexit` in a non-conditional context,
//! escalates into a `Divert::Exit`.

use psh_syntax::source::Location;
use thiserror::Error;

/// Something that went wrong expanding a word or running a command.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ExpansionError {
    /// `nounset` rejected a reference to an unset variable.
    #[error("{name}: unbound variable")]
    UnboundVariable { name: String, location: Location },

    /// `${v:?message}` was triggered.
    #[error("{name}: {message}")]
    SwitchError {
        name: String,
        message: String,
        location: Location,
    },

    /// A value assigned through `${v:=word}` turned out to be read-only, or
    /// any other assignment failure surfaced during expansion.
    #[error("{name}: {source}")]
    Assign {
        name: String,
        #[source]
        source: psh_env::AssignError,
        location: Location,
    },

    /// Arithmetic expansion (`$((...))`) failed.
    #[error("{message}")]
    Arith { message: String, location: Location },

    /// A glob or parameter-expansion pattern (`${v#pattern}` etc.) failed to
    /// compile.
    #[error("{message}")]
    BadPattern { message: String, location: Location },

    /// Command substitution could not run the subshell (`fork`/`pipe`
    /// failure, not a nonzero exit status — that is not an error).
    #[error("command substitution failed: {message}")]
    CommandSubst { message: String, location: Location },

    /// `~user` named a user with no password-database entry, or any other
    /// tilde-expansion failure; falls back to the literal text rather than
    /// erroring, per common shell behavior, but is tracked here so the
    /// expander never has to guess silently (§7 forbids silent downgrade for
    /// anything that is not an explicitly documented fallback).
    #[error("{message}")]
    Tilde { message: String, location: Location },
}

impl ExpansionError {
    /// Exit code an uncaught expansion error gives the command (§7: default
    /// 1, but `${v:?msg}` and friends may be more specific in a fuller
    /// implementation).
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        1
    }

    #[must_use]
    pub fn location(&self) -> &Location {
        match self {
            ExpansionError::UnboundVariable { location, .. }
            | ExpansionError::SwitchError { location, .. }
            | ExpansionError::Assign { location, .. }
            | ExpansionError::Arith { location, .. }
            | ExpansionError::BadPattern { location, .. }
            | ExpansionError::CommandSubst { location, .. }
            | ExpansionError::Tilde { location, .. } => location,
        }
    }
}
