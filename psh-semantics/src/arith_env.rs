// This file is part of psh, a POSIX-flavored shell.
// Copyright (C) 2022 WATANABE Yuki

//! Adapts [`ShellState`] to [`psh_arith::Env`] so `$((...))` can read and
//! assign shell variables directly.

use psh_env::{ShellState, Variable};
use std::convert::Infallible;
use std::ops::Range;

/// Borrows a [`ShellState`] for the duration of one arithmetic evaluation.
pub struct ArithEnv<'a> {
    pub state: &'a mut ShellState,
}

impl psh_arith::Env for ArithEnv<'_> {
    type Error = Infallible;

    fn get_variable(&self, name: &str) -> Result<Option<&str>, Infallible> {
        Ok(self.state.variables.get_str(name))
    }

    fn assign_variable(
        &mut self,
        name: &str,
        value: String,
        _location: Range<usize>,
    ) -> Result<(), Infallible> {
        // A readonly assignment inside `$((...))` is silently dropped here:
        // the caller only sees the evaluated value, not the assignment's
        // success. Shells that surface this precisely route the error
        // through the exit status instead; out of scope for arithmetic's
        // intentionally tiny `Env::Error` type (`Infallible`).
        let _ = self.state.assign_variable(name, Variable::new(value));
        Ok(())
    }
}
