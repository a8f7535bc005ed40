// This file is part of psh, a POSIX-flavored shell.
// Copyright (C) 2021 WATANABE Yuki
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Implementations of the shell's built-in utilities.
//!
//! Each built-in lives in the module named after it (`cd`, `read`, ...);
//! [`lookup`] is the dispatch table the executor consults before falling
//! back to `$PATH` search. A built-in's `main` function takes the current
//! [`ShellState`](psh_env::ShellState), its already-expanded argument
//! fields (`args[0]` is the built-in's own name, matching `argv[0]`
//! convention), and a [`Runner`](common::Runner) so `eval`/`.`/`source` can
//! hand a string back to the lex-parse-execute pipeline without this crate
//! depending on `psh-semantics`.

pub mod cd;
pub mod common;
pub mod control;
pub mod read;
pub mod set;
pub mod simple;
pub mod trap;
pub mod type_cmd;
pub mod variables;
pub mod wait;

use common::{Result, Runner};
use psh_env::{semantics::Field, ShellState};

/// Signature every built-in's `main` function implements.
pub type Main = fn(&mut ShellState, Vec<Field>, Runner) -> Result;

/// Looks up a built-in by its command name. Returns `None` for anything not
/// implemented here, which the executor then searches for as a function or
/// on `$PATH`.
#[must_use]
pub fn lookup(name: &str) -> Option<Main> {
    Some(match name {
        ":" => simple::colon,
        "true" => simple::r#true,
        "false" => simple::r#false,
        "echo" => simple::echo,
        "printf" => simple::printf,
        "cd" => cd::cd,
        "pwd" => cd::pwd,
        "export" => variables::export,
        "unset" => variables::unset,
        "readonly" => variables::readonly,
        "declare" | "typeset" => variables::declare,
        "local" => variables::local,
        "shift" => variables::shift,
        "exit" => control::exit,
        "return" => control::r#return,
        "break" => control::r#break,
        "continue" => control::r#continue,
        "eval" => control::eval,
        "." | "source" => control::source,
        "exec" => control::exec,
        "read" => read::read,
        "set" => set::set,
        "trap" => trap::trap,
        "wait" => wait::wait,
        "type" => type_cmd::r#type,
        _ => return None,
    })
}

/// Every built-in name recognized by [`lookup`], for `command -v`/`type`'s
/// completeness and for the expander's "is this word a builtin" checks that
/// don't need the full dispatch (e.g. deciding `is_assignment` eligibility
/// for `declare`/`export`/`local`/`readonly`, per the expander's
/// assignment-word rule).
#[must_use]
pub fn names() -> &'static [&'static str] {
    &[
        ":", "true", "false", "echo", "printf", "cd", "pwd", "export", "unset", "readonly",
        "declare", "typeset", "local", "shift", "exit", "return", "break", "continue", "eval",
        ".", "source", "exec", "read", "set", "trap", "wait", "type",
    ]
}

/// Built-ins whose unquoted operands of the form `NAME=value` must not be
/// word-split on assignment, per §4.3's assignment-word subtlety.
#[must_use]
pub fn treats_operands_as_assignments(name: &str) -> bool {
    matches!(name, "export" | "declare" | "typeset" | "local" | "readonly")
}
