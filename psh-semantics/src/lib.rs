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

//! Word expansion and AST execution: the part of the shell that turns a
//! parsed [`psh_syntax::syntax::List`] into actual behavior against a
//! [`psh_env::ShellState`].
//!
//! [`runner::run_command`] and [`runner::run_script_file`] are the two
//! entry points external callers (a REPL, a script runner) use; everything
//! else in this crate is reached through them.

mod arith_env;
pub mod assign;
pub mod command;
pub mod command_search;
pub mod error;
pub mod expansion;
pub mod job;
pub mod pipeline;
pub mod redir;
pub mod runner;
pub mod trap;
pub mod xtrace;

pub use error::ExpansionError;
pub use runner::{run_command, run_script_file, Runner};
