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

//! Shell execution state: variable scopes, options, traps, and jobs.
//!
//! This crate owns the data [`ShellState`] that every other subsystem
//! (expander, executor, builtins) reads, and that only the expander and
//! executor write. It knows nothing about lexing, parsing, or process
//! spawning; it is pure bookkeeping.

pub mod job;
pub mod options;
pub mod scope;
pub mod semantics;
mod state;
pub mod trap;
pub mod variable;

pub use scope::{AssignError, VariableScope, VariableSet};
pub use semantics::{Divert, ExitStatus, Field};
pub use state::{Function, ShellState};
pub use variable::{Attributes, Value, Variable};
