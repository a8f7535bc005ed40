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

//! Source locations.
//!
//! Every token, and every AST node built from tokens, carries a [`Location`]
//! so that lexer, parser, and expansion errors can point at the exact
//! byte range in the original source that caused them.

use std::fmt;
use std::rc::Rc;

/// Where a piece of source code came from.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Source {
    /// Source read from a named script file.
    ScriptFile { path: Rc<str> },
    /// Source read from a command substitution or arithmetic expansion.
    ///
    /// `original` is the location of the expansion in the enclosing source.
    Nested { original: Box<Location> },
    /// Source with no further description (used by tests and `FromStr`).
    Unknown,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::ScriptFile { path } => write!(f, "{path}"),
            Source::Nested { original } => write!(f, "{}", original.source),
            Source::Unknown => write!(f, "<unknown>"),
        }
    }
}

/// A byte range in a piece of source code, with line and column of its start.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Location {
    /// Where the source code came from.
    pub source: Rc<Source>,
    /// Byte range of the token or node within the source string.
    pub range: std::ops::Range<usize>,
    /// 1-based line number of the start of `range`.
    pub line: u32,
    /// 1-based column number (in characters) of the start of `range`.
    pub column: u32,
}

impl Location {
    /// Returns a location with an unknown source, mainly for tests.
    #[must_use]
    pub fn dummy(range: std::ops::Range<usize>) -> Self {
        Location {
            source: Rc::new(Source::Unknown),
            range,
            line: 1,
            column: 1,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.source, self.line, self.column)
    }
}
