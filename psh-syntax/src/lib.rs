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

//! Lexer, parser, and abstract syntax tree for shell scripts.
//!
//! This crate turns a source string into a [`syntax::List`]: it does not
//! know how to run anything. [`parse_script`] ties the lexer and parser
//! together for the common case; [`lexer`] and [`parser`] are exposed
//! separately for callers (an interactive line reader, for instance) that
//! need to drive tokenization and parsing themselves.

pub mod lexer;
pub mod parser;
pub mod source;
pub mod syntax;
mod token;

pub use lexer::{LexerConfig, LexerError};
pub use parser::ParseError;
pub use source::{Location, Source};
pub use token::{Position, Token, TokenType};

use std::rc::Rc;

/// Lexes and parses `source` in one step, using [`Source::Unknown`].
///
/// Callers that need accurate error locations for a named file should call
/// [`lexer::tokenize`] and [`parser::parse`] directly with their own
/// [`Source`].
pub fn parse_script(source: &str, config: LexerConfig) -> Result<syntax::List, Error> {
    let (tokens, heredocs) = lexer::tokenize(source, config)?;
    let list = parser::parse(&tokens, &heredocs, Rc::new(Source::Unknown))?;
    Ok(list)
}

/// Either stage of the lexer/parser pipeline can fail.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Lexer(#[from] LexerError),
    #[error(transparent)]
    Parser(#[from] ParseError),
}
