// This file is part of psh, a POSIX-flavored shell.
// Copyright (C) 2022 WATANABE Yuki

//! This crate provides the `fnmatch` function that performs pattern matching
//! based on a globbing pattern.
//!
//! This implementation supports the following syntax in patterns:
//!
//! - Any single character (`?`)
//! - Any character sequence (`*`)
//! - Bracket expression (`[...]`)
//!     - Character literals
//!     - Character ranges (e.g. `a-z`)
//!     - Complement (`[!...]`)
//!     - Collating symbols (e.g. `[.ch.]`)
//!     - Equivalence classes (e.g. `[=a=]`)
//!     - Character classes (`[:alpha:]`)
//!
//! The current implementation does not support any locale-specific
//! characteristics. Especially, collating symbols and equivalent classes only
//! match the specified character sequence itself, and character classes only
//! match ASCII characters.
//!
//! This crate is very similar to the [`fnmatch-regex`] crate in that the both
//! perform matching by converting the pattern to a regular expression. The
//! `psh-fnmatch` crate tries to support the POSIX specification as much as
//! possible rather than introducing unique (non-portable) functionalities.
//!
//! [`fnmatch-regex`]: https://crates.io/crates/fnmatch-regex

pub mod ast;
mod char_iter;

pub use char_iter::{PatternChar, WithEscape, WithoutEscape, with_escape, without_escape};

use self::ast::Ast;
use regex::Regex;
use std::ops::Deref;
use thiserror::Error;

/// Error that may happen in parsing or compiling a pattern
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum Error {
    /// A bracket expression contains no characters (`[]`).
    #[error("empty bracket expression")]
    EmptyBracket,
    /// A collating symbol or equivalence class names no character (`[..]`).
    #[error("empty collating symbol")]
    EmptyCollatingSymbol,
    /// A character class name is not defined, e.g. `[:foo:]`.
    #[error("undefined character class: {0}")]
    UndefinedCharClass(String),
    /// A character class appears as the endpoint of a bracket range, e.g.
    /// `[[:alpha:]-z]`.
    #[error("character class cannot be used in a range: {0}")]
    CharClassInRange(String),
    /// The converted regular expression failed to compile.
    #[error("invalid pattern: {0}")]
    InvalidRegex(String),
}

/// Configuration of pattern matching behavior
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Config {
    /// Whether matching should be case-insensitive
    pub case_sensitive: bool,
    /// Whether the pattern must match from the beginning of the string
    pub anchor_begin: bool,
    /// Whether the pattern must match to the end of the string
    pub anchor_end: bool,
}

impl Config {
    /// Returns a configuration that anchors the pattern at both ends, which
    /// is what shell globbing and `case` pattern matching require.
    #[must_use]
    pub fn anchored() -> Self {
        Config {
            case_sensitive: true,
            anchor_begin: true,
            anchor_end: true,
        }
    }
}

/// Compiled glob pattern
///
/// A `Pattern` wraps a compiled [`Regex`] that implements POSIX-style
/// globbing semantics. Use [`Pattern::parse`] to compile a pattern string,
/// then [`Pattern::is_match`] to test a candidate string.
#[derive(Clone, Debug)]
pub struct Pattern {
    ast: Ast,
    regex: Regex,
}

impl Pattern {
    /// Parses and compiles a pattern from an iterator of [`PatternChar`]s.
    pub fn parse<I>(pattern: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = PatternChar>,
        <I as IntoIterator>::IntoIter: Clone,
    {
        Self::parse_with_config(pattern, Config::anchored())
    }

    /// Parses and compiles a pattern with an explicit [`Config`].
    pub fn parse_with_config<I>(pattern: I, config: Config) -> Result<Self, Error>
    where
        I: IntoIterator<Item = PatternChar>,
        <I as IntoIterator>::IntoIter: Clone,
    {
        let ast = Ast::new(pattern)?;
        let source = ast.to_regex(&config)?;
        let regex = regex::RegexBuilder::new(&source)
            .case_insensitive(!config.case_sensitive)
            .dot_matches_new_line(true)
            .build()
            .map_err(|e| Error::InvalidRegex(e.to_string()))?;
        Ok(Pattern { ast, regex })
    }

    /// Returns whether the whole of `text` matches this pattern.
    #[must_use]
    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    /// Returns the length, in bytes, of the longest prefix of `text` that
    /// matches this pattern, if any.
    ///
    /// This is used to implement the `${v#pattern}`/`${v%pattern}` family of
    /// parameter expansion trims, which require leftmost-longest and
    /// leftmost-shortest prefix/suffix matches rather than whole-string
    /// matches.
    #[must_use]
    pub fn find_prefix(&self, text: &str, longest: bool) -> Option<usize> {
        find_anchored(&self.ast, text, AnchorSide::Prefix, longest)
    }

    /// Returns the byte offset at which the longest (or shortest) suffix of
    /// `text` matching this pattern begins, if any.
    #[must_use]
    pub fn find_suffix(&self, text: &str, longest: bool) -> Option<usize> {
        find_anchored(&self.ast, text, AnchorSide::Suffix, longest)
    }

    /// Returns the underlying AST, mainly for testing and introspection.
    #[must_use]
    pub fn ast(&self) -> &Ast {
        &self.ast
    }
}

impl Deref for Pattern {
    type Target = Regex;
    fn deref(&self) -> &Regex {
        &self.regex
    }
}

#[derive(Clone, Copy, Eq, PartialEq)]
enum AnchorSide {
    Prefix,
    Suffix,
}

/// Finds the boundary of the longest/shortest match anchored at one end of
/// `text`, by re-running the (unanchored-on-the-far-side) pattern against
/// each candidate boundary. This brute-force approach mirrors the reference
/// shell's behavior and is adequate for the short strings parameter
/// expansion typically deals with.
fn find_anchored(ast: &Ast, text: &str, side: AnchorSide, longest: bool) -> Option<usize> {
    let config = Config {
        case_sensitive: true,
        anchor_begin: true,
        anchor_end: true,
    };
    let source = ast.to_regex(&config).ok()?;
    let regex = Regex::new(&source).ok()?;

    let boundaries: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();

    let candidates: Box<dyn Iterator<Item = usize>> = match side {
        AnchorSide::Prefix => {
            if longest {
                Box::new(boundaries.into_iter().rev())
            } else {
                Box::new(boundaries.into_iter())
            }
        }
        AnchorSide::Suffix => {
            if longest {
                Box::new(boundaries.into_iter())
            } else {
                Box::new(boundaries.into_iter().rev())
            }
        }
    };

    for b in candidates {
        let candidate = match side {
            AnchorSide::Prefix => &text[..b],
            AnchorSide::Suffix => &text[b..],
        };
        if regex.is_match(candidate) {
            return Some(b);
        }
    }
    None
}

/// Tests whether `text` matches `pattern`, treating backslash as an escape
/// character in the pattern (see [`with_escape`]).
pub fn fnmatch(pattern: &str, text: &str) -> Result<bool, Error> {
    let p = Pattern::parse(with_escape(pattern))?;
    Ok(p.is_match(text))
}
