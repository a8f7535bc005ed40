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

//! Abstract syntax tree for shell scripts.
//!
//! The types in this module mirror the shell grammar fairly directly. The
//! central invariant is that every [`WordUnit`] records the quote context it
//! was written in (unquoted, single-quoted, double-quoted, or `$'...'`
//! quoted); expansion correctness depends entirely on this being preserved
//! from lexing all the way to the expander.

use crate::source::Location;
use std::cell::OnceCell;
use std::os::unix::io::RawFd;
use std::rc::Rc;

/// Special parameters such as `$@`, `$#`, `$?`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SpecialParam {
    /// `$@`
    At,
    /// `$*`
    Asterisk,
    /// `$#`
    Hash,
    /// `$?`
    Question,
    /// `$-`
    Hyphen,
    /// `$$`
    Dollar,
    /// `$!`
    Bang,
    /// `$0`
    Zero,
}

/// What kind of parameter a [`Param`] refers to.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ParamType {
    /// Named variable, e.g. `foo` in `$foo`
    Variable,
    /// One of the special parameters
    Special(SpecialParam),
    /// A positional parameter, e.g. `12` in `$12`
    ///
    /// Indices are 1-based; index `0` never refers to an actual parameter.
    Positional(usize),
}

/// Parameter referenced by a parameter expansion.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Param {
    /// Literal name as written in the source, e.g. `foo`, `@`, `12`.
    pub id: String,
    /// Precomputed classification of `id`.
    pub r#type: ParamType,
    /// Array subscript, if the parameter was written as `name[index]`.
    pub index: Option<Box<Word>>,
    /// Whether the name was prefixed with `!` to request indirect expansion
    /// (`${!name}`, which expands to the value of the variable *named by*
    /// the value of `name`).
    pub indirect: bool,
}

impl Param {
    /// Constructs a plain variable reference with no index or indirection.
    #[must_use]
    pub fn variable(id: impl Into<String>) -> Self {
        Param {
            id: id.into(),
            r#type: ParamType::Variable,
            index: None,
            indirect: false,
        }
    }
}

/// `+`, `-`, `=`, or `?` suffix of a braced parameter expansion.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SwitchType {
    /// `${v+word}` / `${v:+word}`: substitute `word` if set
    Alter,
    /// `${v-word}` / `${v:-word}`: substitute `word` if unset (default)
    Default,
    /// `${v=word}` / `${v:=word}`: assign and substitute `word` if unset
    Assign,
    /// `${v?word}` / `${v:?word}`: error out with `word` if unset
    Error,
}

/// Whether a [`Switch`] also triggers on an empty (as opposed to merely
/// unset) value.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SwitchCondition {
    /// No `:` prefix: triggers only when the parameter is unset.
    Unset,
    /// `:` prefix: triggers when the parameter is unset or empty.
    UnsetOrEmpty,
}

/// `${v:-word}` and friends.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Switch {
    pub r#type: SwitchType,
    pub condition: SwitchCondition,
    pub word: Word,
}

/// `#` or `%` side of a [`Trim`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TrimSide {
    /// `#`/`##`: trim a prefix
    Prefix,
    /// `%`/`%%`: trim a suffix
    Suffix,
}

/// Whether a [`Trim`] removes the shortest or longest matching substring.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TrimLength {
    /// `#`/`%`: shortest match
    Shortest,
    /// `##`/`%%`: longest match
    Longest,
}

/// `${v#pattern}` and friends.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Trim {
    pub side: TrimSide,
    pub length: TrimLength,
    pub pattern: Word,
}

/// `${v/pattern/replacement}` and `${v//pattern/replacement}`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Substitution {
    /// Whether every match is replaced (`//`) or only the first (`/`).
    pub all: bool,
    pub pattern: Word,
    /// Absent for `${v/pattern}` (delete matches instead of replacing).
    pub replacement: Option<Word>,
}

/// `${v:offset}` / `${v:offset:length}`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Slice {
    pub offset: Word,
    pub length: Option<Word>,
}

/// Upper/lower case conversion requested by `^`, `^^`, `,`, `,,`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CaseConv {
    /// `^`/`^^`: convert to upper case
    Upper,
    /// `,`/`,,`: convert to lower case
    Lower,
}

/// Modification applied to a parameter's value in a braced expansion.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Modifier {
    /// `${v}`: no modification
    None,
    /// `${#v}`: length of the value
    Length,
    /// `${v-x}`, `${v:-x}`, etc.
    Switch(Switch),
    /// `${v#x}`, `${v##x}`, `${v%x}`, `${v%%x}`
    Trim(Trim),
    /// `${v/x/y}`, `${v//x/y}`
    Substitution(Substitution),
    /// `${v:o:l}`
    Slice(Slice),
    /// `${v^}`, `${v^^}`, `${v,}`, `${v,,}`
    CaseConv {
        conv: CaseConv,
        /// `true` for the doubled form (`^^`/`,,`), converting every
        /// character rather than just the first.
        whole: bool,
    },
    /// `${!prefix*}` / `${!prefix@}`: names of variables starting with `prefix`
    PrefixNames {
        /// `true` for `@` (each name a separate field when unquoted)
        at: bool,
    },
}

/// Parameter expansion enclosed in braces, e.g. `${foo:-bar}`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BracedParam {
    pub param: Param,
    pub modifier: Modifier,
    pub location: Location,
}

/// Single character appearing in a backquoted command substitution.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BackquoteUnit {
    /// Literal single character
    Literal(char),
    /// Character immediately preceded by a backslash
    Backslashed(char),
}

/// Element of a double-quotable [`Text`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TextUnit {
    /// Literal single character
    Literal(char),
    /// Character immediately preceded by a backslash
    Backslashed(char),
    /// Parameter expansion not enclosed in braces, e.g. `$foo`
    RawParam { param: Param, location: Location },
    /// Parameter expansion enclosed in braces, e.g. `${foo}`
    BracedParam(BracedParam),
    /// `$(...)` command substitution
    CommandSubst { content: String, location: Location },
    /// `` `...` `` command substitution
    Backquote {
        content: Vec<BackquoteUnit>,
        location: Location,
    },
    /// `$((...))` arithmetic expansion
    Arith { content: String, location: Location },
}

/// Sequence of [`TextUnit`]s, the content of a double-quoted string.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Text(pub Vec<TextUnit>);

/// Element of an [`EscapedString`], the content of a `$'...'` string.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EscapeUnit {
    /// Character that was not part of a recognized escape sequence
    Literal(char),
    /// Character produced by resolving a backslash escape sequence
    Escaped(char),
}

/// Sequence of [`EscapeUnit`]s, the content of a `$'...'` string.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct EscapedString(pub Vec<EscapeUnit>);

/// Direction of a [process substitution](WordUnit::ProcessSubst).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProcessSubstDirection {
    /// `<(...)`: the child's stdout is readable through the substituted path
    In,
    /// `>(...)`: the child's stdin is writable through the substituted path
    Out,
}

/// Element of a [`Word`], tagged with the quoting it appeared under.
///
/// This is the crux of correct expansion: single-quoted text is never
/// expanded or split, double-quoted text is expanded but never split or
/// globbed, and unquoted text goes through the full pipeline.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum WordUnit {
    /// Unquoted [`TextUnit`]
    Unquoted(TextUnit),
    /// Text surrounded by a pair of single quotes
    SingleQuote(String),
    /// Text surrounded by a pair of double quotes
    DoubleQuote(Text),
    /// Text surrounded by `$'...'`
    DollarSingleQuote(EscapedString),
    /// Tilde expansion; the string does not include the leading `~`
    Tilde(String),
    /// `<(...)` or `>(...)` process substitution
    ProcessSubst {
        direction: ProcessSubstDirection,
        content: String,
        location: Location,
    },
}

pub use WordUnit::*;

/// Shell word: an ordered sequence of quote-tagged parts.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Word {
    pub units: Vec<WordUnit>,
    pub location: Location,
}

impl Word {
    /// Returns the word's content if it consists of nothing but unquoted,
    /// unescaped literal characters (no expansion of any kind).
    #[must_use]
    pub fn to_string_if_literal(&self) -> Option<String> {
        let mut s = String::new();
        for unit in &self.units {
            match unit {
                Unquoted(TextUnit::Literal(c)) => s.push(*c),
                _ => return None,
            }
        }
        Some(s)
    }
}

/// Value assigned to a variable.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Value {
    /// Scalar value, a possibly empty word
    Scalar(Word),
    /// Array value, e.g. `(a b c)`
    Array(Vec<Word>),
}

/// `NAME=value` assignment.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Assign {
    pub name: String,
    pub value: Value,
    pub location: Location,
}

/// Wrapped file descriptor, mainly to give it a `Display` impl distinct from
/// a bare integer.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Fd(pub RawFd);

impl Fd {
    pub const STDIN: Fd = Fd(0);
    pub const STDOUT: Fd = Fd(1);
}

/// Kind of [`Redir`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RedirOp {
    /// `<file`
    FileIn,
    /// `>file`
    FileOut,
    /// `>>file`
    FileAppend,
    /// `<>file`
    FileInOut,
    /// `>|file`: like `FileOut` but overrides `noclobber`
    FileClobber,
    /// `<&fd`
    FdIn,
    /// `>&fd`
    FdOut,
    /// `<<delim`
    HereDoc,
    /// `<<-delim`
    HereDocDash,
    /// `<<<word`
    HereString,
    /// `<&-`
    CloseIn,
    /// `>&-`
    CloseOut,
}

impl RedirOp {
    /// Default left-hand file descriptor when none is written explicitly.
    #[must_use]
    pub fn default_fd(self) -> Fd {
        use RedirOp::*;
        match self {
            FileIn | FileInOut | FdIn | HereDoc | HereDocDash | HereString | CloseIn => Fd::STDIN,
            FileOut | FileAppend | FileClobber | FdOut | CloseOut => Fd::STDOUT,
        }
    }
}

/// Body of a heredoc (`<<`/`<<-`), filled in once the lexer has collected it.
///
/// The delimiter is known at parse time; the content is not available until
/// the lexer reaches the end of the heredoc body, possibly several lines
/// later, so it is attached through a [`OnceCell`] after the rest of the
/// command has been parsed.
#[derive(Debug)]
pub struct HereDoc {
    /// Delimiter word as written after `<<`/`<<-`
    pub delimiter: Word,
    /// Whether the delimiter was quoted, which suppresses expansion of the body
    pub delimiter_quoted: bool,
    /// Whether leading tabs are stripped from each body line (`<<-`)
    pub remove_tabs: bool,
    /// Body content, filled in after the lexer finishes collecting it
    pub content: OnceCell<Text>,
}

impl PartialEq for HereDoc {
    fn eq(&self, other: &Self) -> bool {
        self.delimiter == other.delimiter
            && self.delimiter_quoted == other.delimiter_quoted
            && self.remove_tabs == other.remove_tabs
            && self.content.get() == other.content.get()
    }
}
impl Eq for HereDoc {}

/// What a [`Redir`] does.
#[derive(Debug)]
pub enum RedirBody {
    /// Ordinary redirection with a word operand
    Normal { operand: Word },
    /// Heredoc redirection
    HereDoc(Rc<HereDoc>),
}

impl PartialEq for RedirBody {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (RedirBody::Normal { operand: a }, RedirBody::Normal { operand: b }) => a == b,
            (RedirBody::HereDoc(a), RedirBody::HereDoc(b)) => a == b,
            _ => false,
        }
    }
}
impl Eq for RedirBody {}

/// Single redirection attached to a command.
#[derive(Debug, Eq, PartialEq)]
pub struct Redir {
    /// Explicit left-hand file descriptor, e.g. the `2` in `2>file`
    pub fd: Option<Fd>,
    pub op: RedirOp,
    pub body: RedirBody,
}

impl Redir {
    /// The file descriptor this redirection applies to: `fd` if given,
    /// otherwise [`RedirOp::default_fd`].
    #[must_use]
    pub fn fd_or_default(&self) -> Fd {
        self.fd.unwrap_or(self.op.default_fd())
    }
}

/// How a word expands for the purposes of a simple command's argument list.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ExpansionMode {
    /// Expand the word to a single field (used for assignment values)
    Single,
    /// Expand the word to zero or more fields
    Multiple,
}

/// Command consisting of assignments, a command name and arguments, and redirections.
///
/// A syntactically valid simple command has at least one of these three.
#[derive(Debug, Default, Eq, PartialEq)]
pub struct SimpleCommand {
    pub assigns: Vec<Assign>,
    pub words: Vec<(Word, ExpansionMode)>,
    pub redirs: Vec<Redir>,
}

impl SimpleCommand {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.assigns.is_empty() && self.words.is_empty() && self.redirs.is_empty()
    }
}

/// `elif ... then ...` clause of an `if` command.
#[derive(Debug, Eq, PartialEq)]
pub struct ElifThen {
    pub condition: List,
    pub body: List,
}

/// What follows the body of a [`CaseItem`].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum CaseContinuation {
    /// `;;`: stop matching, end the case construct
    #[default]
    Break,
    /// `;&`: run the next item's body unconditionally, without matching its patterns
    FallThrough,
    /// `;;&`: stop running bodies, but resume pattern matching at the next item
    Continue,
}

/// One `pattern) body ;;` branch of a `case` construct.
#[derive(Debug, Eq, PartialEq)]
pub struct CaseItem {
    /// At least one pattern; the first one that matches wins.
    pub patterns: Vec<Word>,
    pub body: List,
    pub continuation: CaseContinuation,
}

/// Command that contains other commands.
#[derive(Debug, Eq, PartialEq)]
pub enum CompoundCommand {
    /// `{ list; }`
    Grouping(List),
    /// `(list)`
    Subshell { body: Rc<List>, location: Location },
    /// `for name [in words]; do body; done`
    For {
        name: Word,
        values: Option<Vec<Word>>,
        body: List,
    },
    /// `for ((init; cond; update)); do body; done`
    CStyleFor {
        init: Option<String>,
        condition: Option<String>,
        update: Option<String>,
        body: List,
    },
    /// `select name [in words]; do body; done`
    Select {
        name: Word,
        values: Option<Vec<Word>>,
        body: List,
    },
    /// `while cond; do body; done`
    While { condition: List, body: List },
    /// `until cond; do body; done`
    Until { condition: List, body: List },
    /// `if cond; then body; [elif cond; then body;]... [else body;] fi`
    If {
        condition: List,
        body: List,
        elifs: Vec<ElifThen>,
        r#else: Option<List>,
    },
    /// `case word in items esac`
    Case { subject: Word, items: Vec<CaseItem> },
    /// `break [n]`
    Break { level: Option<Word> },
    /// `continue [n]`
    Continue { level: Option<Word> },
    /// `((expr))`
    Arith { expr: String, location: Location },
}

/// Compound command together with its redirections.
#[derive(Debug, Eq, PartialEq)]
pub struct FullCompoundCommand {
    pub command: CompoundCommand,
    pub redirs: Vec<Redir>,
}

/// `name() body` / `function name body` / `function name() body`.
#[derive(Debug, Eq, PartialEq)]
pub struct FunctionDefinition {
    /// Whether the `function` reserved word introduced the definition
    pub has_keyword: bool,
    pub name: Word,
    pub body: Rc<FullCompoundCommand>,
}

/// One element of a [`Pipeline`].
#[derive(Debug, Eq, PartialEq)]
pub enum Command {
    Simple(SimpleCommand),
    Compound(FullCompoundCommand),
    Function(FunctionDefinition),
}

/// Commands connected by `|`.
#[derive(Debug, Eq, PartialEq)]
pub struct Pipeline {
    /// At least one command. Wrapped in `Rc` so stages can be forked off to
    /// run concurrently without cloning the AST.
    pub commands: Vec<Rc<Command>>,
    /// Whether the pipeline is prefixed with `!`
    pub negation: bool,
}

/// `&&` or `||` joining two [`Pipeline`]s.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AndOr {
    AndThen,
    OrElse,
}

/// Pipelines joined by `&&`/`||`, evaluated left to right with short-circuiting.
#[derive(Debug, Eq, PartialEq)]
pub struct AndOrList {
    pub first: Pipeline,
    pub rest: Vec<(AndOr, Pipeline)>,
}

/// One element of a [`List`].
#[derive(Debug, Eq, PartialEq)]
pub struct Item {
    /// Wrapped in `Rc` so a backgrounded item can be executed without
    /// cloning the AST.
    pub and_or: Rc<AndOrList>,
    /// Location of the `&` operator, if the item is to be run in the background
    pub async_flag: Option<Location>,
}

/// Sequence of [`AndOrList`]s separated by `;`, `&`, or a newline.
#[derive(Debug, Default, Eq, PartialEq)]
pub struct List(pub Vec<Item>);
