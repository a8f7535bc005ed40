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

//! Tokenization: turns a source byte string into a token stream.
//!
//! The lexer runs as a single forward scan over the source, tracking just
//! enough state ([`LexerContext`]) to resolve the handful of context
//! sensitive ambiguities POSIX shell syntax is full of: whether `[` starts a
//! test command or is part of a case pattern glob, whether `{`/`}` are
//! brace-group operators or ordinary word characters, and so on.

use crate::token::{Position, Token, TokenType};
use std::collections::HashMap;
use thiserror::Error;

/// Which kind of quoting is currently open, innermost last.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum QuoteKind {
    Single,
    Double,
    /// `$'...'`
    Ansi,
}

/// State threaded through the scan to disambiguate context-sensitive tokens.
#[derive(Clone, Debug, Default)]
pub struct LexerContext {
    pub paren_depth: u32,
    pub bracket_depth: u32,
    pub brace_depth: u32,
    pub arithmetic_depth: u32,
    pub command_position: bool,
    pub case_depth: u32,
    pub case_expecting_in: bool,
    pub in_case_pattern: bool,
    quote_stack: Vec<QuoteKind>,
}

impl LexerContext {
    fn new() -> Self {
        LexerContext {
            command_position: true,
            ..LexerContext::default()
        }
    }

    fn in_quotes(&self) -> bool {
        !self.quote_stack.is_empty()
    }
}

/// Lexer behavior that differs between reading a whole script and reading
/// one line at a time from an interactive terminal.
#[derive(Clone, Copy, Debug)]
pub struct LexerConfig {
    /// Interactive mode recovers from a bad byte sequence instead of aborting.
    pub interactive: bool,
    /// Whether `extglob`-style patterns (`@(...)`, `+(...)`, ...) are recognized.
    pub extglob: bool,
}

impl Default for LexerConfig {
    fn default() -> Self {
        LexerConfig {
            interactive: false,
            extglob: false,
        }
    }
}

/// A heredoc body collected by the lexer, keyed by delimiter.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HeredocBody {
    pub quoted: bool,
    pub content: String,
}

/// Delimiter → body, filled in as `<<`/`<<-` bodies are collected.
pub type HeredocMap = HashMap<String, HeredocBody>;

#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum LexerError {
    #[error("unterminated single quote starting at {0}")]
    UnterminatedSingleQuote(Position),
    #[error("unterminated double quote starting at {0}")]
    UnterminatedDoubleQuote(Position),
    #[error("unterminated {1} starting at {0}")]
    UnterminatedExpansion(Position, &'static str),
    #[error("unterminated heredoc for delimiter {1:?} starting at {0}")]
    UnterminatedHereDoc(Position, String),
    #[error("`;;` outside a case item at {0}")]
    SemiSemiOutsideCase(Position),
    #[error("invalid byte sequence at {0}")]
    InvalidByte(Position),
}

struct Lexer<'s> {
    source: &'s str,
    bytes: &'s [u8],
    pos: usize,
    line: u32,
    column: u32,
    context: LexerContext,
    config: LexerConfig,
    tokens: Vec<Token>,
    heredocs: HeredocMap,
    /// Delimiters awaiting collection once the current logical line ends.
    pending_heredocs: Vec<(String, bool, bool)>,
    /// Byte offset just past the previously emitted token, used to detect adjacency.
    last_token_end: Option<usize>,
    /// Set right after a `<<`/`<<-` operator is pushed, so the very next
    /// word token is recognized as its heredoc delimiter.
    expecting_heredoc_delimiter: bool,
}

/// Tokenizes `source`, returning the token stream (always `EOF`-terminated)
/// and the heredoc bodies collected along the way.
pub fn tokenize(source: &str, config: LexerConfig) -> Result<(Vec<Token>, HeredocMap), LexerError> {
    let mut lexer = Lexer {
        source,
        bytes: source.as_bytes(),
        pos: 0,
        line: 1,
        column: 1,
        context: LexerContext::new(),
        config,
        tokens: Vec::new(),
        heredocs: HeredocMap::new(),
        pending_heredocs: Vec::new(),
        last_token_end: None,
        expecting_heredoc_delimiter: false,
    };
    lexer.run()?;
    normalize_keywords(&mut lexer.tokens);
    validate_tokens(&lexer.tokens)?;
    Ok((lexer.tokens, lexer.heredocs))
}

impl<'s> Lexer<'s> {
    fn position(&self) -> Position {
        Position {
            line: self.line,
            column: self.column,
            offset: self.pos,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        if b == b'\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(b)
    }

    fn starts_with(&self, s: &str) -> bool {
        self.source[self.pos..].starts_with(s)
    }

    fn run(&mut self) -> Result<(), LexerError> {
        loop {
            self.skip_blanks();
            let Some(b) = self.peek() else { break };

            if b == b'#' && !self.context.in_quotes() {
                while let Some(c) = self.peek() {
                    if c == b'\n' {
                        break;
                    }
                    self.advance();
                }
                continue;
            }

            if b == b'\n' {
                self.collect_pending_heredocs()?;
                let start = self.position();
                self.advance();
                self.push(TokenType::Newline, "\n", start);
                self.context.command_position = true;
                continue;
            }

            if let Some(()) = self.try_operator()? {
                continue;
            }

            self.scan_word()?;
        }
        self.collect_pending_heredocs()?;
        let eof_pos = self.position();
        self.tokens.push(Token::eof(eof_pos));
        Ok(())
    }

    fn skip_blanks(&mut self) {
        while matches!(self.peek(), Some(b' ') | Some(b'\t')) {
            self.advance();
        }
    }

    fn push(&mut self, r#type: TokenType, value: impl Into<String>, start: Position) {
        let mut token = Token::new(r#type, value, start);
        token.adjacent_to_previous = self.last_token_end == Some(start.offset);
        self.last_token_end = Some(self.pos);
        self.after_token(&token);
        self.tokens.push(token);

        if matches!(
            self.tokens.last().map(|t| t.r#type),
            Some(TokenType::DLess) | Some(TokenType::DLessDash)
        ) {
            self.expecting_heredoc_delimiter = true;
        } else if self.expecting_heredoc_delimiter {
            self.expecting_heredoc_delimiter = false;
            if let Some(tok) = self.tokens.last() {
                let quoted = tok.value.contains(['\'', '"', '\\']);
                let strip_tabs = self
                    .tokens
                    .iter()
                    .rev()
                    .nth(1)
                    .is_some_and(|t| t.r#type == TokenType::DLessDash);
                let unquoted_delim = unquote_literally(&tok.value);
                self.pending_heredocs
                    .push((unquoted_delim, quoted, strip_tabs));
            }
        }
    }

    /// Updates `command_position` and case-pattern tracking after a token is emitted.
    fn after_token(&mut self, token: &Token) {
        use TokenType::*;
        self.context.command_position = matches!(
            token.r#type,
            Newline | Semicolon | Amp | Pipe | AndAnd | OrOr | LParen | LBrace
        ) || TokenType::keyword_from_str(&token.value).is_some()
            || matches!(token.r#type, In) && self.context.case_depth > 0;

        match token.r#type {
            Case => {
                self.context.case_depth += 1;
                self.context.case_expecting_in = true;
            }
            In if self.context.case_expecting_in => {
                self.context.case_expecting_in = false;
                self.context.in_case_pattern = true;
            }
            RParen if self.context.in_case_pattern => {
                self.context.in_case_pattern = false;
            }
            SemiSemi | SemiAmp | SemiSemiAmp => {
                self.context.in_case_pattern = true;
            }
            Esac => {
                self.context.case_depth = self.context.case_depth.saturating_sub(1);
                self.context.in_case_pattern = false;
            }
            _ => {}
        }
    }

    fn try_operator(&mut self) -> Result<Option<()>, LexerError> {
        let start = self.position();
        let two = |s: &Self, op: &str| s.starts_with(op);

        macro_rules! op {
            ($text:expr, $type:expr) => {{
                for _ in 0..$text.len() {
                    self.advance();
                }
                self.push($type, $text, start);
                return Ok(Some(()));
            }};
        }

        if two(self, "<<-") {
            op!("<<-", TokenType::DLessDash);
        }
        if two(self, "<<<") {
            op!("<<<", TokenType::TLess);
        }
        if two(self, "<<") {
            op!("<<", TokenType::DLess);
        }
        if two(self, "<&") {
            op!("<&", TokenType::LessAnd);
        }
        if self.context.arithmetic_depth == 0 && two(self, "<(") {
            return self.scan_process_subst(start, TokenType::ProcessSubIn).map(Some);
        }
        if two(self, "<") {
            op!("<", TokenType::Less);
        }
        if two(self, ">>") {
            op!(">>", TokenType::DGreat);
        }
        if two(self, ">&") {
            op!(">&", TokenType::GreatAnd);
        }
        if two(self, ">|") {
            op!(">|", TokenType::Great);
        }
        if self.context.arithmetic_depth == 0 && two(self, ">(") {
            return self.scan_process_subst(start, TokenType::ProcessSubOut).map(Some);
        }
        if two(self, ">") {
            op!(">", TokenType::Great);
        }
        if two(self, "&&") {
            op!("&&", TokenType::AndAnd);
        }
        if two(self, "&") {
            op!("&", TokenType::Amp);
        }
        if two(self, "||") {
            op!("||", TokenType::OrOr);
        }
        if two(self, "|") {
            op!("|", TokenType::Pipe);
        }
        if two(self, ";;&") {
            op!(";;&", TokenType::SemiSemiAmp);
        }
        if two(self, ";;") {
            op!(";;", TokenType::SemiSemi);
        }
        if two(self, ";&") {
            op!(";&", TokenType::SemiAmp);
        }
        if two(self, ";") {
            op!(";", TokenType::Semicolon);
        }
        if two(self, "((") && self.context.command_position {
            self.scan_arith_command(start)?;
            return Ok(Some(()));
        }
        if two(self, "(") {
            self.context.paren_depth += 1;
            op!("(", TokenType::LParen);
        }
        if two(self, ")") {
            self.context.paren_depth = self.context.paren_depth.saturating_sub(1);
            op!(")", TokenType::RParen);
        }
        if two(self, "{") && self.context.command_position {
            self.context.brace_depth += 1;
            op!("{", TokenType::LBrace);
        }
        if two(self, "}") && self.context.brace_depth > 0 {
            self.context.brace_depth -= 1;
            op!("}", TokenType::RBrace);
        }
        if two(self, "[") && self.context.command_position && !self.context.in_case_pattern {
            self.context.bracket_depth += 1;
            op!("[", TokenType::LBracket);
        }
        if two(self, "]") && self.context.bracket_depth > 0 {
            self.context.bracket_depth -= 1;
            op!("]", TokenType::RBracket);
        }
        Ok(None)
    }

    fn scan_process_subst(&mut self, start: Position, r#type: TokenType) -> Result<(), LexerError> {
        self.advance(); // '<' or '>'
        self.advance(); // '('
        let inner_start = self.pos;
        let depth = self.scan_balanced(b'(', b')')?;
        debug_assert_eq!(depth, 0);
        let inner_end = self.pos - 1;
        let text = self.source[inner_start..inner_end].to_string();
        self.push(r#type, text, start);
        Ok(())
    }

    /// Consumes up to and including the matching close byte, honoring nested
    /// quotes so a `)` inside a string does not terminate early. Returns the
    /// remaining nesting depth (always zero on success).
    fn scan_balanced(&mut self, open: u8, close: u8) -> Result<u32, LexerError> {
        let mut depth = 1u32;
        let mut in_single = false;
        let mut in_double = false;
        while let Some(b) = self.peek() {
            if in_single {
                self.advance();
                if b == b'\'' {
                    in_single = false;
                }
                continue;
            }
            if in_double {
                if b == b'\\' {
                    self.advance();
                    self.advance();
                    continue;
                }
                self.advance();
                if b == b'"' {
                    in_double = false;
                }
                continue;
            }
            match b {
                b'\'' => {
                    in_single = true;
                    self.advance();
                }
                b'"' => {
                    in_double = true;
                    self.advance();
                }
                b'\\' => {
                    self.advance();
                    self.advance();
                }
                b if b == open => {
                    depth += 1;
                    self.advance();
                }
                b if b == close => {
                    depth -= 1;
                    self.advance();
                    if depth == 0 {
                        return Ok(0);
                    }
                }
                _ => {
                    self.advance();
                }
            }
        }
        Err(LexerError::UnterminatedExpansion(
            self.position(),
            "bracketed expression",
        ))
    }

    /// Scans one maximal word, handling quotes, escapes, tilde, and
    /// embedded/whole-word expansions. Pushes exactly one token.
    fn scan_word(&mut self) -> Result<(), LexerError> {
        let start = self.position();

        // Whole-word fast paths: a construct that IS the entire word becomes
        // its own dedicated token type instead of a generic WORD.
        if self.starts_with("$((") {
            if let Some(text) = self.try_scan_whole_arith()? {
                self.push(TokenType::ArithExpansion, text, start);
                return Ok(());
            }
        }
        if self.starts_with("$(") {
            if self.word_ends_after_command_sub() {
                self.advance();
                self.advance();
                let inner_start = self.pos;
                self.scan_balanced(b'(', b')')?;
                let text = self.source[inner_start..self.pos - 1].to_string();
                self.push(TokenType::CommandSub, text, start);
                return Ok(());
            }
        }
        if self.peek() == Some(b'`') && self.word_ends_after_backquote() {
            self.advance();
            let inner_start = self.pos;
            while let Some(b) = self.peek() {
                if b == b'`' {
                    break;
                }
                if b == b'\\' {
                    self.advance();
                }
                self.advance();
            }
            if self.peek() != Some(b'`') {
                return Err(LexerError::UnterminatedExpansion(start, "backquote"));
            }
            let text = self.source[inner_start..self.pos].to_string();
            self.advance();
            self.push(TokenType::CommandSub, text, start);
            return Ok(());
        }

        // Generic word scan: consume characters (and nested quotes/$-forms)
        // until an unquoted blank, newline, or operator-introducing byte.
        let mut saw_only_double_quote = None;
        loop {
            let Some(b) = self.peek() else { break };
            if self.context.quote_stack.is_empty() {
                if matches!(b, b' ' | b'\t' | b'\n') {
                    break;
                }
                if self.is_operator_start(b) {
                    break;
                }
            }
            match (self.context.quote_stack.last(), b) {
                (Some(QuoteKind::Single), b'\'') => {
                    self.context.quote_stack.pop();
                    self.advance();
                }
                (Some(QuoteKind::Single), _) => {
                    self.advance();
                }
                (Some(QuoteKind::Ansi), b'\'') => {
                    self.context.quote_stack.pop();
                    self.advance();
                }
                (Some(QuoteKind::Ansi), b'\\') => {
                    self.advance();
                    self.advance();
                }
                (Some(QuoteKind::Ansi), _) => {
                    self.advance();
                }
                (_, b'\'') => {
                    self.context.quote_stack.push(QuoteKind::Single);
                    self.advance();
                    if saw_only_double_quote.is_none() {
                        saw_only_double_quote = Some(false);
                    }
                }
                (Some(QuoteKind::Double), b'"') => {
                    self.context.quote_stack.pop();
                    self.advance();
                }
                (Some(QuoteKind::Double), b'\\') => {
                    self.advance();
                    self.advance();
                }
                (_, b'"') => {
                    self.context.quote_stack.push(QuoteKind::Double);
                    if saw_only_double_quote.is_none() {
                        saw_only_double_quote = Some(self.pos == start.offset);
                    } else {
                        saw_only_double_quote = Some(false);
                    }
                    self.advance();
                }
                (_, b'\\') => {
                    self.advance();
                    self.advance();
                }
                (None, b'$') if self.peek_at(1) == Some(b'\'') => {
                    self.advance();
                    self.context.quote_stack.push(QuoteKind::Ansi);
                    self.advance();
                    saw_only_double_quote = Some(false);
                }
                (_, b'$') if self.peek_at(1) == Some(b'(') || self.peek_at(1) == Some(b'{') => {
                    self.skip_dollar_form()?;
                    saw_only_double_quote = Some(false);
                }
                (_, b'$') => {
                    self.advance();
                    while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == b'_')
                    {
                        self.advance();
                    }
                    saw_only_double_quote = Some(false);
                }
                _ => {
                    self.advance();
                    saw_only_double_quote = Some(false);
                }
            }
            if self.context.quote_stack.is_empty()
                && matches!(self.peek(), Some(b' ') | Some(b'\t') | Some(b'\n') | None)
            {
                break;
            }
        }

        if !self.context.quote_stack.is_empty() {
            return Err(match self.context.quote_stack.last() {
                Some(QuoteKind::Single) => LexerError::UnterminatedSingleQuote(start),
                Some(QuoteKind::Ansi) => LexerError::UnterminatedExpansion(start, "$'...'"),
                _ => LexerError::UnterminatedDoubleQuote(start),
            });
        }

        let text = self.source[start.offset..self.pos].to_string();
        let r#type = if saw_only_double_quote == Some(true)
            && text.starts_with('"')
            && text.ends_with('"')
        {
            TokenType::String
        } else if looks_like_assignment(&text) && self.context.command_position {
            TokenType::AssignmentWord
        } else {
            TokenType::Word
        };
        self.finish_word(r#type, text, start)?;
        Ok(())
    }

    /// Skips over a `${...}` or `$(...)` appearing in the middle of a word
    /// (not as the whole word); the raw characters remain part of the WORD
    /// token's text for the parser to decompose.
    fn skip_dollar_form(&mut self) -> Result<(), LexerError> {
        self.advance(); // $
        match self.peek() {
            Some(b'(') => {
                self.advance();
                self.scan_balanced(b'(', b')')?;
            }
            Some(b'{') => {
                self.advance();
                self.scan_balanced(b'{', b'}')?;
            }
            _ => {}
        }
        Ok(())
    }

    fn is_operator_start(&self, b: u8) -> bool {
        matches!(
            b,
            b'|' | b'&' | b';' | b'<' | b'>' | b'(' | b')' | b'`'
        ) || (b == b'{' && self.context.command_position)
            || (b == b'}' && self.context.brace_depth > 0)
            || (b == b'[' && self.context.command_position && !self.context.in_case_pattern)
            || (b == b']' && self.context.bracket_depth > 0)
    }

    /// Heuristic used only to pick the CommandSub/ArithExpansion fast path:
    /// true when the `$(`/`` ` `` construct starting here would consume the
    /// rest of the word (i.e. nothing unquoted follows it before a blank,
    /// newline, or operator).
    /// `$(...)` and `` `...` `` always get their own dedicated token; a
    /// construct appearing mid-word (`pre$(cmd)post`) is instead left
    /// embedded in the surrounding `WORD` and decomposed later by the
    /// parser's word builder, which re-scans the raw text.
    fn word_ends_after_command_sub(&self) -> bool {
        true
    }

    fn word_ends_after_backquote(&self) -> bool {
        true
    }

    /// Scans an `((...))` arithmetic command: the opening and closing
    /// operators are real tokens, but the expression between them is raw
    /// arithmetic source, never tokenized as ordinary shell syntax (so `<`,
    /// `>`, and friends keep their C meaning).
    fn scan_arith_command(&mut self, start: Position) -> Result<(), LexerError> {
        self.advance();
        self.advance();
        self.push(TokenType::DoubleLParen, "((", start);
        self.context.arithmetic_depth += 1;
        let inner_start = self.pos;
        let expr_start = self.position();
        let mut depth = 1u32;
        loop {
            match self.peek() {
                Some(b'(') => {
                    depth += 1;
                    self.advance();
                }
                Some(b')') if self.peek_at(1) == Some(b')') => {
                    depth -= 1;
                    self.advance();
                    if depth == 0 {
                        let text = self.source[inner_start..self.pos].to_string();
                        self.push(TokenType::Word, text, expr_start);
                        let close_start = self.position();
                        self.advance();
                        self.advance();
                        self.context.arithmetic_depth -= 1;
                        self.push(TokenType::DoubleRParen, "))", close_start);
                        return Ok(());
                    }
                }
                Some(_) => {
                    self.advance();
                }
                None => {
                    self.context.arithmetic_depth -= 1;
                    return Err(LexerError::UnterminatedExpansion(start, "((...))"));
                }
            }
        }
    }

    fn try_scan_whole_arith(&mut self) -> Result<Option<String>, LexerError> {
        let save = self.pos;
        self.advance();
        self.advance();
        self.advance();
        self.context.arithmetic_depth += 1;
        let inner_start = self.pos;
        let mut depth = 1u32;
        loop {
            match self.peek() {
                Some(b'(') => {
                    depth += 1;
                    self.advance();
                }
                Some(b')') if self.peek_at(1) == Some(b')') => {
                    depth -= 1;
                    self.advance();
                    if depth == 0 {
                        let text = self.source[inner_start..self.pos].to_string();
                        self.advance();
                        self.context.arithmetic_depth -= 1;
                        return Ok(Some(text));
                    }
                }
                Some(_) => {
                    self.advance();
                }
                None => {
                    self.context.arithmetic_depth -= 1;
                    self.pos = save;
                    return Err(LexerError::UnterminatedExpansion(
                        self.position(),
                        "$((...))",
                    ));
                }
            }
        }
    }

    fn finish_word(
        &mut self,
        r#type: TokenType,
        text: String,
        start: Position,
    ) -> Result<(), LexerError> {
        // FD-prefixed redirection: a bare nonnegative integer immediately
        // followed by a redirection operator is not reinterpreted here; the
        // parser recognizes `WORD(int) + adjacent redirection operator`.
        self.push(r#type, text, start);
        Ok(())
    }

    fn collect_pending_heredocs(&mut self) -> Result<(), LexerError> {
        for (delimiter, quoted, strip_tabs) in std::mem::take(&mut self.pending_heredocs) {
            let start = self.position();
            let mut content = String::new();
            loop {
                let line_start = self.pos;
                while let Some(b) = self.peek() {
                    self.advance();
                    if b == b'\n' {
                        break;
                    }
                }
                let mut line = &self.source[line_start..self.pos];
                let had_newline = line.ends_with('\n');
                if had_newline {
                    line = &line[..line.len() - 1];
                }
                let check = if strip_tabs {
                    line.trim_start_matches('\t')
                } else {
                    line
                };
                if check == delimiter {
                    break;
                }
                content.push_str(if strip_tabs { check } else { line });
                content.push('\n');
                if !had_newline {
                    return Err(LexerError::UnterminatedHereDoc(start, delimiter));
                }
            }
            self.heredocs.insert(delimiter, HeredocBody { quoted, content });
        }
        Ok(())
    }
}

/// Strips a heredoc delimiter word down to its literal text (for the
/// `heredoc_map` key), removing quote characters and backslash escapes
/// without performing any expansion.
fn unquote_literally(word: &str) -> String {
    let mut out = String::with_capacity(word.len());
    let mut chars = word.chars().peekable();
    let mut in_single = false;
    let mut in_double = false;
    while let Some(c) = chars.next() {
        match c {
            '\'' if !in_double => in_single = !in_single,
            '"' if !in_single => in_double = !in_double,
            '\\' if !in_single => {
                if let Some(next) = chars.next() {
                    out.push(next);
                }
            }
            _ => out.push(c),
        }
    }
    out
}

fn looks_like_assignment(text: &str) -> bool {
    let Some(eq) = text.find('=') else {
        return false;
    };
    if eq == 0 {
        return false;
    }
    let name = &text[..eq];
    let mut chars = name.chars();
    let first = chars.next().unwrap();
    (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Keyword normalization: a `WORD` becomes the matching keyword token only
/// when the lexer recorded it at command position.
fn normalize_keywords(tokens: &mut [Token]) {
    let mut command_position = true;
    for i in 0..tokens.len() {
        let this_type = tokens[i].r#type;
        if this_type == TokenType::Word && command_position {
            if let Some(kw) = TokenType::keyword_from_str(&tokens[i].value) {
                tokens[i].r#type = kw;
            }
        }
        command_position = matches!(
            tokens[i].r#type,
            TokenType::Newline
                | TokenType::Semicolon
                | TokenType::Amp
                | TokenType::Pipe
                | TokenType::AndAnd
                | TokenType::OrOr
                | TokenType::LParen
                | TokenType::LBrace
                | TokenType::If
                | TokenType::Then
                | TokenType::Elif
                | TokenType::Else
                | TokenType::While
                | TokenType::Until
                | TokenType::For
                | TokenType::Do
                | TokenType::Case
                | TokenType::In
                | TokenType::Select
        );
    }
}

/// Token transformation: context rules that can only be checked once the
/// full stream (and keyword normalization) is available.
fn validate_tokens(tokens: &[Token]) -> Result<(), LexerError> {
    let mut case_depth = 0u32;
    for token in tokens {
        match token.r#type {
            TokenType::Case => case_depth += 1,
            TokenType::Esac => case_depth = case_depth.saturating_sub(1),
            TokenType::SemiSemi | TokenType::SemiAmp | TokenType::SemiSemiAmp if case_depth == 0 => {
                return Err(LexerError::SemiSemiOutsideCase(token.position));
            }
            _ => {}
        }
    }
    Ok(())
}
