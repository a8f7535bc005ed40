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

//! Recursive-descent parser: token stream to [`List`].
//!
//! The grammar closely follows the POSIX shell grammar:
//! `command_list := and_or ((';'|'&'|NEWLINE) and_or)*`,
//! `and_or := pipeline (('&&'|'||') pipeline)*`,
//! `pipeline := '!'? command ('|' command)*`,
//! `command := simple | compound [redir...] | function_def`.

use crate::lexer::HeredocMap;
use crate::source::{Location, Source};
use crate::syntax::*;
use crate::token::{Position, Token, TokenType};
use std::rc::Rc;
use thiserror::Error;

#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ParseError {
    #[error("unexpected token {found:?} at {position:?}: {expected}")]
    Unexpected {
        found: TokenType,
        position: Position,
        expected: &'static str,
    },
    #[error("unexpected end of input: {expected}")]
    UnexpectedEof { expected: &'static str },
    #[error("missing `{0}` to close a construct opened at {1:?}")]
    MissingTerminator(&'static str, Position),
    #[error("unclosed `{0}` starting at {1:?}")]
    UnclosedExpansion(&'static str, Position),
    #[error("`\\$(` inside a double-quoted string at {0:?} escapes only the `$`, not the substitution; this rarely means what it looks like")]
    EscapedDollarInDoubleQuote(Position),
    #[error("empty command")]
    EmptyCommand,
    #[error("a heredoc delimiter {0:?} has no matching body")]
    MissingHeredocBody(String),
}

pub struct Parser<'t> {
    tokens: &'t [Token],
    pos: usize,
    heredocs: &'t HeredocMap,
    source: Rc<Source>,
}

/// Parses a complete token stream (as produced by [`crate::lexer::tokenize`])
/// into a [`List`] of top-level commands.
pub fn parse(tokens: &[Token], heredocs: &HeredocMap, source: Rc<Source>) -> Result<List, ParseError> {
    let mut parser = Parser {
        tokens,
        pos: 0,
        heredocs,
        source,
    };
    let list = parser.command_list()?;
    parser.expect_eof()?;
    Ok(list)
}

impl<'t> Parser<'t> {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn peek_type(&self) -> TokenType {
        self.peek().r#type
    }

    fn at(&self, r#type: TokenType) -> bool {
        self.peek_type() == r#type
    }

    fn advance(&mut self) -> &Token {
        let tok = &self.tokens[self.pos];
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn location_of(&self, token: &Token) -> Location {
        Location {
            source: Rc::clone(&self.source),
            range: token.position.offset..token.position.offset + token.value.len().max(1),
            line: token.position.line,
            column: token.position.column,
        }
    }

    fn here(&self) -> Location {
        self.location_of(self.peek())
    }

    fn expect(&mut self, r#type: TokenType, expected: &'static str) -> Result<&Token, ParseError> {
        if self.at(TokenType::Eof) && r#type != TokenType::Eof {
            return Err(ParseError::UnexpectedEof { expected });
        }
        if self.peek_type() != r#type {
            return Err(ParseError::Unexpected {
                found: self.peek_type(),
                position: self.peek().position,
                expected,
            });
        }
        Ok(self.advance())
    }

    fn expect_eof(&mut self) -> Result<(), ParseError> {
        if !self.at(TokenType::Eof) {
            return Err(ParseError::Unexpected {
                found: self.peek_type(),
                position: self.peek().position,
                expected: "end of input",
            });
        }
        Ok(())
    }

    fn skip_separators(&mut self) {
        while matches!(self.peek_type(), TokenType::Newline | TokenType::Semicolon) {
            self.advance();
        }
    }

    // command_list := and_or ((';'|'&'|NEWLINE)+ and_or)*
    fn command_list(&mut self) -> Result<List, ParseError> {
        let mut items = Vec::new();
        self.skip_separators();
        while !self.at_list_end() {
            let and_or = self.and_or()?;
            let async_flag = if self.at(TokenType::Amp) {
                let loc = self.here();
                self.advance();
                Some(loc)
            } else {
                None
            };
            items.push(Item {
                and_or: Rc::new(and_or),
                async_flag,
            });
            if matches!(self.peek_type(), TokenType::Semicolon | TokenType::Newline) {
                self.skip_separators();
            } else {
                break;
            }
        }
        Ok(List(items))
    }

    fn at_list_end(&self) -> bool {
        matches!(
            self.peek_type(),
            TokenType::Eof
                | TokenType::Fi
                | TokenType::Done
                | TokenType::Esac
                | TokenType::Then
                | TokenType::Elif
                | TokenType::Else
                | TokenType::RBrace
                | TokenType::RParen
                | TokenType::SemiSemi
                | TokenType::SemiAmp
                | TokenType::SemiSemiAmp
        )
    }

    fn and_or(&mut self) -> Result<AndOrList, ParseError> {
        let first = self.pipeline()?;
        let mut rest = Vec::new();
        loop {
            let op = match self.peek_type() {
                TokenType::AndAnd => AndOr::AndThen,
                TokenType::OrOr => AndOr::OrElse,
                _ => break,
            };
            self.advance();
            while self.at(TokenType::Newline) {
                self.advance();
            }
            rest.push((op, self.pipeline()?));
        }
        Ok(AndOrList { first, rest })
    }

    fn pipeline(&mut self) -> Result<Pipeline, ParseError> {
        let negation = if self.at_word_value("!") {
            self.advance();
            true
        } else {
            false
        };
        let mut commands = vec![Rc::new(self.command()?)];
        while self.at(TokenType::Pipe) {
            self.advance();
            while self.at(TokenType::Newline) {
                self.advance();
            }
            commands.push(Rc::new(self.command()?));
        }
        Ok(Pipeline { commands, negation })
    }

    fn at_word_value(&self, value: &str) -> bool {
        matches!(self.peek_type(), TokenType::Word) && self.peek().value == value
    }

    fn command(&mut self) -> Result<Command, ParseError> {
        if self.is_function_def_start() {
            return Ok(Command::Function(self.function_definition()?));
        }
        if self.is_compound_start() {
            let full = self.full_compound_command()?;
            return Ok(Command::Compound(full));
        }
        Ok(Command::Simple(self.simple_command()?))
    }

    fn is_compound_start(&self) -> bool {
        matches!(
            self.peek_type(),
            TokenType::LBrace
                | TokenType::LParen
                | TokenType::DoubleLParen
                | TokenType::If
                | TokenType::While
                | TokenType::Until
                | TokenType::For
                | TokenType::Case
                | TokenType::Select
                | TokenType::Break
                | TokenType::Continue
        )
    }

    fn is_function_def_start(&self) -> bool {
        if self.at(TokenType::Function) {
            return true;
        }
        matches!(self.peek_type(), TokenType::Word)
            && matches!(self.tokens.get(self.pos + 1), Some(t) if t.r#type == TokenType::LParen)
            && matches!(self.tokens.get(self.pos + 2), Some(t) if t.r#type == TokenType::RParen)
    }

    fn function_definition(&mut self) -> Result<FunctionDefinition, ParseError> {
        let has_keyword = if self.at(TokenType::Function) {
            self.advance();
            true
        } else {
            false
        };
        let name = self.word("function name")?;
        if self.at(TokenType::LParen) {
            self.advance();
            self.expect(TokenType::RParen, "`)` to close function parameter list")?;
        }
        self.skip_separators();
        let body = Rc::new(self.full_compound_command()?);
        Ok(FunctionDefinition {
            has_keyword,
            name,
            body,
        })
    }

    fn full_compound_command(&mut self) -> Result<FullCompoundCommand, ParseError> {
        let command = self.compound_command()?;
        let redirs = self.redirections()?;
        Ok(FullCompoundCommand { command, redirs })
    }

    fn compound_command(&mut self) -> Result<CompoundCommand, ParseError> {
        match self.peek_type() {
            TokenType::LBrace => self.grouping(),
            TokenType::LParen => self.subshell(),
            TokenType::DoubleLParen => self.arith_command(),
            TokenType::If => self.if_command(),
            TokenType::While => self.while_command(),
            TokenType::Until => self.until_command(),
            TokenType::For => self.for_command(),
            TokenType::Case => self.case_command(),
            TokenType::Select => self.select_command(),
            TokenType::Break => {
                self.advance();
                let level = self.optional_level_word()?;
                Ok(CompoundCommand::Break { level })
            }
            TokenType::Continue => {
                self.advance();
                let level = self.optional_level_word()?;
                Ok(CompoundCommand::Continue { level })
            }
            _ => Err(ParseError::Unexpected {
                found: self.peek_type(),
                position: self.peek().position,
                expected: "a compound command",
            }),
        }
    }

    fn optional_level_word(&mut self) -> Result<Option<Word>, ParseError> {
        if matches!(self.peek_type(), TokenType::Word) {
            Ok(Some(self.word("break/continue level")?))
        } else {
            Ok(None)
        }
    }

    fn grouping(&mut self) -> Result<CompoundCommand, ParseError> {
        let open = self.peek().position;
        self.advance();
        let body = self.command_list()?;
        self.expect(TokenType::RBrace, "`}`")
            .map_err(|_| ParseError::MissingTerminator("}", open))?;
        Ok(CompoundCommand::Grouping(body))
    }

    fn subshell(&mut self) -> Result<CompoundCommand, ParseError> {
        let location = self.here();
        let open = self.peek().position;
        self.advance();
        let body = self.command_list()?;
        self.expect(TokenType::RParen, "`)`")
            .map_err(|_| ParseError::MissingTerminator(")", open))?;
        Ok(CompoundCommand::Subshell {
            body: Rc::new(body),
            location,
        })
    }

    fn arith_command(&mut self) -> Result<CompoundCommand, ParseError> {
        let location = self.here();
        self.expect(TokenType::DoubleLParen, "`((`")?;
        let expr = if self.at(TokenType::DoubleRParen) {
            String::new()
        } else {
            self.advance().value.clone()
        };
        self.expect(TokenType::DoubleRParen, "`))`")?;
        Ok(CompoundCommand::Arith { expr, location })
    }

    fn if_command(&mut self) -> Result<CompoundCommand, ParseError> {
        self.advance();
        let condition = self.command_list()?;
        self.expect(TokenType::Then, "`then`")?;
        let body = self.command_list()?;
        let mut elifs = Vec::new();
        while self.at(TokenType::Elif) {
            self.advance();
            let cond = self.command_list()?;
            self.expect(TokenType::Then, "`then`")?;
            let elif_body = self.command_list()?;
            elifs.push(ElifThen {
                condition: cond,
                body: elif_body,
            });
        }
        let r#else = if self.at(TokenType::Else) {
            self.advance();
            Some(self.command_list()?)
        } else {
            None
        };
        self.expect(TokenType::Fi, "`fi`")?;
        Ok(CompoundCommand::If {
            condition,
            body,
            elifs,
            r#else,
        })
    }

    fn while_command(&mut self) -> Result<CompoundCommand, ParseError> {
        self.advance();
        let condition = self.command_list()?;
        let body = self.do_block()?;
        Ok(CompoundCommand::While { condition, body })
    }

    fn until_command(&mut self) -> Result<CompoundCommand, ParseError> {
        self.advance();
        let condition = self.command_list()?;
        let body = self.do_block()?;
        Ok(CompoundCommand::Until { condition, body })
    }

    fn do_block(&mut self) -> Result<List, ParseError> {
        self.expect(TokenType::Do, "`do`")?;
        let body = self.command_list()?;
        self.expect(TokenType::Done, "`done`")?;
        Ok(body)
    }

    fn for_command(&mut self) -> Result<CompoundCommand, ParseError> {
        self.advance();
        if self.at(TokenType::DoubleLParen) {
            return self.c_style_for();
        }
        let name = self.word("loop variable")?;
        self.skip_separators();
        let values = if self.at(TokenType::In) {
            self.advance();
            let mut words = Vec::new();
            while matches!(
                self.peek_type(),
                TokenType::Word | TokenType::String | TokenType::CommandSub | TokenType::ArithExpansion
            ) {
                words.push(self.word("for-loop value")?);
            }
            Some(words)
        } else {
            None
        };
        self.skip_separators();
        let body = self.do_block()?;
        Ok(CompoundCommand::For { name, values, body })
    }

    fn c_style_for(&mut self) -> Result<CompoundCommand, ParseError> {
        self.expect(TokenType::DoubleLParen, "`((`")?;
        let clause = self.advance().value.clone();
        self.expect(TokenType::DoubleRParen, "`))`")?;
        let mut parts = clause.splitn(3, ';').map(str::trim);
        let init = parts.next().filter(|s| !s.is_empty()).map(str::to_string);
        let condition = parts.next().filter(|s| !s.is_empty()).map(str::to_string);
        let update = parts.next().filter(|s| !s.is_empty()).map(str::to_string);
        self.skip_separators();
        let body = self.do_block()?;
        Ok(CompoundCommand::CStyleFor {
            init,
            condition,
            update,
            body,
        })
    }

    fn select_command(&mut self) -> Result<CompoundCommand, ParseError> {
        self.advance();
        let name = self.word("select variable")?;
        self.skip_separators();
        let values = if self.at(TokenType::In) {
            self.advance();
            let mut words = Vec::new();
            while matches!(self.peek_type(), TokenType::Word | TokenType::String) {
                words.push(self.word("select value")?);
            }
            Some(words)
        } else {
            None
        };
        self.skip_separators();
        let body = self.do_block()?;
        Ok(CompoundCommand::Select { name, values, body })
    }

    fn case_command(&mut self) -> Result<CompoundCommand, ParseError> {
        self.advance();
        let subject = self.word("case subject")?;
        self.skip_separators();
        self.expect(TokenType::In, "`in`")?;
        self.skip_separators();
        let mut items = Vec::new();
        while !self.at(TokenType::Esac) {
            if self.at(TokenType::LParen) {
                self.advance();
            }
            let mut patterns = vec![self.word("case pattern")?];
            while self.at(TokenType::Pipe) {
                self.advance();
                patterns.push(self.word("case pattern")?);
            }
            self.expect(TokenType::RParen, "`)`")?;
            let body = self.command_list()?;
            let continuation = match self.peek_type() {
                TokenType::SemiSemi => {
                    self.advance();
                    CaseContinuation::Break
                }
                TokenType::SemiAmp => {
                    self.advance();
                    CaseContinuation::FallThrough
                }
                TokenType::SemiSemiAmp => {
                    self.advance();
                    CaseContinuation::Continue
                }
                _ => CaseContinuation::Break,
            };
            self.skip_separators();
            items.push(CaseItem {
                patterns,
                body,
                continuation,
            });
        }
        self.expect(TokenType::Esac, "`esac`")?;
        Ok(CompoundCommand::Case { subject, items })
    }

    fn simple_command(&mut self) -> Result<SimpleCommand, ParseError> {
        let mut command = SimpleCommand::default();
        loop {
            match self.peek_type() {
                TokenType::AssignmentWord => {
                    command.assigns.push(self.assignment()?);
                }
                TokenType::Word
                | TokenType::String
                | TokenType::CommandSub
                | TokenType::ArithExpansion
                | TokenType::ProcessSubIn
                | TokenType::ProcessSubOut => {
                    let word = self.word("command word")?;
                    command.words.push((word, ExpansionMode::Multiple));
                }
                TokenType::Less
                | TokenType::Great
                | TokenType::DGreat
                | TokenType::DLess
                | TokenType::DLessDash
                | TokenType::TLess
                | TokenType::LessAnd
                | TokenType::GreatAnd => {
                    command.redirs.push(self.redirection(None)?);
                }
                _ => break,
            }
        }
        if command.is_empty() {
            return Err(ParseError::EmptyCommand);
        }
        Ok(command)
    }

    fn redirections(&mut self) -> Result<Vec<Redir>, ParseError> {
        let mut redirs = Vec::new();
        while matches!(
            self.peek_type(),
            TokenType::Less
                | TokenType::Great
                | TokenType::DGreat
                | TokenType::DLess
                | TokenType::DLessDash
                | TokenType::TLess
                | TokenType::LessAnd
                | TokenType::GreatAnd
        ) {
            redirs.push(self.redirection(None)?);
        }
        Ok(redirs)
    }

    /// Parses one redirection. `fd_word` is a previously consumed
    /// fd-prefix word (`2` in `2>&1`) recognized via `adjacent_to_previous`.
    fn redirection(&mut self, fd_word: Option<&Token>) -> Result<Redir, ParseError> {
        let op_token = self.advance().clone();
        let fd = fd_word
            .and_then(|t| t.value.parse().ok())
            .map(Fd);
        let (op, is_heredoc) = match op_token.r#type {
            TokenType::Less => (RedirOp::FileIn, false),
            TokenType::Great => (RedirOp::FileOut, false),
            TokenType::DGreat => (RedirOp::FileAppend, false),
            TokenType::DLess => (RedirOp::HereDoc, true),
            TokenType::DLessDash => (RedirOp::HereDocDash, true),
            TokenType::TLess => (RedirOp::HereString, false),
            TokenType::LessAnd => (RedirOp::FdIn, false),
            TokenType::GreatAnd => (RedirOp::FdOut, false),
            other => {
                return Err(ParseError::Unexpected {
                    found: other,
                    position: op_token.position,
                    expected: "a redirection operator",
                })
            }
        };
        if matches!(self.peek_type(), TokenType::GreatAnd | TokenType::LessAnd)
            && self.at_word_value("-")
        {
            self.advance();
            let op = if op == RedirOp::FdIn {
                RedirOp::CloseIn
            } else {
                RedirOp::CloseOut
            };
            return Ok(Redir {
                fd,
                op,
                body: RedirBody::Normal {
                    operand: Word {
                        units: Vec::new(),
                        location: self.location_of(&op_token),
                    },
                },
            });
        }
        let operand = self.word("redirection target")?;
        if is_heredoc {
            let delimiter_literal = operand
                .to_string_if_literal()
                .unwrap_or_default();
            let body = self
                .heredocs
                .get(&delimiter_literal)
                .ok_or_else(|| ParseError::MissingHeredocBody(delimiter_literal.clone()))?;
            let heredoc = Rc::new(HereDoc {
                delimiter: operand,
                delimiter_quoted: body.quoted,
                remove_tabs: op == RedirOp::HereDocDash,
                content: std::cell::OnceCell::new(),
            });
            let _ = heredoc.content.set(parse_text(&body.content, &self.source));
            return Ok(Redir {
                fd,
                op,
                body: RedirBody::HereDoc(heredoc),
            });
        }
        Ok(Redir {
            fd,
            op,
            body: RedirBody::Normal { operand },
        })
    }

    /// Builds a [`Word`] from the current token, consuming it and any tokens
    /// glued to it via `adjacent_to_previous`.
    fn word(&mut self, expected: &'static str) -> Result<Word, ParseError> {
        if matches!(self.peek_type(), TokenType::Eof) {
            return Err(ParseError::UnexpectedEof { expected });
        }
        let start_location = self.here();
        let mut units = Vec::new();
        loop {
            let fd_prefix_candidate = matches!(self.peek_type(), TokenType::Word)
                && self.peek().value.bytes().all(|b| b.is_ascii_digit())
                && !self.peek().value.is_empty();
            if fd_prefix_candidate {
                if let Some(next) = self.tokens.get(self.pos + 1) {
                    if next.adjacent_to_previous
                        && matches!(
                            next.r#type,
                            TokenType::Less
                                | TokenType::Great
                                | TokenType::DGreat
                                | TokenType::DLess
                                | TokenType::DLessDash
                                | TokenType::LessAnd
                                | TokenType::GreatAnd
                        )
                    {
                        // This digit word is an fd prefix, not part of the current Word.
                        break;
                    }
                }
            }
            let tok = self.advance().clone();
            units.extend(self.word_units_from_token(&tok)?);
            let next_adjacent = self
                .tokens
                .get(self.pos)
                .is_some_and(|t| t.adjacent_to_previous)
                && matches!(
                    self.peek_type(),
                    TokenType::Word
                        | TokenType::String
                        | TokenType::CommandSub
                        | TokenType::ArithExpansion
                        | TokenType::ProcessSubIn
                        | TokenType::ProcessSubOut
                );
            if !next_adjacent {
                break;
            }
        }
        Ok(Word {
            units,
            location: start_location,
        })
    }

    fn word_units_from_token(&self, token: &Token) -> Result<Vec<WordUnit>, ParseError> {
        match token.r#type {
            TokenType::CommandSub => Ok(vec![Unquoted(TextUnit::CommandSubst {
                content: token.value.clone(),
                location: self.location_of(token),
            })]),
            TokenType::ArithExpansion => Ok(vec![Unquoted(TextUnit::Arith {
                content: token.value.clone(),
                location: self.location_of(token),
            })]),
            TokenType::ProcessSubIn => Ok(vec![WordUnit::ProcessSubst {
                direction: ProcessSubstDirection::In,
                content: token.value.clone(),
                location: self.location_of(token),
            }]),
            TokenType::ProcessSubOut => Ok(vec![WordUnit::ProcessSubst {
                direction: ProcessSubstDirection::Out,
                content: token.value.clone(),
                location: self.location_of(token),
            }]),
            TokenType::String => {
                let inner = token
                    .value
                    .strip_prefix('"')
                    .and_then(|s| s.strip_suffix('"'))
                    .unwrap_or(&token.value);
                Ok(vec![WordUnit::DoubleQuote(parse_double_quoted(
                    inner,
                    &self.location_of(token),
                )?)])
            }
            TokenType::Word | TokenType::AssignmentWord => {
                word_units_from_raw(&token.value, &self.location_of(token))
            }
            other => Err(ParseError::Unexpected {
                found: other,
                position: token.position,
                expected: "a word",
            }),
        }
    }

    fn assignment(&mut self) -> Result<Assign, ParseError> {
        let token = self.advance().clone();
        let location = self.location_of(&token);
        let eq = token.value.find('=').expect("lexer only emits ASSIGNMENT_WORD with `=`");
        let name = token.value[..eq].to_string();
        let rhs = &token.value[eq + 1..];
        let value = if let Some(inner) = rhs.strip_prefix('(').and_then(|s| s.strip_suffix(')')) {
            Value::Array(
                inner
                    .split_whitespace()
                    .map(|w| Word {
                        units: word_units_from_raw(w, &location).unwrap_or_default(),
                        location: location.clone(),
                    })
                    .collect(),
            )
        } else {
            Value::Scalar(Word {
                units: word_units_from_raw(rhs, &location)?,
                location: location.clone(),
            })
        };
        Ok(Assign {
            name,
            value,
            location,
        })
    }
}

/// Decomposes the raw text of a `WORD`/`ASSIGNMENT_WORD` token (which may
/// still contain embedded quotes, escapes, tildes, and `$`-expansions) into
/// quote-tagged [`WordUnit`]s. The lexer only guarantees balanced nesting;
/// all further interpretation happens here.
fn word_units_from_raw(raw: &str, location: &Location) -> Result<Vec<WordUnit>, ParseError> {
    let mut units = Vec::new();
    let mut chars = raw.char_indices().peekable();
    let mut leading = true;
    while let Some((i, c)) = chars.next() {
        match c {
            '~' if leading => {
                let mut name = String::new();
                while let Some(&(_, c)) = chars.peek() {
                    if c == '/' || c.is_whitespace() {
                        break;
                    }
                    name.push(c);
                    chars.next();
                }
                units.push(WordUnit::Tilde(name));
            }
            '\'' => {
                let mut s = String::new();
                for (_, c) in chars.by_ref() {
                    if c == '\'' {
                        break;
                    }
                    s.push(c);
                }
                units.push(WordUnit::SingleQuote(s));
            }
            '"' => {
                let mut inner = String::new();
                let mut depth = 1;
                while depth > 0 {
                    let Some((_, c)) = chars.next() else {
                        return Err(ParseError::UnclosedExpansion("\"", Position {
                            line: location.line,
                            column: location.column,
                            offset: location.range.start + i,
                        }));
                    };
                    if c == '\\' {
                        inner.push(c);
                        if let Some((_, c2)) = chars.next() {
                            inner.push(c2);
                        }
                        continue;
                    }
                    if c == '"' {
                        depth -= 1;
                        if depth == 0 {
                            break;
                        }
                    }
                    inner.push(c);
                }
                units.push(WordUnit::DoubleQuote(parse_double_quoted(&inner, location)?));
            }
            '$' if matches!(chars.peek(), Some((_, '\''))) => {
                chars.next();
                let mut escaped = EscapedString::default();
                while let Some((_, c)) = chars.next() {
                    if c == '\'' {
                        break;
                    }
                    if c == '\\' {
                        if let Some((_, c2)) = chars.next() {
                            escaped.0.push(EscapeUnit::Escaped(resolve_backslash_escape(c2)));
                        }
                    } else {
                        escaped.0.push(EscapeUnit::Literal(c));
                    }
                }
                units.push(WordUnit::DollarSingleQuote(escaped));
            }
            '$' => {
                units.push(Unquoted(parse_dollar_unquoted(&mut chars, location)?));
            }
            '\\' => {
                if let Some((_, c2)) = chars.next() {
                    units.push(Unquoted(TextUnit::Backslashed(c2)));
                }
            }
            _ => units.push(Unquoted(TextUnit::Literal(c))),
        }
        leading = false;
    }
    Ok(units)
}

fn parse_double_quoted(inner: &str, location: &Location) -> Result<Text, ParseError> {
    let mut units = Vec::new();
    let mut chars = inner.char_indices().peekable();
    while let Some((_, c)) = chars.next() {
        match c {
            '\\' => {
                if let Some((_, c2)) = chars.next() {
                    if c2 == '$' {
                        return Err(ParseError::EscapedDollarInDoubleQuote(Position {
                            line: location.line,
                            column: location.column,
                            offset: location.range.start,
                        }));
                    }
                    if matches!(c2, '"' | '\\' | '`') {
                        units.push(TextUnit::Backslashed(c2));
                    } else {
                        units.push(TextUnit::Literal('\\'));
                        units.push(TextUnit::Literal(c2));
                    }
                }
            }
            '$' => units.push(parse_dollar_unquoted(&mut chars, location)?),
            _ => units.push(TextUnit::Literal(c)),
        }
    }
    Ok(Text(units))
}

fn parse_dollar_unquoted(
    chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>,
    location: &Location,
) -> Result<TextUnit, ParseError> {
    match chars.peek().copied() {
        Some((_, '(')) => {
            chars.next();
            if matches!(chars.peek(), Some((_, '('))) {
                chars.next();
                let content = take_balanced(chars, '(', ')');
                // consume the extra trailing ')'
                if matches!(chars.peek(), Some((_, ')'))) {
                    chars.next();
                }
                Ok(TextUnit::Arith {
                    content,
                    location: location.clone(),
                })
            } else {
                let content = take_balanced(chars, '(', ')');
                Ok(TextUnit::CommandSubst {
                    content,
                    location: location.clone(),
                })
            }
        }
        Some((_, '{')) => {
            chars.next();
            let content = take_balanced(chars, '{', '}');
            parse_braced_param(&content, location)
        }
        Some((_, c)) if c.is_ascii_digit() || c == '@' || c == '*' || c == '#' || c == '?' || c == '-' || c == '$' || c == '!' || c == '0' => {
            chars.next();
            Ok(TextUnit::RawParam {
                param: special_or_positional_param(c),
                location: location.clone(),
            })
        }
        Some((_, c)) if c.is_ascii_alphabetic() || c == '_' => {
            let mut name = String::new();
            while let Some(&(_, c)) = chars.peek() {
                if c.is_ascii_alphanumeric() || c == '_' {
                    name.push(c);
                    chars.next();
                } else {
                    break;
                }
            }
            Ok(TextUnit::RawParam {
                param: Param::variable(name),
                location: location.clone(),
            })
        }
        _ => Ok(TextUnit::Literal('$')),
    }
}

fn special_or_positional_param(c: char) -> Param {
    let special = match c {
        '@' => Some(SpecialParam::At),
        '*' => Some(SpecialParam::Asterisk),
        '#' => Some(SpecialParam::Hash),
        '?' => Some(SpecialParam::Question),
        '-' => Some(SpecialParam::Hyphen),
        '$' => Some(SpecialParam::Dollar),
        '!' => Some(SpecialParam::Bang),
        '0' => Some(SpecialParam::Zero),
        _ => None,
    };
    if let Some(sp) = special {
        return Param {
            id: c.to_string(),
            r#type: ParamType::Special(sp),
            index: None,
            indirect: false,
        };
    }
    let n = c.to_digit(10).unwrap_or(0) as usize;
    Param {
        id: c.to_string(),
        r#type: ParamType::Positional(n),
        index: None,
        indirect: false,
    }
}

/// Consumes up to and including the matching `close`, honoring nested single
/// and double quotes so a `close` byte inside a quoted string does not end
/// the construct early (e.g. the `)` in `$(printf 'a)b')`). Mirrors
/// `Lexer::scan_balanced`, which does the same job for whole-word `$(...)`.
fn take_balanced(
    chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>,
    open: char,
    close: char,
) -> String {
    let mut depth = 1u32;
    let mut out = String::new();
    let mut in_single = false;
    let mut in_double = false;
    while let Some((_, c)) = chars.next() {
        if in_single {
            out.push(c);
            if c == '\'' {
                in_single = false;
            }
            continue;
        }
        if in_double {
            if c == '\\' {
                out.push(c);
                if let Some((_, c2)) = chars.next() {
                    out.push(c2);
                }
                continue;
            }
            out.push(c);
            if c == '"' {
                in_double = false;
            }
            continue;
        }
        match c {
            '\'' => {
                in_single = true;
                out.push(c);
            }
            '"' => {
                in_double = true;
                out.push(c);
            }
            '\\' => {
                out.push(c);
                if let Some((_, c2)) = chars.next() {
                    out.push(c2);
                }
            }
            _ if c == open => {
                depth += 1;
                out.push(c);
            }
            _ if c == close => {
                depth -= 1;
                if depth == 0 {
                    break;
                }
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

/// Parses the inside of a `${...}` expansion (after the braces have already
/// been stripped) into a [`TextUnit::BracedParam`].
fn parse_braced_param(content: &str, location: &Location) -> Result<TextUnit, ParseError> {
    let mut rest = content;
    let length_only = rest.starts_with('#') && rest.len() > 1 && !rest[1..].starts_with('#');
    if length_only {
        rest = &rest[1..];
    }
    let indirect = rest.starts_with('!') && !length_only;
    if indirect {
        rest = &rest[1..];
    }

    let name_end = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(rest.len());
    let (name, mut remainder) = rest.split_at(name_end);

    let mut index = None;
    if let Some(stripped) = remainder.strip_prefix('[') {
        if let Some(close) = stripped.find(']') {
            let idx_src = &stripped[..close];
            index = Some(Box::new(Word {
                units: word_units_from_raw(idx_src, location)?,
                location: location.clone(),
            }));
            remainder = &stripped[close + 1..];
        }
    }

    let param = Param {
        id: name.to_string(),
        r#type: ParamType::Variable,
        index,
        indirect,
    };

    if length_only {
        return Ok(TextUnit::BracedParam(BracedParam {
            param,
            modifier: Modifier::Length,
            location: location.clone(),
        }));
    }
    if indirect && remainder == "*" {
        return Ok(TextUnit::BracedParam(BracedParam {
            param,
            modifier: Modifier::PrefixNames { at: false },
            location: location.clone(),
        }));
    }
    if indirect && remainder == "@" {
        return Ok(TextUnit::BracedParam(BracedParam {
            param,
            modifier: Modifier::PrefixNames { at: true },
            location: location.clone(),
        }));
    }

    let modifier = parse_modifier(remainder, location)?;
    Ok(TextUnit::BracedParam(BracedParam {
        param,
        modifier,
        location: location.clone(),
    }))
}

fn parse_modifier(text: &str, location: &Location) -> Result<Modifier, ParseError> {
    if text.is_empty() {
        return Ok(Modifier::None);
    }
    let word_of = |s: &str| -> Result<Word, ParseError> {
        Ok(Word {
            units: word_units_from_raw(s, location)?,
            location: location.clone(),
        })
    };
    if let Some(rest) = text.strip_prefix(":-") {
        return Ok(Modifier::Switch(Switch {
            r#type: SwitchType::Default,
            condition: SwitchCondition::UnsetOrEmpty,
            word: word_of(rest)?,
        }));
    }
    if let Some(rest) = text.strip_prefix(":=") {
        return Ok(Modifier::Switch(Switch {
            r#type: SwitchType::Assign,
            condition: SwitchCondition::UnsetOrEmpty,
            word: word_of(rest)?,
        }));
    }
    if let Some(rest) = text.strip_prefix(":?") {
        return Ok(Modifier::Switch(Switch {
            r#type: SwitchType::Error,
            condition: SwitchCondition::UnsetOrEmpty,
            word: word_of(rest)?,
        }));
    }
    if let Some(rest) = text.strip_prefix(":+") {
        return Ok(Modifier::Switch(Switch {
            r#type: SwitchType::Alter,
            condition: SwitchCondition::UnsetOrEmpty,
            word: word_of(rest)?,
        }));
    }
    if let Some(rest) = text.strip_prefix('-') {
        return Ok(Modifier::Switch(Switch {
            r#type: SwitchType::Default,
            condition: SwitchCondition::Unset,
            word: word_of(rest)?,
        }));
    }
    if let Some(rest) = text.strip_prefix('=') {
        return Ok(Modifier::Switch(Switch {
            r#type: SwitchType::Assign,
            condition: SwitchCondition::Unset,
            word: word_of(rest)?,
        }));
    }
    if let Some(rest) = text.strip_prefix('?') {
        return Ok(Modifier::Switch(Switch {
            r#type: SwitchType::Error,
            condition: SwitchCondition::Unset,
            word: word_of(rest)?,
        }));
    }
    if let Some(rest) = text.strip_prefix('+') {
        return Ok(Modifier::Switch(Switch {
            r#type: SwitchType::Alter,
            condition: SwitchCondition::Unset,
            word: word_of(rest)?,
        }));
    }
    if let Some(rest) = text.strip_prefix(':') {
        let (offset, length) = match rest.split_once(':') {
            Some((o, l)) => (o, Some(l)),
            None => (rest, None),
        };
        return Ok(Modifier::Slice(Slice {
            offset: word_of(offset)?,
            length: match length {
                Some(l) => Some(word_of(l)?),
                None => None,
            },
        }));
    }
    if let Some(rest) = text.strip_prefix("##") {
        return Ok(Modifier::Trim(Trim {
            side: TrimSide::Prefix,
            length: TrimLength::Longest,
            pattern: word_of(rest)?,
        }));
    }
    if let Some(rest) = text.strip_prefix('#') {
        return Ok(Modifier::Trim(Trim {
            side: TrimSide::Prefix,
            length: TrimLength::Shortest,
            pattern: word_of(rest)?,
        }));
    }
    if let Some(rest) = text.strip_prefix("%%") {
        return Ok(Modifier::Trim(Trim {
            side: TrimSide::Suffix,
            length: TrimLength::Longest,
            pattern: word_of(rest)?,
        }));
    }
    if let Some(rest) = text.strip_prefix('%') {
        return Ok(Modifier::Trim(Trim {
            side: TrimSide::Suffix,
            length: TrimLength::Shortest,
            pattern: word_of(rest)?,
        }));
    }
    if let Some(rest) = text.strip_prefix("//") {
        let (pattern, replacement) = rest.split_once('/').unwrap_or((rest, ""));
        return Ok(Modifier::Substitution(Substitution {
            all: true,
            pattern: word_of(pattern)?,
            replacement: if replacement.is_empty() && !rest.contains('/') {
                None
            } else {
                Some(word_of(replacement)?)
            },
        }));
    }
    if let Some(rest) = text.strip_prefix('/') {
        let (pattern, replacement) = rest.split_once('/').unwrap_or((rest, ""));
        return Ok(Modifier::Substitution(Substitution {
            all: false,
            pattern: word_of(pattern)?,
            replacement: if replacement.is_empty() && !rest.contains('/') {
                None
            } else {
                Some(word_of(replacement)?)
            },
        }));
    }
    if let Some(rest) = text.strip_prefix("^^") {
        if !rest.is_empty() {
            // pattern-restricted case conversion is not modeled; fall back
            // to whole-value conversion, the common case.
        }
        return Ok(Modifier::CaseConv {
            conv: CaseConv::Upper,
            whole: true,
        });
    }
    if text.starts_with('^') {
        return Ok(Modifier::CaseConv {
            conv: CaseConv::Upper,
            whole: false,
        });
    }
    if let Some(_rest) = text.strip_prefix(",,") {
        return Ok(Modifier::CaseConv {
            conv: CaseConv::Lower,
            whole: true,
        });
    }
    if text.starts_with(',') {
        return Ok(Modifier::CaseConv {
            conv: CaseConv::Lower,
            whole: false,
        });
    }
    Err(ParseError::Unexpected {
        found: TokenType::Word,
        position: Position {
            line: location.line,
            column: location.column,
            offset: location.range.start,
        },
        expected: "a recognized parameter expansion operator",
    })
}

fn resolve_backslash_escape(c: char) -> char {
    match c {
        'n' => '\n',
        't' => '\t',
        'r' => '\r',
        'a' => '\u{7}',
        'b' => '\u{8}',
        'f' => '\u{c}',
        'v' => '\u{b}',
        '0' => '\0',
        '\\' => '\\',
        other => other,
    }
}

/// Parses a heredoc body (plain text collected by the lexer) into [`Text`],
/// honoring the same `$`-expansion rules as a double-quoted string (but with
/// no enclosing quote delimiters to strip).
fn parse_text(body: &str, _source: &Rc<Source>) -> Text {
    let location = Location::dummy(0..body.len());
    parse_double_quoted(body, &location).unwrap_or_else(|_| {
        Text(body.chars().map(TextUnit::Literal).collect())
    })
}
