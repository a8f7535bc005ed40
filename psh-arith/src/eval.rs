// This file is part of psh, a POSIX-flavored shell.
// Copyright (C) 2022 WATANABE Yuki
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

//! Recursive-descent evaluation of the operator-precedence grammar described
//! by the shell's `$(( ... ))` arithmetic expansion.
//!
//! Precedence climbs from assignment (lowest) down to unary operators and
//! parenthesized expressions (highest), matching the C-derived grammar POSIX
//! specifies for arithmetic expansion.

use crate::env::Env;
use crate::token::{Operator, PeekableTokens, Term, Token, TokenValue, Value};
use crate::{Error, ErrorCause};
use std::ops::Range;

type EResult<'a, E> = Result<Value, Error<<E as Env>::Error>>;

struct Parser<'a, 'e, E: Env> {
    tokens: PeekableTokens<'a>,
    env: &'e mut E,
    /// Set while evaluating an operand that short-circuit evaluation has
    /// determined cannot affect the result. Variable lookups and
    /// assignments are suppressed (but tokens are still parsed) so that
    /// `(a = 1) || (b = 2)` never stores to `b`.
    skip: bool,
}

impl<'a, 'e, E: Env> Parser<'a, 'e, E> {
    fn peek_op(&mut self) -> Option<Operator> {
        match self.tokens.peek() {
            Ok(Token {
                value: TokenValue::Operator(op),
                ..
            }) => Some(*op),
            _ => None,
        }
    }

    fn next_token(&mut self) -> Result<Token<'a>, Error<E::Error>> {
        self.tokens.next().map_err(Into::into)
    }

    fn lookup(&self, name: &str, location: &Range<usize>) -> EResult<'a, E> {
        if self.skip {
            return Ok(Value::Integer(0));
        }
        match self.env.get_variable(name) {
            Ok(Some(value)) => value.trim().parse().map(Value::Integer).map_err(|_| Error {
                cause: ErrorCause::InvalidVariableValue(value.to_string()),
                location: location.clone(),
            }),
            Ok(None) => Ok(Value::Integer(0)),
            Err(e) => Err(Error {
                cause: ErrorCause::VariableAccessError(e),
                location: location.clone(),
            }),
        }
    }

    fn term_value(&mut self, term: Term<'a>, location: &Range<usize>) -> EResult<'a, E> {
        match term {
            Term::Value(v) => Ok(v),
            Term::Variable { name, location } => self.lookup(name, &location),
        }
    }

    /// Parses a primary expression: a value, variable, parenthesized
    /// expression, or a unary-prefixed expression.
    fn primary(&mut self) -> EResult<'a, E> {
        let token = self.next_token()?;
        match token.value {
            TokenValue::Term(term) => self.term_value(term, &token.location),
            TokenValue::Operator(Operator::OpenParen) => {
                let value = self.assignment()?;
                let close = self.next_token()?;
                match close.value {
                    TokenValue::Operator(Operator::CloseParen) => Ok(value),
                    _ => Err(Error {
                        cause: ErrorCause::UnexpectedToken,
                        location: close.location,
                    }),
                }
            }
            TokenValue::Operator(Operator::Minus) => {
                let i = (self.primary()?).as_int();
                i.checked_neg()
                    .map(Value::Integer)
                    .ok_or_else(|| Error {
                        cause: ErrorCause::Overflow,
                        location: token.location.clone(),
                    })
            }
            TokenValue::Operator(Operator::Plus) => self.primary(),
            TokenValue::Operator(Operator::Bang) => {
                let i = (self.primary()?).as_int();
                Ok(Value::Integer((i == 0) as i64))
            }
            TokenValue::Operator(Operator::Tilde) => {
                let i = (self.primary()?).as_int();
                Ok(Value::Integer(!i))
            }
            TokenValue::Operator(Operator::PlusPlus) | TokenValue::Operator(Operator::MinusMinus) => {
                let delta = if token.value == TokenValue::Operator(Operator::PlusPlus) {
                    1
                } else {
                    -1
                };
                let name_token = self.next_token()?;
                let TokenValue::Term(Term::Variable { name, location }) = name_token.value else {
                    return Err(Error {
                        cause: ErrorCause::UnexpectedToken,
                        location: name_token.location,
                    });
                };
                let old = (self.lookup(name, &location)?).as_int();
                let new = old + delta;
                self.store(name, new, location)?;
                Ok(Value::Integer(new))
            }
            _ => Err(Error {
                cause: ErrorCause::UnexpectedToken,
                location: token.location,
            }),
        }
    }

    fn store(&mut self, name: &str, value: i64, location: Range<usize>) -> Result<(), Error<E::Error>> {
        if self.skip {
            return Ok(());
        }
        self.env
            .assign_variable(name, value.to_string(), location.clone())
            .map_err(|e| Error {
                cause: ErrorCause::VariableAccessError(e),
                location,
            })
    }

    /// Parses a postfix `++`/`--` suffix following a primary expression.
    fn postfix(&mut self) -> EResult<'a, E> {
        // Look ahead: postfix only applies when the primary was a bare
        // variable reference, which we detect by re-peeking before consuming.
        let checkpoint = self.tokens.clone();
        let token = self.next_token()?;
        if let TokenValue::Term(Term::Variable { name, location }) = &token.value {
            let name = *name;
            let location = location.clone();
            match self.peek_op() {
                Some(Operator::PlusPlus) => {
                    self.next_token()?;
                    let old = (self.lookup(name, &location)?).as_int();
                    self.store(name, old + 1, location)?;
                    return Ok(Value::Integer(old));
                }
                Some(Operator::MinusMinus) => {
                    self.next_token()?;
                    let old = (self.lookup(name, &location)?).as_int();
                    self.store(name, old - 1, location)?;
                    return Ok(Value::Integer(old));
                }
                _ => {}
            }
        }
        self.tokens = checkpoint;
        self.primary()
    }

    fn binary<F>(&mut self, operators: &[(Operator, F)], next: fn(&mut Self) -> EResult<'a, E>) -> EResult<'a, E>
    where
        F: Fn(i64, i64, &Range<usize>) -> Result<i64, ErrorCause<E::Error>>,
    {
        let mut left = next(self)?;
        loop {
            let Some(op) = self.peek_op() else { break };
            let Some((_, f)) = operators.iter().find(|(o, _)| *o == op) else {
                break;
            };
            let op_token = self.next_token()?;
            let l = (left).as_int();
            let r = (next(self)?).as_int();
            left = Value::Integer(f(l, r, &op_token.location).map_err(|cause| Error {
                cause,
                location: op_token.location.clone(),
            })?);
        }
        Ok(left)
    }

    fn multiplicative(&mut self) -> EResult<'a, E> {
        self.binary(
            &[
                (Operator::Asterisk, (|a, b, _| a.checked_mul(b).ok_or(ErrorCause::Overflow)) as fn(_, _, _) -> _),
                (Operator::Slash, |a, b, _| {
                    if b == 0 {
                        Err(ErrorCause::DivisionByZero)
                    } else {
                        a.checked_div(b).ok_or(ErrorCause::Overflow)
                    }
                }),
                (Operator::Percent, |a, b, _| {
                    if b == 0 {
                        Err(ErrorCause::DivisionByZero)
                    } else {
                        a.checked_rem(b).ok_or(ErrorCause::Overflow)
                    }
                }),
            ],
            Self::postfix,
        )
    }

    fn additive(&mut self) -> EResult<'a, E> {
        self.binary(
            &[
                (Operator::Plus, (|a, b, _| a.checked_add(b).ok_or(ErrorCause::Overflow)) as fn(_, _, _) -> _),
                (Operator::Minus, |a, b, _| a.checked_sub(b).ok_or(ErrorCause::Overflow)),
            ],
            Self::multiplicative,
        )
    }

    fn shift(&mut self) -> EResult<'a, E> {
        self.binary(
            &[
                (Operator::LessLess, (|a, b, _| {
                    let r = a.wrapping_shl(b as u32);
                    if b < 0 || b >= i64::BITS as i64 || r.wrapping_shr(b as u32) != a {
                        Err(ErrorCause::Overflow)
                    } else {
                        Ok(r)
                    }
                }) as fn(_, _, _) -> _),
                (Operator::GreaterGreater, |a, b, _| {
                    if b < 0 || b >= i64::BITS as i64 {
                        Err(ErrorCause::Overflow)
                    } else {
                        Ok(a.wrapping_shr(b as u32))
                    }
                }),
            ],
            Self::additive,
        )
    }

    fn relational(&mut self) -> EResult<'a, E> {
        self.binary(
            &[
                (Operator::Less, (|a, b, _| Ok((a < b) as i64)) as fn(_, _, _) -> _),
                (Operator::LessEqual, |a, b, _| Ok((a <= b) as i64)),
                (Operator::Greater, |a, b, _| Ok((a > b) as i64)),
                (Operator::GreaterEqual, |a, b, _| Ok((a >= b) as i64)),
            ],
            Self::shift,
        )
    }

    fn equality(&mut self) -> EResult<'a, E> {
        self.binary(
            &[
                (Operator::EqualEqual, (|a, b, _| Ok((a == b) as i64)) as fn(_, _, _) -> _),
                (Operator::BangEqual, |a, b, _| Ok((a != b) as i64)),
            ],
            Self::relational,
        )
    }

    fn bit_and(&mut self) -> EResult<'a, E> {
        self.binary(&[(Operator::And, (|a, b, _| Ok(a & b)) as fn(_, _, _) -> _)], Self::equality)
    }

    fn bit_xor(&mut self) -> EResult<'a, E> {
        self.binary(&[(Operator::Caret, (|a, b, _| Ok(a ^ b)) as fn(_, _, _) -> _)], Self::bit_and)
    }

    fn bit_or(&mut self) -> EResult<'a, E> {
        self.binary(&[(Operator::Bar, (|a, b, _| Ok(a | b)) as fn(_, _, _) -> _)], Self::bit_xor)
    }

    /// Parses `next` while suppressing variable lookups/assignments, used
    /// for the operand of `&&`/`||` that short-circuit evaluation will
    /// discard. Tokens are still fully consumed so the parser position
    /// stays correct.
    fn skipped(&mut self, next: fn(&mut Self) -> EResult<'a, E>) -> EResult<'a, E> {
        let was_skipping = self.skip;
        self.skip = true;
        let result = next(self);
        self.skip = was_skipping;
        result
    }

    fn logical_and(&mut self) -> EResult<'a, E> {
        let mut left = self.bit_or()?;
        while self.peek_op() == Some(Operator::AndAnd) {
            self.next_token()?;
            let l = (left).as_int();
            if l == 0 {
                let _ = self.skipped(Self::bit_or)?;
                left = Value::Integer(0);
            } else {
                let r = (self.bit_or()?).as_int();
                left = Value::Integer((r != 0) as i64);
            }
        }
        Ok(left)
    }

    fn logical_or(&mut self) -> EResult<'a, E> {
        let mut left = self.logical_and()?;
        while self.peek_op() == Some(Operator::BarBar) {
            self.next_token()?;
            let l = (left).as_int();
            if l != 0 {
                let _ = self.skipped(Self::logical_and)?;
                left = Value::Integer(1);
            } else {
                let r = (self.logical_and()?).as_int();
                left = Value::Integer((r != 0) as i64);
            }
        }
        Ok(left)
    }

    fn conditional(&mut self) -> EResult<'a, E> {
        let condition = self.logical_or()?;
        if self.peek_op() == Some(Operator::Question) {
            self.next_token()?;
            let then_value = self.assignment()?;
            let colon = self.next_token()?;
            if colon.value != TokenValue::Operator(Operator::Colon) {
                return Err(Error {
                    cause: ErrorCause::UnexpectedToken,
                    location: colon.location,
                });
            }
            let else_value = self.conditional()?;
            let c = (condition).as_int();
            Ok(if c != 0 { then_value } else { else_value })
        } else {
            Ok(condition)
        }
    }

    fn assignment(&mut self) -> EResult<'a, E> {
        let checkpoint = self.tokens.clone();
        let token = self.next_token()?;
        if let TokenValue::Term(Term::Variable { name, location }) = &token.value {
            let name = *name;
            let location = location.clone();
            let compound = |op: Operator| -> Option<fn(i64, i64) -> Result<i64, ErrorCause<E::Error>>> {
                Some(match op {
                    Operator::PlusEqual => |a, b| a.checked_add(b).ok_or(ErrorCause::Overflow),
                    Operator::MinusEqual => |a, b| a.checked_sub(b).ok_or(ErrorCause::Overflow),
                    Operator::AsteriskEqual => |a, b| a.checked_mul(b).ok_or(ErrorCause::Overflow),
                    Operator::SlashEqual => |a, b| {
                        if b == 0 {
                            Err(ErrorCause::DivisionByZero)
                        } else {
                            a.checked_div(b).ok_or(ErrorCause::Overflow)
                        }
                    },
                    Operator::PercentEqual => |a, b| {
                        if b == 0 {
                            Err(ErrorCause::DivisionByZero)
                        } else {
                            a.checked_rem(b).ok_or(ErrorCause::Overflow)
                        }
                    },
                    Operator::AndEqual => |a, b| Ok(a & b),
                    Operator::BarEqual => |a, b| Ok(a | b),
                    Operator::CaretEqual => |a, b| Ok(a ^ b),
                    Operator::LessLessEqual => |a, b| {
                        if !(0..i64::BITS as i64).contains(&b) {
                            Err(ErrorCause::Overflow)
                        } else {
                            Ok(a.wrapping_shl(b as u32))
                        }
                    },
                    Operator::GreaterGreaterEqual => |a, b| {
                        if !(0..i64::BITS as i64).contains(&b) {
                            Err(ErrorCause::Overflow)
                        } else {
                            Ok(a.wrapping_shr(b as u32))
                        }
                    },
                    _ => return None,
                })
            };
            match self.peek_op() {
                Some(Operator::Equal) => {
                    self.next_token()?;
                    let v = (self.assignment()?).as_int();
                    self.store(name, v, location)?;
                    return Ok(Value::Integer(v));
                }
                Some(op) if compound(op).is_some() => {
                    let op_token_location = self.next_token()?.location;
                    let f = compound(op).unwrap();
                    let old = (self.lookup(name, &location)?).as_int();
                    let rhs = (self.assignment()?).as_int();
                    let v = f(old, rhs).map_err(|cause| Error {
                        cause,
                        location: op_token_location,
                    })?;
                    self.store(name, v, location)?;
                    return Ok(Value::Integer(v));
                }
                _ => {}
            }
        }
        self.tokens = checkpoint;
        self.conditional()
    }
}

/// Evaluates an arithmetic expression string in the context of `env`.
///
/// Variable lookups and assignments (via `=`, `+=`, `++`, etc.) are routed
/// through the [`Env`] trait so the caller's shell variable scope stays the
/// single source of truth.
pub fn eval<E: Env>(expression: &str, env: &mut E) -> Result<Value, Error<E::Error>> {
    let tokens = PeekableTokens::from(expression);
    let mut parser = Parser { tokens, env, skip: false };
    let value = parser.assignment()?;
    let end = parser.next_token()?;
    if end.value != TokenValue::EndOfInput {
        return Err(Error {
            cause: ErrorCause::UnexpectedToken,
            location: end.location,
        });
    }
    Ok(value)
}
