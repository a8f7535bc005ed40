// This file is part of psh, a POSIX-flavored shell.
// Copyright (C) 2021 WATANABE Yuki

//! Top-level word expansion: [`expand_word`] and [`expand_words`] run the
//! five-stage pipeline (tilde, parameter/command/arithmetic substitution,
//! field splitting, pathname expansion, quote removal) over a
//! [`psh_syntax::syntax::Word`].

use crate::error::ExpansionError;
use crate::expansion::attr::{AttrChar, AttrField, Expansion, Origin};
use crate::expansion::{arith, command_subst, glob, param, quote_removal, split, tilde};
use nix::unistd::{dup2, fork, pipe, ForkResult};
use psh_env::semantics::CommandRunner;
use psh_env::options::Option as ShellOption;
use psh_env::ShellState;
use psh_syntax::source::Location;
use psh_syntax::syntax::{BackquoteUnit, EscapeUnit, ExpansionMode, Text, TextUnit, Word, WordUnit};
use std::os::fd::AsRawFd;

/// Expands one [`TextUnit`] into `dest`, tagging every produced character
/// `is_quoted` according to `quoted` (the quote context the unit appeared
/// in — double-quoted text passes `true`, unquoted text `false`).
fn expand_text_unit<E: Expansion>(
    unit: &TextUnit,
    quoted: bool,
    state: &mut ShellState,
    runner: &mut dyn CommandRunner,
    dest: &mut E,
) -> Result<(), ExpansionError> {
    match unit {
        TextUnit::Literal(c) => {
            dest.push_char(AttrChar {
                value: *c,
                origin: Origin::Literal,
                is_quoted: quoted,
                is_quoting: false,
            });
        }
        TextUnit::Backslashed(c) => {
            dest.push_char(AttrChar {
                value: *c,
                origin: Origin::Literal,
                is_quoted: true,
                is_quoting: false,
            });
        }
        TextUnit::RawParam { param: p, location } => {
            param::expand_raw(p, location, quoted, state, runner, dest)?;
        }
        TextUnit::BracedParam(braced) => {
            param::expand(braced, quoted, state, runner, dest)?;
        }
        TextUnit::CommandSubst { content, location } => {
            let text = command_subst::expand(content, location, state, runner)?;
            dest.push_str(&text, Origin::SoftExpansion, quoted, false);
        }
        TextUnit::Backquote { content, location } => {
            let source: String = content
                .iter()
                .map(|u| match u {
                    BackquoteUnit::Literal(c) | BackquoteUnit::Backslashed(c) => *c,
                })
                .collect();
            let text = command_subst::expand(&source, location, state, runner)?;
            dest.push_str(&text, Origin::SoftExpansion, quoted, false);
        }
        TextUnit::Arith { content, location } => {
            let text = arith::expand(content, location, state, runner)?;
            dest.push_str(&text, Origin::SoftExpansion, quoted, false);
        }
    }
    Ok(())
}

fn expand_text<E: Expansion>(
    text: &Text,
    state: &mut ShellState,
    runner: &mut dyn CommandRunner,
    dest: &mut E,
) -> Result<(), ExpansionError> {
    for unit in &text.0 {
        expand_text_unit(unit, true, state, runner, dest)?;
    }
    Ok(())
}

/// Expands a here-document body: quote rules are the same as double-quoted
/// text (`$`, `` ` ``, `\` remain active; everything else is literal), used
/// by `crate::redir` when the delimiter was not quoted.
pub fn expand_here_doc_text(
    text: &Text,
    state: &mut ShellState,
    runner: &mut dyn CommandRunner,
) -> Result<String, ExpansionError> {
    let mut field = AttrField::default();
    expand_text(text, state, runner, &mut field)?;
    Ok(quote_removal::remove(&field))
}

/// Forks a child to run `content`, exposing one end of a pipe to the parent
/// as `/dev/fd/N` and leaving the other end connected to the child's
/// stdin/stdout per `direction` (§4.5's process substitution).
fn expand_process_subst(
    direction: psh_syntax::syntax::ProcessSubstDirection,
    content: &str,
    location: &Location,
    state: &mut ShellState,
    runner: &mut dyn CommandRunner,
) -> Result<String, ExpansionError> {
    use psh_syntax::syntax::ProcessSubstDirection::{In, Out};

    let (read_fd, write_fd) = pipe().map_err(|e| ExpansionError::CommandSubst {
        message: format!("pipe: {e}"),
        location: location.clone(),
    })?;

    // Safety: single-threaded core; see command_subst::expand.
    match unsafe { fork() } {
        Ok(ForkResult::Child) => {
            match direction {
                In => {
                    drop(read_fd);
                    let _ = dup2(write_fd.as_raw_fd(), 1);
                }
                Out => {
                    drop(write_fd);
                    let _ = dup2(read_fd.as_raw_fd(), 0);
                }
            }
            let result = runner.run_source(state, content);
            let status = match result {
                std::ops::ControlFlow::Continue(s) => s,
                std::ops::ControlFlow::Break(d) => d.exit_status().unwrap_or_default(),
            };
            std::process::exit(status.0);
        }
        Ok(ForkResult::Parent { child }) => {
            let (kept, path) = match direction {
                In => {
                    drop(write_fd);
                    (read_fd, format!("/dev/fd/{}", read_fd.as_raw_fd()))
                }
                Out => {
                    drop(read_fd);
                    (write_fd, format!("/dev/fd/{}", write_fd.as_raw_fd()))
                }
            };
            // The fd must outlive this function so the path stays valid for
            // the lifetime of the command using it; the process substitution
            // child is reaped by the job table once the fd is eventually
            // closed by its consumer.
            std::mem::forget(kept);
            state.jobs.add(psh_env::job::Job {
                pgid: child.as_raw(),
                pids: vec![child.as_raw()],
                command: content.to_owned(),
                state: psh_env::job::JobState::Running,
            });
            Ok(path)
        }
        Err(e) => Err(ExpansionError::CommandSubst {
            message: format!("fork: {e}"),
            location: location.clone(),
        }),
    }
}

fn expand_word_unit<E: Expansion>(
    unit: &WordUnit,
    is_leftmost: bool,
    next_starts_with_slash: bool,
    state: &mut ShellState,
    runner: &mut dyn CommandRunner,
    dest: &mut E,
) -> Result<(), ExpansionError> {
    match unit {
        WordUnit::Unquoted(text_unit) => expand_text_unit(text_unit, false, state, runner, dest),
        WordUnit::SingleQuote(s) => {
            dest.push_str(s, Origin::Literal, true, false);
            Ok(())
        }
        WordUnit::DoubleQuote(text) => expand_text(text, state, runner, dest),
        WordUnit::DollarSingleQuote(escaped) => {
            for unit in &escaped.0 {
                let c = match unit {
                    EscapeUnit::Literal(c) | EscapeUnit::Escaped(c) => *c,
                };
                dest.push_char(AttrChar {
                    value: c,
                    origin: Origin::Literal,
                    is_quoted: true,
                    is_quoting: false,
                });
            }
            Ok(())
        }
        WordUnit::Tilde(name) => {
            if is_leftmost {
                let chars = tilde::expand(name, next_starts_with_slash, state, &Location::dummy(0..0));
                for c in chars {
                    dest.push_char(c);
                }
            } else {
                dest.push_char(AttrChar::literal('~'));
                dest.push_str(name, Origin::Literal, false, false);
            }
            Ok(())
        }
        WordUnit::ProcessSubst {
            direction,
            content,
            location,
        } => {
            let path = expand_process_subst(*direction, content, location, state, runner)?;
            dest.push_str(&path, Origin::SoftExpansion, false, false);
            Ok(())
        }
    }
}

/// Expands `word` into a single non-splitting [`AttrField`]: the path used
/// for assignment values (§4.3's assignment-word rule) and for sub-word
/// operands (`${v:-default}`'s default word, trim/substitution patterns).
pub fn expand_word_single(
    word: &Word,
    state: &mut ShellState,
    runner: &mut dyn CommandRunner,
) -> Result<AttrField, ExpansionError> {
    let mut field = AttrField::default();
    let len = word.units.len();
    for (i, unit) in word.units.iter().enumerate() {
        let next_starts_with_slash = word
            .units
            .get(i + 1)
            .map(|u| starts_with_slash(u))
            .unwrap_or(false);
        expand_word_unit(unit, i == 0, next_starts_with_slash, state, runner, &mut field)?;
    }
    let _ = len;
    Ok(field)
}

fn starts_with_slash(unit: &WordUnit) -> bool {
    matches!(unit, WordUnit::Unquoted(TextUnit::Literal('/')))
}

/// Drops a field produced by splitting/expansion when it is empty and
/// nothing in it was explicitly quoted (POSIX: an empty field from an
/// unquoted expansion disappears; `""` survives because it is explicitly
/// quoted).
fn keep_field(field: &AttrField) -> bool {
    !field.strip().is_empty() || field.0.iter().any(|c| c.is_quoting || c.is_quoted)
}

/// Expands `word` to zero or more final argv strings, running the full
/// five-stage pipeline. `is_assignment` suppresses field splitting on the
/// unquoted expansion results (§4.3's assignment-word subtlety); pathname
/// expansion and quote removal still apply in that case (an assignment
/// value is not globbed either, since it is never split into multiple
/// words, but quote removal must still run to produce the final string).
pub fn expand_word(
    word: &Word,
    is_assignment: bool,
    state: &mut ShellState,
    runner: &mut dyn CommandRunner,
) -> Result<Vec<String>, ExpansionError> {
    if is_assignment {
        let field = expand_word_single(word, state, runner)?;
        return Ok(vec![quote_removal::remove(&field)]);
    }

    let mut fields: Vec<AttrField> = vec![AttrField::default()];
    for (i, unit) in word.units.iter().enumerate() {
        let next_starts_with_slash = word
            .units
            .get(i + 1)
            .map(|u| starts_with_slash(u))
            .unwrap_or(false);
        expand_word_unit(unit, i == 0, next_starts_with_slash, state, runner, &mut fields)?;
    }

    let mut split_fields = Vec::new();
    for field in fields {
        split_fields.extend(split::split(field, state));
    }

    let noglob = state.options.is_set(ShellOption::NoGlob);
    let mut globbed_fields = Vec::new();
    for field in split_fields {
        if !noglob && glob::has_wildcard(&field) {
            match glob::expand(&field) {
                Some(matches) => {
                    for m in matches {
                        globbed_fields.push(AttrField(
                            m.chars().map(AttrChar::literal).collect(),
                        ));
                    }
                }
                None => globbed_fields.push(field),
            }
        } else {
            globbed_fields.push(field);
        }
    }

    Ok(globbed_fields
        .iter()
        .filter(|f| keep_field(f))
        .map(quote_removal::remove)
        .collect())
}

/// Expands every word of a simple command's argument list, honoring each
/// word's [`ExpansionMode`] (assignment-style words parsed as `Single` never
/// split).
pub fn expand_words(
    words: &[(Word, ExpansionMode)],
    state: &mut ShellState,
    runner: &mut dyn CommandRunner,
) -> Result<Vec<String>, ExpansionError> {
    let mut out = Vec::new();
    for (word, mode) in words {
        let is_assignment = matches!(mode, ExpansionMode::Single);
        out.extend(expand_word(word, is_assignment, state, runner)?);
    }
    Ok(out)
}

/// Like [`expand_words`], but for a declaration builtin's operand list
/// (`declare`/`export`/`local`/`readonly`/`typeset`): an operand shaped
/// `NAME=value` is expanded in single/no-split mode regardless of the
/// parser's `ExpansionMode`, per §4.3's assignment-word subtlety. The parser
/// tags every argv word `Multiple` because it has no notion of which
/// commands are declaration builtins; that knowledge only exists at the
/// call site in `command.rs`, once the command name has been resolved, so
/// it is threaded in here as an explicit decision rather than inferred from
/// the word's literal text alone.
pub fn expand_words_as_declaration(
    words: &[(Word, ExpansionMode)],
    state: &mut ShellState,
    runner: &mut dyn CommandRunner,
) -> Result<Vec<String>, ExpansionError> {
    let mut out = Vec::new();
    for (word, mode) in words {
        let is_assignment = matches!(mode, ExpansionMode::Single) || looks_like_assignment_operand(word);
        out.extend(expand_word(word, is_assignment, state, runner)?);
    }
    Ok(out)
}

/// True if `word` begins with an unquoted, unescaped `NAME=` prefix: the
/// shape a declaration builtin's `NAME=value` operand takes. Only a
/// wholly-literal prefix up to the `=` counts — `"x"=1` or `$x=1` are not
/// assignment-shaped, matching the lexer's own `ASSIGNMENT_WORD` rule for
/// the leading-assignment-prefix case.
fn looks_like_assignment_operand(word: &Word) -> bool {
    let mut name = String::new();
    for unit in &word.units {
        match unit {
            WordUnit::Unquoted(TextUnit::Literal(c)) => {
                if *c == '=' {
                    return name.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_')
                        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
                }
                name.push(*c);
            }
            _ => return false,
        }
    }
    false
}
