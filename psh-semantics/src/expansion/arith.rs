// This file is part of psh, a POSIX-flavored shell.
// Copyright (C) 2022 WATANABE Yuki

//! Arithmetic expansion `$((...))`. The source text has already had its
//! nested command substitutions extracted quote-aware at parse time; this
//! module only has to pre-run those nested substitutions and then hand the
//! resulting expression to [`psh_arith::eval`].

use crate::arith_env::ArithEnv;
use crate::error::ExpansionError;
use psh_env::semantics::CommandRunner;
use psh_env::ShellState;
use psh_syntax::source::Location;

/// Evaluates `content` (the text between `$((` and `))`) and returns the
/// result formatted as a decimal string.
pub fn expand(
    content: &str,
    location: &Location,
    state: &mut ShellState,
    runner: &mut dyn CommandRunner,
) -> Result<String, ExpansionError> {
    let pre_expanded = pre_expand_command_substitutions(content, location, state, runner)?;
    let mut env = ArithEnv { state };
    let value = psh_arith::eval(&pre_expanded, &mut env).map_err(|e| ExpansionError::Arith {
        message: e.to_string(),
        location: location.clone(),
    })?;
    Ok(value.to_string())
}

/// Scans for `$(...)` inside the arithmetic text and replaces each with its
/// captured output, quote-aware (mirrors [`psh_syntax::parser::take_balanced`]
/// for the nested-substitution case, since arithmetic text is plain source
/// rather than pre-split `Word`s).
fn pre_expand_command_substitutions(
    content: &str,
    location: &Location,
    state: &mut ShellState,
    runner: &mut dyn CommandRunner,
) -> Result<String, ExpansionError> {
    let mut out = String::new();
    let mut chars = content.char_indices().peekable();
    while let Some((_, c)) = chars.next() {
        if c == '$' && chars.peek().map(|(_, c)| *c) == Some('(') {
            chars.next();
            let inner = take_balanced(&mut chars);
            let captured = super::command_subst::expand(&inner, location, state, runner)?;
            out.push_str(&captured);
        } else {
            out.push(c);
        }
    }
    Ok(out)
}

fn take_balanced(chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>) -> String {
    let mut depth = 1u32;
    let mut out = String::new();
    let mut in_single = false;
    let mut in_double = false;
    for (_, c) in chars.by_ref() {
        if in_single {
            out.push(c);
            if c == '\'' {
                in_single = false;
            }
            continue;
        }
        if in_double {
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
            '(' => {
                depth += 1;
                out.push(c);
            }
            ')' => {
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

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop;
    impl CommandRunner for Noop {
        fn run_source(
            &mut self,
            _state: &mut ShellState,
            _source: &str,
        ) -> psh_env::semantics::Result<psh_env::ExitStatus> {
            unreachable!()
        }
    }

    #[test]
    fn simple_arithmetic() {
        let mut state = ShellState::new("psh", 1);
        let mut runner = Noop;
        let result = expand("1 + 2 * 3", &Location::dummy(0..0), &mut state, &mut runner).unwrap();
        assert_eq!(result, "7");
    }

    #[test]
    fn variable_increment_persists() {
        let mut state = ShellState::new("psh", 1);
        state
            .assign_variable("a", psh_env::Variable::new("5"))
            .unwrap();
        let mut runner = Noop;
        let result = expand("a++", &Location::dummy(0..0), &mut state, &mut runner).unwrap();
        assert_eq!(result, "5");
        assert_eq!(state.variables.get_str("a"), Some("6"));
    }
}
