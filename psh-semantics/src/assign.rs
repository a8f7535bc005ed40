// This file is part of psh, a POSIX-flavored shell.
// Copyright (C) 2021 WATANABE Yuki

//! Assignment-word expansion: `NAME=value` and `NAME=(a b c)`.
//!
//! `is_assignment` (§4.3's assignment-word subtlety) is never inferred from
//! `=` appearing in a literal; every call site here already knows it is
//! looking at a real [`psh_syntax::syntax::Assign`] (from
//! `SimpleCommand.assigns`) or an operand of a builtin that
//! [`psh_builtin::treats_operands_as_assignments`].

use crate::error::ExpansionError;
use crate::expansion::word::expand_word;
use psh_env::semantics::CommandRunner;
use psh_env::{ShellState, Variable};
use psh_syntax::syntax::{Assign, Value};

/// Expands and applies one `NAME=value`/`NAME=(a b c)` assignment into the
/// scope appropriate to the caller: `local_scope` selects
/// [`ShellState::assign_local`] (function parameters, `local` builtin
/// operands) over the default scope-aware [`ShellState::assign_variable`].
pub fn apply(
    assign: &Assign,
    local_scope: bool,
    state: &mut ShellState,
    runner: &mut dyn CommandRunner,
) -> Result<(), ExpansionError> {
    let variable = match &assign.value {
        Value::Scalar(word) => {
            let fields = expand_word(word, true, state, runner)?;
            Variable::new(fields.into_iter().next().unwrap_or_default())
                .assigned_at(assign.location.clone())
        }
        Value::Array(words) => {
            let mut elements = Vec::new();
            for word in words {
                elements.extend(expand_word(word, false, state, runner)?);
            }
            Variable::new_indexed_array(elements).assigned_at(assign.location.clone())
        }
    };

    let result = if local_scope {
        state.assign_local(&assign.name, variable)
    } else {
        state.assign_variable(&assign.name, variable)
    };
    result.map_err(|source| ExpansionError::Assign {
        name: assign.name.clone(),
        source,
        location: assign.location.clone(),
    })
}

/// Expands and applies every assignment in `assigns`, in order (later
/// assignments may reference earlier ones, e.g. `a=1 b=$a`).
pub fn apply_all(
    assigns: &[Assign],
    local_scope: bool,
    state: &mut ShellState,
    runner: &mut dyn CommandRunner,
) -> Result<(), ExpansionError> {
    for assign in assigns {
        apply(assign, local_scope, state, runner)?;
    }
    Ok(())
}
