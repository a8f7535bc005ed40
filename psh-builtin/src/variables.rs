// This file is part of psh, a POSIX-flavored shell.
// Copyright (C) 2021 WATANABE Yuki

//! `export`, `unset`, `readonly`, `declare`/`local`/`typeset`, and `shift`.

use crate::common::{error, operands, print, success, Result};
use psh_env::scope::AssignError;
use psh_env::variable::{Attributes, Variable};
use psh_env::{semantics::Field, ShellState};

fn split_assignment(operand: &str) -> (String, Option<String>) {
    match operand.split_once('=') {
        Some((name, value)) => (name.to_owned(), Some(value.to_owned())),
        None => (operand.to_owned(), None),
    }
}

fn report_assign_err(name: &str, err: AssignError) -> Result {
    error(name, err)
}

/// `export [-p] [name[=value]...]`. With no operands, lists exported
/// variables (`-p` form, `name=value`, one per line).
pub fn export(state: &mut ShellState, args: Vec<Field>, _runner: crate::common::Runner) -> Result {
    let operands = operands(&args);
    if operands.is_empty() || operands == ["-p"] {
        let mut names: Vec<_> = state
            .variables
            .iter_visible()
            .filter(|(_, v)| v.is_exported())
            .map(|(n, v)| (n.to_owned(), v.export_string().unwrap_or_default()))
            .collect();
        names.sort();
        for (name, value) in names {
            print(&format!("export {name}={}\n", psh_quote::quote(&value)));
        }
        return success();
    }
    for operand in operands {
        if operand == "-p" {
            continue;
        }
        let (name, value) = split_assignment(operand);
        let existing = state.variables.get(&name).cloned();
        let variable = match (existing, value) {
            (Some(mut v), Some(new_value)) => {
                v.value = Some(psh_env::variable::Value::scalar(new_value));
                v.attributes |= Attributes::EXPORT;
                v
            }
            (Some(mut v), None) => {
                v.attributes |= Attributes::EXPORT;
                v
            }
            (None, Some(new_value)) => Variable::new(new_value).exported(),
            (None, None) => Variable {
                attributes: Attributes::EXPORT,
                ..Default::default()
            },
        };
        if let Err(e) = state.assign_variable(&name, variable) {
            return report_assign_err(&name, e);
        }
    }
    success()
}

/// `unset [-v|-f] name...`. `-f` removes a function instead of a variable.
pub fn unset(state: &mut ShellState, args: Vec<Field>, _runner: crate::common::Runner) -> Result {
    let mut operands = operands(&args);
    let mut functions = false;
    if operands.first() == Some(&"-f") {
        functions = true;
        operands.remove(0);
    } else if operands.first() == Some(&"-v") {
        operands.remove(0);
    }
    for name in operands {
        if functions {
            state.functions.remove(name);
        } else if let Err(e) = state.unset_variable(name) {
            return report_assign_err(name, e);
        }
    }
    success()
}

/// `readonly [-p] [name[=value]...]`: like `declare -r`, but its own
/// built-in for POSIX compatibility.
pub fn readonly(state: &mut ShellState, args: Vec<Field>, _runner: crate::common::Runner) -> Result {
    declare_like(state, args, Attributes::READONLY, false)
}

/// `declare`/`typeset [-x] [-r] [-i] [-a] [-A] [name[=value]...]`, global
/// (or innermost-scope, for `typeset` called inside a function body — the
/// distinction `declare` vs `local` is only in which assignment helper is
/// used, below).
pub fn declare(state: &mut ShellState, args: Vec<Field>, _runner: crate::common::Runner) -> Result {
    declare_like(state, args, Attributes::empty(), false)
}

/// `local [name[=value]...]`: assigns into the innermost (current
/// function's) scope even if an outer scope already defines the name.
pub fn local(state: &mut ShellState, args: Vec<Field>, _runner: crate::common::Runner) -> Result {
    declare_like(state, args, Attributes::empty(), true)
}

fn declare_like(
    state: &mut ShellState,
    args: Vec<Field>,
    forced_attrs: Attributes,
    local_scope: bool,
) -> Result {
    let operands = operands(&args);
    let mut attrs = forced_attrs;
    let mut names = Vec::new();
    for operand in operands {
        match operand {
            "-x" => attrs |= Attributes::EXPORT,
            "-r" => attrs |= Attributes::READONLY,
            "-i" => attrs |= Attributes::INTEGER,
            "-a" => attrs |= Attributes::ARRAY,
            "-A" => attrs |= Attributes::ASSOC_ARRAY,
            "-l" => attrs |= Attributes::LOWERCASE,
            "-u" => attrs |= Attributes::UPPERCASE,
            _ => names.push(operand),
        }
    }
    if names.is_empty() {
        let mut entries: Vec<_> = state.variables.iter_visible().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        for (name, var) in entries {
            if let Some(value) = var.export_string() {
                print(&format!("{name}={}\n", psh_quote::quote(&value)));
            }
        }
        return success();
    }
    for name in names {
        let (name, value) = split_assignment(name);
        let mut variable = match value {
            Some(v) => Variable::new(v),
            None => Variable {
                value: Some(psh_env::variable::Value::scalar("")),
                ..Default::default()
            },
        };
        variable.attributes |= attrs;
        let result = if local_scope {
            state.assign_local(&name, variable)
        } else {
            state.assign_variable(&name, variable)
        };
        if let Err(e) = result {
            return report_assign_err(&name, e);
        }
    }
    success()
}

/// `shift [n]`: drops the first `n` (default 1) positional parameters.
pub fn shift(state: &mut ShellState, args: Vec<Field>, _runner: crate::common::Runner) -> Result {
    let operands = operands(&args);
    let n: usize = match operands.first() {
        Some(s) => match s.parse() {
            Ok(n) => n,
            Err(_) => return error("shift", format!("{s}: not a valid number")),
        },
        None => 1,
    };
    let params = state.positional_params();
    if n > params.len() {
        return error("shift", "shift count out of range");
    }
    let remaining = params[n..].to_vec();
    state.set_positional_params(remaining);
    success()
}
