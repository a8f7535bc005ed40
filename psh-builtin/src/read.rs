// This file is part of psh, a POSIX-flavored shell.
// Copyright (C) 2021 WATANABE Yuki

//! `read`.

use crate::common::{error, operands, Result, Runner};
use psh_env::variable::Variable;
use psh_env::{semantics::Field, ShellState};
use std::io::BufRead as _;

/// `read [-r] name...`: reads one line from stdin, splits it on `$IFS`
/// into as many fields as there are names (the last name receives any
/// remainder, POSIX's usual "last variable gets the rest" rule), and
/// assigns them. `-r` disables backslash line continuation/escaping.
pub fn read(state: &mut ShellState, args: Vec<Field>, _runner: Runner) -> Result {
    let mut operands = operands(&args);
    let raw = if operands.first() == Some(&"-r") {
        operands.remove(0);
        true
    } else {
        false
    };
    if operands.is_empty() {
        return error("read", "at least one variable name is required");
    }

    let ifs = state
        .variables
        .get_str("IFS")
        .map(str::to_owned)
        .unwrap_or_else(|| " \t\n".to_owned());

    let mut line = String::new();
    let stdin = std::io::stdin();
    let mut handle = stdin.lock();
    loop {
        let mut chunk = String::new();
        let bytes = match handle.read_line(&mut chunk) {
            Ok(n) => n,
            Err(e) => return error("read", e),
        };
        if bytes == 0 {
            if line.is_empty() {
                return std::ops::ControlFlow::Continue(psh_env::ExitStatus::FAILURE);
            }
            break;
        }
        let chunk = chunk.strip_suffix('\n').unwrap_or(&chunk).to_owned();
        if !raw && chunk.ends_with('\\') {
            line.push_str(&chunk[..chunk.len() - 1]);
            continue;
        }
        line.push_str(&chunk);
        break;
    }

    let fields = split_ifs(&line, &ifs, operands.len());
    for (i, name) in operands.iter().enumerate() {
        let value = fields.get(i).cloned().unwrap_or_default();
        if let Err(e) = state.assign_variable(name, Variable::new(value)) {
            return error("read", e);
        }
    }
    std::ops::ControlFlow::Continue(psh_env::ExitStatus::SUCCESS)
}

/// Splits `line` on any character in `ifs`, collapsing runs of IFS
/// whitespace and coalescing overflow fields into the last slot.
fn split_ifs(line: &str, ifs: &str, max_fields: usize) -> Vec<String> {
    if max_fields == 0 {
        return Vec::new();
    }
    let is_ifs = |c: char| ifs.contains(c);
    let mut fields = Vec::new();
    let mut rest = line.trim_start_matches(is_ifs);
    while fields.len() + 1 < max_fields {
        let Some(idx) = rest.find(is_ifs) else {
            break;
        };
        fields.push(rest[..idx].to_owned());
        rest = rest[idx..].trim_start_matches(is_ifs);
    }
    fields.push(rest.to_owned());
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_ifs_puts_remainder_in_last_field() {
        let fields = split_ifs("a b c d", " ", 3);
        assert_eq!(fields, vec!["a", "b", "c d"]);
    }

    #[test]
    fn split_ifs_collapses_runs_of_whitespace() {
        let fields = split_ifs("  a   b  ", " ", 2);
        assert_eq!(fields, vec!["a", "b"]);
    }
}
