// This file is part of psh, a POSIX-flavored shell.
// Copyright (C) 2021 WATANABE Yuki

//! `exit`, `return`, `break`, `continue`, `eval`, `.`/`source`, and `exec`.

use crate::common::{error, operands, Result, Runner};
use psh_env::semantics::Divert;
use psh_env::{semantics::Field, ExitStatus, ShellState};
use std::ops::ControlFlow::Break;

fn parse_status(operands: &[&str], default: ExitStatus) -> Option<ExitStatus> {
    match operands.first() {
        None => Some(default),
        Some(s) => s.parse::<i32>().ok().map(ExitStatus),
    }
}

/// `exit [n]`: diverts to [`Divert::Exit`], which the top-level driver
/// unwinds to after running the `EXIT` trap (§5).
pub fn exit(state: &mut ShellState, args: Vec<Field>, _runner: Runner) -> Result {
    let operands = operands(&args);
    match parse_status(&operands, state.exit_status.into()) {
        Some(status) => Break(Divert::Exit(Some(status))),
        None => error("exit", "numeric argument required"),
    }
}

/// `return [n]`: diverts to [`Divert::Return`], caught by the nearest
/// function call (or, at the top level of a sourced script, by the `.`
/// built-in that invoked it).
pub fn r#return(state: &mut ShellState, args: Vec<Field>, _runner: Runner) -> Result {
    let operands = operands(&args);
    match parse_status(&operands, state.exit_status.into()) {
        Some(status) => Break(Divert::Return(Some(status))),
        None => error("return", "numeric argument required"),
    }
}

fn parse_level(operands: &[&str], name: &str) -> std::result::Result<usize, Result> {
    match operands.first() {
        None => Ok(1),
        Some(s) => match s.parse::<usize>() {
            Ok(n) if n >= 1 => Ok(n),
            _ => Err(error(name, format!("{s}: not a positive integer"))),
        },
    }
}

/// `break [n]`: diverts to [`Divert::Break`], consumed by the `n`th
/// enclosing loop out from the innermost.
pub fn r#break(_state: &mut ShellState, args: Vec<Field>, _runner: Runner) -> Result {
    let operands = operands(&args);
    match parse_level(&operands, "break") {
        Ok(n) => Break(Divert::Break { count: n - 1 }),
        Err(result) => result,
    }
}

/// `continue [n]`: diverts to [`Divert::Continue`].
pub fn r#continue(_state: &mut ShellState, args: Vec<Field>, _runner: Runner) -> Result {
    let operands = operands(&args);
    match parse_level(&operands, "continue") {
        Ok(n) => Break(Divert::Continue { count: n - 1 }),
        Err(result) => result,
    }
}

/// `eval [arg...]`: joins its operands with spaces and runs the result as
/// shell code in the current environment (not a subshell).
pub fn eval(state: &mut ShellState, args: Vec<Field>, runner: Runner) -> Result {
    let source = operands(&args).join(" ");
    runner.run_source(state, &source)
}

/// `.`/`source file`: reads and runs `file`'s contents in the current
/// environment. Unlike a script invoked as a command, this does not fork;
/// `return` inside the file ends the `.` built-in rather than the shell.
pub fn source(state: &mut ShellState, args: Vec<Field>, runner: Runner) -> Result {
    let operands = operands(&args);
    let Some(path) = operands.first() else {
        return error(".", "missing file operand");
    };
    let path = *path;
    match std::fs::read_to_string(path) {
        Ok(contents) => {
            let result = runner.run_source(state, &contents);
            match result {
                Break(Divert::Return(status)) => {
                    std::ops::ControlFlow::Continue(status.unwrap_or(ExitStatus::SUCCESS))
                }
                other => other,
            }
        }
        Err(e) => error(".", format!("{path}: {e}")),
    }
}

/// `exec [command [args...]]`: replaces the shell process image via
/// `execvp`. With no operands, the executor has already applied this
/// command's redirections permanently (§4.5 mode 2) and there is nothing
/// further for the built-in to do.
pub fn exec(_state: &mut ShellState, args: Vec<Field>, _runner: Runner) -> Result {
    let operands = operands(&args);
    let Some(&program) = operands.first() else {
        return crate::common::success();
    };
    use std::ffi::CString;
    let Ok(program_c) = CString::new(program) else {
        return error("exec", format!("{program}: invalid command name"));
    };
    let argv: Vec<CString> = operands
        .iter()
        .filter_map(|a| CString::new(*a).ok())
        .collect();
    match nix::unistd::execvp(&program_c, &argv) {
        Ok(_) => unreachable!("execvp only returns on error"),
        Err(nix::errno::Errno::ENOENT) => {
            std::ops::ControlFlow::Continue(ExitStatus::NOT_FOUND)
        }
        Err(_) => std::ops::ControlFlow::Continue(ExitStatus::NOT_EXECUTABLE),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::NoopRunner;

    fn field(s: &str) -> Field {
        Field::dummy(s)
    }

    #[test]
    fn exit_with_no_operand_reuses_last_status() {
        let mut state = ShellState::new("psh", 1);
        state.exit_status = 3;
        let mut runner = NoopRunner;
        let result = exit(&mut state, vec![field("exit")], &mut runner);
        assert_eq!(result, Break(Divert::Exit(Some(ExitStatus(3)))));
    }

    #[test]
    fn break_level_two_consumes_one_extra_loop() {
        let mut state = ShellState::new("psh", 1);
        let mut runner = NoopRunner;
        let result = r#break(&mut state, vec![field("break"), field("2")], &mut runner);
        assert_eq!(result, Break(Divert::Break { count: 1 }));
    }
}
