// This file is part of psh, a POSIX-flavored shell.
// Copyright (C) 2021 WATANABE Yuki

//! Ties the lexer/parser crate to this one: runs a [`List`] to completion,
//! threading `errexit`/`ERR`-trap exemptions through conditional contexts,
//! and exposes the two entry points an embedder (a REPL, a script runner)
//! actually calls.

use crate::command;
use nix::unistd::{fork, ForkResult};
use psh_env::options::Option as ShellOption;
use psh_env::semantics::{CommandRunner, Divert, ExitStatus, Result};
use psh_env::ShellState;
use psh_syntax::syntax::{AndOr, AndOrList, Command, Item, List};
use std::ops::ControlFlow::{Break, Continue};

/// Runs every item of `list` in order. `exempt` marks the whole list as a
/// context POSIX exempts from `errexit`/`ERR` (an `if`/`while`/`until`
/// condition) — `command.rs` passes `true` for those, `false` everywhere
/// else.
pub fn run_list(
    list: &List,
    exempt: bool,
    state: &mut ShellState,
    runner: &mut dyn CommandRunner,
) -> Result<ExitStatus> {
    let mut status = ExitStatus::SUCCESS;
    for item in &list.0 {
        status = match run_item(item, exempt, state, runner) {
            Continue(s) => s,
            other => return other,
        };
        crate::trap::run_pending(state, runner);
        crate::job::reap_background(state);
    }
    state.exit_status = status.0;
    Continue(status)
}

fn run_item(
    item: &Item,
    exempt: bool,
    state: &mut ShellState,
    runner: &mut dyn CommandRunner,
) -> Result<ExitStatus> {
    if item.async_flag.is_some() {
        let status = run_async(item, state, runner);
        state.exit_status = status.0;
        return Continue(status);
    }
    run_and_or_list(&item.and_or, exempt, state, runner)
}

/// Runs one `cmd1 && cmd2 || cmd3 ...` chain, short-circuiting on
/// `&&`/`||` the usual way. `errexit`/`ERR` only ever look at the pipeline
/// whose status the chain as a whole reports — every earlier pipeline is
/// followed by `&&`/`||` and is exempt regardless of `exempt`, matching
/// POSIX's own exemption for those positions.
fn run_and_or_list(
    andor: &AndOrList,
    exempt: bool,
    state: &mut ShellState,
    runner: &mut dyn CommandRunner,
) -> Result<ExitStatus> {
    let mut status = match crate::pipeline::run(&andor.first, state, runner) {
        Continue(s) => s,
        other => return other,
    };
    let mut negated = andor.first.negation;

    for (op, pipeline) in &andor.rest {
        let should_run = match op {
            AndOr::AndThen => status.is_successful(),
            AndOr::OrElse => !status.is_successful(),
        };
        if !should_run {
            continue;
        }
        status = match crate::pipeline::run(pipeline, state, runner) {
            Continue(s) => s,
            other => return other,
        };
        negated = pipeline.negation;
    }

    if !exempt && !negated && !status.is_successful() {
        crate::trap::mark_err(state);
        if state.options.is_set(ShellOption::ErrExit) {
            state.exit_status = status.0;
            return Break(Divert::Exit(Some(status)));
        }
    }

    state.exit_status = status.0;
    Continue(status)
}

/// Forks `command &` off into its own process group and registers it as a
/// background job without waiting for it. A `break`/`continue`/`return` the
/// backgrounded chain produces has nowhere to go once it's on the other
/// side of the fork, so it collapses to a plain exit status, same as a
/// pipeline stage.
fn run_async(item: &Item, state: &mut ShellState, runner: &mut dyn CommandRunner) -> ExitStatus {
    let label = describe_item(item);
    // Safety: single-threaded core; no other thread can race this fork.
    match unsafe { fork() } {
        Ok(ForkResult::Child) => {
            let pid = std::process::id() as i32;
            crate::job::join_process_group(pid, pid);
            let status = match run_and_or_list(&item.and_or, false, state, runner) {
                Continue(status) => status,
                Break(Divert::Exit(status)) => {
                    crate::trap::run_exit_trap(state, runner);
                    status.unwrap_or(ExitStatus::SUCCESS)
                }
                Break(other) => other.exit_status().unwrap_or(ExitStatus::SUCCESS),
            };
            std::process::exit(status.0);
        }
        Ok(ForkResult::Parent { child }) => {
            let pid = child.as_raw();
            crate::job::join_process_group(pid, pid);
            crate::job::add_background_job(pid, vec![pid], label, state);
            ExitStatus::SUCCESS
        }
        Err(e) => {
            eprintln!("psh: fork: {e}");
            ExitStatus::ERROR
        }
    }
}

/// Best-effort job label for `jobs`/`wait` output: the literal command name
/// for a plain simple command, a generic placeholder for anything fancier
/// (the syntax tree has no `Display` impl to reconstruct exact source text
/// from).
fn describe_item(item: &Item) -> String {
    if let [only] = item.and_or.first.commands.as_slice() {
        if let Command::Simple(simple) = &**only {
            if let Some((word, _)) = simple.words.first() {
                if let Some(literal) = word.to_string_if_literal() {
                    return literal;
                }
            }
        }
    }
    "shell job".to_owned()
}

/// A [`CommandRunner`] that parses its source with [`psh_syntax::parse_script`]
/// and runs it with [`run_list`]; this is what `eval`, `.`, and top-level
/// script execution actually use to get from source text to behavior.
#[derive(Default)]
pub struct Runner;

impl CommandRunner for Runner {
    fn run_source(&mut self, state: &mut ShellState, source: &str) -> Result<ExitStatus> {
        let list = match psh_syntax::parse_script(source, psh_syntax::LexerConfig::default()) {
            Ok(list) => list,
            Err(e) => {
                eprintln!("psh: {e}");
                state.exit_status = ExitStatus::ERROR.0;
                return Continue(ExitStatus::ERROR);
            }
        };
        run_list(&list, false, state, self)
    }
}

/// Runs one line (or a whole script's worth) of source text read from an
/// interactive prompt or `-c`. Returns the resulting exit status; a
/// `Divert::Exit`/`Divert::Return` that escapes all the way out here is
/// treated the same as a normal fall-through, since there's no enclosing
/// context left to propagate it to.
pub fn run_command(state: &mut ShellState, source: &str) -> ExitStatus {
    let mut runner = Runner;
    match runner.run_source(state, source) {
        Continue(status) => status,
        Break(Divert::Exit(status)) => {
            crate::trap::run_exit_trap(state, &mut runner);
            status.unwrap_or(ExitStatus::SUCCESS)
        }
        Break(other) => other.exit_status().unwrap_or(ExitStatus::SUCCESS),
    }
}

/// Reads `path` in full and runs it the same way [`run_command`] runs a
/// string, reporting a read failure as [`ExitStatus::NOT_FOUND`].
pub fn run_script_file(state: &mut ShellState, path: &std::path::Path) -> ExitStatus {
    match std::fs::read_to_string(path) {
        Ok(source) => run_command(state, &source),
        Err(e) => {
            eprintln!("psh: {}: {e}", path.display());
            ExitStatus::NOT_FOUND
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_status_of_empty_list_is_success() {
        let mut state = ShellState::new("psh", 1);
        let status = run_command(&mut state, "");
        assert_eq!(status, ExitStatus::SUCCESS);
    }

    #[test]
    fn and_then_short_circuits_on_failure() {
        let mut state = ShellState::new("psh", 1);
        let status = run_command(&mut state, "false && x=1");
        assert_eq!(status, ExitStatus::FAILURE);
        assert_eq!(state.variables.get_str("x"), None);
    }

    #[test]
    fn errexit_stops_the_script_on_a_failing_command() {
        let mut state = ShellState::new("psh", 1);
        state.options.set(ShellOption::ErrExit, true);
        let status = run_command(&mut state, "false\nx=1");
        assert_eq!(status, ExitStatus::FAILURE);
        assert_eq!(state.variables.get_str("x"), None);
    }

    #[test]
    fn errexit_does_not_fire_inside_an_if_condition() {
        let mut state = ShellState::new("psh", 1);
        state.options.set(ShellOption::ErrExit, true);
        let status = run_command(&mut state, "if false; then :; fi\nx=1");
        assert_eq!(status, ExitStatus::SUCCESS);
        assert_eq!(state.variables.get_str("x"), Some("1"));
    }

    #[test]
    fn errexit_does_not_fire_on_a_negated_pipeline() {
        let mut state = ShellState::new("psh", 1);
        state.options.set(ShellOption::ErrExit, true);
        let status = run_command(&mut state, "! true\nx=1");
        assert_eq!(status, ExitStatus::SUCCESS);
        assert_eq!(state.variables.get_str("x"), Some("1"));
    }
}
