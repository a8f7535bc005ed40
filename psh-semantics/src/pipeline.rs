// This file is part of psh, a POSIX-flavored shell.
// Copyright (C) 2021 WATANABE Yuki

//! Pipeline execution (`cmd1 | cmd2 | ...`).
//!
//! A single-command pipeline runs directly in this process. A multi-command
//! pipeline forks one child per stage, wiring each stage's stdout to the
//! next stage's stdin, puts every stage in the same process group (the
//! first stage's pid), and waits for all of them. `pipefail` picks the
//! rightmost non-zero stage status instead of the last stage's; `!`
//! inverts the final status, unless execution diverted (a diverting
//! pipeline is never inverted — the divert propagates as-is).

use crate::command;
use nix::unistd::{dup2, fork, pipe, ForkResult};
use psh_env::options::Option as ShellOption;
use psh_env::semantics::{CommandRunner, Divert, ExitStatus, Result};
use psh_env::ShellState;
use psh_syntax::syntax::{Command, Pipeline};
use std::ops::ControlFlow::{Break, Continue};
use std::os::fd::{AsRawFd, OwnedFd};
use std::rc::Rc;

pub fn run(
    pipeline: &Pipeline,
    state: &mut ShellState,
    runner: &mut dyn CommandRunner,
) -> Result<ExitStatus> {
    let result = match pipeline.commands.as_slice() {
        [] => Continue(ExitStatus::SUCCESS),
        [only] => command::run(only, state, runner),
        _ => run_multi_stage(pipeline, state, runner),
    };

    match result {
        Continue(status) => {
            let status = if pipeline.negation {
                invert(status)
            } else {
                status
            };
            state.exit_status = status.0;
            Continue(status)
        }
        other => other,
    }
}

fn invert(status: ExitStatus) -> ExitStatus {
    if status.is_successful() {
        ExitStatus::FAILURE
    } else {
        ExitStatus::SUCCESS
    }
}

/// Runs `command` in a process forked off for one pipeline stage. A
/// subshell boundary absorbs any `break`/`continue`/`return` the command
/// produces — they have nowhere to propagate to on the other side of a
/// `fork` — so this collapses a divert to a plain exit status, still
/// honoring `exit`'s `EXIT` trap before the process actually goes away.
fn run_stage_in_child(
    command: &Rc<Command>,
    state: &mut ShellState,
    runner: &mut dyn CommandRunner,
) -> ! {
    let status = match command::run(command, state, runner) {
        Continue(status) => status,
        Break(Divert::Exit(status)) => {
            crate::trap::run_exit_trap(state, runner);
            status.unwrap_or(ExitStatus::SUCCESS)
        }
        Break(other) => other.exit_status().unwrap_or(ExitStatus::SUCCESS),
    };
    std::process::exit(status.0);
}

fn run_multi_stage(
    pipeline: &Pipeline,
    state: &mut ShellState,
    runner: &mut dyn CommandRunner,
) -> Result<ExitStatus> {
    let stage_count = pipeline.commands.len();
    let mut pids = Vec::with_capacity(stage_count);
    let mut pgid = 0;
    let mut prev_read: Option<OwnedFd> = None;

    for (i, command) in pipeline.commands.iter().enumerate() {
        let is_last = i + 1 == stage_count;
        let next_pipe = if is_last {
            None
        } else {
            match pipe() {
                Ok(pair) => Some(pair),
                Err(e) => {
                    eprintln!("psh: pipe: {e}");
                    state.exit_status = ExitStatus::ERROR.0;
                    return Continue(ExitStatus::ERROR);
                }
            }
        };

        // Safety: single-threaded core; no other thread can race this fork.
        match unsafe { fork() } {
            Ok(ForkResult::Child) => {
                let pid = std::process::id() as i32;
                crate::job::join_process_group(pid, pgid);
                if let Some(read_fd) = prev_read {
                    let _ = dup2(read_fd.as_raw_fd(), 0);
                    drop(read_fd);
                }
                if let Some((read_fd, write_fd)) = next_pipe {
                    let _ = dup2(write_fd.as_raw_fd(), 1);
                    drop(write_fd);
                    drop(read_fd);
                }
                run_stage_in_child(command, state, runner);
            }
            Ok(ForkResult::Parent { child }) => {
                let pid = child.as_raw();
                if pgid == 0 {
                    pgid = pid;
                }
                crate::job::join_process_group(pid, pgid);
                pids.push(pid);
                prev_read = next_pipe.map(|(read_fd, write_fd)| {
                    drop(write_fd);
                    read_fd
                });
            }
            Err(e) => {
                eprintln!("psh: fork: {e}");
                state.exit_status = ExitStatus::ERROR.0;
                return Continue(ExitStatus::ERROR);
            }
        }
    }

    crate::job::hand_terminal_to(pgid, state);
    let results = crate::job::wait_foreground(&pids, state);
    crate::job::reclaim_terminal(state);

    let status = final_status(&results, state);
    state.exit_status = status.0;
    Continue(status)
}

/// Picks the pipeline's reported status: the last stage's, unless
/// `pipefail` is set, in which case the rightmost non-zero stage wins.
fn final_status(results: &[(i32, i32)], state: &ShellState) -> ExitStatus {
    if state.options.is_set(ShellOption::PipeFail) {
        for &(_, code) in results.iter().rev() {
            if code != 0 {
                return ExitStatus(code);
            }
        }
        ExitStatus::SUCCESS
    } else {
        results
            .last()
            .map(|&(_, code)| ExitStatus(code))
            .unwrap_or(ExitStatus::SUCCESS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use psh_syntax::parse_script;

    struct Noop;
    impl CommandRunner for Noop {
        fn run_source(
            &mut self,
            _state: &mut ShellState,
            _source: &str,
        ) -> psh_env::semantics::Result<ExitStatus> {
            unreachable!()
        }
    }

    fn first_pipeline(source: &str) -> Pipeline {
        let list = parse_script(source, psh_syntax::LexerConfig::default()).unwrap();
        let item = list.0.into_iter().next().unwrap();
        Rc::try_unwrap(item.and_or).unwrap().first
    }

    #[test]
    fn two_stage_pipeline_reports_last_stage_status() {
        let mut state = ShellState::new("psh", 1);
        let pipeline = first_pipeline("true | false");
        let mut runner = Noop;
        let result = run(&pipeline, &mut state, &mut runner);
        assert_eq!(result, Continue(ExitStatus::FAILURE));
    }

    #[test]
    fn pipefail_reports_rightmost_nonzero_stage() {
        let mut state = ShellState::new("psh", 1);
        state.options.set(ShellOption::PipeFail, true);
        let pipeline = first_pipeline("false | true | true");
        let mut runner = Noop;
        let result = run(&pipeline, &mut state, &mut runner);
        assert_eq!(result, Continue(ExitStatus::FAILURE));
    }

    #[test]
    fn negation_inverts_a_successful_status() {
        let mut state = ShellState::new("psh", 1);
        let pipeline = first_pipeline("! true");
        let mut runner = Noop;
        let result = run(&pipeline, &mut state, &mut runner);
        assert_eq!(result, Continue(ExitStatus::FAILURE));
    }
}
