// This file is part of psh, a POSIX-flavored shell.
// Copyright (C) 2021 WATANABE Yuki

//! `wait`.
//!
//! The executor reaps children and reports their exit status into
//! [`psh_env::job::JobSet`] as `SIGCHLD`s arrive (or synchronously after a
//! foreground pipeline). This built-in only reads that table; it does not
//! itself call `waitpid`, so `wait`ing on a job that is still running just
//! reports nothing for it rather than blocking — a script relying on
//! blocking `wait` needs the executor to drive the event loop between
//! built-in calls, which the top-level driver does.

use crate::common::{error, operands, Result, Runner};
use psh_env::{semantics::Field, ExitStatus, ShellState};

pub fn wait(state: &mut ShellState, args: Vec<Field>, _runner: Runner) -> Result {
    let operands = operands(&args);
    if operands.is_empty() {
        let done = state.jobs.drain_done();
        let status = done
            .last()
            .map(|j| match j.state {
                psh_env::job::JobState::Done(code) => ExitStatus(code),
                _ => ExitStatus::SUCCESS,
            })
            .unwrap_or(ExitStatus::SUCCESS);
        return std::ops::ControlFlow::Continue(status);
    }

    let mut last_status = ExitStatus::SUCCESS;
    for operand in operands {
        let Ok(pid) = operand.parse::<i32>() else {
            return error("wait", format!("{operand}: not a pid"));
        };
        match state.jobs.find_by_pgid(pid) {
            Some(index) => {
                if let Some(job) = state.jobs.get(index) {
                    if let psh_env::job::JobState::Done(code) = job.state {
                        last_status = ExitStatus(code);
                    }
                }
            }
            None => return error("wait", format!("{pid}: no such job")),
        }
    }
    std::ops::ControlFlow::Continue(last_status)
}
