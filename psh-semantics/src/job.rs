// This file is part of psh, a POSIX-flavored shell.
// Copyright (C) 2021 WATANABE Yuki

//! Process-group and job bookkeeping on top of [`psh_env::job::JobSet`].
//!
//! [`psh_env::job::JobSet`] only remembers which pipelines are outstanding;
//! this module is the one place that actually calls `waitpid` and,
//! when job control ([`ShellOption::Monitor`]) is on, hands the controlling
//! terminal to a pipeline's process group and takes it back.

use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{setpgid, tcsetpgrp, Pid};
use psh_env::job::{Job, JobState};
use psh_env::options::Option as ShellOption;
use psh_env::ShellState;

/// Puts `pid` in process group `pgid`, creating the group if `pid == pgid`.
/// Called by both the forking parent and the child (redundantly, which is
/// the standard way to close the race between the two).
pub fn join_process_group(pid: i32, pgid: i32) {
    let _ = setpgid(Pid::from_raw(pid), Pid::from_raw(pgid));
}

/// Gives the terminal to `pgid`, if job control is enabled and stdin is a
/// terminal; a non-interactive shell or one without `Monitor` set leaves the
/// terminal alone.
pub fn hand_terminal_to(pgid: i32, state: &mut ShellState) {
    if !state.options.is_set(ShellOption::Monitor) {
        return;
    }
    if tcsetpgrp(std::io::stdin(), Pid::from_raw(pgid)).is_ok() {
        state.foreground_pgid = Some(pgid);
    }
}

/// Takes the terminal back for the shell itself once a foreground pipeline
/// finishes.
pub fn reclaim_terminal(state: &mut ShellState) {
    if !state.options.is_set(ShellOption::Monitor) {
        return;
    }
    let _ = tcsetpgrp(std::io::stdin(), Pid::from_raw(state.shell_pid));
    state.foreground_pgid = None;
}

fn status_code(status: WaitStatus) -> Option<i32> {
    match status {
        WaitStatus::Exited(_, code) => Some(code),
        WaitStatus::Signaled(_, signal, _) => Some(128 + signal as i32),
        _ => None,
    }
}

/// Blocks until every pid in `pids` has exited, updating the job table as
/// each one reports. Returns each pid's exit code in the same order as
/// `pids` (pipeline stage order), so a caller implementing `pipefail` can
/// pick the rightmost non-zero one; a plain caller just takes the last
/// entry.
pub fn wait_foreground(pids: &[i32], state: &mut ShellState) -> Vec<(i32, i32)> {
    let mut remaining: std::collections::HashSet<i32> = pids.iter().copied().collect();
    let mut statuses = std::collections::HashMap::new();
    while !remaining.is_empty() {
        match waitpid(None, None) {
            Ok(status) => {
                if let Some(pid) = status.pid() {
                    let raw = pid.as_raw();
                    if let Some(code) = status_code(status) {
                        remaining.remove(&raw);
                        statuses.insert(raw, code);
                        state.jobs.report_exit(raw, code);
                    }
                }
            }
            Err(nix::errno::Errno::ECHILD) => break,
            Err(_) => break,
        }
    }
    pids
        .iter()
        .map(|pid| (*pid, statuses.get(pid).copied().unwrap_or(0)))
        .collect()
}

/// Non-blocking reap of any child that has exited since the last call
/// (stands in for `SIGCHLD` delivery, which this core handles by polling at
/// safe points rather than from an async-signal-safe handler). Call this
/// between top-level commands so `jobs`/`wait`/`$!` stay current for
/// background pipelines.
pub fn reap_background(state: &mut ShellState) {
    loop {
        match waitpid(None, Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::StillAlive) | Err(nix::errno::Errno::ECHILD) => break,
            Ok(status) => {
                if let (Some(pid), Some(code)) = (status.pid(), status_code(status)) {
                    state.jobs.report_exit(pid.as_raw(), code);
                } else {
                    continue;
                }
            }
            Err(_) => break,
        }
    }
}

/// Registers a newly started pipeline as a background job (`command &`).
pub fn add_background_job(pgid: i32, pids: Vec<i32>, command: String, state: &mut ShellState) {
    state.jobs.add(Job {
        pgid,
        pids,
        command,
        state: JobState::Running,
    });
}
