// This file is part of psh, a POSIX-flavored shell.
// Copyright (C) 2021 WATANABE Yuki

//! Trap dispatch: runs commands queued in [`psh_env::trap::TrapSet`] at the
//! safe points the executor calls into this module (between top-level
//! commands, and at shell exit). Signal delivery itself (the self-pipe that
//! calls [`psh_env::trap::TrapSet::mark_pending`]) lives outside this crate;
//! this module only turns "pending" into "run".

use psh_env::semantics::CommandRunner;
use psh_env::trap::{Condition, PseudoSignal};
use psh_env::ShellState;

/// Runs every trap command queued since the last call, in delivery order.
/// Each trap command runs with its own fresh exit status; the overall `$?`
/// visible to the rest of the script is restored once all pending traps have
/// run, since a trap must not clobber the status of the command that
/// triggered it.
pub fn run_pending(state: &mut ShellState, runner: &mut dyn CommandRunner) {
    let commands = state.traps.take_pending_commands();
    if commands.is_empty() {
        return;
    }
    let saved_status = state.exit_status;
    for command in commands {
        let _ = runner.run_source(state, &command);
    }
    state.exit_status = saved_status;
}

/// Marks `EXIT` pending and runs it immediately; called once, right before
/// the shell process actually terminates.
pub fn run_exit_trap(state: &mut ShellState, runner: &mut dyn CommandRunner) {
    state.traps.mark_pending(Condition::Pseudo(PseudoSignal::Exit));
    run_pending(state, runner);
}

/// Marks `ERR` pending if a trap is registered for it; called after any
/// command that reports a non-zero exit status outside a condition that
/// POSIX exempts (the right-hand side of `&&`/`||`, the condition of
/// `if`/`while`/`until`, a negated pipeline).
pub fn mark_err(state: &mut ShellState) {
    if state.traps.get(&Condition::Pseudo(PseudoSignal::Err)).is_some() {
        state.traps.mark_pending(Condition::Pseudo(PseudoSignal::Err));
    }
}

/// Marks `DEBUG` pending if a trap is registered for it; called before each
/// simple command runs.
pub fn mark_debug(state: &mut ShellState) {
    if state
        .traps
        .get(&Condition::Pseudo(PseudoSignal::Debug))
        .is_some()
    {
        state
            .traps
            .mark_pending(Condition::Pseudo(PseudoSignal::Debug));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use psh_env::trap::Action;

    struct Echo(Vec<String>);
    impl CommandRunner for Echo {
        fn run_source(
            &mut self,
            _state: &mut ShellState,
            source: &str,
        ) -> psh_env::semantics::Result<psh_env::ExitStatus> {
            self.0.push(source.to_owned());
            std::ops::ControlFlow::Continue(psh_env::ExitStatus::SUCCESS)
        }
    }

    #[test]
    fn pending_trap_runs_and_restores_exit_status() {
        let mut state = ShellState::new("psh", 1);
        state.exit_status = 7;
        state.traps.set(
            Condition::Pseudo(PseudoSignal::Exit),
            Action::Command("echo bye".into()),
        );
        state.traps.mark_pending(Condition::Pseudo(PseudoSignal::Exit));
        let mut runner = Echo(Vec::new());
        run_pending(&mut state, &mut runner);
        assert_eq!(runner.0, vec!["echo bye".to_string()]);
        assert_eq!(state.exit_status, 7);
    }

    #[test]
    fn no_pending_traps_is_a_no_op() {
        let mut state = ShellState::new("psh", 1);
        let mut runner = Echo(Vec::new());
        run_pending(&mut state, &mut runner);
        assert!(runner.0.is_empty());
    }
}
