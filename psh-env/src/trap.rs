// This file is part of psh, a POSIX-flavored shell.
// Copyright (C) 2021 WATANABE Yuki

//! Trap handler table.
//!
//! `trap CMD SIG` registers a command to run at the next safe point after
//! `SIG` is caught. `EXIT`, `DEBUG`, and `ERR` are pseudo-signals handled the
//! same way: `EXIT` fires once at shell exit, `DEBUG` before each simple
//! command, `ERR` after a command that fails. Real signal delivery uses a
//! self-pipe (handlers may only write one byte, async-signal-safe); this
//! module just stores the action and lets the executor's main loop decide
//! when to run it, since running arbitrary shell code is never safe from
//! inside a signal handler.

use std::collections::HashMap;

/// Pseudo-signals that are not real POSIX signals but are valid `trap`
/// conditions.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum PseudoSignal {
    Exit,
    Debug,
    Err,
}

/// Key under which a trap action is registered.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum Condition {
    Signal(i32),
    Pseudo(PseudoSignal),
}

/// What `trap` should do when the condition occurs.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Action {
    /// Default disposition (as if no trap were set).
    Default,
    /// Ignore the condition entirely.
    Ignore,
    /// Run this command string.
    Command(String),
}

/// Registered trap actions, plus signals pending execution.
#[derive(Debug, Default)]
pub struct TrapSet {
    actions: HashMap<Condition, Action>,
    /// Conditions observed (e.g. by the self-pipe reader) but not yet run,
    /// in delivery order.
    pending: Vec<Condition>,
}

impl TrapSet {
    pub fn set(&mut self, condition: Condition, action: Action) {
        if action == Action::Default {
            self.actions.remove(&condition);
        } else {
            self.actions.insert(condition, action);
        }
    }

    #[must_use]
    pub fn get(&self, condition: &Condition) -> Option<&Action> {
        self.actions.get(condition)
    }

    /// Queues a condition for execution at the next safe point.
    pub fn mark_pending(&mut self, condition: Condition) {
        self.pending.push(condition);
    }

    /// Drains and returns every pending trap's command, in delivery order,
    /// skipping conditions with no registered command (e.g. ignored or
    /// since-cleared).
    pub fn take_pending_commands(&mut self) -> Vec<String> {
        std::mem::take(&mut self.pending)
            .into_iter()
            .filter_map(|c| match self.actions.get(&c) {
                Some(Action::Command(cmd)) => Some(cmd.clone()),
                _ => None,
            })
            .collect()
    }

    /// All registered traps, for `trap -p`/`trap` with no operands.
    pub fn iter(&self) -> impl Iterator<Item = (&Condition, &Action)> {
        self.actions.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_trap_command_is_returned_once() {
        let mut traps = TrapSet::default();
        traps.set(
            Condition::Pseudo(PseudoSignal::Exit),
            Action::Command("echo bye".into()),
        );
        traps.mark_pending(Condition::Pseudo(PseudoSignal::Exit));
        let cmds = traps.take_pending_commands();
        assert_eq!(cmds, vec!["echo bye".to_string()]);
        assert!(traps.take_pending_commands().is_empty());
    }

    #[test]
    fn clearing_a_trap_sets_default() {
        let mut traps = TrapSet::default();
        traps.set(Condition::Signal(2), Action::Ignore);
        traps.set(Condition::Signal(2), Action::Default);
        assert_eq!(traps.get(&Condition::Signal(2)), None);
    }
}
