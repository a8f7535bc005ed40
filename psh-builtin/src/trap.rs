// This file is part of psh, a POSIX-flavored shell.
// Copyright (C) 2021 WATANABE Yuki

//! `trap`.

use crate::common::{error, print, success, Result, Runner};
use psh_env::trap::{Action, Condition, PseudoSignal};
use psh_env::{semantics::Field, ShellState};

fn parse_condition(name: &str) -> Option<Condition> {
    match name.to_ascii_uppercase().as_str() {
        "EXIT" | "0" => Some(Condition::Pseudo(PseudoSignal::Exit)),
        "DEBUG" => Some(Condition::Pseudo(PseudoSignal::Debug)),
        "ERR" => Some(Condition::Pseudo(PseudoSignal::Err)),
        other => signal_number(other).map(Condition::Signal),
    }
}

/// Resolves a handful of common signal names (with or without the `SIG`
/// prefix) plus bare numbers; a fuller table belongs to a dedicated signal
/// module, out of scope for this core.
fn signal_number(name: &str) -> Option<i32> {
    let name = name.strip_prefix("SIG").unwrap_or(name);
    if let Ok(n) = name.parse() {
        return Some(n);
    }
    let n = match name {
        "HUP" => 1,
        "INT" => 2,
        "QUIT" => 3,
        "ILL" => 4,
        "TRAP" => 5,
        "ABRT" => 6,
        "FPE" => 8,
        "KILL" => 9,
        "USR1" => 10,
        "SEGV" => 11,
        "USR2" => 12,
        "PIPE" => 13,
        "ALRM" => 14,
        "TERM" => 15,
        "CHLD" => 17,
        "CONT" => 18,
        "STOP" => 19,
        "TSTP" => 20,
        "TTIN" => 21,
        "TTOU" => 22,
        "WINCH" => 28,
        _ => return None,
    };
    Some(n)
}

fn condition_name(condition: &Condition) -> String {
    match condition {
        Condition::Pseudo(PseudoSignal::Exit) => "EXIT".to_owned(),
        Condition::Pseudo(PseudoSignal::Debug) => "DEBUG".to_owned(),
        Condition::Pseudo(PseudoSignal::Err) => "ERR".to_owned(),
        Condition::Signal(n) => n.to_string(),
    }
}

/// `trap [-p] [action condition...]`. `action` of `-` resets the default
/// disposition; an empty string ignores the condition. With no operands,
/// prints every registered trap as `trap ACTION CONDITION`.
pub fn trap(state: &mut ShellState, args: Vec<Field>, _runner: Runner) -> Result {
    let operands: Vec<&str> = args.iter().skip(1).map(|f| f.value.as_str()).collect();
    if operands.is_empty() || operands == ["-p"] {
        for (condition, action) in state.traps.iter() {
            if let Action::Command(cmd) = action {
                print(&format!(
                    "trap -- {} {}\n",
                    psh_quote::quote(cmd),
                    condition_name(condition)
                ));
            }
        }
        return success();
    }

    let action_text = operands[0];
    let action = match action_text {
        "-" => Action::Default,
        "" => Action::Ignore,
        cmd => Action::Command(cmd.to_owned()),
    };
    for name in &operands[1..] {
        match parse_condition(name) {
            Some(condition) => state.traps.set(condition, action.clone()),
            None => return error("trap", format!("{name}: unknown condition")),
        }
    }
    success()
}
