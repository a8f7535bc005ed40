// This file is part of psh, a POSIX-flavored shell.
// Copyright (C) 2021 WATANABE Yuki

//! `set`: toggles shell options and replaces the positional parameters.

use crate::common::{error, print, success, Result, Runner};
use psh_env::options::Option as ShellOption;
use psh_env::{semantics::Field, ShellState};

/// `set [-+<flags>] [-o name | +o name]... [--] [arg...]`.
///
/// With no operands at all, lists every variable (not implemented here —
/// that is `declare`'s no-operand behavior); `set -o`/`set +o` with no name
/// lists current option states.
pub fn set(state: &mut ShellState, args: Vec<Field>, _runner: Runner) -> Result {
    let operands: Vec<&str> = args.iter().skip(1).map(|f| f.value.as_str()).collect();
    let mut i = 0;
    while i < operands.len() {
        let arg = operands[i];
        if arg == "--" {
            i += 1;
            break;
        }
        if arg == "-o" || arg == "+o" {
            let enable = arg.starts_with('-');
            i += 1;
            match operands.get(i) {
                None => {
                    list_options(state);
                    return success();
                }
                Some(name) => {
                    match ShellOption::from_long_name(name) {
                        Some(opt) => state.options.set(opt, enable),
                        None => return error("set", format!("{name}: unknown option")),
                    }
                    i += 1;
                }
            }
            continue;
        }
        if let Some(rest) = arg.strip_prefix('-').filter(|r| !r.is_empty()) {
            if !apply_flags(state, rest, true) {
                return error("set", format!("{arg}: unknown option"));
            }
            i += 1;
            continue;
        }
        if let Some(rest) = arg.strip_prefix('+').filter(|r| !r.is_empty()) {
            if !apply_flags(state, rest, false) {
                return error("set", format!("{arg}: unknown option"));
            }
            i += 1;
            continue;
        }
        break;
    }
    if i < operands.len() {
        let params = operands[i..].iter().map(|s| (*s).to_owned()).collect();
        state.set_positional_params(params);
    }
    success()
}

fn apply_flags(state: &mut ShellState, flags: &str, enable: bool) -> bool {
    for c in flags.chars() {
        match ShellOption::from_short_flag(c) {
            Some(opt) => state.options.set(opt, enable),
            None => return false,
        }
    }
    true
}

fn list_options(state: &ShellState) {
    for opt in [
        ShellOption::ErrExit,
        ShellOption::NoUnset,
        ShellOption::XTrace,
        ShellOption::PipeFail,
        ShellOption::NoClobber,
        ShellOption::NoGlob,
        ShellOption::AllExport,
        ShellOption::Monitor,
        ShellOption::IgnoreEof,
        ShellOption::Vi,
        ShellOption::Emacs,
        ShellOption::Posix,
    ] {
        let state_word = if state.options.is_set(opt) { "on" } else { "off" };
        print(&format!("{:<16}{state_word}\n", opt.long_name()));
    }
}
