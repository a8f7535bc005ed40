// This file is part of psh, a POSIX-flavored shell.
// Copyright (C) 2021 WATANABE Yuki

//! `:`, `true`, `false`, `echo`, and `printf`.

use crate::common::{error, operands, print, success, Result};
use psh_env::semantics::Field;
use psh_env::ShellState;

/// `:`: does nothing, exits successfully. Still expands its arguments (the
/// caller already did that before invoking the built-in) and still applies
/// any redirections attached to the command (the executor's job, not ours).
pub fn colon(_state: &mut ShellState, _args: Vec<Field>, _runner: crate::common::Runner) -> Result {
    success()
}

pub fn r#true(_state: &mut ShellState, _args: Vec<Field>, _runner: crate::common::Runner) -> Result {
    success()
}

pub fn r#false(_state: &mut ShellState, _args: Vec<Field>, _runner: crate::common::Runner) -> Result {
    use std::ops::ControlFlow::Continue;
    Continue(psh_env::ExitStatus::FAILURE)
}

/// `echo [-n] [-e] args...`. `-e` interprets a small set of backslash
/// escapes (`\n \t \\ \c` stop-output); without it, operands print as
/// written. `-n` suppresses the trailing newline.
pub fn echo(_state: &mut ShellState, args: Vec<Field>, _runner: crate::common::Runner) -> Result {
    let mut rest = operands(&args);
    let mut newline = true;
    let mut interpret_escapes = false;
    loop {
        match rest.first() {
            Some(&"-n") => {
                newline = false;
                rest.remove(0);
            }
            Some(&"-e") => {
                interpret_escapes = true;
                rest.remove(0);
            }
            Some(&"-E") => {
                interpret_escapes = false;
                rest.remove(0);
            }
            _ => break,
        }
    }

    let mut out = String::new();
    let mut stop = false;
    for (i, word) in rest.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        if interpret_escapes {
            let mut chars = word.chars().peekable();
            while let Some(c) = chars.next() {
                if c != '\\' {
                    out.push(c);
                    continue;
                }
                match chars.next() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some('r') => out.push('\r'),
                    Some('\\') => out.push('\\'),
                    Some('a') => out.push('\u{7}'),
                    Some('c') => {
                        stop = true;
                        break;
                    }
                    Some(other) => {
                        out.push('\\');
                        out.push(other);
                    }
                    None => out.push('\\'),
                }
            }
        } else {
            out.push_str(word);
        }
        if stop {
            break;
        }
    }
    if newline && !stop {
        out.push('\n');
    }
    print(&out);
    success()
}

/// `printf format [args...]`: the format string is reused as many times as
/// needed to consume every argument (POSIX's recycling rule); if there are
/// more conversions than arguments, the missing ones are treated as empty
/// strings or zero.
pub fn printf(_state: &mut ShellState, args: Vec<Field>, _runner: crate::common::Runner) -> Result {
    let operands = operands(&args);
    let Some((format, rest)) = operands.split_first() else {
        return error("printf", "missing format operand");
    };
    let mut rest = rest.to_vec();
    let mut out = String::new();
    loop {
        let consumed = render_format(format, &mut rest, &mut out);
        if rest.is_empty() || !consumed {
            break;
        }
    }
    print(&out);
    success()
}

/// Renders `format` once, consuming arguments from `args` for each `%`
/// conversion. Returns whether at least one conversion consumed an
/// argument, so the caller knows whether recycling the format would make
/// progress.
fn render_format(format: &str, args: &mut Vec<&str>, out: &mut String) -> bool {
    let mut consumed_any = false;
    let mut chars = format.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('\\') => out.push('\\'),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => out.push('\\'),
            }
            continue;
        }
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('%') => out.push('%'),
            Some('s') => {
                out.push_str(&next_arg(args));
                consumed_any = true;
            }
            Some('d') | Some('i') => {
                let value: i64 = next_arg(args).trim().parse().unwrap_or(0);
                out.push_str(&value.to_string());
                consumed_any = true;
            }
            Some('c') => {
                if let Some(ch) = next_arg(args).chars().next() {
                    out.push(ch);
                }
                consumed_any = true;
            }
            Some(other) => {
                out.push('%');
                out.push(other);
            }
            None => out.push('%'),
        }
    }
    consumed_any
}

fn next_arg(args: &mut Vec<&str>) -> String {
    if args.is_empty() {
        String::new()
    } else {
        args.remove(0).to_owned()
    }
}
