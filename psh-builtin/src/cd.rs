// This file is part of psh, a POSIX-flavored shell.
// Copyright (C) 2021 WATANABE Yuki

//! `cd` and `pwd`.

use crate::common::{error, operands, print, success, Result};
use psh_env::{semantics::Field, ShellState, Variable};
use std::path::{Path, PathBuf};

/// `cd [-L|-P] [directory]`. Resolves `-` to `$OLDPWD`, a bare `cd` to
/// `$HOME`, updates `$OLDPWD`/`$PWD`, and changes the process's working
/// directory.
pub fn cd(state: &mut ShellState, args: Vec<Field>, _runner: crate::common::Runner) -> Result {
    let operands = operands(&args);
    let mut physical = false;
    let mut rest = operands.as_slice();
    while let Some(&first) = rest.first() {
        match first {
            "-L" => physical = false,
            "-P" => physical = true,
            _ => break,
        }
        rest = &rest[1..];
    }

    let target = match rest.first() {
        Some(&"-") => match state.variables.get_str("OLDPWD") {
            Some(dir) => {
                println_cd_target(dir);
                dir.to_owned()
            }
            None => return error("cd", "OLDPWD not set"),
        },
        Some(dir) => (*dir).to_owned(),
        None => match state.variables.get_str("HOME") {
            Some(home) => home.to_owned(),
            None => return error("cd", "HOME not set"),
        },
    };

    let old_cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let mut path = PathBuf::from(&target);
    if physical {
        if let Ok(canon) = path.canonicalize() {
            path = canon;
        }
    }
    if let Err(e) = std::env::set_current_dir(&path) {
        return error("cd", format!("{target}: {e}"));
    }

    let new_cwd = std::env::current_dir().unwrap_or(path);
    let _ = state.assign_variable("OLDPWD", Variable::new(old_cwd.display().to_string()));
    let _ = state.assign_variable("PWD", Variable::new(new_cwd.display().to_string()));
    success()
}

fn println_cd_target(dir: &str) {
    print(&format!("{dir}\n"));
}

/// `pwd [-L|-P]`: prints `$PWD` (`-L`, the default) or the physically
/// resolved directory (`-P`).
pub fn pwd(state: &mut ShellState, args: Vec<Field>, _runner: crate::common::Runner) -> Result {
    let operands = operands(&args);
    let physical = operands.iter().any(|a| *a == "-P");
    let path: PathBuf = if !physical {
        if let Some(pwd) = state.variables.get_str("PWD") {
            PathBuf::from(pwd)
        } else {
            std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
        }
    } else {
        std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
    };
    let path: &Path = &path;
    print(&format!("{}\n", path.display()));
    success()
}
