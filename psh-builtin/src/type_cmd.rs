// This file is part of psh, a POSIX-flavored shell.
// Copyright (C) 2021 WATANABE Yuki

//! `type`: reports whether each name is a function, a built-in, or an
//! executable found on `$PATH`.

use crate::common::{operands, print, Result, Runner};
use psh_env::{semantics::Field, ExitStatus, ShellState};
use std::ops::ControlFlow::Continue;

pub fn r#type(state: &mut ShellState, args: Vec<Field>, _runner: Runner) -> Result {
    let operands = operands(&args);
    let mut all_found = true;
    for name in operands {
        if state.functions.contains_key(name) {
            print(&format!("{name} is a function\n"));
        } else if crate::lookup(name).is_some() {
            print(&format!("{name} is a shell builtin\n"));
        } else if let Some(path) = find_on_path(name) {
            print(&format!("{name} is {}\n", path.display()));
        } else {
            print(&format!("{name}: not found\n"));
            all_found = false;
        }
    }
    Continue(if all_found {
        ExitStatus::SUCCESS
    } else {
        ExitStatus::FAILURE
    })
}

fn find_on_path(name: &str) -> Option<std::path::PathBuf> {
    if name.contains('/') {
        let path = std::path::PathBuf::from(name);
        return path.exists().then_some(path);
    }
    let path_var = std::env::var("PATH").ok()?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}
