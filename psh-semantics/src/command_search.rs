// This file is part of psh, a POSIX-flavored shell.
// Copyright (C) 2021 WATANABE Yuki

//! Command search: function → built-in → `$PATH`, per the order a simple
//! command's name is resolved in.

use psh_env::ShellState;
use std::path::PathBuf;

/// What a command name resolved to.
pub enum Target {
    /// A user-defined function (`function name`, run with `$1.. $n` replaced
    /// by the command's own arguments).
    Function(String),
    /// A shell built-in utility.
    Builtin(psh_builtin::Main),
    /// An external executable found on `$PATH`.
    External(PathBuf),
    /// Nothing named `name` exists anywhere in the search order.
    NotFound,
}

/// Resolves `name` to what actually runs when a simple command invokes it,
/// in POSIX's search order: function, then built-in, then `$PATH`. A name
/// containing a `/` is never searched for — it is used directly as a path
/// (handled by the caller, which only calls this function for a bare name).
#[must_use]
pub fn search(name: &str, state: &ShellState) -> Target {
    if state.functions.contains_key(name) {
        return Target::Function(name.to_owned());
    }
    if let Some(main) = psh_builtin::lookup(name) {
        return Target::Builtin(main);
    }
    match find_on_path(name, state) {
        Some(path) => Target::External(path),
        None => Target::NotFound,
    }
}

/// Searches `$PATH` for an executable regular file named `name`, POSIX
/// style: empty `PATH` entries mean the current directory.
#[must_use]
fn find_on_path(name: &str, state: &ShellState) -> Option<PathBuf> {
    let path_var = state.variables.get_str("PATH").unwrap_or("");
    for dir in path_var.split(':') {
        let candidate = if dir.is_empty() {
            PathBuf::from(name)
        } else {
            PathBuf::from(dir).join(name)
        };
        if is_executable_file(&candidate) {
            return Some(candidate);
        }
    }
    None
}

fn is_executable_file(path: &std::path::Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    match std::fs::metadata(path) {
        Ok(meta) => meta.is_file() && meta.permissions().mode() & 0o111 != 0,
        Err(_) => false,
    }
}
