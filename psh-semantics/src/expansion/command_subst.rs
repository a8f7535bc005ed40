// This file is part of psh, a POSIX-flavored shell.
// Copyright (C) 2021 WATANABE Yuki

//! Command substitution (`$(...)`, `` `...` ``): runs `content` as a command
//! in a subshell, captures its stdout, and trims trailing newlines.
//!
//! The source text handed to this module has already been extracted
//! quote-aware at parse time (`psh-syntax`'s balanced scanners); this module
//! only has to fork, run it, and read back the pipe.

use crate::error::ExpansionError;
use nix::sys::wait::waitpid;
use nix::unistd::{dup2, fork, pipe, read, ForkResult};
use psh_env::semantics::CommandRunner;
use psh_env::ShellState;
use psh_syntax::source::Location;
use std::os::fd::AsRawFd;

/// Runs `content` in a forked subshell, returning its captured stdout with
/// trailing newlines stripped.
pub fn expand(
    content: &str,
    location: &Location,
    state: &mut ShellState,
    runner: &mut dyn CommandRunner,
) -> Result<String, ExpansionError> {
    let (read_fd, write_fd) = pipe().map_err(|e| ExpansionError::CommandSubst {
        message: format!("pipe: {e}"),
        location: location.clone(),
    })?;

    // Safety: single-threaded core (per the concurrency model); no other
    // thread can race this fork.
    match unsafe { fork() } {
        Ok(ForkResult::Child) => {
            drop(read_fd);
            let _ = dup2(write_fd.as_raw_fd(), 1);
            drop(write_fd);
            let result = runner.run_source(state, content);
            let status = match result {
                std::ops::ControlFlow::Continue(s) => s,
                std::ops::ControlFlow::Break(d) => d.exit_status().unwrap_or_default(),
            };
            std::process::exit(status.0);
        }
        Ok(ForkResult::Parent { child }) => {
            drop(write_fd);
            let mut out = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                match read(read_fd.as_raw_fd(), &mut buf) {
                    Ok(0) => break,
                    Ok(n) => out.extend_from_slice(&buf[..n]),
                    Err(nix::errno::Errno::EINTR) => continue,
                    Err(e) => {
                        return Err(ExpansionError::CommandSubst {
                            message: format!("read: {e}"),
                            location: location.clone(),
                        })
                    }
                }
            }
            drop(read_fd);
            let _ = waitpid(child, None);
            let mut text = String::from_utf8_lossy(&out).into_owned();
            while text.ends_with('\n') {
                text.pop();
            }
            Ok(text)
        }
        Err(e) => {
            drop(read_fd);
            drop(write_fd);
            Err(ExpansionError::CommandSubst {
                message: format!("fork: {e}"),
                location: location.clone(),
            })
        }
    }
}
