// This file is part of psh, a POSIX-flavored shell.
// Copyright (C) 2021 WATANABE Yuki

//! Redirection semantics (§4.5).
//!
//! Applying a [`Redir`] always does the same two things: expand its operand
//! (or here-document body), then move the resulting file descriptor onto the
//! redirection's target fd with `dup2`. The three modes named in §4.5 differ
//! only in what happens to the *original* content of the target fd
//! afterwards:
//!
//! - temporary (a simple command's own redirections): [`RedirGuard`] records
//!   the previous fd and restores it once the command finishes.
//! - permanent (`exec >file`): the caller takes the guard's saves and
//!   discards them instead of restoring.
//! - child (a forked pipeline stage): the fork already gives the child an
//!   unshared fd table, so no restoration is needed; the child just leaks its
//!   `RedirGuard` by calling [`std::mem::forget`] on it.

use crate::expansion::{expand_here_doc_text, word::expand_word_single};
use nix::fcntl::{open, OFlag};
use nix::sys::stat::Mode;
use nix::unistd::{close, dup, dup2, write};
use psh_env::semantics::CommandRunner;
use psh_env::options::Option as ShellOption;
use psh_env::ShellState;
use psh_syntax::syntax::{Redir, RedirBody, RedirOp};
use std::os::fd::{AsRawFd, IntoRawFd, RawFd};
use thiserror::Error;

#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum RedirError {
    #[error(transparent)]
    Expansion(#[from] crate::error::ExpansionError),
    #[error("cannot open {path}: {message}")]
    Open { path: String, message: String },
    #[error("{operand} is not a valid file descriptor")]
    BadFd { operand: String },
    #[error("cannot duplicate file descriptor: {message}")]
    Dup { message: String },
    #[error("cannot prepare here-document: {message}")]
    HereDoc { message: String },
}

/// One target fd's original content, saved so it can be restored later.
struct SavedFd {
    target: RawFd,
    /// `None` means the target fd was not open before the redirection (and
    /// should simply be closed again on restore).
    saved: Option<RawFd>,
}

/// Applies a list of redirections, remembering how to undo them.
///
/// Dropping the guard restores every target fd to what it held before
/// [`RedirGuard::apply`] ran, in reverse order. A caller that wants the
/// redirections to stick (`exec >file`, or a forked child that is about to
/// exec/exit anyway) should [`std::mem::forget`] the guard instead of
/// letting it drop.
#[must_use]
pub struct RedirGuard {
    saved: Vec<SavedFd>,
}

impl RedirGuard {
    /// Expands and performs every redirection in `redirs`, in order. On
    /// failure, already-applied redirections in this call are undone before
    /// the error is returned.
    pub fn apply(
        redirs: &[Redir],
        state: &mut ShellState,
        runner: &mut dyn CommandRunner,
    ) -> Result<RedirGuard, RedirError> {
        let mut guard = RedirGuard { saved: Vec::new() };
        for redir in redirs {
            if let Err(e) = guard.apply_one(redir, state, runner) {
                drop(guard);
                return Err(e);
            }
        }
        Ok(guard)
    }

    fn apply_one(
        &mut self,
        redir: &Redir,
        state: &mut ShellState,
        runner: &mut dyn CommandRunner,
    ) -> Result<(), RedirError> {
        let target = redir.fd_or_default().0;
        let source_fd = self.open_source(redir, state, runner)?;
        self.save(target);

        // `-1` is the `dup_operand`/`CloseIn`/`CloseOut` sentinel for "close
        // the target instead of copying onto it" (`<&-`, `>&-`, `<&-` via a
        // bare `-` operand).
        if source_fd == -1 {
            let _ = close(target);
            return Ok(());
        }

        let result = dup2(source_fd, target);
        if source_fd != target {
            let _ = close(source_fd);
        }
        result.map_err(|e| RedirError::Dup {
            message: e.to_string(),
        })?;
        Ok(())
    }

    /// Opens (or otherwise produces) the file descriptor that will be
    /// `dup2`'d onto the redirection's target; the caller closes it.
    fn open_source(
        &self,
        redir: &Redir,
        state: &mut ShellState,
        runner: &mut dyn CommandRunner,
    ) -> Result<RawFd, RedirError> {
        match &redir.body {
            RedirBody::HereDoc(here_doc) => {
                let content = here_doc.content.get().expect("here-doc content unfilled");
                let text = if here_doc.delimiter_quoted {
                    content
                        .0
                        .iter()
                        .map(|u| match u {
                            psh_syntax::syntax::TextUnit::Literal(c)
                            | psh_syntax::syntax::TextUnit::Backslashed(c) => *c,
                            _ => unreachable!("quoted here-doc body has no active expansions"),
                        })
                        .collect::<String>()
                } else {
                    expand_here_doc_text(content, state, runner)?
                };
                make_here_doc_fd(&text)
            }
            RedirBody::Normal { operand } => {
                let field = expand_word_single(operand, state, runner)?;
                let operand = field.strip();
                match redir.op {
                    RedirOp::FileIn => open_file(&operand, OFlag::O_RDONLY, Mode::empty()),
                    RedirOp::FileInOut => open_file(
                        &operand,
                        OFlag::O_RDWR | OFlag::O_CREAT,
                        default_create_mode(),
                    ),
                    RedirOp::FileOut => {
                        let mut flags = OFlag::O_WRONLY | OFlag::O_CREAT | OFlag::O_TRUNC;
                        if state.options.is_set(ShellOption::NoClobber) {
                            flags |= OFlag::O_EXCL;
                        }
                        open_file(&operand, flags, default_create_mode())
                    }
                    RedirOp::FileClobber => open_file(
                        &operand,
                        OFlag::O_WRONLY | OFlag::O_CREAT | OFlag::O_TRUNC,
                        default_create_mode(),
                    ),
                    RedirOp::FileAppend => open_file(
                        &operand,
                        OFlag::O_WRONLY | OFlag::O_CREAT | OFlag::O_APPEND,
                        default_create_mode(),
                    ),
                    RedirOp::FdIn | RedirOp::FdOut => dup_operand(&operand),
                    RedirOp::HereString => {
                        let mut text = operand;
                        text.push('\n');
                        make_here_doc_fd(&text)
                    }
                    RedirOp::CloseIn | RedirOp::CloseOut => Ok(-1),
                    RedirOp::HereDoc | RedirOp::HereDocDash => {
                        unreachable!("here-doc body is RedirBody::HereDoc, not Normal")
                    }
                }
            }
        }
    }

    fn save(&mut self, target: RawFd) {
        let saved = dup(target).ok();
        self.saved.push(SavedFd { target, saved });
    }
}

impl Drop for RedirGuard {
    fn drop(&mut self) {
        for saved in self.saved.iter().rev() {
            match saved.saved {
                Some(fd) => {
                    let _ = dup2(fd, saved.target);
                    let _ = close(fd);
                }
                None => {
                    let _ = close(saved.target);
                }
            }
        }
    }
}

fn default_create_mode() -> Mode {
    Mode::S_IRUSR | Mode::S_IWUSR | Mode::S_IRGRP | Mode::S_IWGRP | Mode::S_IROTH | Mode::S_IWOTH
}

fn open_file(path: &str, flags: OFlag, mode: Mode) -> Result<RawFd, RedirError> {
    open(path, flags, mode)
        .map(IntoRawFd::into_raw_fd)
        .map_err(|e| RedirError::Open {
            path: path.to_owned(),
            message: e.to_string(),
        })
}

/// `<&fd`/`>&fd`: duplicates an existing fd named by a decimal operand, or
/// passes `-1` through for `CloseIn`/`CloseOut` handled separately, or `-`
/// meaning "close the target" (handled by the caller treating a `-1` result
/// the same as `CloseIn`/`CloseOut`).
fn dup_operand(operand: &str) -> Result<RawFd, RedirError> {
    if operand == "-" {
        return Ok(-1);
    }
    let source: RawFd = operand.parse().map_err(|_| RedirError::BadFd {
        operand: operand.to_owned(),
    })?;
    dup(source).map_err(|e| RedirError::Dup {
        message: e.to_string(),
    })
}

/// Backs a here-document/here-string with an unnamed temporary file: written
/// once, then rewound, matching the teacher's approach of using `tempfile`
/// rather than a pipe (a pipe can deadlock on content larger than its
/// buffer; a regular file cannot).
fn make_here_doc_fd(content: &str) -> Result<RawFd, RedirError> {
    let file = tempfile::tempfile().map_err(|e| RedirError::HereDoc {
        message: e.to_string(),
    })?;
    let fd = file.as_raw_fd();
    write(&file, content.as_bytes()).map_err(|e| RedirError::HereDoc {
        message: e.to_string(),
    })?;
    nix::unistd::lseek(fd, 0, nix::unistd::Whence::SeekSet).map_err(|e| RedirError::HereDoc {
        message: e.to_string(),
    })?;
    // `file` must outlive the fd we hand back; leak the `File` wrapper so its
    // `Drop` does not close the fd out from under the caller, who now owns it
    // via `fd` alone and will close it once dup2'd elsewhere.
    std::mem::forget(file);
    Ok(fd)
}

#[cfg(test)]
mod tests {
    use super::*;
    use psh_syntax::syntax::Word;
    use std::io::Read;

    struct Noop;
    impl CommandRunner for Noop {
        fn run_source(
            &mut self,
            _state: &mut ShellState,
            _source: &str,
        ) -> psh_env::semantics::Result<psh_env::ExitStatus> {
            unreachable!()
        }
    }

    fn literal_word(s: &str) -> Word {
        Word {
            units: s
                .chars()
                .map(|c| {
                    psh_syntax::syntax::WordUnit::Unquoted(psh_syntax::syntax::TextUnit::Literal(c))
                })
                .collect(),
            location: psh_syntax::source::Location::dummy(0..s.len()),
        }
    }

    /// Redirects an unused high fd (3), rather than a standard stream, so
    /// the test can't interfere with the harness's own stdout.
    #[test]
    fn file_out_then_in_round_trips_through_an_fd() {
        let mut state = ShellState::new("psh", 1);
        let mut runner = Noop;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");

        let out_redir = Redir {
            fd: Some(psh_syntax::syntax::Fd(3)),
            op: RedirOp::FileOut,
            body: RedirBody::Normal {
                operand: literal_word(path.to_str().unwrap()),
            },
        };
        {
            let _guard = RedirGuard::apply(
                std::slice::from_ref(&out_redir),
                &mut state,
                &mut runner,
            )
            .unwrap();
            write(unsafe { std::os::fd::BorrowedFd::borrow_raw(3) }, b"hi").unwrap();
        }
        // The guard restored fd 3 to whatever it held before (closed), so a
        // fresh write to it now would fail; what matters is the file itself.
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "hi");

        let in_redir = Redir {
            fd: Some(psh_syntax::syntax::Fd(3)),
            op: RedirOp::FileIn,
            body: RedirBody::Normal {
                operand: literal_word(path.to_str().unwrap()),
            },
        };
        let mut buf = String::new();
        {
            let _guard =
                RedirGuard::apply(std::slice::from_ref(&in_redir), &mut state, &mut runner)
                    .unwrap();
            let mut f = unsafe {
                <std::fs::File as std::os::fd::FromRawFd>::from_raw_fd(dup(3).unwrap())
            };
            f.read_to_string(&mut buf).unwrap();
        }
        assert_eq!(buf, "hi");
    }

    #[test]
    fn here_string_is_readable_with_trailing_newline() {
        let fd = make_here_doc_fd("payload").unwrap();
        let mut f = unsafe { <std::fs::File as std::os::fd::FromRawFd>::from_raw_fd(fd) };
        let mut buf = String::new();
        f.read_to_string(&mut buf).unwrap();
        assert_eq!(buf, "payload");
    }

    #[test]
    fn noclobber_rejects_existing_file() {
        let mut state = ShellState::new("psh", 1);
        state
            .options
            .set(ShellOption::NoClobber, true);
        let mut runner = Noop;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exists.txt");
        std::fs::write(&path, "old").unwrap();
        let redir = Redir {
            fd: Some(psh_syntax::syntax::Fd(3)),
            op: RedirOp::FileOut,
            body: RedirBody::Normal {
                operand: literal_word(path.to_str().unwrap()),
            },
        };
        let result = RedirGuard::apply(std::slice::from_ref(&redir), &mut state, &mut runner);
        assert!(result.is_err());
    }
}
