// This file is part of psh, a POSIX-flavored shell.
// Copyright (C) 2021 WATANABE Yuki

//! Shell options settable via `set -o`/`set +o` and their short flags.

use enumset::{EnumSet, EnumSetType};

/// One `set -o name`/`set +o name` option.
#[derive(Debug, EnumSetType)]
#[enumset(no_super_impls)]
pub enum Option {
    /// `-e`: exit on a failing command outside a conditional context
    ErrExit,
    /// `-u`: reading an unset variable in expansion is an error
    NoUnset,
    /// `-x`: trace each command to stderr, prefixed by `PS4`
    XTrace,
    /// `-o pipefail`: a pipeline's exit code is its rightmost non-zero stage
    PipeFail,
    /// `-C`: refuse `>` onto an existing regular file
    NoClobber,
    /// `-f`: disable pathname expansion
    NoGlob,
    /// `-a`: export every variable on assignment
    AllExport,
    /// `-m`: enable job control (process groups, terminal handoff)
    Monitor,
    /// `--ignore-eof`: ignore EOF from the interactive terminal (external REPL concern)
    IgnoreEof,
    /// `-o vi`: vi-style line editing (external REPL concern)
    Vi,
    /// `-o emacs`: emacs-style line editing (external REPL concern)
    Emacs,
    /// `--posix`: favor strict POSIX behavior over extensions
    Posix,
}

pub use Option::*;

impl Option {
    /// Short flag letter, if the option has one.
    #[must_use]
    pub const fn short_flag(self) -> std::option::Option<char> {
        match self {
            ErrExit => Some('e'),
            NoUnset => Some('u'),
            XTrace => Some('x'),
            NoClobber => Some('C'),
            NoGlob => Some('f'),
            AllExport => Some('a'),
            Monitor => Some('m'),
            PipeFail | IgnoreEof | Vi | Emacs | Posix => None,
        }
    }

    /// Long name as accepted by `set -o`/`set +o`.
    #[must_use]
    pub const fn long_name(self) -> &'static str {
        match self {
            ErrExit => "errexit",
            NoUnset => "nounset",
            XTrace => "xtrace",
            PipeFail => "pipefail",
            NoClobber => "noclobber",
            NoGlob => "noglob",
            AllExport => "allexport",
            Monitor => "monitor",
            IgnoreEof => "ignoreeof",
            Vi => "vi",
            Emacs => "emacs",
            Posix => "posix",
        }
    }

    #[must_use]
    pub fn all() -> EnumSet<Option> {
        EnumSet::all()
    }

    #[must_use]
    pub fn from_short_flag(c: char) -> std::option::Option<Self> {
        Self::all().iter().find(|o| o.short_flag() == Some(c))
    }

    #[must_use]
    pub fn from_long_name(s: &str) -> std::option::Option<Self> {
        Self::all().iter().find(|o| o.long_name() == s)
    }
}

/// Set of currently enabled [`Option`]s.
#[derive(Clone, Debug, Default)]
pub struct OptionSet {
    enabled: EnumSet<Option>,
}

impl OptionSet {
    #[must_use]
    pub fn is_set(&self, option: Option) -> bool {
        self.enabled.contains(option)
    }

    pub fn set(&mut self, option: Option, value: bool) {
        if value {
            self.enabled.insert(option);
        } else {
            self.enabled.remove(option);
        }
    }

    /// All currently enabled options, for `$-` and `set -o` with no operand.
    pub fn iter_enabled(&self) -> impl Iterator<Item = Option> + '_ {
        self.enabled.iter()
    }
}
