// This file is part of psh, a POSIX-flavored shell.
// Copyright (C) 2022 WATANABE Yuki

//! Tilde expansion (`~`, `~name`), the leftmost-literal-part-only, unquoted-
//! only case of `WordUnit::Tilde`.

use crate::error::ExpansionError;
use crate::expansion::attr::{AttrChar, Origin};
use psh_env::ShellState;
use psh_syntax::source::Location;

/// Resolves `~name`'s home directory. An empty `name` means `$HOME`;
/// otherwise the name is looked up in the password database via `nix`. An
/// unresolvable name falls back to the literal `~name` text rather than
/// erroring — the one documented silent-fallback exception to this crate's
/// otherwise-strict "never silently downgrade" rule.
fn resolve_body(name: &str, state: &ShellState) -> Result<String, ExpansionError> {
    if name.is_empty() {
        return Ok(state
            .variables
            .get_str("HOME")
            .unwrap_or("~")
            .to_owned());
    }
    match nix::unistd::User::from_name(name) {
        Ok(Some(user)) => Ok(user.dir.to_string_lossy().into_owned()),
        _ => Ok(format!("~{name}")),
    }
}

/// Expands `~name` (the string after the `~`, before any `/`) into a run of
/// [`AttrChar`]s tagged [`Origin::HardExpansion`] so it is never subject to
/// pathname expansion.
#[must_use]
pub fn expand(name: &str, followed_by_slash: bool, state: &ShellState, _location: &Location) -> Vec<AttrChar> {
    let mut text = resolve_body(name, state).unwrap_or_else(|_| format!("~{name}"));
    if followed_by_slash {
        if let Some(stripped) = text.strip_suffix('/') {
            text = stripped.to_owned();
        }
    }
    let mut chars: Vec<AttrChar> = text
        .chars()
        .map(|c| AttrChar {
            value: c,
            origin: Origin::HardExpansion,
            is_quoted: false,
            is_quoting: false,
        })
        .collect();
    if chars.is_empty() {
        // A dummy quoting character keeps an empty $HOME from being
        // stripped away entirely by field splitting/empty-field removal.
        chars.push(AttrChar {
            value: '"',
            origin: Origin::HardExpansion,
            is_quoted: false,
            is_quoting: true,
        });
    }
    chars
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_name_uses_home_variable() {
        let mut state = ShellState::new("psh", 1);
        state
            .assign_variable("HOME", psh_env::Variable::new("/home/foobar"))
            .unwrap();
        let chars = expand("", false, &state, &Location::dummy(0..0));
        let value: String = chars.iter().map(|c| c.value).collect();
        assert_eq!(value, "/home/foobar");
        assert!(chars.iter().all(|c| c.origin == Origin::HardExpansion));
    }

    #[test]
    fn unresolvable_name_falls_back_to_literal() {
        let state = ShellState::new("psh", 1);
        let chars = expand("no-such-user-xyz", false, &state, &Location::dummy(0..0));
        let value: String = chars.iter().map(|c| c.value).collect();
        assert_eq!(value, "~no-such-user-xyz");
    }

    #[test]
    fn trailing_slash_stripped_when_followed_by_slash() {
        let mut state = ShellState::new("psh", 1);
        state
            .assign_variable("HOME", psh_env::Variable::new("/home/user/"))
            .unwrap();
        let chars = expand("", true, &state, &Location::dummy(0..0));
        let value: String = chars.iter().map(|c| c.value).collect();
        assert_eq!(value, "/home/user");
    }
}
