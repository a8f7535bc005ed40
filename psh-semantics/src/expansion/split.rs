// This file is part of psh, a POSIX-flavored shell.
// Copyright (C) 2021 WATANABE Yuki

//! Field splitting on `$IFS`.
//!
//! Only characters produced by an expansion and left unquoted are eligible
//! split points ([`Origin::SoftExpansion`], `is_quoted == false`); a literal
//! character that happens to equal an `IFS` character (impossible for plain
//! whitespace, since the lexer already split the word boundary there, but
//! possible for a custom `IFS` containing e.g. `,`) is never a split point.

use crate::expansion::attr::{AttrChar, AttrField, Origin};
use psh_env::ShellState;

fn ifs_chars(state: &ShellState) -> (Vec<char>, Vec<char>) {
    let ifs = state.variables.get_str("IFS").unwrap_or(" \t\n");
    let mut whitespace = Vec::new();
    let mut other = Vec::new();
    for c in ifs.chars() {
        if c.is_whitespace() {
            whitespace.push(c);
        } else {
            other.push(c);
        }
    }
    (whitespace, other)
}

fn is_split_point(c: &AttrChar, whitespace: &[char], other: &[char]) -> bool {
    c.origin == Origin::SoftExpansion
        && !c.is_quoted
        && (whitespace.contains(&c.value) || other.contains(&c.value))
}

/// Splits one field into zero or more fields on unquoted `IFS` characters.
/// If `IFS` is unset, whitespace splitting applies (the default); if `IFS`
/// is set but empty, no splitting occurs at all.
#[must_use]
pub fn split(field: AttrField, state: &ShellState) -> Vec<AttrField> {
    if state.variables.get_str("IFS") == Some("") {
        return vec![field];
    }
    let (whitespace, other) = ifs_chars(state);
    if whitespace.is_empty() && other.is_empty() {
        return vec![field];
    }

    let mut fields = Vec::new();
    let mut current = Vec::new();
    let mut chars = field.0.into_iter().peekable();
    let mut pending_field_from_delim = false;

    while let Some(c) = chars.next() {
        if is_split_point(&c, &whitespace, &other) {
            let is_ws = whitespace.contains(&c.value);
            if !current.is_empty() || pending_field_from_delim {
                fields.push(AttrField(std::mem::take(&mut current)));
            }
            pending_field_from_delim = !is_ws;
            // Collapse a run of adjacent IFS whitespace into one delimiter.
            while let Some(next) = chars.peek() {
                if is_split_point(next, &whitespace, &[]) {
                    chars.next();
                } else {
                    break;
                }
            }
        } else {
            current.push(c);
        }
    }
    if !current.is_empty() || pending_field_from_delim {
        fields.push(AttrField(current));
    }
    if fields.is_empty() {
        fields.push(AttrField::default());
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    fn soft_unquoted(s: &str) -> Vec<AttrChar> {
        s.chars()
            .map(|c| AttrChar {
                value: c,
                origin: Origin::SoftExpansion,
                is_quoted: false,
                is_quoting: false,
            })
            .collect()
    }

    #[test]
    fn splits_on_default_whitespace() {
        let state = ShellState::new("psh", 1);
        let field = AttrField(soft_unquoted("a b  c"));
        let fields = split(field, &state);
        let strings: Vec<String> = fields.iter().map(|f| f.strip()).collect();
        assert_eq!(strings, vec!["a", "b", "c"]);
    }

    #[test]
    fn quoted_characters_are_never_split_points() {
        let state = ShellState::new("psh", 1);
        let mut chars = soft_unquoted("a");
        chars.push(AttrChar {
            value: ' ',
            origin: Origin::SoftExpansion,
            is_quoted: true,
            is_quoting: false,
        });
        chars.extend(soft_unquoted("b"));
        let fields = split(AttrField(chars), &state);
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].strip(), "a b");
    }

    #[test]
    fn empty_ifs_disables_splitting() {
        let mut state = ShellState::new("psh", 1);
        state
            .assign_variable("IFS", psh_env::Variable::new(""))
            .unwrap();
        let field = AttrField(soft_unquoted("a b c"));
        let fields = split(field, &state);
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].strip(), "a b c");
    }
}
